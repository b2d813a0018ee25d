use super::{Error, RelocationEngine, Settings};
use crate::jvm;
use crate::jvm::class_file::ClassFile;
use crate::jvm::constants::{ConstantMap, ConstantPool, PoolId};
use crate::jvm::{ConsistencyError, Deserialize};
use byteorder::WriteBytesExt;
use std::fs;
use std::path::{Path, PathBuf};

/// Class whose constants have been merged into the shared pool
#[derive(Debug)]
pub struct LoadedClass {
    pub name: String,
    pub class: ClassFile,

    /// Where each of the class's constants ended up in the shared pool
    pub constants: ConstantMap,
}

/// How far along [`Romizer::finish`] got
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Stage {
    /// Classes can still be added
    Collecting,

    /// The pool is final and every method was relocated against it
    Finished,

    /// Finishing was attempted and failed part way. Nothing can be done with the pool anymore.
    Failed,
}

/// Main entry point for consolidating constants across classes
///
/// Classes are added one at a time. Once all classes are in, [`Romizer::finish`] freezes the
/// shared pool and relocates every method against it.
pub struct Romizer {
    settings: Settings,

    /// Id to give the next pool created
    next_pool_id: u32,

    shared_pool: ConstantPool,
    classes: Vec<LoadedClass>,
    stage: Stage,
}

impl Romizer {
    pub fn new(settings: Settings) -> Romizer {
        Romizer {
            settings,
            next_pool_id: 1,
            shared_pool: ConstantPool::new(PoolId(0)),
            classes: vec![],
            stage: Stage::Collecting,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Make a fresh pool, with an id distinct from every other pool of this romizer
    pub fn new_pool(&mut self) -> ConstantPool {
        let id = PoolId(self.next_pool_id);
        self.next_pool_id += 1;
        ConstantPool::new(id)
    }

    pub fn shared_pool(&self) -> &ConstantPool {
        &self.shared_pool
    }

    pub fn classes(&self) -> &[LoadedClass] {
        &self.classes
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Read a class file from disk and add it
    pub fn read_class<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        log::debug!("Reading '{}'", path.display());
        let class = ClassFile::read_from_path(path)
            .map_err(Error::in_class(&path.display().to_string()))?;
        self.add_class(class)
    }

    /// Merge the constants of a class into the shared pool
    ///
    /// The class's own table stops holding its constants once merged. What keeps a shared entry
    /// alive is a use from code, from a table attached to code, from the declarations of the
    /// class and its members, or from another live entry.
    pub fn add_class(&mut self, mut class: ClassFile) -> Result<(), Error> {
        let name = class.name()?.to_owned();
        let in_class = Error::in_class(&name);

        for method in &mut class.methods {
            if let Some(code) = &mut method.code {
                code.code.scan().map_err(&in_class)?;
            }
        }

        let pool = &mut self.shared_pool;
        let constants = class.constants.merge_into(pool).map_err(&in_class)?;
        for (index, _) in class.constants.iter() {
            if let Some(handle) = constants.get(index) {
                pool.dec_reference(handle.entry);
            }
        }

        Self::count_declarations(&class, &constants, pool, &name).map_err(&in_class)?;
        for method in &class.methods {
            if let Some(code) = &method.code {
                code.code.count_references(&constants, pool).map_err(&in_class)?;
                for (offset, index) in code.tables.constant_refs() {
                    let handle = constants
                        .lookup(index, code.code.method(), offset)
                        .map_err(&in_class)?;
                    pool.inc_reference(handle.entry);
                }
            }
        }

        log::debug!(
            "Merged {} ({} methods), shared pool now has {} entries",
            name,
            class.methods.len(),
            pool.entry_count()
        );
        self.classes.push(LoadedClass {
            name: name.clone(),
            class,
            constants,
        });
        Ok(())
    }

    /// Count uses of constants outside of code: the class's name, superclass, and interfaces,
    /// names and descriptors of members, and the initial values of fields
    fn count_declarations(
        class: &ClassFile,
        constants: &ConstantMap,
        pool: &mut ConstantPool,
        name: &str,
    ) -> Result<(), jvm::Error> {
        let mut indices = vec![class.this_class];
        if class.super_class != 0 {
            indices.push(class.super_class);
        }
        indices.extend(&class.interfaces);

        for field in &class.fields {
            indices.push(field.name_index);
            indices.push(field.descriptor_index);
            for attribute in &field.attributes {
                if class.constants.utf8(attribute.name_index)? == "ConstantValue" {
                    let value = u16::deserialize(&mut attribute.info.as_slice())?;
                    indices.push(attribute.name_index);
                    indices.push(value);
                }
            }
        }
        for method in &class.methods {
            indices.push(method.name_index);
            indices.push(method.descriptor_index);
        }

        for index in indices {
            let handle = constants.lookup(index, name, 0)?;
            pool.inc_reference(handle.entry);
        }
        Ok(())
    }

    /// Freeze the shared pool, then relocate every method against it
    ///
    /// The pool is locked, then sorted and compacted as the settings dictate. Calling this again
    /// after it succeeded does nothing. A failure is final: later calls report it again.
    pub fn finish(&mut self) -> Result<(), Error> {
        match self.stage {
            Stage::Collecting => (),
            Stage::Finished => return Ok(()),
            Stage::Failed => return Err(self.not_finished()),
        }

        self.stage = Stage::Failed;
        self.relocate_all()?;
        self.stage = Stage::Finished;
        Ok(())
    }

    fn relocate_all(&mut self) -> Result<(), Error> {
        let pool = &mut self.shared_pool;
        pool.lock();
        if self.settings.sort_by_ldc_usage {
            pool.sort_by_ldc_usage();
        }
        if self.settings.compact {
            let freed = pool.compact();
            log::info!("Compaction freed {} constant pool slots", freed);
        }

        let engine = RelocationEngine::new(&self.shared_pool);
        for loaded in &mut self.classes {
            let in_class = Error::in_class(&loaded.name);
            for method in &mut loaded.class.methods {
                if let Some(code) = &mut method.code {
                    engine
                        .relocate(&mut code.code, &mut code.tables, &loaded.constants)
                        .map_err(&in_class)?;
                }
            }
        }

        log::info!(
            "Relocated {} classes against a shared pool of {} entries ({} slots)",
            self.classes.len(),
            self.shared_pool.entry_count(),
            self.shared_pool.len()
        );
        Ok(())
    }

    fn not_finished(&self) -> Error {
        Error::Jvm(jvm::Error::Consistency(ConsistencyError::PoolNotFinished {
            pool: self.shared_pool.id(),
        }))
    }

    /// Serialize the shared pool, which must have been [finished](Romizer::finish)
    pub fn write_pool<W: WriteBytesExt>(&self, writer: &mut W) -> Result<(), Error> {
        if self.stage != Stage::Finished {
            return Err(self.not_finished());
        }
        self.shared_pool.write(writer)?;
        Ok(())
    }

    /// Save the shared pool into the output directory, returning the path written
    pub fn save_pool(&self) -> Result<PathBuf, Error> {
        if self.stage != Stage::Finished {
            return Err(self.not_finished());
        }
        fs::create_dir_all(&self.settings.output_directory).map_err(jvm::Error::IoError)?;
        let path = self
            .settings
            .output_directory
            .join(&self.settings.pool_file_name);

        let mut bytes = vec![];
        self.write_pool(&mut bytes)?;
        fs::write(&path, bytes).map_err(jvm::Error::IoError)?;
        log::info!("Wrote '{}'", path.display());
        Ok(path)
    }
}
