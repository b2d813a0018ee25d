use crate::jvm::class_file::{Attribute, Field, Method};
use crate::jvm::constants::ConstantTable;
use crate::jvm::{ClassAccessFlags, Deserialize, Error, FormatError, Serialize};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::fs;
use std::path::Path;

/// Representation of the [`class` file format of the JVM][0]
///
/// Constants are kept as a class-local [`ConstantTable`], already resolved.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html
#[derive(Debug)]
pub struct ClassFile {
    pub version: Version,
    pub constants: ConstantTable,
    pub access_flags: ClassAccessFlags,
    pub this_class: u16,

    /// Superclass, or 0 for `java/lang/Object`
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Magic header bytes that go at the front of the serialized class file
    pub const MAGIC: u32 = 0xCAFE_BABE;

    /// Read a class file from disk
    pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<ClassFile, Error> {
        let bytes = fs::read(path)?;
        ClassFile::read(&mut bytes.as_slice())
    }

    pub fn read<R: ReadBytesExt>(reader: &mut R) -> Result<ClassFile, Error> {
        let magic = u32::deserialize(reader)?;
        if magic != ClassFile::MAGIC {
            return Err(Error::Format(FormatError::BadMagic(magic)));
        }
        let version = Version::deserialize(reader)?;

        let mut constants = ConstantTable::parse(reader)?;
        constants.resolve_all()?;

        let access_flags = ClassAccessFlags::deserialize(reader)?;
        let this_class = u16::deserialize(reader)?;
        let class_name = constants.class_name(this_class)?.to_owned();
        let super_class = u16::deserialize(reader)?;
        let interfaces = Vec::deserialize(reader)?;
        let fields = Vec::deserialize(reader)?;

        let method_count = u16::deserialize(reader)?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            methods.push(Method::read(reader, &constants, &class_name)?);
        }

        let attributes = Vec::deserialize(reader)?;
        log::debug!(
            "Read class {} ({} constant slots, {} methods)",
            class_name,
            constants.len(),
            methods.len()
        );

        Ok(ClassFile {
            version,
            constants,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// Binary name of the class, eg. `java/lang/String`
    pub fn name(&self) -> Result<&str, Error> {
        self.constants.class_name(self.this_class)
    }
}

/// Class file version
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Version {
    pub minor: u16,
    pub major: u16,
}

impl Version {
    pub const JAVA1_1: Version = Version {
        minor: 3,
        major: 45,
    };
}

impl Serialize for Version {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.minor.serialize(writer)?;
        self.major.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Version {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(Version {
            minor: u16::deserialize(reader)?,
            major: u16::deserialize(reader)?,
        })
    }
}
