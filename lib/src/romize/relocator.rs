use super::OffsetMap;
use crate::jvm::class_file::AttributeLike;
use crate::jvm::code::{
    AuxiliaryTables, CodeState, CodeUnit, LineNumberTable, LocalVariableTable, StackMap,
    VerificationType,
};
use crate::jvm::constants::{ConstantMap, ConstantPool};
use crate::jvm::{ConsistencyError, Error, FormatError, OverflowError};

/// Rewrites code and its tables so that constant operands are indices into a final pool
///
/// The pool must no longer change (sorting and compaction are done). Relocation of a method
/// happens in two steps: first every constant reference is resolved to its final index, then the
/// code is copied with patched operands and every table offset is translated. The code and tables
/// are only written back once both steps have succeeded, but code that made it past the first
/// step can never be relocated again.
pub struct RelocationEngine<'p> {
    pool: &'p ConstantPool,
}

impl<'p> RelocationEngine<'p> {
    pub fn new(pool: &'p ConstantPool) -> RelocationEngine<'p> {
        RelocationEngine { pool }
    }

    /// Relocate the code of one method along with its tables
    ///
    /// `map` must be the constant map produced when the method's class was merged into the pool.
    pub fn relocate(
        &self,
        code: &mut CodeUnit,
        tables: &mut AuxiliaryTables,
        map: &ConstantMap,
    ) -> Result<(), Error> {
        match code.state() {
            CodeState::Scanned => (),
            CodeState::Unscanned => {
                return Err(Error::Consistency(ConsistencyError::NotScanned {
                    method: code.method().to_owned(),
                }))
            }
            CodeState::IndicesResolved | CodeState::Relocated => {
                return Err(Error::Consistency(ConsistencyError::AlreadyRelocated {
                    method: code.method().to_owned(),
                }))
            }
        }
        let method = code.method().to_owned();
        let method = method.as_str();

        // Resolve every constant before touching anything
        let mut single_byte_operands = Vec::with_capacity(code.single_byte_refs().len());
        for offset in code.single_byte_refs() {
            let original_index = code.single_byte_operand(*offset);
            let index = self.final_index(map, original_index, method, *offset)?;
            if index > u8::MAX as u16 {
                return Err(Error::Overflow(OverflowError {
                    method: method.to_owned(),
                    offset: *offset,
                    index,
                }));
            }
            single_byte_operands.push((*offset, index as u8));
        }
        let mut wide_operands = Vec::with_capacity(code.wide_refs().len());
        for offset in code.wide_refs() {
            let original_index = code.wide_operand(*offset);
            let index = self.final_index(map, original_index, method, *offset)?;
            wide_operands.push((*offset, index));
        }
        let mut relocated_tables = tables.clone();
        self.relocate_table_constants(&mut relocated_tables, map, method)?;
        code.set_state(CodeState::IndicesResolved);

        // Copy the code one instruction at a time, recording where each one lands
        let boundaries = code.boundaries();
        let mut offsets = OffsetMap::new(code.len());
        let mut new_code: Vec<u8> = Vec::with_capacity(code.len());
        let mut new_boundaries = Vec::with_capacity(boundaries.len());
        for (i, start) in boundaries.iter().enumerate() {
            let end = boundaries.get(i + 1).copied().unwrap_or_else(|| code.len());
            offsets.insert(*start, new_code.len());
            new_boundaries.push(new_code.len());
            new_code.extend_from_slice(&code.code()[*start..end]);
        }
        offsets.insert(code.len(), new_code.len());

        for (offset, index) in single_byte_operands {
            let at = offsets.instruction(offset, method, "code")?;
            new_code[at + 1] = index;
        }
        for (offset, index) in wide_operands {
            let at = offsets.instruction(offset, method, "code")?;
            new_code[at + 1..at + 3].copy_from_slice(&index.to_be_bytes());
        }
        Self::relocate_table_offsets(&mut relocated_tables, &offsets, method)?;

        log::trace!(
            "Relocated {} ({} constant operands)",
            method,
            code.single_byte_refs().len() + code.wide_refs().len()
        );
        code.replace_code(new_code, new_boundaries);
        code.set_state(CodeState::Relocated);
        *tables = relocated_tables;
        Ok(())
    }

    /// Final pool index for a class-local index used at some offset
    fn final_index(
        &self,
        map: &ConstantMap,
        original_index: u16,
        method: &str,
        offset: usize,
    ) -> Result<u16, Error> {
        let handle = map.lookup(original_index, method, offset)?;
        if handle.pool != self.pool.id() {
            return Err(Error::Consistency(
                ConsistencyError::ForeignSharedConstant {
                    method: method.to_owned(),
                    offset,
                    pool: handle.pool,
                },
            ));
        }

        let entry = self
            .pool
            .get(handle.entry)
            .ok_or(Error::Format(FormatError::DanglingEntry(handle.entry)))?;
        if entry.is_deleted() {
            return Err(Error::Consistency(ConsistencyError::DeletedConstant {
                method: method.to_owned(),
                offset,
                original_index,
            }));
        }
        Ok(entry.index as u16)
    }

    fn relocate_table_constants(
        &self,
        tables: &mut AuxiliaryTables,
        map: &ConstantMap,
        method: &str,
    ) -> Result<(), Error> {
        for handler in &mut tables.exception_table {
            if let Some(catch_type) = handler.catch_type {
                let offset = handler.handler_pc as usize;
                handler.catch_type = Some(self.final_index(map, catch_type, method, offset)?);
            }
        }

        if let Some(LocalVariableTable(variables)) = &mut tables.local_variables {
            for variable in variables {
                let offset = variable.start_pc as usize;
                variable.name_index = self.final_index(map, variable.name_index, method, offset)?;
                variable.descriptor_index =
                    self.final_index(map, variable.descriptor_index, method, offset)?;
            }
        }

        if let Some(StackMap(frames)) = &mut tables.stack_map {
            for frame in frames {
                let offset = frame.offset as usize;
                for verification_type in frame.locals.iter_mut().chain(frame.stack.iter_mut()) {
                    if let VerificationType::Object(class) = verification_type {
                        *class = self.final_index(map, *class, method, offset)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn relocate_table_offsets(
        tables: &mut AuxiliaryTables,
        offsets: &OffsetMap,
        method: &str,
    ) -> Result<(), Error> {
        let narrow = |new_offset: usize| -> Result<u16, Error> {
            u16::try_from(new_offset).map_err(|_| {
                Error::Format(FormatError::CodeTooLong {
                    method: method.to_owned(),
                    length: new_offset,
                })
            })
        };
        let instruction = |offset: u16, table: &'static str| -> Result<u16, Error> {
            narrow(offsets.instruction(offset as usize, method, table)?)
        };
        let range_end = |offset: usize, table: &'static str| -> Result<u16, Error> {
            narrow(offsets.range_end(offset, method, table)?)
        };

        for handler in &mut tables.exception_table {
            handler.start_pc = instruction(handler.start_pc, "exception table")?;
            handler.end_pc = range_end(handler.end_pc as usize, "exception table")?;
            handler.handler_pc = instruction(handler.handler_pc, "exception table")?;
        }

        if let Some(LineNumberTable(lines)) = &mut tables.line_numbers {
            for line in lines {
                line.start_pc = instruction(line.start_pc, LineNumberTable::NAME)?;
            }
        }

        if let Some(LocalVariableTable(variables)) = &mut tables.local_variables {
            for variable in variables {
                let end_pc = variable.start_pc as usize + variable.length as usize;
                let start_pc = instruction(variable.start_pc, LocalVariableTable::NAME)?;
                let end_pc = range_end(end_pc, LocalVariableTable::NAME)?;
                variable.start_pc = start_pc;
                variable.length = end_pc - start_pc;
            }
        }

        if let Some(StackMap(frames)) = &mut tables.stack_map {
            for frame in frames {
                frame.offset = instruction(frame.offset, StackMap::NAME)?;
                for verification_type in frame.locals.iter_mut().chain(frame.stack.iter_mut()) {
                    if let VerificationType::Uninitialized(new_offset) = verification_type {
                        *new_offset = instruction(*new_offset, StackMap::NAME)?;
                    }
                }
            }
        }

        Ok(())
    }
}
