use super::opcodes::{self, ConstantOperand};
use crate::jvm::constants::{ConstantMap, ConstantPool};
use crate::jvm::{ConsistencyError, Error, FormatError, ScanError, Serialize};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

/// Where a [`CodeUnit`] is in its lifecycle
///
/// Code moves forward through these states exactly once. In particular, relocated code holds
/// final pool indices and can never be relocated again.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CodeState {
    Unscanned,
    Scanned,
    IndicesResolved,
    Relocated,
}

/// Bytecode of a method, along with the location of every constant pool operand in it
#[derive(Clone, Debug)]
pub struct CodeUnit {
    /// Name of the method (for error messages), eg. `Foo.bar(I)V`
    method: String,

    code: Vec<u8>,

    /// Offsets of instructions with a one-byte constant operand
    single_byte_refs: Vec<usize>,

    /// Offsets of instructions with a two-byte constant operand
    wide_refs: Vec<usize>,

    /// Offsets of every instruction, in increasing order
    boundaries: Vec<usize>,

    state: CodeState,
}

impl CodeUnit {
    pub fn new(method: impl Into<String>, code: Vec<u8>) -> CodeUnit {
        CodeUnit {
            method: method.into(),
            code,
            single_byte_refs: vec![],
            wide_refs: vec![],
            boundaries: vec![],
            state: CodeState::Unscanned,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn state(&self) -> CodeState {
        self.state
    }

    pub fn single_byte_refs(&self) -> &[usize] {
        &self.single_byte_refs
    }

    pub fn wide_refs(&self) -> &[usize] {
        &self.wide_refs
    }

    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.code
    }

    pub(crate) fn replace_code(&mut self, code: Vec<u8>, boundaries: Vec<usize>) {
        self.code = code;
        self.boundaries = boundaries;
    }

    pub(crate) fn set_state(&mut self, state: CodeState) {
        self.state = state;
    }

    /// Classify every instruction, recording the offsets of constant pool operands
    pub fn scan(&mut self) -> Result<(), Error> {
        if matches!(
            self.state,
            CodeState::IndicesResolved | CodeState::Relocated
        ) {
            return Err(Error::Consistency(ConsistencyError::AlreadyRelocated {
                method: self.method.clone(),
            }));
        }
        if self.code.len() > u16::MAX as usize {
            return Err(Error::Format(FormatError::CodeTooLong {
                method: self.method.clone(),
                length: self.code.len(),
            }));
        }

        let mut single_byte_refs = vec![];
        let mut wide_refs = vec![];
        let mut boundaries = vec![];

        let mut offset = 0;
        while offset < self.code.len() {
            let opcode = self.code[offset];
            let length = self.instruction_length(offset)?;
            if offset + length > self.code.len() {
                return Err(Error::Scan(ScanError::Truncated {
                    method: self.method.clone(),
                    offset,
                }));
            }

            match opcodes::constant_operand(opcode) {
                ConstantOperand::SingleByte => single_byte_refs.push(offset),
                ConstantOperand::Wide => wide_refs.push(offset),
                ConstantOperand::None => (),
            }
            boundaries.push(offset);
            offset += length;
        }

        log::trace!(
            "Scanned {}: {} instructions, {} ldc and {} wide constant operands",
            self.method,
            boundaries.len(),
            single_byte_refs.len(),
            wide_refs.len()
        );
        self.single_byte_refs = single_byte_refs;
        self.wide_refs = wide_refs;
        self.boundaries = boundaries;
        self.state = CodeState::Scanned;
        Ok(())
    }

    /// Length of the instruction at `offset`, opcode included
    fn instruction_length(&self, offset: usize) -> Result<usize, Error> {
        let opcode = self.code[offset];
        if let Some(length) = opcodes::fixed_length(opcode) {
            return Ok(length);
        }

        match opcode {
            // Operands start on the next 4-byte boundary (relative to the start of the code)
            opcodes::TABLESWITCH => {
                let operands = (offset + 4) & !3;
                let low = self.read_i32(offset, operands + 4)? as i64;
                let high = self.read_i32(offset, operands + 8)? as i64;
                let entries = (high - low + 1).max(0) as usize;
                Ok(operands + 12 + 4 * entries - offset)
            }
            opcodes::LOOKUPSWITCH => {
                let operands = (offset + 4) & !3;
                let pairs = self.read_i32(offset, operands + 4)?.max(0) as usize;
                Ok(operands + 8 + 8 * pairs - offset)
            }
            opcodes::WIDE => {
                let modified = *self.code.get(offset + 1).ok_or_else(|| {
                    Error::Scan(ScanError::Truncated {
                        method: self.method.clone(),
                        offset,
                    })
                })?;
                opcodes::wide_length(modified).ok_or_else(|| {
                    Error::Scan(ScanError::UnknownWideOpcode {
                        method: self.method.clone(),
                        offset,
                        opcode: modified,
                    })
                })
            }
            _ => Err(Error::Scan(ScanError::UnknownOpcode {
                method: self.method.clone(),
                offset,
                opcode,
            })),
        }
    }

    /// Read a switch operand of the instruction at `offset`
    fn read_i32(&self, offset: usize, at: usize) -> Result<i32, Error> {
        match self.code.get(at..at + 4) {
            Some(bytes) => Ok(BigEndian::read_i32(bytes)),
            None => Err(Error::Scan(ScanError::Truncated {
                method: self.method.clone(),
                offset,
            })),
        }
    }

    /// One-byte constant operand of the instruction at `offset`
    pub fn single_byte_operand(&self, offset: usize) -> u16 {
        self.code[offset + 1] as u16
    }

    /// Two-byte constant operand of the instruction at `offset`
    pub fn wide_operand(&self, offset: usize) -> u16 {
        BigEndian::read_u16(&self.code[offset + 1..offset + 3])
    }

    /// Charge every constant operand to the shared entry standing in for it
    ///
    /// Each operand is one reference. One-byte operands also count as `ldc` references, which
    /// decides what gets sorted to the front of the pool.
    pub fn count_references(&self, map: &ConstantMap, pool: &mut ConstantPool) -> Result<(), Error> {
        if self.state != CodeState::Scanned {
            return Err(Error::Consistency(ConsistencyError::NotScanned {
                method: self.method.clone(),
            }));
        }

        for offset in &self.single_byte_refs {
            let handle = map.lookup(self.single_byte_operand(*offset), &self.method, *offset)?;
            pool.inc_reference(handle.entry);
            pool.note_ldc_reference(handle.entry);
        }
        for offset in &self.wide_refs {
            let handle = map.lookup(self.wide_operand(*offset), &self.method, *offset)?;
            pool.inc_reference(handle.entry);
        }
        Ok(())
    }
}

/// Code array as in the `Code` attribute: a `u32` length, then the bytes
impl Serialize for CodeUnit {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        (self.code.len() as u32).serialize(writer)?;
        writer.write_all(&self.code)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn scanned(code: Vec<u8>) -> CodeUnit {
        let mut unit = CodeUnit::new("Test.run()V", code);
        unit.scan().unwrap();
        unit
    }

    #[test]
    fn classifies_constant_operands() {
        let unit = scanned(vec![
            0x12, 0x05, // ldc #5
            0xb2, 0x00, 0x07, // getstatic #7
            0x13, 0x01, 0x00, // ldc_w #256
            0x14, 0x00, 0x09, // ldc2_w #9
            0xbb, 0x00, 0x02, // new #2
            0x59, // dup
            0xb7, 0x00, 0x03, // invokespecial #3
            0xb9, 0x00, 0x04, 0x01, 0x00, // invokeinterface #4, 1
            0xc5, 0x00, 0x06, 0x02, // multianewarray #6, 2
            0x10, 0x12, // bipush 18 (not a constant, despite looking like ldc)
            0xb1, // return
        ]);
        assert_eq!(unit.single_byte_refs(), &[0]);
        assert_eq!(unit.wide_refs(), &[2, 5, 8, 11, 15, 18, 23]);
        assert_eq!(unit.boundaries(), &[0, 2, 5, 8, 11, 14, 15, 18, 23, 27, 29]);
        assert_eq!(unit.single_byte_operand(0), 5);
        assert_eq!(unit.wide_operand(5), 256);
        assert_eq!(unit.state(), CodeState::Scanned);
    }

    #[test]
    fn skips_aligned_tableswitch() {
        let unit = scanned(vec![
            0x03, // iconst_0
            0xaa, // tableswitch
            0x00, 0x00, // padding up to offset 4
            0x00, 0x00, 0x00, 0x14, // default
            0x00, 0x00, 0x00, 0x01, // low
            0x00, 0x00, 0x00, 0x02, // high
            0x00, 0x00, 0x00, 0x14, // 1
            0x00, 0x00, 0x00, 0x14, // 2
            0x12, 0x01, // ldc #1
            0xb1, // return
        ]);
        assert_eq!(unit.boundaries(), &[0, 1, 24, 26]);
        assert_eq!(unit.single_byte_refs(), &[24]);
    }

    #[test]
    fn skips_aligned_lookupswitch() {
        let unit = scanned(vec![
            0xab, // lookupswitch (at 0, so 3 padding bytes)
            0x00, 0x00, 0x00, //
            0x00, 0x00, 0x00, 0x10, // default
            0x00, 0x00, 0x00, 0x01, // npairs
            0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00, 0x10, // 7 => +16
            0xb2, 0x00, 0x01, // getstatic #1
        ]);
        assert_eq!(unit.boundaries(), &[0, 20]);
        assert_eq!(unit.wide_refs(), &[20]);
    }

    #[test]
    fn skips_wide_instructions() {
        let unit = scanned(vec![
            0xc4, 0x15, 0x01, 0x00, // wide iload 256
            0xc4, 0x84, 0x01, 0x00, 0xff, 0xff, // wide iinc 256, -1
            0x12, 0x02, // ldc #2
        ]);
        assert_eq!(unit.boundaries(), &[0, 4, 10]);
        assert_eq!(unit.single_byte_refs(), &[10]);
    }

    #[test]
    fn unknown_wide_opcode_is_fatal() {
        let mut unit = CodeUnit::new("Test.bad()V", vec![0x00, 0xc4, 0xa7, 0x00, 0x00]);
        match unit.scan() {
            Err(Error::Scan(ScanError::UnknownWideOpcode {
                method,
                offset: 1,
                opcode: 0xa7,
            })) => assert_eq!(method, "Test.bad()V"),
            other => panic!("expected unknown wide opcode, got {:?}", other),
        }
    }

    #[test]
    fn truncated_instruction_is_fatal() {
        let mut unit = CodeUnit::new("Test.bad()V", vec![0x00, 0xb2, 0x00]);
        assert!(matches!(
            unit.scan(),
            Err(Error::Scan(ScanError::Truncated { offset: 1, .. }))
        ));
    }

    #[test]
    fn code_past_offset_limit_is_rejected() {
        let mut code = vec![0x00; 0x1_0000];
        code.extend_from_slice(&[0x12, 0x05]);
        let mut unit = CodeUnit::new("Test.huge()V", code);
        match unit.scan() {
            Err(Error::Format(FormatError::CodeTooLong { method, length })) => {
                assert_eq!(method, "Test.huge()V");
                assert_eq!(length, 0x1_0002);
            }
            other => panic!("expected oversized code, got {:?}", other),
        }
        assert_eq!(unit.state(), CodeState::Unscanned);

        let mut largest = vec![0x00; 0xFFFD];
        largest.extend_from_slice(&[0x12, 0x05]);
        let largest = scanned(largest);
        assert_eq!(largest.single_byte_refs(), &[0xFFFD]);
    }

    #[test]
    fn unassigned_opcode_is_fatal() {
        let mut unit = CodeUnit::new("Test.bad()V", vec![0xf0]);
        assert!(matches!(
            unit.scan(),
            Err(Error::Scan(ScanError::UnknownOpcode { opcode: 0xf0, .. }))
        ));
    }
}
