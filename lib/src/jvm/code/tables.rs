use crate::jvm::class_file::AttributeLike;
use crate::jvm::{Deserialize, Error, FormatError, Serialize};
use byteorder::{ReadBytesExt, WriteBytesExt};

/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.7.3
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExceptionHandler {
    /// Start of exception handler range (inclusive)
    pub start_pc: u16,

    /// End of exception handler range (exclusive)
    pub end_pc: u16,

    /// Start of the exception handler
    pub handler_pc: u16,

    /// Class of exceptions caught, or `None` to catch everything
    pub catch_type: Option<u16>,
}

impl Serialize for ExceptionHandler {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.end_pc.serialize(writer)?;
        self.handler_pc.serialize(writer)?;
        self.catch_type.unwrap_or(0).serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ExceptionHandler {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let start_pc = u16::deserialize(reader)?;
        let end_pc = u16::deserialize(reader)?;
        let handler_pc = u16::deserialize(reader)?;
        let catch_type = match u16::deserialize(reader)? {
            0 => None,
            index => Some(index),
        };
        Ok(ExceptionHandler {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LineNumber {
    pub start_pc: u16,
    pub line_number: u16,
}

impl Serialize for LineNumber {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.line_number.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for LineNumber {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(LineNumber {
            start_pc: u16::deserialize(reader)?,
            line_number: u16::deserialize(reader)?,
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.7.12
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LineNumberTable(pub Vec<LineNumber>);

impl AttributeLike for LineNumberTable {
    const NAME: &'static str = "LineNumberTable";
}

impl Serialize for LineNumberTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for LineNumberTable {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(LineNumberTable(Vec::deserialize(reader)?))
    }
}

/// Local variable live in `start_pc .. start_pc + length`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LocalVariable {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub slot: u16,
}

impl Serialize for LocalVariable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.length.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.slot.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for LocalVariable {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(LocalVariable {
            start_pc: u16::deserialize(reader)?,
            length: u16::deserialize(reader)?,
            name_index: u16::deserialize(reader)?,
            descriptor_index: u16::deserialize(reader)?,
            slot: u16::deserialize(reader)?,
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.7.13
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LocalVariableTable(pub Vec<LocalVariable>);

impl AttributeLike for LocalVariableTable {
    const NAME: &'static str = "LocalVariableTable";
}

impl Serialize for LocalVariableTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for LocalVariableTable {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(LocalVariableTable(Vec::deserialize(reader)?))
    }
}

/// Verification types, as they appear in stack map frames
///
/// Only `Object` and `Uninitialized` carry data, and neither is a plain number: the first is a
/// constant pool index of a class, the second the bytecode offset of the `new` instruction that
/// created the value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    Object(u16),
    Uninitialized(u16),
}

impl Serialize for VerificationType {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            VerificationType::Top => 0u8.serialize(writer)?,
            VerificationType::Integer => 1u8.serialize(writer)?,
            VerificationType::Float => 2u8.serialize(writer)?,
            VerificationType::Double => 3u8.serialize(writer)?,
            VerificationType::Long => 4u8.serialize(writer)?,
            VerificationType::Null => 5u8.serialize(writer)?,
            VerificationType::UninitializedThis => 6u8.serialize(writer)?,
            VerificationType::Object(class) => {
                7u8.serialize(writer)?;
                class.serialize(writer)?;
            }
            VerificationType::Uninitialized(offset) => {
                8u8.serialize(writer)?;
                offset.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for VerificationType {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let verification_type = match u8::deserialize(reader)? {
            0 => VerificationType::Top,
            1 => VerificationType::Integer,
            2 => VerificationType::Float,
            3 => VerificationType::Double,
            4 => VerificationType::Long,
            5 => VerificationType::Null,
            6 => VerificationType::UninitializedThis,
            7 => VerificationType::Object(u16::deserialize(reader)?),
            8 => VerificationType::Uninitialized(u16::deserialize(reader)?),
            tag => return Err(Error::Format(FormatError::UnknownVerificationTag(tag))),
        };
        Ok(verification_type)
    }
}

/// Full description of the verifier state at one offset
///
/// Unlike the compressed frames of `StackMapTable`, frames here always list every local and
/// stack entry, and offsets are absolute.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackMapFrame {
    pub offset: u16,
    pub locals: Vec<VerificationType>,
    pub stack: Vec<VerificationType>,
}

impl Serialize for StackMapFrame {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.offset.serialize(writer)?;
        self.locals.serialize(writer)?;
        self.stack.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for StackMapFrame {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(StackMapFrame {
            offset: u16::deserialize(reader)?,
            locals: Vec::deserialize(reader)?,
            stack: Vec::deserialize(reader)?,
        })
    }
}

/// CLDC `StackMap` attribute
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackMap(pub Vec<StackMapFrame>);

impl AttributeLike for StackMap {
    const NAME: &'static str = "StackMap";
}

impl Serialize for StackMap {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for StackMap {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(StackMap(Vec::deserialize(reader)?))
    }
}

/// Every table of a method that is keyed by bytecode offsets
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AuxiliaryTables {
    pub exception_table: Vec<ExceptionHandler>,
    pub line_numbers: Option<LineNumberTable>,
    pub local_variables: Option<LocalVariableTable>,
    pub stack_map: Option<StackMap>,
}

impl AuxiliaryTables {
    /// Constant pool indices mentioned by the tables, each paired with the bytecode offset of the
    /// table entry mentioning it
    pub fn constant_refs(&self) -> Vec<(usize, u16)> {
        let mut refs = vec![];
        for handler in &self.exception_table {
            if let Some(catch_type) = handler.catch_type {
                refs.push((handler.handler_pc as usize, catch_type));
            }
        }
        if let Some(LocalVariableTable(variables)) = &self.local_variables {
            for variable in variables {
                refs.push((variable.start_pc as usize, variable.name_index));
                refs.push((variable.start_pc as usize, variable.descriptor_index));
            }
        }
        if let Some(StackMap(frames)) = &self.stack_map {
            for frame in frames {
                for verification_type in frame.locals.iter().chain(&frame.stack) {
                    if let VerificationType::Object(class) = verification_type {
                        refs.push((frame.offset as usize, *class));
                    }
                }
            }
        }
        refs
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn catch_all_handler_has_no_type() {
        let bytes: Vec<u8> = vec![0, 0, 0, 8, 0, 9, 0, 0];
        let handler = ExceptionHandler::deserialize(&mut bytes.as_slice()).unwrap();
        assert_eq!(handler.catch_type, None);

        let mut written = vec![];
        handler.serialize(&mut written).unwrap();
        assert_eq!(written, bytes);
    }

    #[test]
    fn stack_map_frame_layout() {
        let frame = StackMapFrame {
            offset: 12,
            locals: vec![VerificationType::Object(3), VerificationType::Integer],
            stack: vec![VerificationType::Uninitialized(4)],
        };
        let mut bytes = vec![];
        frame.serialize(&mut bytes).unwrap();
        assert_eq!(
            bytes,
            vec![0, 12, 0, 2, 7, 0, 3, 1, 0, 1, 8, 0, 4],
        );
        assert_eq!(
            StackMapFrame::deserialize(&mut bytes.as_slice()).unwrap(),
            frame
        );
    }

    #[test]
    fn unknown_verification_tag() {
        let bytes: Vec<u8> = vec![9];
        assert!(matches!(
            VerificationType::deserialize(&mut bytes.as_slice()),
            Err(Error::Format(FormatError::UnknownVerificationTag(9)))
        ));
    }

    #[test]
    fn constant_refs_cover_every_table() {
        let tables = AuxiliaryTables {
            exception_table: vec![
                ExceptionHandler {
                    start_pc: 0,
                    end_pc: 4,
                    handler_pc: 7,
                    catch_type: Some(10),
                },
                ExceptionHandler {
                    start_pc: 0,
                    end_pc: 4,
                    handler_pc: 9,
                    catch_type: None,
                },
            ],
            line_numbers: Some(LineNumberTable(vec![LineNumber {
                start_pc: 0,
                line_number: 3,
            }])),
            local_variables: Some(LocalVariableTable(vec![LocalVariable {
                start_pc: 0,
                length: 9,
                name_index: 11,
                descriptor_index: 12,
                slot: 0,
            }])),
            stack_map: Some(StackMap(vec![StackMapFrame {
                offset: 7,
                locals: vec![VerificationType::Object(13)],
                stack: vec![VerificationType::Uninitialized(0)],
            }])),
        };
        assert_eq!(
            tables.constant_refs(),
            vec![(7, 10), (0, 11), (0, 12), (7, 13)]
        );
    }
}
