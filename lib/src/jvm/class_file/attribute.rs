use crate::jvm::{read_bytes, Deserialize, Error, FormatError, Serialize};
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Attributes (used in classes, fields, methods, and even on some attributes)
///
/// Only the attributes of `Code` that are keyed by bytecode offsets get decoded. Everything else
/// is carried around as opaque bytes.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Attribute {
    pub name_index: u16,
    pub info: Vec<u8>,
}

impl Attribute {
    /// Decode the payload as a specific kind of attribute
    ///
    /// The payload must be consumed exactly.
    pub fn parse<A: AttributeLike + Deserialize>(&self) -> Result<A, Error> {
        let mut info: &[u8] = &self.info;
        let attribute = A::deserialize(&mut info)?;
        if !info.is_empty() {
            return Err(Error::Format(FormatError::AttributeLength {
                name: String::from(A::NAME),
                declared: self.info.len(),
                consumed: self.info.len() - info.len(),
            }));
        }
        Ok(attribute)
    }
}

impl Serialize for Attribute {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.name_index.serialize(writer)?;

        // Attribute info length is 4 bytes
        (self.info.len() as u32).serialize(writer)?;
        writer.write_all(&self.info)?;

        Ok(())
    }
}

impl Deserialize for Attribute {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let name_index = u16::deserialize(reader)?;
        let length = u32::deserialize(reader)?;
        let info = read_bytes(reader, length as usize)?;
        Ok(Attribute { name_index, info })
    }
}

/// Attributes are all stored in the same way (see `Attribute`), but internally
/// they represent very different things. This trait is implemented by things
/// which can be turned into attributes.
pub trait AttributeLike: Serialize {
    /// Name of the attribute
    const NAME: &'static str;
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::LineNumberTable;

    #[test]
    fn parse_must_consume_everything() {
        let attribute = Attribute {
            name_index: 1,
            info: vec![0, 1, 0, 0, 0, 7, 0xff],
        };
        match attribute.parse::<LineNumberTable>() {
            Err(Error::Format(FormatError::AttributeLength {
                name,
                declared: 7,
                consumed: 6,
            })) => assert_eq!(name, "LineNumberTable"),
            other => panic!("expected attribute length error, got {:?}", other),
        }
    }
}
