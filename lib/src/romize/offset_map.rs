use crate::jvm::{ConsistencyError, Error};

/// Translation of bytecode offsets from code before relocation to code after
///
/// Only instruction boundaries (and the end of the code) have an image. Since relocation never
/// changes the width of an instruction, the mapping built today is always the identity on those
/// offsets.
#[derive(Debug)]
pub struct OffsetMap {
    /// New offset, indexed by old offset
    offsets: Vec<Option<usize>>,
}

impl OffsetMap {
    /// Map for code of length `code_length`, with nothing mapped yet
    pub fn new(code_length: usize) -> OffsetMap {
        OffsetMap {
            offsets: vec![None; code_length + 1],
        }
    }

    pub fn insert(&mut self, old_offset: usize, new_offset: usize) {
        if old_offset >= self.offsets.len() {
            self.offsets.resize(old_offset + 1, None);
        }
        self.offsets[old_offset] = Some(new_offset);
    }

    /// Image of an offset, if it is mapped
    pub fn get(&self, old_offset: usize) -> Option<usize> {
        self.offsets.get(old_offset).copied().flatten()
    }

    /// Relocate the offset of an instruction
    pub fn instruction(
        &self,
        offset: usize,
        method: &str,
        table: &'static str,
    ) -> Result<usize, Error> {
        let end = self.offsets.len() - 1;
        match self.get(offset) {
            Some(new_offset) if offset != end => Ok(new_offset),
            _ => Err(Self::not_a_boundary(offset, method, table)),
        }
    }

    /// Relocate the exclusive end of a range, which may also be the end of the code
    pub fn range_end(
        &self,
        offset: usize,
        method: &str,
        table: &'static str,
    ) -> Result<usize, Error> {
        self.get(offset)
            .ok_or_else(|| Self::not_a_boundary(offset, method, table))
    }

    fn not_a_boundary(offset: usize, method: &str, table: &'static str) -> Error {
        Error::Consistency(ConsistencyError::NotInstructionBoundary {
            method: method.to_owned(),
            table,
            offset,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn unchanged(boundaries: &[usize], code_length: usize) -> OffsetMap {
        let mut map = OffsetMap::new(code_length);
        for boundary in boundaries {
            map.insert(*boundary, *boundary);
        }
        map.insert(code_length, code_length);
        map
    }

    #[test]
    fn boundaries_and_end_are_mapped() {
        let map = unchanged(&[0, 2, 5], 6);
        assert_eq!(map.instruction(2, "Foo.bar()V", "LineNumberTable").unwrap(), 2);
        assert_eq!(map.range_end(6, "Foo.bar()V", "exception table").unwrap(), 6);
        assert!(map.instruction(6, "Foo.bar()V", "exception table").is_err());
        assert!(map.get(3).is_none());
    }

    #[test]
    fn mid_instruction_offset_is_rejected() {
        let map = unchanged(&[0, 2, 5], 6);
        match map.instruction(1, "Foo.bar()V", "StackMap") {
            Err(Error::Consistency(ConsistencyError::NotInstructionBoundary {
                method,
                table: "StackMap",
                offset: 1,
            })) => assert_eq!(method, "Foo.bar()V"),
            other => panic!("expected boundary error, got {:?}", other),
        }
    }

    #[test]
    fn offsets_past_u16_do_not_wrap() {
        let map = unchanged(&[0, 0x1_0000], 0x1_0002);
        assert_eq!(map.instruction(0x1_0000, "Foo.bar()V", "code").unwrap(), 0x1_0000);
        assert!(map.instruction(1, "Foo.bar()V", "code").is_err());
    }
}
