use super::{
    Constant, ConstantEntry, ConstantPool, ConstantRef, ConstantSource, EntryId, PoolId, RefTarget,
};
use crate::jvm::{ConsistencyError, Deserialize, Error, FormatError};
use crate::util::Width;
use byteorder::ReadBytesExt;

/// Constants of a single class, exactly as laid out in its class file
///
/// Entries in the table are unshared: they belong to the class that was read, and are only ever
/// copied into a [`ConstantPool`], never moved. Index 0 and the slot after every `long` or
/// `double` are empty.
#[derive(Clone, Debug)]
pub struct ConstantTable {
    slots: Vec<Option<ConstantEntry>>,
}

impl ConstantTable {
    /// Make a fresh empty table
    pub fn new() -> ConstantTable {
        ConstantTable { slots: vec![None] }
    }

    /// Read the `constant_pool_count` and the entries that follow it
    ///
    /// References are left as raw indices: see [`ConstantTable::resolve_all`].
    pub fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<ConstantTable, Error> {
        let count = u16::deserialize(reader)?;
        ConstantTable::parse_entries(reader, count)
    }

    /// Read the entries filling exactly `count` slots (slot 0 included)
    pub fn parse_entries<R: ReadBytesExt>(
        reader: &mut R,
        count: u16,
    ) -> Result<ConstantTable, Error> {
        if count == 0 {
            return Err(Error::Format(FormatError::ConstantCount { index: 0, count }));
        }
        let mut table = ConstantTable::new();
        while table.slots.len() < count as usize {
            let index = table.slots.len() as u16;
            let constant = Constant::read(reader, index)?;
            if index as usize + constant.width() > count as usize {
                return Err(Error::Format(FormatError::ConstantCount { index, count }));
            }
            table.push(constant);
        }
        log::trace!("Read {} constant slots", table.slots.len());
        Ok(table)
    }

    /// Append a constant, returning its index
    pub fn push(&mut self, value: Constant) -> u16 {
        let index = self.slots.len();
        let width = value.width();
        let mut entry = ConstantEntry::new(value);
        entry.index = index as i32;
        self.slots.push(Some(entry));
        if width == 2 {
            self.slots.push(None);
        }
        index as u16
    }

    /// Number of slots, including the unusable slot 0 (aka. `constant_pool_count`)
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.len() <= 1
    }

    pub fn get(&self, index: u16) -> Option<&ConstantEntry> {
        self.slots.get(index as usize).and_then(Option::as_ref)
    }

    /// Entries along with their index
    pub fn iter(&self) -> impl Iterator<Item = (u16, &ConstantEntry)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|entry| (index as u16, entry)))
    }

    /// Text of the `Utf8` constant at `index`
    ///
    /// For references coming from outside the table (class members, attributes), so a bad
    /// index is reported as coming from slot 0. Names are never allowed to hold unpaired
    /// surrogates.
    pub fn utf8(&self, index: u16) -> Result<&str, Error> {
        match self.get(index).map(|entry| &entry.value) {
            Some(Constant::Utf8Text(text)) => text
                .as_str()
                .ok_or(Error::Format(FormatError::MalformedUtf8 { index })),
            _ => Err(Error::Format(FormatError::BadReference {
                from: 0,
                target: index,
                expected: RefTarget::Utf8Text.name(),
            })),
        }
    }

    /// Name of the `Class` constant at `index`
    pub fn class_name(&self, index: u16) -> Result<&str, Error> {
        match self.get(index).map(|entry| &entry.value) {
            Some(Constant::ClassRef {
                name: ConstantRef::Index(name),
            }) => self.utf8(*name),
            Some(Constant::ClassRef {
                name: ConstantRef::Entry(id),
            }) => self.utf8(id.0 as u16),
            _ => Err(Error::Format(FormatError::BadReference {
                from: 0,
                target: index,
                expected: RefTarget::ClassRef.name(),
            })),
        }
    }

    /// Resolve every reference in the table against the table itself
    pub fn resolve_all(&mut self) -> Result<(), Error> {
        for index in 0..self.slots.len() {
            if let Some(mut entry) = self.slots[index].take() {
                let resolved = entry.resolve(&*self);
                self.slots[index] = Some(entry);
                resolved?;
            }
        }
        Ok(())
    }

    /// Add every constant of this table to `pool`
    ///
    /// The result records, for each index in the table, which shared entry stands in for it.
    pub fn merge_into(&self, pool: &mut ConstantPool) -> Result<ConstantMap, Error> {
        let mut map = ConstantMap::with_len(self.slots.len());
        for (index, _) in self.iter() {
            let id = pool.add(self, EntryId(index as usize))?;
            map.insert(
                index,
                EntryHandle {
                    pool: pool.id(),
                    entry: id,
                },
            );
        }
        Ok(map)
    }
}

impl Default for ConstantTable {
    fn default() -> Self {
        ConstantTable::new()
    }
}

impl ConstantSource for ConstantTable {
    fn entry(&self, id: EntryId) -> Option<&ConstantEntry> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    fn id_at(&self, index: u16) -> Option<EntryId> {
        self.get(index).map(|_| EntryId(index as usize))
    }
}

/// Entry of a specific pool
#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct EntryHandle {
    pub pool: PoolId,
    pub entry: EntryId,
}

/// Where each constant of a class ended up after merging
///
/// This is what lets relocation translate the class-local indices still present in bytecode
/// into final pool indices.
#[derive(Clone, Debug, Default)]
pub struct ConstantMap {
    entries: Vec<Option<EntryHandle>>,
}

impl ConstantMap {
    pub fn new() -> ConstantMap {
        ConstantMap { entries: vec![] }
    }

    pub fn with_len(len: usize) -> ConstantMap {
        ConstantMap {
            entries: vec![None; len],
        }
    }

    pub fn insert(&mut self, original_index: u16, handle: EntryHandle) {
        let index = original_index as usize;
        if index >= self.entries.len() {
            self.entries.resize(index + 1, None);
        }
        self.entries[index] = Some(handle);
    }

    /// Shared entry standing in for a class-local index
    pub fn get(&self, original_index: u16) -> Option<EntryHandle> {
        self.entries.get(original_index as usize).copied().flatten()
    }

    /// Like [`ConstantMap::get`], but an unmapped index is a consistency error pinned to a
    /// location in some method
    pub fn lookup(&self, original_index: u16, method: &str, offset: usize) -> Result<EntryHandle, Error> {
        self.get(original_index).ok_or_else(|| {
            Error::Consistency(ConsistencyError::UnmergedConstant {
                method: method.to_owned(),
                offset,
                original_index,
            })
        })
    }
}
