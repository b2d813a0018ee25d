use super::{
    ConstantEntry, ConstantKey, ConstantRef, ConstantSource, ConstantTable, EntryId, PoolId,
};
use crate::jvm::{ConsistencyError, Deserialize, Error, FormatError, LockedPoolError, Serialize};
use crate::util::Width;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::collections::{HashMap, HashSet};

/// Shared, deduplicating constant pool
///
/// Entries live in an arena and are addressed by [`EntryId`]. Separately, the pool keeps the
/// 1-indexed slot layout that gets written out: each slot is either an entry or a placeholder
/// (slot 0 and the slot following a `long` or `double`). Sorting and compaction shuffle slots
/// around, but never move entries in the arena, so ids handed out earlier stay valid. An entry
/// removed by compaction stays in the arena with an index of `-1`.
///
/// The usual lifecycle is:
///
///   1. classes [`add`](ConstantPool::add) their constants
///   2. the pool is [locked](ConstantPool::lock), [sorted](ConstantPool::sort_by_ldc_usage), and
///      [compacted](ConstantPool::compact)
///   3. code is relocated against the final indices and the pool is
///      [written](ConstantPool::write)
#[derive(Debug)]
pub struct ConstantPool {
    id: PoolId,
    entries: Vec<ConstantEntry>,
    slots: Vec<Option<EntryId>>,
    lookup: HashMap<ConstantKey, EntryId>,
    locked: bool,
}

impl ConstantPool {
    /// Make a fresh empty constant pool
    pub fn new(id: PoolId) -> ConstantPool {
        ConstantPool {
            id,
            entries: vec![],
            slots: vec![None],
            lookup: HashMap::new(),
            locked: false,
        }
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Number of slots, including slot 0 (aka. `constant_pool_count`)
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.len() <= 1
    }

    /// Number of live entries (placeholders excluded)
    pub fn entry_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Forbid further insertions
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// Entry by id, whether it is live or deleted
    pub fn get(&self, id: EntryId) -> Option<&ConstantEntry> {
        self.entries.get(id.0)
    }

    /// Live entry at a slot index
    pub fn entry_at(&self, index: u16) -> Option<&ConstantEntry> {
        self.id_at(index).map(|id| &self.entries[id.0])
    }

    /// Current index of an entry, `None` if it was deleted
    pub fn index_of(&self, id: EntryId) -> Option<u16> {
        self.entries
            .get(id.0)
            .filter(|entry| !entry.is_deleted())
            .map(|entry| entry.index as u16)
    }

    /// Live entries in index order, along with their id
    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &ConstantEntry)> + '_ {
        self.slots
            .iter()
            .flatten()
            .map(move |id| (*id, &self.entries[id.0]))
    }

    /// Record one more use of an entry
    pub fn inc_reference(&mut self, id: EntryId) {
        if let Some(entry) = self.entries.get_mut(id.0) {
            entry.reference_count += 1;
        }
    }

    /// Forget one use of an entry (eg. when the using method or attribute is dropped)
    pub fn dec_reference(&mut self, id: EntryId) {
        if let Some(entry) = self.entries.get_mut(id.0) {
            entry.reference_count = entry.reference_count.saturating_sub(1);
        }
    }

    /// Record one use through a one-byte `ldc` operand
    ///
    /// This only affects ordering. The use should also be counted with
    /// [`ConstantPool::inc_reference`].
    pub fn note_ldc_reference(&mut self, id: EntryId) {
        if let Some(entry) = self.entries.get_mut(id.0) {
            entry.ldc_reference_count += 1;
        }
    }

    /// Get or insert the constant `id` of `source`
    ///
    /// If an equal constant is already in the pool, that entry is returned (and its reference
    /// count bumped). Otherwise, the constants it refers to are added first, then a copy of the
    /// constant is appended. Entries that already belong to this pool come back unchanged.
    pub fn add<S: ConstantSource + ?Sized>(
        &mut self,
        source: &S,
        id: EntryId,
    ) -> Result<EntryId, Error> {
        let entry = source
            .entry(id)
            .ok_or(Error::Format(FormatError::DanglingEntry(id)))?;

        // Already ours: references in `entry` point into this arena
        if entry.owner == Some(self.id) {
            let key = self.key_of(&entry.value)?;
            if let Some(existing) = self.lookup.get(&key) {
                return Ok(*existing);
            }
        }

        let key = source.key_of(&entry.value)?;
        if let Some(existing) = self.lookup.get(&key) {
            let existing = *existing;
            self.entries[existing.0].reference_count += 1;
            return Ok(existing);
        }

        if self.locked {
            return Err(Error::LockedPool(LockedPoolError {
                pool: self.id,
                constant: key.to_string(),
            }));
        }

        // Externalize whatever the constant refers to
        let mut shared = entry.clone_unshared();
        shared.value = entry.value.try_map_refs(|reference, _| {
            let sub_entry = self.add(source, reference.resolved()?)?;
            Ok::<_, Error>(ConstantRef::Entry(sub_entry))
        })?;
        shared.reference_count = 1;

        let id = self.append(shared, key)?;
        log::trace!(
            "Added {} to {:?} at #{}",
            self.describe(id),
            self.id,
            self.entries[id.0].index
        );
        Ok(id)
    }

    /// Insert a constant already expressed in terms of this pool
    ///
    /// Unlike [`ConstantPool::add`], nothing the constant refers to gets externalized: every
    /// reference must already be a resolved entry of this pool. When an equal constant exists,
    /// both reference counts of `entry` accumulate into it.
    pub fn append_local(&mut self, entry: ConstantEntry) -> Result<EntryId, Error> {
        let key = self.key_of(&entry.value)?;
        if let Some(existing) = self.lookup.get(&key) {
            let existing = *existing;
            let survivor = &mut self.entries[existing.0];
            survivor.reference_count += entry.reference_count;
            survivor.ldc_reference_count += entry.ldc_reference_count;
            return Ok(existing);
        }

        if self.locked {
            return Err(Error::LockedPool(LockedPoolError {
                pool: self.id,
                constant: key.to_string(),
            }));
        }

        self.append(entry, key)
    }

    /// Push an entry into the next free slot
    ///
    /// Note: the largest valid index is 65535, indexing starts at 1, and some constants take two
    /// slots.
    fn append(&mut self, mut entry: ConstantEntry, key: ConstantKey) -> Result<EntryId, Error> {
        let offset = self.slots.len();
        if offset + entry.slots() > u16::MAX as usize {
            return Err(Error::ConstantPoolOverflow {
                constant: key.to_string(),
                offset,
            });
        }

        let id = EntryId(self.entries.len());
        entry.owner = Some(self.id);
        entry.index = offset as i32;
        self.slots.push(Some(id));
        if entry.slots() == 2 {
            self.slots.push(None);
        }
        self.entries.push(entry);
        self.lookup.insert(key, id);
        Ok(id)
    }

    /// Lay out the given entries in order, starting at index 1
    fn rebuild_slots(&mut self, order: Vec<EntryId>) {
        self.slots = vec![None];
        for id in order {
            let entry = &mut self.entries[id.0];
            entry.index = self.slots.len() as i32;
            self.slots.push(Some(id));
            if entry.value.width() == 2 {
                self.slots.push(None);
            }
        }
    }

    /// Reorder entries so that the most used ones through `ldc` come first
    ///
    /// Only the first 255 indices can be the operand of a one-byte `ldc`. The relative order of
    /// entries with the same count is not part of the contract.
    pub fn sort_by_ldc_usage(&mut self) {
        let mut order: Vec<EntryId> = self.slots.iter().flatten().copied().collect();
        order.sort_by(|id1, id2| {
            let count1 = self.entries[id1.0].ldc_reference_count;
            let count2 = self.entries[id2.0].ldc_reference_count;
            count2.cmp(&count1)
        });
        self.rebuild_slots(order);
        log::debug!("Sorted {:?} by ldc usage", self.id);
    }

    /// Drop every entry that is no longer referenced and renumber the rest densely
    ///
    /// The relative order of surviving entries is preserved. Returns the number of slots that were
    /// freed.
    pub fn compact(&mut self) -> usize {
        let (live, dead): (Vec<EntryId>, Vec<EntryId>) = self
            .slots
            .iter()
            .flatten()
            .copied()
            .partition(|id| self.entries[id.0].reference_count > 0);
        if dead.is_empty() {
            return 0;
        }

        let before = self.slots.len();
        let dead: HashSet<EntryId> = dead.into_iter().collect();
        for id in &dead {
            self.entries[id.0].index = -1;
        }
        self.lookup.retain(|_, id| !dead.contains(id));
        self.rebuild_slots(live);

        let freed = before - self.slots.len();
        log::debug!(
            "Compacted {:?}: removed {} entries, freed {} slots",
            self.id,
            dead.len(),
            freed
        );
        freed
    }

    /// Final index of the entry a reference points to
    fn final_index(&self, reference: ConstantRef) -> Result<u16, Error> {
        let id = reference.resolved()?;
        let entry = self
            .entries
            .get(id.0)
            .ok_or(Error::Format(FormatError::DanglingEntry(id)))?;
        if entry.is_deleted() {
            return Err(Error::Consistency(ConsistencyError::DeletedPoolReference(
                id,
            )));
        }
        Ok(entry.index as u16)
    }

    /// Write out `constant_pool_count` followed by the entries in index order
    pub fn write<W: WriteBytesExt>(&self, writer: &mut W) -> Result<(), Error> {
        (self.slots.len() as u16).serialize(writer)?;
        for (_, entry) in self.iter() {
            entry
                .value
                .write(writer, |reference| self.final_index(reference))?;
        }
        Ok(())
    }

    /// Read a pool written by [`ConstantPool::write`] (or the pool of a class file)
    ///
    /// Entries keep the order they had in the input. An entry equal to one seen earlier is folded
    /// into it. Each entry starts with a reference count equal to the number of times it
    /// appeared. Also returns the `constant_pool_count` that was read.
    pub fn read<R: ReadBytesExt>(reader: &mut R, id: PoolId) -> Result<(ConstantPool, u16), Error> {
        let count = u16::deserialize(reader)?;
        let mut table = ConstantTable::parse_entries(reader, count)?;
        table.resolve_all()?;
        let pool = ConstantPool::from_table(&table, id)?;
        Ok((pool, count))
    }

    /// Build a pool out of a resolved table, keeping the table's order
    pub fn from_table(table: &ConstantTable, id: PoolId) -> Result<ConstantPool, Error> {
        let mut pool = ConstantPool::new(id);
        let mut ids: Vec<Option<EntryId>> = vec![None; table.len()];
        let mut order: Vec<EntryId> = vec![];

        for (index, entry) in table.iter() {
            let key = table.key_of(&entry.value)?;
            if let Some(existing) = pool.lookup.get(&key) {
                let existing = *existing;
                pool.entries[existing.0].reference_count += 1;
                ids[index as usize] = Some(existing);
            } else {
                let entry_id = EntryId(pool.entries.len());
                let mut copy = entry.clone_unshared();
                copy.owner = Some(id);
                copy.reference_count = 1;
                pool.entries.push(copy);
                pool.lookup.insert(key, entry_id);
                ids[index as usize] = Some(entry_id);
                order.push(entry_id);
            }
        }

        // References still point at table indices
        for entry in &mut pool.entries {
            entry.value = entry.value.try_map_refs(|reference, _| {
                let table_id = reference.resolved()?;
                ids.get(table_id.0)
                    .copied()
                    .flatten()
                    .map(ConstantRef::Entry)
                    .ok_or(Error::Format(FormatError::DanglingEntry(table_id)))
            })?;
        }

        pool.rebuild_slots(order);
        Ok(pool)
    }

    /// Human readable rendering of an entry (for logs and errors)
    pub fn describe(&self, id: EntryId) -> String {
        match self.get(id) {
            Some(entry) => match self.key_of(&entry.value) {
                Ok(key) => key.to_string(),
                Err(_) => format!("{:?}", entry.value),
            },
            None => format!("{:?}", id),
        }
    }
}

impl ConstantSource for ConstantPool {
    fn entry(&self, id: EntryId) -> Option<&ConstantEntry> {
        self.entries.get(id.0)
    }

    fn id_at(&self, index: u16) -> Option<EntryId> {
        self.slots.get(index as usize).copied().flatten()
    }
}

#[cfg(test)]
mod test {
    use super::super::{Constant, JavaString, MemberKind};
    use super::*;

    fn utf8(table: &mut ConstantTable, string: &str) -> u16 {
        table.push(Constant::utf8(string))
    }

    /// Table containing one constant of every kind
    fn every_kind() -> ConstantTable {
        let mut table = ConstantTable::new();
        let object = utf8(&mut table, "java/lang/Object");
        let class = table.push(Constant::ClassRef {
            name: ConstantRef::Index(object),
        });
        let init = utf8(&mut table, "<init>");
        let void = utf8(&mut table, "()V");
        let nat = table.push(Constant::NameAndType {
            name: ConstantRef::Index(init),
            descriptor: ConstantRef::Index(void),
        });
        table.push(Constant::MemberRef {
            kind: MemberKind::Method,
            owner: ConstantRef::Index(class),
            sig: ConstantRef::Index(nat),
        });
        table.push(Constant::long(-3));
        table.push(Constant::integer(42));
        table.push(Constant::float(0.5));
        table.push(Constant::double(2.25));
        let hello = utf8(&mut table, "hello");
        table.push(Constant::StringRef {
            text: ConstantRef::Index(hello),
        });
        table.resolve_all().unwrap();
        table
    }

    fn assert_slot_accounting(pool: &ConstantPool) {
        let slots: usize = pool.iter().map(|(_, entry)| entry.slots()).sum();
        assert_eq!(pool.len(), 1 + slots);
        for (id, entry) in pool.iter() {
            assert_eq!(pool.id_at(entry.index as u16), Some(id));
            if entry.slots() == 2 {
                assert_eq!(pool.slots[entry.index as usize + 1], None);
            }
        }
    }

    #[test]
    fn adding_twice_returns_same_entry() {
        let mut table = ConstantTable::new();
        let foo1 = utf8(&mut table, "foo");
        let foo2 = utf8(&mut table, "foo");

        let mut pool = ConstantPool::new(PoolId(0));
        let first = pool.add(&table, EntryId(foo1 as usize)).unwrap();
        let len = pool.len();
        let second = pool.add(&table, EntryId(foo2 as usize)).unwrap();

        assert_eq!(first, second);
        assert_eq!(pool.len(), len);
        assert_eq!(pool.get(first).unwrap().reference_count, 2);
        assert!(pool.get(first).unwrap().is_shared());
    }

    #[test]
    fn dedup_is_by_resolved_content() {
        // Two classes naming `Foo` through different indices
        let mut table1 = ConstantTable::new();
        let name = utf8(&mut table1, "Foo");
        let class1 = table1.push(Constant::ClassRef {
            name: ConstantRef::Index(name),
        });
        table1.resolve_all().unwrap();

        let mut table2 = ConstantTable::new();
        utf8(&mut table2, "unrelated");
        let class2 = table2.push(Constant::ClassRef {
            name: ConstantRef::Index(3),
        });
        utf8(&mut table2, "Foo");
        table2.resolve_all().unwrap();

        let mut pool = ConstantPool::new(PoolId(0));
        let id1 = pool.add(&table1, EntryId(class1 as usize)).unwrap();
        let id2 = pool.add(&table2, EntryId(class2 as usize)).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(pool.entry_count(), 2);
    }

    #[test]
    fn sub_entries_are_externalized_first() {
        let table = every_kind();
        let mut pool = ConstantPool::new(PoolId(1));
        // The method ref is at index 6
        let method = pool.add(&table, EntryId(6)).unwrap();

        assert_eq!(pool.entry_count(), 6);
        assert_eq!(pool.index_of(method), Some(6));
        assert_eq!(
            pool.describe(method),
            "Methodref java/lang/Object.<init>:()V"
        );
        for (_, entry) in pool.iter() {
            assert_eq!(entry.owner, Some(PoolId(1)));
        }
    }

    #[test]
    fn adding_own_entry_is_a_no_op() {
        let table = every_kind();
        let mut pool = ConstantPool::new(PoolId(1));
        let class = pool.add(&table, EntryId(2)).unwrap();
        let copy = pool.get(class).unwrap().clone();

        // Simulate a source handing back an entry that this pool already owns
        struct Single(ConstantEntry);
        impl ConstantSource for Single {
            fn entry(&self, _: EntryId) -> Option<&ConstantEntry> {
                Some(&self.0)
            }
            fn id_at(&self, _: u16) -> Option<EntryId> {
                None
            }
        }
        let again = pool.add(&Single(copy), EntryId(0)).unwrap();
        assert_eq!(again, class);
        assert_eq!(pool.get(class).unwrap().reference_count, 1);
    }

    #[test]
    fn long_takes_two_slots() {
        let mut table = ConstantTable::new();
        for i in 0..4 {
            table.push(Constant::integer(i));
        }
        let long = table.push(Constant::long(1 << 40));
        let after = table.push(Constant::integer(100));

        let mut pool = ConstantPool::new(PoolId(0));
        for (index, _) in table.iter() {
            pool.add(&table, EntryId(index as usize)).unwrap();
        }
        let long_id = pool.add(&table, EntryId(long as usize)).unwrap();
        let after_id = pool.add(&table, EntryId(after as usize)).unwrap();

        assert_eq!(pool.index_of(long_id), Some(5));
        assert_eq!(pool.id_at(6), None);
        assert_eq!(pool.index_of(after_id), Some(7));
        assert_eq!(pool.len(), 8);
        assert_slot_accounting(&pool);
    }

    #[test]
    fn locked_pool_rejects_new_constants() {
        let table = every_kind();
        let mut pool = ConstantPool::new(PoolId(2));
        let object = pool.add(&table, EntryId(1)).unwrap();
        pool.lock();

        // Known constants are still found
        assert_eq!(pool.add(&table, EntryId(1)).unwrap(), object);

        match pool.add(&table, EntryId(3)) {
            Err(Error::LockedPool(LockedPoolError { pool: PoolId(2), .. })) => (),
            other => panic!("expected locked pool, got {:?}", other),
        }

        pool.unlock();
        assert!(pool.add(&table, EntryId(3)).is_ok());
    }

    #[test]
    fn append_local_accumulates_counts() {
        let mut pool = ConstantPool::new(PoolId(0));
        let mut entry = ConstantEntry::new(Constant::utf8("Ex"));
        entry.reference_count = 2;
        entry.ldc_reference_count = 1;
        let name = pool.append_local(entry.clone()).unwrap();
        let again = pool.append_local(entry).unwrap();
        assert_eq!(name, again);
        assert_eq!(pool.get(name).unwrap().reference_count, 4);
        assert_eq!(pool.get(name).unwrap().ldc_reference_count, 2);

        let mut class = ConstantEntry::new(Constant::ClassRef {
            name: ConstantRef::Entry(name),
        });
        class.reference_count = 1;
        let class_id = pool.append_local(class).unwrap();
        assert_eq!(pool.index_of(class_id), Some(2));

        // References must already be in this pool
        let stray = ConstantEntry::new(Constant::ClassRef {
            name: ConstantRef::Index(7),
        });
        assert!(pool.append_local(stray).is_err());
    }

    #[test]
    fn sort_is_descending_in_ldc_usage() {
        let table = every_kind();
        let mut pool = ConstantPool::new(PoolId(0));
        let mut ids = vec![];
        for (index, _) in table.iter() {
            ids.push(pool.add(&table, EntryId(index as usize)).unwrap());
        }
        let counts = [0, 3, 0, 1, 7, 0, 2, 2, 0, 0, 0, 5];
        for (id, count) in ids.iter().zip(counts.iter()) {
            for _ in 0..*count {
                pool.note_ldc_reference(*id);
            }
        }

        pool.sort_by_ldc_usage();

        let sorted: Vec<u32> = pool
            .iter()
            .map(|(_, entry)| entry.ldc_reference_count)
            .collect();
        for pair in sorted.windows(2) {
            assert!(pair[0] >= pair[1], "not descending: {:?}", sorted);
        }
        assert_eq!(pool.entry_at(1).unwrap().ldc_reference_count, 7);
        assert_slot_accounting(&pool);
    }

    #[test]
    fn compact_drops_unreferenced_entries() {
        let mut table = ConstantTable::new();
        for i in 0..10 {
            table.push(Constant::integer(i));
        }
        let mut pool = ConstantPool::new(PoolId(0));
        let mut ids = vec![];
        for (index, _) in table.iter() {
            ids.push(pool.add(&table, EntryId(index as usize)).unwrap());
        }
        for dead in [1, 4, 8] {
            pool.dec_reference(ids[dead]);
        }

        assert_eq!(pool.compact(), 3);
        assert_eq!(pool.entry_count(), 7);
        assert_eq!(pool.len(), 8);

        let survivors: Vec<Constant> = pool.iter().map(|(_, e)| e.value.clone()).collect();
        let expected: Vec<Constant> = [0, 2, 3, 5, 6, 7, 9]
            .iter()
            .map(|i| Constant::integer(*i))
            .collect();
        assert_eq!(survivors, expected);
        for (position, (_, entry)) in pool.iter().enumerate() {
            assert_eq!(entry.index, position as i32 + 1);
            assert!(entry.reference_count > 0);
        }
        assert!(pool.get(ids[4]).unwrap().is_deleted());
        assert_eq!(pool.index_of(ids[4]), None);

        // Nothing left to remove
        assert_eq!(pool.compact(), 0);
    }

    #[test]
    fn compact_keeps_placeholders() {
        let mut table = ConstantTable::new();
        table.push(Constant::integer(1));
        table.push(Constant::double(1.0));
        table.push(Constant::long(2));
        let mut pool = ConstantPool::new(PoolId(0));
        let mut ids = vec![];
        for (index, _) in table.iter() {
            ids.push(pool.add(&table, EntryId(index as usize)).unwrap());
        }
        pool.dec_reference(ids[0]);

        assert_eq!(pool.compact(), 1);
        assert_eq!(pool.len(), 5);
        assert_eq!(pool.index_of(ids[1]), Some(1));
        assert_eq!(pool.index_of(ids[2]), Some(3));
        assert_slot_accounting(&pool);
    }

    #[test]
    fn write_then_read_round_trips() {
        let table = every_kind();
        let mut pool = ConstantPool::new(PoolId(0));
        for (index, _) in table.iter() {
            pool.add(&table, EntryId(index as usize)).unwrap();
        }
        pool.note_ldc_reference(EntryId(11));
        pool.sort_by_ldc_usage();

        let mut bytes = vec![];
        pool.write(&mut bytes).unwrap();
        let (read, count) = ConstantPool::read(&mut bytes.as_slice(), PoolId(1)).unwrap();

        assert_eq!(count as usize, pool.len());
        let keys = |pool: &ConstantPool| -> Vec<(i32, ConstantKey)> {
            pool.iter()
                .map(|(_, entry)| (entry.index, pool.key_of(&entry.value).unwrap()))
                .collect()
        };
        assert_eq!(keys(&read), keys(&pool));
        assert_slot_accounting(&read);

        // And the bytes are stable
        let mut again = vec![];
        read.write(&mut again).unwrap();
        assert_eq!(again, bytes);
    }

    #[test]
    fn read_folds_duplicates() {
        let bytes: Vec<u8> = vec![
            0, 4, //
            1, 0, 1, b'a', //
            1, 0, 1, b'b', //
            1, 0, 1, b'a',
        ];
        let (pool, count) = ConstantPool::read(&mut bytes.as_slice(), PoolId(0)).unwrap();
        assert_eq!(count, 4);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.entry_count(), 2);
        assert_eq!(pool.entry_at(1).unwrap().reference_count, 2);
    }

    #[test]
    fn read_rejects_long_spilling_past_count() {
        let bytes: Vec<u8> = vec![
            0, 3, //
            3, 0, 0, 0, 7, //
            5, 0, 0, 0, 0, 0, 0, 0, 1,
        ];
        match ConstantPool::read(&mut bytes.as_slice(), PoolId(0)) {
            Err(Error::Format(FormatError::ConstantCount { index: 2, count: 3 })) => (),
            other => panic!("expected count mismatch, got {:?}", other),
        }

        let empty: Vec<u8> = vec![0, 0];
        assert!(matches!(
            ConstantPool::read(&mut empty.as_slice(), PoolId(0)),
            Err(Error::Format(FormatError::ConstantCount { count: 0, .. }))
        ));
    }

    #[test]
    fn read_keeps_unpaired_surrogates() {
        let bytes: Vec<u8> = vec![0, 2, 1, 0, 3, 0xED, 0xA0, 0x80];
        let (pool, count) = ConstantPool::read(&mut bytes.as_slice(), PoolId(0)).unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            pool.entry_at(1).unwrap().value,
            Constant::Utf8Text(JavaString::InvalidUtf8(vec![0xD800]))
        );

        let mut again = vec![];
        pool.write(&mut again).unwrap();
        assert_eq!(again, bytes);
    }

    #[test]
    fn write_rejects_references_to_deleted_entries() {
        let table = every_kind();
        let mut pool = ConstantPool::new(PoolId(0));
        let class = pool.add(&table, EntryId(2)).unwrap();
        let name = pool.id_at(1).unwrap();
        pool.dec_reference(name);
        pool.compact();

        assert!(pool.index_of(class).is_some());
        let mut bytes = vec![];
        match pool.write(&mut bytes) {
            Err(Error::Consistency(ConsistencyError::DeletedPoolReference(id))) => {
                assert_eq!(id, name)
            }
            other => panic!("expected deleted reference, got {:?}", other),
        }
    }
}
