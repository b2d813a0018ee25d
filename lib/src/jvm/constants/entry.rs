use super::{decode_modified_utf8, ConstantKey, JavaString};
use crate::jvm::{Deserialize, Error, FormatError, Serialize};
use crate::util::Width;
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Identifier of a constant pool
///
/// Entries remember which pool owns them through this id only, so that a pool can tell its own
/// entries apart from ones that belong to some other pool.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct PoolId(pub u32);

/// Position of an entry in the arena of the container holding it
///
/// For a [`super::ConstantTable`] this is the same as the class file index. For a
/// [`super::ConstantPool`] it is stable across sorting and compaction, unlike the index.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct EntryId(pub usize);

/// Reference from one constant to another
#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub enum ConstantRef {
    /// Raw index, as read out of a class file
    Index(u16),

    /// Resolved entry in the same container as the referring constant
    Entry(EntryId),
}

impl ConstantRef {
    /// Resolved entry, if there is one
    pub fn entry(self) -> Option<EntryId> {
        match self {
            ConstantRef::Entry(id) => Some(id),
            ConstantRef::Index(_) => None,
        }
    }

    /// Resolved entry, or an error mentioning the raw index
    pub fn resolved(self) -> Result<EntryId, Error> {
        match self {
            ConstantRef::Entry(id) => Ok(id),
            ConstantRef::Index(index) => Err(Error::Format(FormatError::Unresolved(index))),
        }
    }
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub enum SingleKind {
    Integer,
    Float,
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub enum DoubleKind {
    Long,
    Double,
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub enum MemberKind {
    Field,
    Method,
    InterfaceMethod,
}

/// What kind of constant a reference must point at
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum RefTarget {
    Utf8Text,
    ClassRef,
    NameAndType,
}

impl RefTarget {
    pub fn accepts(self, constant: &Constant) -> bool {
        matches!(
            (self, constant),
            (RefTarget::Utf8Text, Constant::Utf8Text(_))
                | (RefTarget::ClassRef, Constant::ClassRef { .. })
                | (RefTarget::NameAndType, Constant::NameAndType { .. })
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            RefTarget::Utf8Text => "Utf8",
            RefTarget::ClassRef => "Class",
            RefTarget::NameAndType => "NameAndType",
        }
    }
}

/// Value of a constant pool slot
///
/// Unlike class file constants, `int`/`float` and `long`/`double` share a variant: the payload is
/// kept as raw bits so that equality is bitwise (two `NaN`s with the same bits are the same
/// constant, `0.0` and `-0.0` are not).
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Constant {
    Utf8Text(JavaString),
    IntegerOrFloat { kind: SingleKind, raw: u32 },
    LongOrDouble { kind: DoubleKind, raw: u64 },
    StringRef { text: ConstantRef },
    ClassRef { name: ConstantRef },
    NameAndType {
        name: ConstantRef,
        descriptor: ConstantRef,
    },
    MemberRef {
        kind: MemberKind,
        owner: ConstantRef,
        sig: ConstantRef,
    },
}

impl Constant {
    pub fn utf8(text: impl Into<JavaString>) -> Constant {
        Constant::Utf8Text(text.into())
    }

    pub fn integer(value: i32) -> Constant {
        Constant::IntegerOrFloat {
            kind: SingleKind::Integer,
            raw: value as u32,
        }
    }

    pub fn float(value: f32) -> Constant {
        Constant::IntegerOrFloat {
            kind: SingleKind::Float,
            raw: value.to_bits(),
        }
    }

    pub fn long(value: i64) -> Constant {
        Constant::LongOrDouble {
            kind: DoubleKind::Long,
            raw: value as u64,
        }
    }

    pub fn double(value: f64) -> Constant {
        Constant::LongOrDouble {
            kind: DoubleKind::Double,
            raw: value.to_bits(),
        }
    }

    /// Tag byte in the class file format
    pub fn tag(&self) -> u8 {
        match self {
            Constant::Utf8Text(_) => 1,
            Constant::IntegerOrFloat {
                kind: SingleKind::Integer,
                ..
            } => 3,
            Constant::IntegerOrFloat {
                kind: SingleKind::Float,
                ..
            } => 4,
            Constant::LongOrDouble {
                kind: DoubleKind::Long,
                ..
            } => 5,
            Constant::LongOrDouble {
                kind: DoubleKind::Double,
                ..
            } => 6,
            Constant::ClassRef { .. } => 7,
            Constant::StringRef { .. } => 8,
            Constant::MemberRef {
                kind: MemberKind::Field,
                ..
            } => 9,
            Constant::MemberRef {
                kind: MemberKind::Method,
                ..
            } => 10,
            Constant::MemberRef {
                kind: MemberKind::InterfaceMethod,
                ..
            } => 11,
            Constant::NameAndType { .. } => 12,
        }
    }

    /// Rebuild the constant with every reference passed through `map_ref`
    ///
    /// References are visited in wire order and each comes with the kind of constant it must
    /// point at.
    pub fn try_map_refs<E>(
        &self,
        mut map_ref: impl FnMut(ConstantRef, RefTarget) -> Result<ConstantRef, E>,
    ) -> Result<Constant, E> {
        Ok(match self {
            Constant::Utf8Text(_)
            | Constant::IntegerOrFloat { .. }
            | Constant::LongOrDouble { .. } => self.clone(),
            Constant::StringRef { text } => Constant::StringRef {
                text: map_ref(*text, RefTarget::Utf8Text)?,
            },
            Constant::ClassRef { name } => Constant::ClassRef {
                name: map_ref(*name, RefTarget::Utf8Text)?,
            },
            Constant::NameAndType { name, descriptor } => Constant::NameAndType {
                name: map_ref(*name, RefTarget::Utf8Text)?,
                descriptor: map_ref(*descriptor, RefTarget::Utf8Text)?,
            },
            Constant::MemberRef { kind, owner, sig } => Constant::MemberRef {
                kind: *kind,
                owner: map_ref(*owner, RefTarget::ClassRef)?,
                sig: map_ref(*sig, RefTarget::NameAndType)?,
            },
        })
    }

    /// Read one constant (tag included)
    ///
    /// References come back as [`ConstantRef::Index`] and need resolving. `index` is only used
    /// for error messages.
    pub fn read<R: ReadBytesExt>(reader: &mut R, index: u16) -> Result<Constant, Error> {
        fn reference<R: ReadBytesExt>(reader: &mut R) -> Result<ConstantRef, Error> {
            Ok(ConstantRef::Index(u16::deserialize(reader)?))
        }

        let tag = u8::deserialize(reader)?;
        Ok(match tag {
            1 => {
                let len = u16::deserialize(reader)?;
                let bytes = crate::jvm::read_bytes(reader, len as usize)?;
                let text = decode_modified_utf8(&bytes)
                    .ok_or(Error::Format(FormatError::MalformedUtf8 { index }))?;
                Constant::Utf8Text(text)
            }
            3 | 4 => Constant::IntegerOrFloat {
                kind: if tag == 3 {
                    SingleKind::Integer
                } else {
                    SingleKind::Float
                },
                raw: u32::deserialize(reader)?,
            },
            5 | 6 => Constant::LongOrDouble {
                kind: if tag == 5 {
                    DoubleKind::Long
                } else {
                    DoubleKind::Double
                },
                raw: u64::deserialize(reader)?,
            },
            7 => Constant::ClassRef {
                name: reference(reader)?,
            },
            8 => Constant::StringRef {
                text: reference(reader)?,
            },
            9 | 10 | 11 => Constant::MemberRef {
                kind: match tag {
                    9 => MemberKind::Field,
                    10 => MemberKind::Method,
                    _ => MemberKind::InterfaceMethod,
                },
                owner: reference(reader)?,
                sig: reference(reader)?,
            },
            12 => Constant::NameAndType {
                name: reference(reader)?,
                descriptor: reference(reader)?,
            },
            _ => return Err(Error::Format(FormatError::UnknownConstantTag { index, tag })),
        })
    }

    /// Write the constant (tag included), turning each reference into an index with `index_of`
    pub fn write<W: WriteBytesExt>(
        &self,
        writer: &mut W,
        mut index_of: impl FnMut(ConstantRef) -> Result<u16, Error>,
    ) -> Result<(), Error> {
        self.tag().serialize(writer)?;
        match self {
            Constant::Utf8Text(text) => {
                let buffer: Vec<u8> = text.encode();
                let length = u16::try_from(buffer.len()).map_err(|_| {
                    Error::Format(FormatError::Utf8TooLong {
                        length: buffer.len(),
                    })
                })?;
                length.serialize(writer)?;
                writer.write_all(&buffer)?;
            }
            Constant::IntegerOrFloat { raw, .. } => raw.serialize(writer)?,
            Constant::LongOrDouble { raw, .. } => raw.serialize(writer)?,
            Constant::StringRef { text: reference } | Constant::ClassRef { name: reference } => {
                index_of(*reference)?.serialize(writer)?;
            }
            Constant::NameAndType { name, descriptor } => {
                index_of(*name)?.serialize(writer)?;
                index_of(*descriptor)?.serialize(writer)?;
            }
            Constant::MemberRef { owner, sig, .. } => {
                index_of(*owner)?.serialize(writer)?;
                index_of(*sig)?.serialize(writer)?;
            }
        }
        Ok(())
    }
}

/// Almost all constants have width 1, except for `long` and `double`. Quoting the JVMS:
///
/// > All 8-byte constants take up two entries in the constant_pool table of the class file. If a
/// > CONSTANT_Long_info or CONSTANT_Double_info structure is the item in the constant_pool table
/// > at index n, then the next usable item in the pool is located at index n+2. The constant_pool
/// > index n+1 must be valid but is considered unusable.
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::LongOrDouble { .. } => 2,
            _ => 1,
        }
    }
}

/// Constant along with its bookkeeping
#[derive(Clone, Debug)]
pub struct ConstantEntry {
    pub value: Constant,

    /// Total number of uses
    pub reference_count: u32,

    /// Uses through a one-byte `ldc` operand (a subset of `reference_count`)
    pub ldc_reference_count: u32,

    /// Pool owning this entry. Entries with no owner are class-local (unshared).
    pub owner: Option<PoolId>,

    /// Current index in the owning container, or `-1` once deleted
    pub index: i32,
}

impl ConstantEntry {
    pub fn new(value: Constant) -> ConstantEntry {
        ConstantEntry {
            value,
            reference_count: 0,
            ldc_reference_count: 0,
            owner: None,
            index: 0,
        }
    }

    pub fn is_shared(&self) -> bool {
        self.owner.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.index < 0
    }

    pub fn slots(&self) -> usize {
        self.value.width()
    }

    /// Copy the value, but none of the ownership or usage information
    ///
    /// This is how an entry owned by one pool (or one class) gets admitted into another pool.
    pub fn clone_unshared(&self) -> ConstantEntry {
        ConstantEntry::new(self.value.clone())
    }

    /// Turn raw indices into entries of `entries`
    ///
    /// Each target must exist and be of the kind the reference calls for. Already resolved
    /// references are left alone, so this can safely be called more than once.
    pub fn resolve<S: ConstantSource + ?Sized>(&mut self, entries: &S) -> Result<(), Error> {
        let from = self.index;
        self.value = self.value.try_map_refs(|reference, target| match reference {
            ConstantRef::Entry(_) => Ok(reference),
            ConstantRef::Index(index) => match entries.id_at(index) {
                Some(id)
                    if entries
                        .entry(id)
                        .map_or(false, |entry| target.accepts(&entry.value)) =>
                {
                    Ok(ConstantRef::Entry(id))
                }
                _ => Err(Error::Format(FormatError::BadReference {
                    from,
                    target: index,
                    expected: target.name(),
                })),
            },
        })?;
        Ok(())
    }
}

/// Container of constants that other constants can refer into
///
/// Both class-local tables and shared pools are sources. Equality between constants is defined
/// in terms of [`ConstantKey`], which follows references through the source to the strings they
/// ultimately name: raw indices are meaningless outside of the container they came from.
pub trait ConstantSource {
    /// Entry with the given id
    fn entry(&self, id: EntryId) -> Option<&ConstantEntry>;

    /// Id of the entry currently at `index`
    fn id_at(&self, index: u16) -> Option<EntryId>;

    /// Content of the `Utf8` constant a reference points at
    fn utf8_at(&self, reference: ConstantRef) -> Result<&JavaString, Error> {
        let id = reference.resolved()?;
        match self.entry(id).map(|entry| &entry.value) {
            Some(Constant::Utf8Text(text)) => Ok(text),
            _ => Err(Error::Format(FormatError::DanglingEntry(id))),
        }
    }

    /// Deduplication key of a constant whose references point into this source
    fn key_of(&self, constant: &Constant) -> Result<ConstantKey, Error> {
        Ok(match constant {
            Constant::Utf8Text(text) => ConstantKey::Utf8Text(text.clone()),
            Constant::IntegerOrFloat { kind, raw } => ConstantKey::IntegerOrFloat(*kind, *raw),
            Constant::LongOrDouble { kind, raw } => ConstantKey::LongOrDouble(*kind, *raw),
            Constant::StringRef { text } => ConstantKey::StringRef(self.utf8_at(*text)?.clone()),
            Constant::ClassRef { name } => ConstantKey::ClassRef(self.utf8_at(*name)?.clone()),
            Constant::NameAndType { name, descriptor } => ConstantKey::NameAndType {
                name: self.utf8_at(*name)?.clone(),
                descriptor: self.utf8_at(*descriptor)?.clone(),
            },
            Constant::MemberRef { kind, owner, sig } => {
                let owner_id = owner.resolved()?;
                let owner = match self.entry(owner_id).map(|entry| &entry.value) {
                    Some(Constant::ClassRef { name }) => self.utf8_at(*name)?.clone(),
                    _ => return Err(Error::Format(FormatError::DanglingEntry(owner_id))),
                };
                let sig_id = sig.resolved()?;
                let (name, descriptor) = match self.entry(sig_id).map(|entry| &entry.value) {
                    Some(Constant::NameAndType { name, descriptor }) => (
                        self.utf8_at(*name)?.clone(),
                        self.utf8_at(*descriptor)?.clone(),
                    ),
                    _ => return Err(Error::Format(FormatError::DanglingEntry(sig_id))),
                };
                ConstantKey::MemberRef {
                    kind: *kind,
                    owner,
                    name,
                    descriptor,
                }
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn only_eight_byte_constants_are_two_slots() {
        assert_eq!(Constant::long(1).width(), 2);
        assert_eq!(Constant::double(1.5).width(), 2);
        assert_eq!(Constant::integer(1).width(), 1);
        assert_eq!(Constant::float(1.5).width(), 1);
        assert_eq!(Constant::utf8("x").width(), 1);
    }

    #[test]
    fn clone_unshared_resets_bookkeeping() {
        let mut entry = ConstantEntry::new(Constant::integer(7));
        entry.reference_count = 4;
        entry.ldc_reference_count = 2;
        entry.owner = Some(PoolId(3));
        entry.index = 9;

        let copy = entry.clone_unshared();
        assert_eq!(copy.value, Constant::integer(7));
        assert_eq!(copy.reference_count, 0);
        assert_eq!(copy.ldc_reference_count, 0);
        assert!(!copy.is_shared());
        assert_eq!(copy.index, 0);
    }

    #[test]
    fn float_tags_survive_reading() {
        let bytes = [4u8, 0x3f, 0xc0, 0, 0];
        let constant = Constant::read(&mut &bytes[..], 1).unwrap();
        assert_eq!(constant, Constant::float(1.5));
        assert_eq!(constant.tag(), 4);
    }

    #[test]
    fn unknown_tags_are_rejected() {
        let bytes = [15u8, 1, 0, 3];
        match Constant::read(&mut &bytes[..], 4) {
            Err(Error::Format(FormatError::UnknownConstantTag { index: 4, tag: 15 })) => (),
            other => panic!("expected unknown tag, got {:?}", other),
        }
    }

    #[test]
    fn lone_surrogate_text_round_trips() {
        let bytes = [1u8, 0, 3, 0xED, 0xA0, 0x80];
        let constant = Constant::read(&mut &bytes[..], 1).unwrap();
        assert_eq!(
            constant,
            Constant::Utf8Text(JavaString::InvalidUtf8(vec![0xD800]))
        );

        let mut written = vec![];
        constant
            .write(&mut written, |_| unreachable!("Utf8 has no references"))
            .unwrap();
        assert_eq!(written, bytes.to_vec());
    }

    #[test]
    fn oversized_text_is_not_truncated() {
        let constant = Constant::utf8("\u{e9}".repeat(40_000));
        let mut written = vec![];
        match constant.write(&mut written, |_| unreachable!("Utf8 has no references")) {
            Err(Error::Format(FormatError::Utf8TooLong { length: 80_000 })) => (),
            other => panic!("expected oversized text, got {:?}", other),
        }
    }
}
