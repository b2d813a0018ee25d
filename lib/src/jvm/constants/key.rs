use super::{DoubleKind, JavaString, MemberKind, SingleKind};
use std::fmt;

/// Identity of a constant for deduplication purposes
///
/// Two constants are interchangeable exactly when their keys are equal. Keys spell out the names
/// that references resolve to, so they can be compared across pools and class tables.
#[derive(Clone, Hash, Eq, PartialEq, Debug)]
pub enum ConstantKey {
    Utf8Text(JavaString),
    IntegerOrFloat(SingleKind, u32),
    LongOrDouble(DoubleKind, u64),
    StringRef(JavaString),
    ClassRef(JavaString),
    NameAndType {
        name: JavaString,
        descriptor: JavaString,
    },
    MemberRef {
        kind: MemberKind,
        owner: JavaString,
        name: JavaString,
        descriptor: JavaString,
    },
}

impl fmt::Display for ConstantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantKey::Utf8Text(text) => write!(f, "Utf8 \"{}\"", text),
            ConstantKey::IntegerOrFloat(SingleKind::Integer, raw) => {
                write!(f, "Integer {}", *raw as i32)
            }
            ConstantKey::IntegerOrFloat(SingleKind::Float, raw) => {
                write!(f, "Float {}", f32::from_bits(*raw))
            }
            ConstantKey::LongOrDouble(DoubleKind::Long, raw) => write!(f, "Long {}", *raw as i64),
            ConstantKey::LongOrDouble(DoubleKind::Double, raw) => {
                write!(f, "Double {}", f64::from_bits(*raw))
            }
            ConstantKey::StringRef(text) => write!(f, "String \"{}\"", text),
            ConstantKey::ClassRef(name) => write!(f, "Class {}", name),
            ConstantKey::NameAndType { name, descriptor } => {
                write!(f, "NameAndType {}:{}", name, descriptor)
            }
            ConstantKey::MemberRef {
                kind,
                owner,
                name,
                descriptor,
            } => write!(f, "{:?}ref {}.{}:{}", kind, owner, name, descriptor),
        }
    }
}
