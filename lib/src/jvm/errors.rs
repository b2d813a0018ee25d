use crate::jvm::constants::{EntryId, PoolId};
use std::fmt;

#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),

    /// Malformed class file or constant pool data
    Format(FormatError),

    /// A one-byte constant operand can't encode its final index
    Overflow(OverflowError),

    /// Code or tables disagree with the pool they are being relocated against
    Consistency(ConsistencyError),

    /// Bytecode could not be classified
    Scan(ScanError),

    /// Insertion into a pool after it was locked
    LockedPool(LockedPoolError),

    /// The pool would need more than `u16::MAX` slots
    ConstantPoolOverflow {
        constant: String,
        offset: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Input ended before the structure being read was complete
    TruncatedInput,

    /// Class file doesn't start with `0xCAFEBABE`
    BadMagic(u32),

    UnknownConstantTag {
        index: u16,
        tag: u8,
    },
    UnknownVerificationTag(u8),

    /// Modified UTF-8 payload that doesn't decode
    MalformedUtf8 {
        index: u16,
    },

    /// Text whose modified UTF-8 form needs more than `u16::MAX` bytes
    Utf8TooLong {
        length: usize,
    },

    /// `constant_pool_count` that disagrees with the entries following it, eg. a `long` or
    /// `double` in the last slot
    ConstantCount {
        index: u16,
        count: u16,
    },

    /// Code arrays are limited to 65535 bytes
    CodeTooLong {
        method: String,
        length: usize,
    },

    /// Reference to a slot that is empty or holds the wrong kind of constant
    BadReference {
        from: i32,
        target: u16,
        expected: &'static str,
    },

    /// Constant still holds a raw index where a resolved entry is required
    Unresolved(u16),

    /// Entry id that doesn't exist in the container it was looked up in
    DanglingEntry(EntryId),

    /// Attribute payload didn't match its declared length
    AttributeLength {
        name: String,
        declared: usize,
        consumed: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverflowError {
    pub method: String,
    pub offset: usize,
    pub index: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    /// Code refers to a constant owned by a pool other than the one being relocated against
    ForeignSharedConstant {
        method: String,
        offset: usize,
        pool: PoolId,
    },

    /// Code refers to a constant that compaction removed
    DeletedConstant {
        method: String,
        offset: usize,
        original_index: u16,
    },

    /// Code refers to a class-local constant that was never merged into a pool
    UnmergedConstant {
        method: String,
        offset: usize,
        original_index: u16,
    },

    /// A pool entry refers to a sub-entry that compaction removed
    DeletedPoolReference(EntryId),

    /// A side table offset doesn't land on an instruction
    NotInstructionBoundary {
        method: String,
        table: &'static str,
        offset: usize,
    },

    /// Relocation attempted on code that hasn't been scanned
    NotScanned { method: String },

    /// Relocation attempted twice on the same code
    AlreadyRelocated { method: String },

    /// Pool used as final when finishing it never succeeded
    PoolNotFinished { pool: PoolId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    UnknownOpcode {
        method: String,
        offset: usize,
        opcode: u8,
    },
    UnknownWideOpcode {
        method: String,
        offset: usize,
        opcode: u8,
    },

    /// Instruction at this offset runs past the end of the code
    Truncated { method: String, offset: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedPoolError {
    pub pool: PoolId,
    pub constant: String,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Format(FormatError::TruncatedInput)
        } else {
            Error::IoError(err)
        }
    }
}

impl From<FormatError> for Error {
    fn from(err: FormatError) -> Error {
        Error::Format(err)
    }
}

impl From<OverflowError> for Error {
    fn from(err: OverflowError) -> Error {
        Error::Overflow(err)
    }
}

impl From<ConsistencyError> for Error {
    fn from(err: ConsistencyError) -> Error {
        Error::Consistency(err)
    }
}

impl From<ScanError> for Error {
    fn from(err: ScanError) -> Error {
        Error::Scan(err)
    }
}

impl From<LockedPoolError> for Error {
    fn from(err: LockedPoolError) -> Error {
        Error::LockedPool(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IoError(err) => write!(f, "IO error: {}", err),
            Error::Format(err) => write!(f, "format error: {}", err),
            Error::Overflow(err) => write!(
                f,
                "ldc subscript out of range in {} at offset {}: final index {} does not fit in a byte",
                err.method, err.offset, err.index
            ),
            Error::Consistency(err) => write!(f, "consistency error: {}", err),
            Error::Scan(err) => write!(f, "scan error: {}", err),
            Error::LockedPool(err) => write!(
                f,
                "cannot add {} to locked constant pool {:?}",
                err.constant, err.pool
            ),
            Error::ConstantPoolOverflow { constant, offset } => write!(
                f,
                "constant pool overflow adding {} at offset {}",
                constant, offset
            ),
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::TruncatedInput => write!(f, "unexpected end of input"),
            FormatError::BadMagic(magic) => write!(f, "bad class file magic {:#010x}", magic),
            FormatError::UnknownConstantTag { index, tag } => {
                write!(f, "unknown constant tag {} at index {}", tag, index)
            }
            FormatError::UnknownVerificationTag(tag) => {
                write!(f, "unknown stack map type tag {}", tag)
            }
            FormatError::MalformedUtf8 { index } => {
                write!(f, "malformed modified UTF-8 at index {}", index)
            }
            FormatError::Utf8TooLong { length } => {
                write!(f, "{} bytes of modified UTF-8 do not fit in a constant", length)
            }
            FormatError::ConstantCount { index, count } => write!(
                f,
                "constant at index {} does not fit in constant_pool_count {}",
                index, count
            ),
            FormatError::CodeTooLong { method, length } => write!(
                f,
                "code of {} is {} bytes long, more than the 65535 allowed",
                method, length
            ),
            FormatError::BadReference {
                from,
                target,
                expected,
            } => write!(
                f,
                "constant #{} refers to #{}, which is not a {}",
                from, target, expected
            ),
            FormatError::Unresolved(index) => write!(f, "unresolved reference to #{}", index),
            FormatError::DanglingEntry(id) => write!(f, "dangling entry {:?}", id),
            FormatError::AttributeLength {
                name,
                declared,
                consumed,
            } => write!(
                f,
                "attribute {} declared {} bytes but {} were read",
                name, declared, consumed
            ),
        }
    }
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyError::ForeignSharedConstant {
                method,
                offset,
                pool,
            } => write!(
                f,
                "code reference to shared constant of {:?} in {} at offset {}",
                pool, method, offset
            ),
            ConsistencyError::DeletedConstant {
                method,
                offset,
                original_index,
            } => write!(
                f,
                "reference to deleted constant #{} in {} at offset {}",
                original_index, method, offset
            ),
            ConsistencyError::UnmergedConstant {
                method,
                offset,
                original_index,
            } => write!(
                f,
                "reference to unmerged constant #{} in {} at offset {}",
                original_index, method, offset
            ),
            ConsistencyError::DeletedPoolReference(id) => {
                write!(f, "pool entry refers to deleted {:?}", id)
            }
            ConsistencyError::NotInstructionBoundary {
                method,
                table,
                offset,
            } => write!(
                f,
                "{} offset {} in {} is not an instruction boundary",
                table, offset, method
            ),
            ConsistencyError::NotScanned { method } => {
                write!(f, "code of {} was never scanned", method)
            }
            ConsistencyError::AlreadyRelocated { method } => {
                write!(f, "code of {} was already relocated", method)
            }
            ConsistencyError::PoolNotFinished { pool } => {
                write!(f, "{:?} was never successfully finished", pool)
            }
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::UnknownOpcode {
                method,
                offset,
                opcode,
            } => write!(
                f,
                "unknown opcode {:#04x} in {} at offset {}",
                opcode, method, offset
            ),
            ScanError::UnknownWideOpcode {
                method,
                offset,
                opcode,
            } => write!(
                f,
                "unknown wide opcode {:#04x} in {} at offset {}",
                opcode, method, offset
            ),
            ScanError::Truncated { method, offset } => write!(
                f,
                "instruction in {} at offset {} runs past the end of the code",
                method, offset
            ),
        }
    }
}

impl std::error::Error for Error {}
