//! Constant pool entries, class-local constant tables, and the shared pool they merge into
//!
//! A class file's constants are read into a [`ConstantTable`], where references between constants
//! are raw indices until [resolved](ConstantTable::resolve_all). Merging a class copies each of
//! its constants into a shared [`ConstantPool`], deduplicating by [`ConstantKey`], and yields a
//! [`ConstantMap`] that later lets bytecode operands be translated to final pool indices.

mod entry;
mod key;
mod modified_utf8;
mod pool;
mod table;

pub use entry::*;
pub use key::*;
pub use modified_utf8::*;
pub use pool::*;
pub use table::*;
