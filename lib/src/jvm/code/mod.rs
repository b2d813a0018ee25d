//! Method bytecode and the tables attached to it
//!
//! A [`CodeUnit`] is scanned once to find every constant pool operand. Together with the
//! [`AuxiliaryTables`] of the same method, it is later rewritten to use final pool indices.

mod code_unit;
pub mod opcodes;
mod tables;

pub use code_unit::*;
pub use tables::*;
