//! Reading of class files
//!
//! Just enough of the format is decoded to get at constants and method bodies. Everything else is
//! preserved as raw attributes.

mod attribute;
mod class;
mod field;
mod method;

pub use attribute::*;
pub use class::*;
pub use field::*;
pub use method::*;
