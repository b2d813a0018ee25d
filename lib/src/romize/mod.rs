//! Consolidate the constants of many classes into one shared pool
//!
//! The [`Romizer`] reads classes, merges their constants into a shared pool, then sorts and
//! compacts that pool. Every method's code and tables are finally rewritten against the final
//! pool by the [`RelocationEngine`].

mod errors;
mod offset_map;
mod relocator;
mod romizer;
mod settings;

pub use errors::*;
pub use offset_map::*;
pub use relocator::*;
pub use romizer::*;
pub use settings::*;
