//! Read JVM class files and consolidate their constants
//!
//! ### Simple example
//!
//! Two classes that both use `java/lang/Object` end up sharing a single copy of it (and of its
//! name) once merged into the same pool:
//!
//! ```
//! use romizer::jvm::constants::*;
//! use romizer::jvm::Error;
//!
//! # fn merge() -> Result<(), Error> {
//! let mut pool = ConstantPool::new(PoolId(0));
//!
//! for _ in 0..2 {
//!     // Constants of one class, with class-local indices
//!     let mut table = ConstantTable::new();
//!     let name = table.push(Constant::utf8("java/lang/Object"));
//!     table.push(Constant::ClassRef { name: ConstantRef::Index(name) });
//!     table.resolve_all()?;
//!
//!     // Map from the class-local indices to shared entries
//!     let map = table.merge_into(&mut pool)?;
//!     assert!(map.get(name).is_some());
//! }
//! assert_eq!(pool.entry_count(), 2);
//!
//! // Finally, encode the pool into bytes
//! pool.lock();
//! let mut pool_bytes: Vec<u8> = vec![];
//! pool.write(&mut pool_bytes)?;
//! # Ok(())
//! # }
//! # merge().unwrap();
//! ```

mod access_flags;
mod binary_format;
pub mod class_file;
pub mod code;
pub mod constants;
mod errors;

pub use access_flags::*;
pub use binary_format::*;
pub use errors::*;
