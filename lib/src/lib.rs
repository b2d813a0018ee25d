pub mod jvm;
pub mod romize;
mod util;
