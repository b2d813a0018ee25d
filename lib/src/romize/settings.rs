use std::path::PathBuf;

pub struct Settings {
    /// Directory into which the shared pool is saved
    pub output_directory: PathBuf,

    /// File name of the shared pool inside `output_directory`
    pub pool_file_name: String,

    /// Move the constants most used by one-byte `ldc` operands to the front of the pool
    ///
    /// Without this, a class using `ldc` on a constant that lands past index 255 fails to
    /// relocate.
    pub sort_by_ldc_usage: bool,

    /// Drop constants that nothing refers to anymore
    pub compact: bool,
}

impl Settings {
    pub fn new(output_directory: impl Into<PathBuf>) -> Settings {
        Settings {
            output_directory: output_directory.into(),
            pool_file_name: String::from("SharedConstantPool.bin"),
            sort_by_ldc_usage: true,
            compact: true,
        }
    }
}
