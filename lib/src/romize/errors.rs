use crate::jvm;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    Jvm(jvm::Error),

    /// Failure while processing a specific class
    InClass { class: String, error: jvm::Error },
}

impl Error {
    /// Attach the class being processed to an error
    pub fn in_class(class: &str) -> impl Fn(jvm::Error) -> Error + '_ {
        move |error| Error::InClass {
            class: class.to_owned(),
            error,
        }
    }
}

impl From<jvm::Error> for Error {
    fn from(err: jvm::Error) -> Error {
        Error::Jvm(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Jvm(err) => write!(f, "{}", err),
            Error::InClass { class, error } => write!(f, "{}: {}", class, error),
        }
    }
}

impl std::error::Error for Error {}
