use std::io;

use failure::Fail;

/// Errors surfaced by the fingerprinting core.
#[derive(Debug, Fail)]
pub enum Error {
    /// The database file could not be opened or read.
    #[fail(display = "can't open database file: {}", _0)]
    Io(#[fail(cause)] io::Error),

    /// A structural violation while compiling the database, with the
    /// 1-based line number it was detected on.
    #[fail(display = "error in line {}: {}", line, message)]
    Parse { line: usize, message: String },

    /// An invalid field value inside a signature or label.
    #[fail(display = "invalid field value: {}", _0)]
    Field(String),

    /// A database lookup failure (unknown label, empty bucket).
    #[fail(display = "database error: {}", _0)]
    Database(String),

    /// The packet is not IP+TCP, or is otherwise invalid for the
    /// requested fingerprint.
    #[fail(display = "invalid packet: {}", _0)]
    Packet(String),

    /// The HTTP payload is not HTTP/1.x or is malformed.
    #[fail(display = "invalid payload: {}", _0)]
    Payload(String),

    /// An impersonation request that cannot be honored.
    #[fail(display = "{}", _0)]
    Value(String),
}

impl Error {
    pub fn field<S: Into<String>>(message: S) -> Self {
        Error::Field(message.into())
    }

    pub fn database<S: Into<String>>(message: S) -> Self {
        Error::Database(message.into())
    }

    pub fn packet<S: Into<String>>(message: S) -> Self {
        Error::Packet(message.into())
    }

    pub fn payload<S: Into<String>>(message: S) -> Self {
        Error::Payload(message.into())
    }

    pub fn value<S: Into<String>>(message: S) -> Self {
        Error::Value(message.into())
    }

    /// Wrap a field-level failure with the database line it came from.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            Error::Field(message) | Error::Database(message) => Error::Parse { line, message },
            other => other,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}
