//! Error handling.

use core::fmt;
#[cfg(feature = "std")]
use std::io;

/// Library errors.
#[derive(Debug)]
pub enum Error {
    /// I/O error.
    #[cfg(feature = "std")]
    Io(io::Error),
    /// Not enough bytes to read the 5-byte property header.
    HeaderTooShort {
        /// Number of header bytes that were available.
        available: usize,
    },
    /// The packed properties byte does not encode a valid `(lc, lp, pb)`
    /// triple.
    UnsupportedProperties {
        /// The offending packed byte.
        packed: u8,
    },
    /// A caller-supplied dictionary limit lies outside the valid window.
    InvalidLimit {
        dic_limit: usize,
        dic_pos: usize,
        dic_buf_size: usize,
    },
    /// Growing the dictionary would exceed the configured memory limit.
    MemLimit { requested: usize, limit: usize },
    /// The compressed stream is corrupt.
    Data(&'static str),
    /// More input is needed than the current lookahead window holds.
    InputEof,
    /// Internal consistency violation: a decoder bug, not a stream problem.
    Fail(&'static str),
}

/// Library result alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(feature = "std")]
impl From<io::Error> for Error {
    fn from(error: io::Error) -> Error {
        Error::Io(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            #[cfg(feature = "std")]
            Error::Io(error) => write!(fmt, "io error: {}", error),
            Error::HeaderTooShort { available } => write!(
                fmt,
                "property header needs 5 bytes, only {} available",
                available
            ),
            Error::UnsupportedProperties { packed } => {
                write!(fmt, "unsupported properties byte: {:#04x}", packed)
            }
            Error::InvalidLimit {
                dic_limit,
                dic_pos,
                dic_buf_size,
            } => write!(
                fmt,
                "dictionary limit {} outside [{}, {}]",
                dic_limit, dic_pos, dic_buf_size
            ),
            Error::MemLimit { requested, limit } => write!(
                fmt,
                "dictionary needs {} bytes, memory limit is {}",
                requested, limit
            ),
            Error::Data(reason) => write!(fmt, "data error: {}", reason),
            Error::InputEof => write!(fmt, "input ended inside a symbol"),
            Error::Fail(reason) => write!(fmt, "internal decoder error: {}", reason),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(error) => Some(error),
            _ => None,
        }
    }
}
