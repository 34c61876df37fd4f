
//! Error type definitions.

use std::borrow::Cow;
use std::io::ErrorKind;
pub use std::io::Error as IoError;
pub use std::io::Result as IoResult;
use std::convert::TryFrom;
use std::error;
use std::fmt;

// Export types

/// A result that may contain an rfx error.
pub type Result<T> = std::result::Result<T, Error>;

/// A result that, if ok, contains nothing, and otherwise contains an rfx error.
pub type UnitResult = Result<()>;


/// An error that may happen while decoding or encoding a RemoteFX stream.
/// Distinguishes between protocol violations, corrupt tile data,
/// exhausted resources, unsupported features, and io errors.
#[derive(Debug)]
pub enum Error {

    /// The block stream is malformed: a fixed constant does not match,
    /// a block arrived out of sequence, or a length field points past the buffer.
    /// Fatal to the current message, but not to the context.
    Invalid(Cow<'static, str>),

    /// The input is well formed but uses something this crate cannot handle,
    /// or an operation was called on a context that does not support it.
    NotSupported(Cow<'static, str>),

    /// The compressed data of a single tile is inconsistent.
    /// Only that tile is affected.
    Corrupt(Cow<'static, str>),

    /// A buffer could not be allocated, or an output buffer was too small.
    Resource(Cow<'static, str>),

    /// Writing the encoded bytes failed.
    Io(IoError),
}


impl Error {

    /// Create an error of the variant `Invalid`.
    pub(crate) fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Error::Invalid(message.into())
    }

    /// Create an error of the variant `NotSupported`.
    pub(crate) fn unsupported(message: impl Into<Cow<'static, str>>) -> Self {
        Error::NotSupported(message.into())
    }

    /// Create an error of the variant `Corrupt`.
    pub(crate) fn corrupt(message: impl Into<Cow<'static, str>>) -> Self {
        Error::Corrupt(message.into())
    }

    /// Create an error of the variant `Resource`.
    pub(crate) fn resource(message: impl Into<Cow<'static, str>>) -> Self {
        Error::Resource(message.into())
    }
}

/// Enable using the `?` operator on `std::io::Result`.
/// Reading past the end of a block is a protocol error, not an io error.
impl From<IoError> for Error {
    fn from(error: IoError) -> Self {
        if error.kind() == ErrorKind::UnexpectedEof {
            Error::invalid("reference to missing bytes")
        }
        else {
            Error::Io(error)
        }
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Error::resource("buffer allocation failed")
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(formatter),
            Error::Invalid(message) => write!(formatter, "invalid: {}", message),
            Error::NotSupported(message) => write!(formatter, "not supported: {}", message),
            Error::Corrupt(message) => write!(formatter, "corrupt tile: {}", message),
            Error::Resource(message) => write!(formatter, "resource exhausted: {}", message),
        }
    }
}


/// Return error on a value too large for a `u16` wire field.
#[inline]
pub(crate) fn u16_from_usize(value: usize, error_message: &'static str) -> Result<u16> {
    u16::try_from(value).map_err(|_| Error::unsupported(error_message))
}

/// Return error on a value too large for a `u32` wire field.
#[inline]
pub(crate) fn u32_from_usize(value: usize, error_message: &'static str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::unsupported(error_message))
}
