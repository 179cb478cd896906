use crate::protocol::DeviceModel;

/// Errors raised while encoding, decoding or exchanging thermostat frames.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The checksum carried by a frame does not match the one computed over its bytes.
    #[error("Invalid checksum - calculated={calculated:#06X} received={received:#06X}")]
    ChecksumMismatch { calculated: u16, received: u16 },
    /// A declared frame or DCB length disagrees with the number of bytes present.
    #[error("Length mismatch - declared={declared} actual={actual}")]
    LengthMismatch { declared: usize, actual: usize },
    /// The first byte of a response is not the read acknowledgement code.
    #[error("Invalid response code {0:#04X}")]
    InvalidResponseCode(u8),
    /// The device type byte does not name a known thermostat model.
    #[error("Unknown device model {0}")]
    UnknownModel(u8),
    /// An enumerated DCB byte holds a value outside its defined range.
    #[error("Invalid value {value} for '{field}'")]
    InvalidValue { field: &'static str, value: u8 },
    /// The device reported a date or time that does not exist.
    #[error("Invalid date/time in '{0}'")]
    InvalidDateTime(&'static str),
    /// A write intent names a field that cannot be written.
    #[error("Unsupported item for writing: {0}")]
    UnsupportedField(String),
    /// A write intent supplies a value outside the accepted set.
    #[error("Unsupported value for '{field}': {reason}")]
    UnsupportedValue { field: String, reason: String },
    /// The connected model does not expose the requested field.
    #[error("'{field}' is not supported by model {model}")]
    NotSupportedByModel {
        field: &'static str,
        model: DeviceModel,
    },
    /// A weekly program has a different number of days than the device's schedule mode.
    #[error("Incorrect number of days in '{field}' program {actual}. Expected {expected}")]
    ScheduleLengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    /// The frame would exceed the limits of its length or item count fields.
    #[error("Frame too long: {0}")]
    FrameTooLong(usize),
    /// No complete response arrived within the deadline.
    #[error("Timed out")]
    Timeout,
    /// Connecting to or talking with the device failed.
    #[error("Connection failure: {0}")]
    Connection(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn unsupported_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::UnsupportedValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Maps socket errors to `Timeout` where the OS reports an expired deadline.
    pub(crate) fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Error::Timeout,
            _ => Error::Connection(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
