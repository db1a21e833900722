use thiserror::Error;

/// Errors returned by the codec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Input is not an even-length string of hex digits
    #[error("invalid hex data")]
    InvalidHex,
    /// Unit ended before a field could be read
    #[error("truncated PDU, needed {needed} more bytes for {field}")]
    Truncated { field: &'static str, needed: usize },
    /// Only SMS-DELIVER units can be decoded
    #[error("unsupported message type indicator {0}")]
    UnsupportedType(u8),
    /// Service centre timestamp does not describe a valid date
    #[error("invalid service centre timestamp")]
    InvalidTimestamp,
    /// Phone number contains characters that cannot be semi-octet encoded
    #[error("invalid phone number {0:?}")]
    InvalidAddress(String),
    /// Text needs more parts than a concatenation header can count
    #[error("message needs {0} parts, at most 255 are possible")]
    TooManyParts(usize),
}
