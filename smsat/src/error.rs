use std::time::Duration;

use embedded_io::ErrorKind;
use thiserror::Error;

/// Errors returned by the crate
#[derive(Error, Debug)]
pub enum Error {
    /// Reading from or writing to the serial link failed
    #[error("transport error: {0:?}")]
    Transport(ErrorKind),
    /// Serial port could not be opened or configured
    #[error("serial port: {0}")]
    Serial(#[from] serialport::Error),
    /// Power pin could not be driven
    #[error("power control: {0}")]
    Power(String),
    /// Expected terminator did not arrive before the timeout
    #[error("{command} did not answer with {expected:?}, got {response:?}")]
    Protocol {
        command: String,
        expected: String,
        response: String,
    },
    /// Modem did not register with a network before the deadline
    #[error("no mobile network connection after {0:?}")]
    NetworkUnavailable(Duration),
    /// Message could not be encoded or decoded
    #[error("PDU: {0}")]
    Encoding(#[from] sms_pdu::Error),
    /// Sending stopped after `sent` of `total` parts went out
    #[error("sent {sent} of {total} message parts")]
    Send {
        sent: usize,
        total: usize,
        #[source]
        source: Box<Error>,
    },
    /// Command does not fit the command buffer
    #[error("command buffer overflow")]
    Overflow,
    /// Operation was interrupted
    #[error("cancelled")]
    Cancelled,
    /// Nothing to send
    #[error("no message on stdin")]
    EmptyMessage,
    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn transport(e: impl embedded_io::Error) -> Self {
        Self::Transport(e.kind())
    }
}
