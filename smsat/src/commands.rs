//! Typed AT commands issued by the session.
//!
//! Each command renders itself into a bounded buffer and knows its
//! terminator, its timeout and how to read its response.

use core::fmt::{self, Write as _};
use std::time::Duration;

use heapless::String;

use crate::{digest, messages::StorageIndex, Error};

/// Longest command text issued by this crate
pub const CMD_LEN: usize = 32;

/// This trait needs to be implemented for every command type.
pub trait AtCmd<const LEN: usize> {
    /// The type of the response.
    type Response;

    /// Terminator marking a successful exchange
    const EXPECTED: &'static str = "OK";

    /// Do not log a missing terminator
    const QUIET: bool = false;

    /// Render the command text, without line ending.
    fn write(&self, buf: &mut String<LEN>) -> fmt::Result;

    /// How long to wait for the terminator.
    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    /// Read the response of a successful exchange.
    fn parse(&self, response: &str) -> Result<Self::Response, Error>;
}

/// `AT+CMGF=0`: exchange messages as PDUs
#[derive(Debug, Clone, Copy)]
pub struct SetPduMode;

impl AtCmd<CMD_LEN> for SetPduMode {
    type Response = ();

    fn write(&self, buf: &mut String<CMD_LEN>) -> fmt::Result {
        buf.write_str("AT+CMGF=0")
    }

    fn parse(&self, _response: &str) -> Result<(), Error> {
        Ok(())
    }
}

/// `AT+CPMS`: read, write and receive from SIM storage
#[derive(Debug, Clone, Copy)]
pub struct SelectSimStorage;

impl AtCmd<CMD_LEN> for SelectSimStorage {
    type Response = ();

    fn write(&self, buf: &mut String<CMD_LEN>) -> fmt::Result {
        buf.write_str("AT+CPMS=\"SM\",\"SM\",\"SM\"")
    }

    fn parse(&self, _response: &str) -> Result<(), Error> {
        Ok(())
    }
}

/// Status filter of a message listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ListStatus {
    Unread = 0,
    Read = 1,
    StoredUnsent = 2,
    StoredSent = 3,
    All = 4,
}

/// `AT+CMGL=<status>`: list stored messages as `(slot, pdu)` pairs
#[derive(Debug, Clone, Copy)]
pub struct ListMessages {
    pub status: ListStatus,
}

impl AtCmd<CMD_LEN> for ListMessages {
    type Response = Vec<(StorageIndex, std::string::String)>;

    fn write(&self, buf: &mut String<CMD_LEN>) -> fmt::Result {
        write!(buf, "AT+CMGL={}", self.status as u8)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(2)
    }

    fn parse(&self, response: &str) -> Result<Self::Response, Error> {
        Ok(digest::listing_entries(response)
            .into_iter()
            .map(|(slot, pdu)| (slot, pdu.to_string()))
            .collect())
    }
}

/// `AT+CMGD=<slot>`: delete a single message
#[derive(Debug, Clone, Copy)]
pub struct DeleteMessage {
    pub slot: StorageIndex,
}

impl AtCmd<CMD_LEN> for DeleteMessage {
    type Response = ();

    fn write(&self, buf: &mut String<CMD_LEN>) -> fmt::Result {
        write!(buf, "AT+CMGD={}", self.slot)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(2)
    }

    fn parse(&self, _response: &str) -> Result<(), Error> {
        Ok(())
    }
}

/// Which messages a bulk delete removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeleteFlag {
    /// All read messages
    Read = 1,
    /// Every message in storage
    All = 4,
}

/// `AT+CMGD=1,<flag>`: bulk delete
#[derive(Debug, Clone, Copy)]
pub struct DeleteMessages {
    pub flag: DeleteFlag,
}

impl AtCmd<CMD_LEN> for DeleteMessages {
    type Response = ();

    fn write(&self, buf: &mut String<CMD_LEN>) -> fmt::Result {
        write!(buf, "AT+CMGD=1,{}", self.flag as u8)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(2)
    }

    fn parse(&self, _response: &str) -> Result<(), Error> {
        Ok(())
    }
}

/// `AT+CMGS=<length>`: announce a message body, answered by the `>` prompt
#[derive(Debug, Clone, Copy)]
pub struct SendPrompt {
    pub length: usize,
    pub timeout: Duration,
}

impl AtCmd<CMD_LEN> for SendPrompt {
    type Response = ();

    const EXPECTED: &'static str = ">";

    fn write(&self, buf: &mut String<CMD_LEN>) -> fmt::Result {
        write!(buf, "AT+CMGS={}", self.length)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn parse(&self, _response: &str) -> Result<(), Error> {
        Ok(())
    }
}

/// Network registration state reported by `+CREG`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegStatus {
    NotRegistered,
    Home,
    Searching,
    Denied,
    Unknown,
    Roaming,
    HomeSmsOnly,
    RoamingSmsOnly,
    Other(u8),
}

impl From<u8> for RegStatus {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::NotRegistered,
            1 => Self::Home,
            2 => Self::Searching,
            3 => Self::Denied,
            4 => Self::Unknown,
            5 => Self::Roaming,
            6 => Self::HomeSmsOnly,
            7 => Self::RoamingSmsOnly,
            other => Self::Other(other),
        }
    }
}

impl RegStatus {
    /// Registered in a way that allows sending SMS
    pub const fn is_registered(self) -> bool {
        matches!(
            self,
            Self::Home | Self::Roaming | Self::HomeSmsOnly | Self::RoamingSmsOnly
        )
    }
}

/// `AT+CREG?`: query the registration state. Failures are not logged, the
/// command is polled.
#[derive(Debug, Clone, Copy)]
pub struct GetRegistrationStatus {
    pub timeout: Duration,
}

impl AtCmd<CMD_LEN> for GetRegistrationStatus {
    type Response = Option<RegStatus>;

    const QUIET: bool = true;

    fn write(&self, buf: &mut String<CMD_LEN>) -> fmt::Result {
        buf.write_str("AT+CREG?")
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn parse(&self, response: &str) -> Result<Self::Response, Error> {
        Ok(digest::registration_status(response).map(RegStatus::from))
    }
}
