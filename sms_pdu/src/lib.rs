//! Codec for the SMS protocol data units exchanged with a modem in PDU mode
//! (`AT+CMGF=0`).
//!
//! Two directions are covered:
//!
//! - [`Submit`] turns a recipient and a text into one or more hex encoded
//!   SMS-SUBMIT units, ready to be handed to `AT+CMGS`. Texts that do not fit
//!   into a single unit are split and carry a concatenation header.
//! - [`Deliver`] decodes the SMS-DELIVER units returned by `AT+CMGL` into
//!   sender, service centre timestamp, text and optional [`FragmentInfo`].
//!
//! ```
//! use sms_pdu::Submit;
//!
//! let pdus = Submit::new("+46708251358", "hellohello").to_pdus().unwrap();
//! assert_eq!(pdus.len(), 1);
//! assert_eq!(pdus[0].as_str(), "0001000B916407281553F800000AE8329BFD4697D9EC37");
//! assert_eq!(pdus[0].length(), 22);
//! ```
#![deny(rust_2018_idioms)]
#![allow(clippy::missing_errors_doc)]

mod address;
mod deliver;
mod error;
pub mod gsm7;
mod submit;
mod timestamp;
pub mod ucs2;
mod user_data;

pub use self::deliver::Deliver;
pub use self::error::Error;
pub use self::submit::{Pdu, Submit};
pub use self::user_data::{Alphabet, FragmentInfo};
