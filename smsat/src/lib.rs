//! Send and receive SMS messages through a modem speaking AT commands over a
//! serial link.
//!
//! A [`Session`] owns the serial link and the optional modem power pin for
//! the duration of one operation: sending a message, collecting received
//! ones, clearing storage, querying modem information, running a single raw
//! command or watching for new message notifications. Every command the
//! engine issues is a type implementing [`AtCmd`], exchanged by the
//! [`Client`] one at a time with a per-command timeout.
//!
//! Messages travel in PDU mode; encoding and decoding lives in the
//! [`sms_pdu`] crate.
//!
//! # Examples
//!
//! ```no_run
//! use smsat::{
//!     Cancel, Client, NoopController, PowerSequencer, SerialTransport, Session, SessionConfig,
//! };
//!
//! fn main() -> Result<(), smsat::Error> {
//!     let config = SessionConfig::new("/dev/ttyUSB0").baud(9600);
//!
//!     let transport = SerialTransport::open(&config)?;
//!     let sequencer = PowerSequencer::new(NoopController, config.power())?;
//!     let client = Client::new(transport, Cancel::new());
//!     let mut session = Session::new(&config, client, sequencer);
//!
//!     session.send("+46708251358", "Hello from the modem", |sent, total| {
//!         eprintln!("{}/{} parts sent", sent, total);
//!     })?;
//!     Ok(())
//! }
//! ```
//!
//! # Optional Cargo Features
//!
//! - **`gpio`** *(disabled by default)*: drive the modem power pin through the
//!   Raspberry Pi GPIO with `GpioController`.

#![deny(rust_2018_idioms)]

mod cancel;
mod client;
mod commands;
mod config;
mod digest;
mod error;
mod helpers;
mod messages;
mod monitor;
mod power;
mod reassembly;
mod registration;
mod sender;
mod session;
mod transport;

#[cfg(test)]
mod mock;

pub use self::cancel::Cancel;
pub use self::client::{AtResult, Client};
pub use self::commands::{AtCmd, ListStatus, RegStatus};
pub use self::config::{Framing, PowerPin, SessionConfig};
pub use self::error::Error;
pub use self::helpers::LossyStr;
pub use self::messages::{MessageRecord, StorageIndex};
pub use self::monitor::{NotificationHook, NOTIFICATION_TOKEN};
pub use self::power::{Level, NoopController, PowerController, PowerSequencer, PowerState};
pub use self::reassembly::Reassembler;
pub use self::registration::RegistrationMonitor;
pub use self::sender::Sender;
pub use self::session::{DeletePolicy, ReceiveOptions, Session, INFO_COMMANDS};
pub use self::transport::{SerialTransport, Transport};

#[cfg(feature = "gpio")]
pub use self::power::GpioController;
