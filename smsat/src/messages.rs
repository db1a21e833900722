use chrono::{DateTime, FixedOffset};
use log::{debug, warn};
use serde::Serialize;
use sms_pdu::{Deliver, FragmentInfo};

use crate::{
    client::Client,
    commands::{ListMessages, ListStatus},
    transport::Transport,
    Error,
};

/// Modem storage location of a message
pub type StorageIndex = u16;

/// A received message as reported to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    #[serde(rename = "idx")]
    pub slot: StorageIndex,
    #[serde(rename = "date")]
    pub timestamp: DateTime<FixedOffset>,
    #[serde(rename = "number")]
    pub sender: String,
    pub text: String,
    /// Service centre that relayed the message
    #[serde(rename = "csca", skip_serializing_if = "Option::is_none")]
    pub smsc: Option<String>,
    #[serde(skip)]
    pub fragment: Option<FragmentInfo>,
}

impl MessageRecord {
    pub fn from_pdu(slot: StorageIndex, pdu: &str) -> Result<Self, sms_pdu::Error> {
        let deliver = Deliver::from_hex(pdu)?;
        Ok(Self {
            slot,
            timestamp: deliver.timestamp,
            sender: deliver.sender,
            text: deliver.text,
            smsc: deliver.smsc,
            fragment: deliver.fragment,
        })
    }
}

/// List the stored messages matching `status`.
///
/// Entries that fail to decode are logged and left out. A listing that does
/// not complete is an error, no partial result is returned.
pub fn list<T: Transport>(
    client: &mut Client<T>,
    status: ListStatus,
) -> Result<Vec<MessageRecord>, Error> {
    let entries = client.send(&ListMessages { status })?;
    debug!("Listed {} {:?} messages", entries.len(), status);

    Ok(entries
        .into_iter()
        .filter_map(|(slot, pdu)| match MessageRecord::from_pdu(slot, &pdu) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping message in slot {}: {}", slot, e);
                None
            }
        })
        .collect())
}
