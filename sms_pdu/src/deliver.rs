use chrono::{DateTime, FixedOffset};

use crate::{
    address, gsm7, timestamp, ucs2,
    user_data::{self, Alphabet, FragmentInfo, Reader},
    Error,
};

const MTI_MASK: u8 = 0x03;
const MTI_DELIVER: u8 = 0x00;
const MORE_MESSAGES_TO_SEND: u8 = 0x04;
const UDHI: u8 = 0x40;

/// A decoded SMS-DELIVER unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deliver {
    /// Service centre that relayed the message, if the modem reported one
    pub smsc: Option<String>,
    /// Originating address. International numbers carry a leading `+`,
    /// alphanumeric senders are returned as text.
    pub sender: String,
    /// Service centre timestamp, in the sender's local offset
    pub timestamp: DateTime<FixedOffset>,
    pub text: String,
    pub alphabet: Alphabet,
    /// Present when this unit is one part of a concatenated message
    pub fragment: Option<FragmentInfo>,
}

impl Deliver {
    /// Decode a hex string as printed by the modem in PDU mode, service centre
    /// prefix included.
    pub fn from_hex(pdu: &str) -> Result<Self, Error> {
        let bytes = hex::decode(pdu.trim()).map_err(|_| Error::InvalidHex)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = Reader::new(bytes);

        let smsc = address::decode_smsc(&mut reader)?;
        let first = reader.u8("first octet")?;
        if first & MTI_MASK != MTI_DELIVER {
            return Err(Error::UnsupportedType(first & MTI_MASK));
        }

        let sender = address::decode(&mut reader)?;
        let _pid = reader.u8("protocol identifier")?;
        let alphabet = Alphabet::from_dcs(reader.u8("data coding scheme")?);
        let timestamp = timestamp::decode(reader.take(7, "service centre timestamp")?)?;
        let udl = reader.u8("user data length")?;

        let (text, fragment) =
            user_data::decode(alphabet, first & UDHI != 0, udl, reader.rest())?;

        Ok(Self {
            smsc,
            sender,
            timestamp,
            text,
            alphabet,
            fragment,
        })
    }

    /// Encode back into hex, as a modem would list it.
    ///
    /// The alphabet is picked from the text: the default alphabet when every
    /// character is representable, UCS-2 otherwise. The sender must be a
    /// phone number.
    pub fn to_hex(&self) -> Result<String, Error> {
        let header = self.fragment.map(user_data::concat_header);
        let (alphabet, encoded) = match gsm7::to_septets(&self.text) {
            Some(septets) => (
                Alphabet::Gsm7,
                user_data::encode_gsm7(&septets, header.as_deref()),
            ),
            None => (
                Alphabet::Ucs2,
                user_data::encode_ucs2(&ucs2::encode(&self.text), header.as_deref()),
            ),
        };

        let mut first = MTI_DELIVER | MORE_MESSAGES_TO_SEND;
        if header.is_some() {
            first |= UDHI;
        }

        let mut out = address::encode_smsc(self.smsc.as_deref())?;
        out.push(first);
        out.extend(address::encode(&self.sender)?);
        out.push(0x00);
        out.push(alphabet.dcs());
        out.extend(timestamp::encode(&self.timestamp));
        out.push(encoded.length);
        out.extend(encoded.data);

        Ok(hex::encode_upper(out))
    }
}
