use crate::{
    address, gsm7, ucs2,
    user_data::{self, Alphabet, FragmentInfo},
    Error,
};

const SINGLE_SEPTETS: usize = 160;
const PART_SEPTETS: usize = 153;
const SINGLE_UNITS: usize = 70;
const PART_UNITS: usize = 67;

const MTI_SUBMIT: u8 = 0x01;
const UDHI: u8 = 0x40;

/// One encoded SMS-SUBMIT unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    hex: String,
    length: usize,
}

impl Pdu {
    /// Hex string including the empty service centre prefix `00`
    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// Octet count of the unit without the service centre prefix, as expected
    /// by `AT+CMGS=<length>`.
    pub const fn length(&self) -> usize {
        self.length
    }
}

/// Builder for the units of an outgoing message.
#[derive(Debug, Clone)]
pub struct Submit<'a> {
    recipient: &'a str,
    text: &'a str,
    reference: u8,
}

impl<'a> Submit<'a> {
    pub const fn new(recipient: &'a str, text: &'a str) -> Self {
        Self {
            recipient,
            text,
            reference: 0,
        }
    }

    /// Concatenation reference shared by all parts of the message. Only used
    /// when the text needs more than one unit.
    #[must_use]
    pub const fn with_reference(mut self, reference: u8) -> Self {
        self.reference = reference;
        self
    }

    pub fn to_pdus(&self) -> Result<Vec<Pdu>, Error> {
        let destination = address::encode(self.recipient)?;

        if let Some(septets) = gsm7::to_septets(self.text) {
            if septets.len() <= SINGLE_SEPTETS {
                let ud = user_data::encode_gsm7(&septets, None);
                return Ok(vec![self.unit(&destination, Alphabet::Gsm7, None, ud)]);
            }

            // An escape septet stays with the code that follows it
            let parts = split(&septets, PART_SEPTETS, |&s| s == gsm7::ESCAPE);
            return self.concatenated(&destination, Alphabet::Gsm7, &parts, |part, header| {
                user_data::encode_gsm7(part, Some(header))
            });
        }

        let units = ucs2::encode(self.text);
        if units.len() <= SINGLE_UNITS {
            let ud = user_data::encode_ucs2(&units, None);
            return Ok(vec![self.unit(&destination, Alphabet::Ucs2, None, ud)]);
        }

        let parts = split(&units, PART_UNITS, |&u| ucs2::is_high_surrogate(u));
        self.concatenated(&destination, Alphabet::Ucs2, &parts, |part, header| {
            user_data::encode_ucs2(part, Some(header))
        })
    }

    fn concatenated<T>(
        &self,
        destination: &[u8],
        alphabet: Alphabet,
        parts: &[&[T]],
        encode: impl Fn(&[T], &[u8]) -> user_data::Encoded,
    ) -> Result<Vec<Pdu>, Error> {
        let count = u8::try_from(parts.len()).map_err(|_| Error::TooManyParts(parts.len()))?;

        Ok(parts
            .iter()
            .copied()
            .zip(1..=count)
            .map(|(part, sequence)| {
                let header = user_data::concat_header(FragmentInfo {
                    reference: u16::from(self.reference),
                    sequence,
                    count,
                });
                let ud = encode(part, header.as_slice());
                self.unit(destination, alphabet, Some(header.as_slice()), ud)
            })
            .collect())
    }

    fn unit(
        &self,
        destination: &[u8],
        alphabet: Alphabet,
        header: Option<&[u8]>,
        ud: user_data::Encoded,
    ) -> Pdu {
        let first = if header.is_some() {
            MTI_SUBMIT | UDHI
        } else {
            MTI_SUBMIT
        };

        let mut tpdu = Vec::with_capacity(5 + destination.len() + ud.data.len());
        tpdu.push(first);
        // Message reference, assigned by the modem
        tpdu.push(0x00);
        tpdu.extend_from_slice(destination);
        tpdu.push(0x00);
        tpdu.push(alphabet.dcs());
        tpdu.push(ud.length);
        tpdu.extend(ud.data);

        Pdu {
            hex: format!("00{}", hex::encode_upper(&tpdu)),
            length: tpdu.len(),
        }
    }
}

/// Cut `items` into chunks of at most `limit`, never ending a chunk on an
/// item for which `joins_next` holds unless it is the last one.
fn split<T>(items: &[T], limit: usize, joins_next: impl Fn(&T) -> bool) -> Vec<&[T]> {
    let mut parts = Vec::with_capacity(items.len().div_ceil(limit));
    let mut rest = items;
    while !rest.is_empty() {
        let mut n = limit.min(rest.len());
        if n < rest.len() && n > 1 && joins_next(&rest[n - 1]) {
            n -= 1;
        }
        let (part, tail) = rest.split_at(n);
        parts.push(part);
        rest = tail;
    }
    parts
}
