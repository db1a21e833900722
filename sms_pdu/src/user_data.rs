use crate::{gsm7, ucs2, Error};

const IEI_CONCAT_8BIT: u8 = 0x00;
const IEI_CONCAT_16BIT: u8 = 0x08;

/// Concatenation metadata carried by one part of a multi-part message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentInfo {
    /// Reference shared by all parts of the same message
    pub reference: u16,
    /// 1-based position of this part
    pub sequence: u8,
    /// Total number of parts
    pub count: u8,
}

/// Character set of the user data, as selected by the data coding scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alphabet {
    Gsm7,
    Data8,
    Ucs2,
}

impl Alphabet {
    pub fn from_dcs(dcs: u8) -> Self {
        match dcs & 0xF0 {
            // General data coding, bits 3..2 select the alphabet
            0x00..=0x30 => match (dcs >> 2) & 0x03 {
                0x01 => Self::Data8,
                0x02 => Self::Ucs2,
                _ => Self::Gsm7,
            },
            0xE0 => Self::Ucs2,
            0xF0 if dcs & 0x04 != 0 => Self::Data8,
            _ => Self::Gsm7,
        }
    }

    pub const fn dcs(self) -> u8 {
        match self {
            Self::Gsm7 => 0x00,
            Self::Data8 => 0x04,
            Self::Ucs2 => 0x08,
        }
    }
}

/// Cursor over a decoded unit.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn u8(&mut self, field: &'static str) -> Result<u8, Error> {
        Ok(self.take(1, field)?[0])
    }

    pub(crate) fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], Error> {
        let end = self.pos + n;
        let Some(bytes) = self.buf.get(self.pos..end) else {
            return Err(Error::Truncated {
                field,
                needed: end - self.buf.len(),
            });
        };
        self.pos = end;
        Ok(bytes)
    }

    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.pos..];
        self.pos = self.buf.len();
        rest
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }
}

/// Concatenation header including its own length octet. References above 255
/// use the 16-bit information element.
pub(crate) fn concat_header(info: FragmentInfo) -> Vec<u8> {
    match u8::try_from(info.reference) {
        Ok(reference) => vec![
            0x05,
            IEI_CONCAT_8BIT,
            0x03,
            reference,
            info.count,
            info.sequence,
        ],
        Err(_) => {
            let [hi, lo] = info.reference.to_be_bytes();
            vec![
                0x06,
                IEI_CONCAT_16BIT,
                0x04,
                hi,
                lo,
                info.count,
                info.sequence,
            ]
        }
    }
}

/// Walk the information elements of a header (without its length octet) and
/// pick up concatenation metadata. Unknown elements are skipped.
fn parse_header(mut header: &[u8]) -> Option<FragmentInfo> {
    let mut found = None;
    while let [iei, len, rest @ ..] = header {
        let len = usize::from(*len);
        let Some(data) = rest.get(..len) else {
            break;
        };
        match (*iei, data) {
            (IEI_CONCAT_8BIT, &[reference, count, sequence]) => {
                found = Some(FragmentInfo {
                    reference: u16::from(reference),
                    sequence,
                    count,
                });
            }
            (IEI_CONCAT_16BIT, &[hi, lo, count, sequence]) => {
                found = Some(FragmentInfo {
                    reference: u16::from_be_bytes([hi, lo]),
                    sequence,
                    count,
                });
            }
            _ => {}
        }
        header = &rest[len..];
    }
    found
}

/// User data ready to be appended to a unit: UDL followed by UD.
pub(crate) struct Encoded {
    pub(crate) length: u8,
    pub(crate) data: Vec<u8>,
}

pub(crate) fn encode_gsm7(septets: &[u8], header: Option<&[u8]>) -> Encoded {
    let Some(header) = header else {
        return Encoded {
            length: septets.len() as u8,
            data: gsm7::pack(septets, 0),
        };
    };

    let header_bits = header.len() * 8;
    let header_septets = header_bits.div_ceil(7);
    let fill = (header_septets * 7 - header_bits) as u8;

    let mut data = header.to_vec();
    data.extend(gsm7::pack(septets, fill));
    Encoded {
        length: (header_septets + septets.len()) as u8,
        data,
    }
}

pub(crate) fn encode_ucs2(units: &[u16], header: Option<&[u8]>) -> Encoded {
    let mut data = header.map(<[u8]>::to_vec).unwrap_or_default();
    data.extend(ucs2::to_bytes(units));
    Encoded {
        length: data.len() as u8,
        data,
    }
}

/// Decode the user data of a unit.
///
/// `length` is the raw UDL value, counted in septets for 7-bit data and in
/// octets otherwise.
pub(crate) fn decode(
    alphabet: Alphabet,
    has_header: bool,
    length: u8,
    data: &[u8],
) -> Result<(String, Option<FragmentInfo>), Error> {
    let length = usize::from(length);
    let octets = match alphabet {
        Alphabet::Gsm7 => (length * 7).div_ceil(8),
        _ => length,
    };
    let Some(data) = data.get(..octets) else {
        return Err(Error::Truncated {
            field: "user data",
            needed: octets - data.len(),
        });
    };

    let (header_len, fragment) = if has_header {
        let mut reader = Reader::new(data);
        let udhl = usize::from(reader.u8("user data header length")?);
        let header = reader.take(udhl, "user data header")?;
        (udhl + 1, parse_header(header))
    } else {
        (0, None)
    };

    let text = match alphabet {
        Alphabet::Gsm7 => {
            let header_septets = (header_len * 8).div_ceil(7);
            let fill = (header_septets * 7 - header_len * 8) as u8;
            let count = length.saturating_sub(header_septets);
            gsm7::from_septets(&gsm7::unpack(&data[header_len..], count, fill))
        }
        Alphabet::Ucs2 => ucs2::decode(&data[header_len..]),
        Alphabet::Data8 => data[header_len..].iter().map(|&b| char::from(b)).collect(),
    };

    Ok((text, fragment))
}
