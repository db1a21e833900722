use crate::{gsm7, user_data::Reader, Error};

const TOA_INTERNATIONAL: u8 = 0x91;
const TOA_UNKNOWN: u8 = 0x81;

const TYPE_OF_NUMBER_MASK: u8 = 0x70;
const TON_INTERNATIONAL: u8 = 0x10;
const TON_ALPHANUMERIC: u8 = 0x50;

/// Encode a destination / originating address field: digit count, type of
/// address, swapped semi-octets.
pub(crate) fn encode(number: &str) -> Result<Vec<u8>, Error> {
    let (toa, digits) = split_number(number)?;
    let mut out = Vec::with_capacity(2 + digits.len().div_ceil(2));
    out.push(digits.len() as u8);
    out.push(toa);
    out.extend(semi_octets(&digits));
    Ok(out)
}

/// Encode a service centre address field, whose length counts octets
/// including the type of address.
pub(crate) fn encode_smsc(number: Option<&str>) -> Result<Vec<u8>, Error> {
    let Some(number) = number else {
        return Ok(vec![0x00]);
    };

    let (toa, digits) = split_number(number)?;
    let body = semi_octets(&digits);
    let mut out = Vec::with_capacity(2 + body.len());
    out.push(body.len() as u8 + 1);
    out.push(toa);
    out.extend(body);
    Ok(out)
}

pub(crate) fn decode(reader: &mut Reader<'_>) -> Result<String, Error> {
    let digits = usize::from(reader.u8("address length")?);
    let toa = reader.u8("type of address")?;
    let body = reader.take(digits.div_ceil(2), "address")?;

    if toa & TYPE_OF_NUMBER_MASK == TON_ALPHANUMERIC {
        let septets = gsm7::unpack(body, digits * 4 / 7, 0);
        return Ok(gsm7::from_septets(&septets));
    }

    Ok(with_prefix(toa, &digits_from(body)))
}

pub(crate) fn decode_smsc(reader: &mut Reader<'_>) -> Result<Option<String>, Error> {
    let len = usize::from(reader.u8("service centre length")?);
    if len == 0 {
        return Ok(None);
    }

    let toa = reader.u8("service centre type")?;
    let body = reader.take(len - 1, "service centre address")?;
    Ok(Some(with_prefix(toa, &digits_from(body))))
}

fn split_number(number: &str) -> Result<(u8, Vec<u8>), Error> {
    let (toa, rest) = match number.strip_prefix('+') {
        Some(rest) => (TOA_INTERNATIONAL, rest),
        None => (TOA_UNKNOWN, number),
    };

    let digits = rest
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .map(|c| match c {
            '0'..='9' => Some(c as u8 - b'0'),
            '*' => Some(0xA),
            '#' => Some(0xB),
            _ => None,
        })
        .collect::<Option<Vec<u8>>>()
        .filter(|d| !d.is_empty() && d.len() <= 20)
        .ok_or_else(|| Error::InvalidAddress(number.to_string()))?;

    Ok((toa, digits))
}

fn semi_octets(digits: &[u8]) -> Vec<u8> {
    digits
        .chunks(2)
        .map(|pair| match pair.get(1) {
            Some(hi) => (hi << 4) | pair[0],
            None => 0xF0 | pair[0],
        })
        .collect()
}

fn digits_from(body: &[u8]) -> String {
    body.iter()
        .flat_map(|b| [b & 0x0F, b >> 4])
        .take_while(|&n| n != 0x0F)
        .map(|n| match n {
            0..=9 => char::from(b'0' + n),
            0xA => '*',
            0xB => '#',
            0xC => 'a',
            0xD => 'b',
            _ => 'c',
        })
        .collect()
}

fn with_prefix(toa: u8, digits: &str) -> String {
    if toa & TYPE_OF_NUMBER_MASK == TON_INTERNATIONAL {
        format!("+{digits}")
    } else {
        digits.to_string()
    }
}
