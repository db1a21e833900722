//! Scanners for the informational lines of modem responses.
//!
//! Responses are noisy: they may contain the command echo, unsolicited
//! result codes and blank lines between the lines of interest. The scanners
//! pick out what they recognize and skip everything else.

use nom::{
    bytes::complete::tag,
    character::complete::{char, digit1, satisfy, space0},
    combinator::{map_opt, map_res},
    sequence::{delimited, preceded, tuple},
    IResult,
};

use crate::messages::StorageIndex;

const CREG_TAG: &str = "+CREG:";
const CMGL_TAG: &str = "+CMGL:";

/// `+CREG: <n>,<stat>`, yielding `<stat>`
fn creg(input: &str) -> IResult<&str, u8> {
    preceded(
        tuple((tag(CREG_TAG), space0, digit1, char(','), space0)),
        map_opt(satisfy(|c| c.is_ascii_digit()), |c| {
            c.to_digit(10).map(|d| d as u8)
        }),
    )(input)
}

/// `+CMGL: <index>,`, yielding `<index>`
fn cmgl_header(input: &str) -> IResult<&str, StorageIndex> {
    delimited(
        tuple((tag(CMGL_TAG), space0)),
        map_res(digit1, str::parse),
        char(','),
    )(input)
}

/// Registration state from the first well formed `+CREG:` line.
pub fn registration_status(response: &str) -> Option<u8> {
    response
        .match_indices(CREG_TAG)
        .find_map(|(i, _)| creg(&response[i..]).ok().map(|(_, stat)| stat))
}

/// Storage slot announced by a listing header line.
pub fn listing_header(line: &str) -> Option<StorageIndex> {
    cmgl_header(line).ok().map(|(_, slot)| slot)
}

/// `(slot, pdu)` pairs of a `+CMGL` listing.
///
/// A header line is paired with the next line consisting of hex digits only.
/// A header that is followed by another header before any data is dropped,
/// lines that are neither are ignored.
pub fn listing_entries(response: &str) -> Vec<(StorageIndex, &str)> {
    let mut entries = Vec::new();
    let mut pending = None;

    for line in response
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|l| !l.is_empty())
    {
        if let Some(slot) = listing_header(line) {
            pending = Some(slot);
        } else if line.bytes().all(|b| b.is_ascii_hexdigit()) {
            if let Some(slot) = pending.take() {
                entries.push((slot, line));
            }
        }
    }

    entries
}
