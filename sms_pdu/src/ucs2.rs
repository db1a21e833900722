//! 16-bit user data alphabet.
//!
//! The SMS alphabet is nominally UCS-2, which only knows 16-bit code units.
//! Characters outside the basic multilingual plane travel as UTF-16 surrogate
//! pairs, which every current handset reassembles. Encoding therefore emits
//! surrogate pairs for such characters and decoding recombines them, so text
//! with emoji survives the trip unchanged.

/// Text as big endian UTF-16 code units.
pub fn encode(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}

/// Serialize code units big endian.
pub fn to_bytes(units: &[u16]) -> Vec<u8> {
    units.iter().flat_map(|u| u.to_be_bytes()).collect()
}

/// Decode big endian code units, recombining surrogate pairs.
///
/// Unpaired surrogates and a dangling odd byte turn into U+FFFD.
pub fn decode(bytes: &[u8]) -> String {
    let units = bytes
        .chunks(2)
        .map(|c| match *c {
            [hi, lo] => u16::from_be_bytes([hi, lo]),
            _ => 0xFFFD,
        });

    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Whether a code unit starts a surrogate pair.
pub const fn is_high_surrogate(unit: u16) -> bool {
    matches!(unit, 0xD800..=0xDBFF)
}
