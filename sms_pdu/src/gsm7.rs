//! GSM 03.38 default alphabet and septet packing.

/// Escape septet, switching to the extension table for the next septet.
pub const ESCAPE: u8 = 0x1B;

const DEFAULT_ALPHABET: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å', //
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1B}', 'Æ', 'æ', 'ß', 'É', //
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/', //
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?', //
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', //
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§', //
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', //
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à', //
];

const EXTENSION: [(u8, char); 10] = [
    (0x0A, '\u{0C}'),
    (0x14, '^'),
    (0x28, '{'),
    (0x29, '}'),
    (0x2F, '\\'),
    (0x3C, '['),
    (0x3D, '~'),
    (0x3E, ']'),
    (0x40, '|'),
    (0x65, '€'),
];

/// Map `text` onto default alphabet septets. Characters from the extension
/// table take two septets (`ESCAPE`, code).
///
/// Returns `None` if any character cannot be represented.
pub fn to_septets(text: &str) -> Option<Vec<u8>> {
    let mut septets = Vec::with_capacity(text.len());
    for c in text.chars() {
        if c == '\u{1B}' {
            return None;
        }
        if let Some(pos) = DEFAULT_ALPHABET.iter().position(|&d| d == c) {
            septets.push(pos as u8);
        } else if let Some((code, _)) = EXTENSION.iter().find(|(_, e)| *e == c) {
            septets.push(ESCAPE);
            septets.push(*code);
        } else {
            return None;
        }
    }
    Some(septets)
}

/// Map septets back to text.
///
/// An escape followed by a code missing from the extension table falls back to
/// the default table, a trailing lone escape is dropped.
pub fn from_septets(septets: &[u8]) -> String {
    let mut text = String::with_capacity(septets.len());
    let mut iter = septets.iter().map(|s| s & 0x7F);
    while let Some(s) = iter.next() {
        if s == ESCAPE {
            if let Some(code) = iter.next() {
                let c = EXTENSION
                    .iter()
                    .find(|(e, _)| *e == code)
                    .map_or(DEFAULT_ALPHABET[usize::from(code)], |(_, c)| *c);
                text.push(c);
            }
        } else {
            text.push(DEFAULT_ALPHABET[usize::from(s)]);
        }
    }
    text
}

/// Pack septets LSB first, preceded by `fill_bits` zero bits.
///
/// The fill bits align the first septet on a septet boundary when a user data
/// header precedes the text.
pub fn pack(septets: &[u8], fill_bits: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity((septets.len() * 7 + usize::from(fill_bits)).div_ceil(8));
    let mut acc: u32 = 0;
    let mut bits = u32::from(fill_bits);

    for s in septets {
        acc |= u32::from(s & 0x7F) << bits;
        bits += 7;
        while bits >= 8 {
            out.push(acc as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 {
        out.push(acc as u8);
    }
    out
}

/// Unpack at most `count` septets, skipping `fill_bits` leading bits.
pub fn unpack(bytes: &[u8], count: usize, fill_bits: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(count);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut skip = u32::from(fill_bits);

    for b in bytes {
        acc |= u32::from(*b) << bits;
        bits += 8;
        if skip > 0 {
            acc >>= skip;
            bits -= skip;
            skip = 0;
        }
        while bits >= 7 && out.len() < count {
            out.push((acc & 0x7F) as u8);
            acc >>= 7;
            bits -= 7;
        }
    }
    out
}
