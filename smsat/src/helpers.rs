use core::fmt;

/// Debug formatting of wire bytes, falling back to escaped output for
/// anything that is not UTF-8.
pub struct LossyStr<'a>(pub &'a [u8]);

impl fmt::Debug for LossyStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match core::str::from_utf8(self.0) {
            Ok(s) => write!(f, "{s:?}"),
            Err(_) => write!(f, "{:?}", self.0.escape_ascii().to_string()),
        }
    }
}

/// Whether `needle` occurs anywhere in `haystack`. An empty needle always
/// matches.
pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}
