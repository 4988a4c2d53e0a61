//! Utility functions and helpers.

pub mod http;
pub mod time;
pub mod url;

use md5::{Digest, Md5};

/// First 8 hex characters of the MD5 digest of `input`.
///
/// Must stay MD5: stored plan and space ids were derived with it.
pub fn short_hash(input: &str) -> String {
    let digest = Md5::digest(input.as_bytes());
    hex::encode(&digest[..4])
}

/// Keep only ASCII digits, e.g. `"¥1,100"` becomes `"1100"`.
pub fn digits_only(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

/// Parse the digits of a price label; empty labels read as 0.
pub fn parse_price(text: &str) -> u64 {
    digits_only(text).parse().unwrap_or(0)
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
