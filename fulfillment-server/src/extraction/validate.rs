//! Voucher code format validation

use std::collections::HashSet;

pub const MIN_CODE_LEN: usize = 6;
pub const MAX_CODE_LEN: usize = 20;
const MIN_DISTINCT_CHARS: usize = 3;

fn is_separator(c: char) -> bool {
    c == '-' || c == ' '
}

/// Whether `code` looks like a redeemable voucher code
///
/// Uppercase letters, digits and separators (`-`, space) only; 6 to 20
/// characters once separators are removed, with at least 3 distinct
/// characters so that degenerate runs like `AAAAAAA` are rejected.
pub fn validate_code_format(code: &str) -> bool {
    if code.is_empty()
        || !code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || is_separator(c))
    {
        return false;
    }

    let bare: Vec<char> = code.chars().filter(|c| !is_separator(*c)).collect();
    if !(MIN_CODE_LEN..=MAX_CODE_LEN).contains(&bare.len()) {
        return false;
    }

    bare.iter().collect::<HashSet<_>>().len() >= MIN_DISTINCT_CHARS
}
