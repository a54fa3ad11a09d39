//! Phone number normalization.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static E164: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+[1-9][0-9]{7,14}$").expect("valid E.164 pattern"));

/// Separators tolerated inside a raw phone string.
const SEPARATORS: &[char] = &[' ', '-', '.', '(', ')', '/'];

/// Normalizes a raw contact string to E.164.
///
/// Separators are stripped. A leading `00` becomes `+`, a single leading `0`
/// is replaced by `+<default_country_code>`, and bare digits get the country
/// code prepended unless they already start with it. Returns `None` when the
/// input holds anything else or the result is not a valid E.164 number.
pub fn normalize_phone(raw: &str, default_country_code: &str) -> Option<String> {
    let trimmed = raw.trim();
    let (has_plus, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let mut digits = String::with_capacity(rest.len());
    for c in rest.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if !SEPARATORS.contains(&c) {
            return None;
        }
    }
    if digits.is_empty() {
        return None;
    }

    let candidate = if has_plus {
        format!("+{}", digits)
    } else if let Some(international) = digits.strip_prefix("00") {
        format!("+{}", international)
    } else if let Some(national) = digits.strip_prefix('0') {
        format!("+{}{}", default_country_code, national)
    } else if digits.starts_with(default_country_code) {
        format!("+{}", digits)
    } else {
        format!("+{}{}", default_country_code, digits)
    };

    E164.is_match(&candidate).then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_national_trunk_prefix() {
        assert_eq!(
            normalize_phone("01012345678", "20").as_deref(),
            Some("+201012345678")
        );
    }

    #[test]
    fn test_international_prefixes() {
        assert_eq!(
            normalize_phone("00201012345678", "20").as_deref(),
            Some("+201012345678")
        );
        assert_eq!(
            normalize_phone("+20 101 234-5678", "20").as_deref(),
            Some("+201012345678")
        );
        assert_eq!(
            normalize_phone("+44 (20) 7946 0958", "20").as_deref(),
            Some("+442079460958")
        );
    }

    #[test]
    fn test_bare_digits() {
        assert_eq!(
            normalize_phone("201012345678", "20").as_deref(),
            Some("+201012345678")
        );
        assert_eq!(
            normalize_phone("1012345678", "20").as_deref(),
            Some("+201012345678")
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(normalize_phone("", "20"), None);
        assert_eq!(normalize_phone("   ", "20"), None);
        assert_eq!(normalize_phone("n/a", "20"), None);
        assert_eq!(normalize_phone("0100x123", "20"), None);
        assert_eq!(normalize_phone("+12", "20"), None);
        assert_eq!(normalize_phone("+0123456789", "20"), None);
        assert_eq!(normalize_phone("+1234567890123456", "20"), None);
    }
}
