//! Human-readable byte sizes for cache limits (e.g. "64MB", "512KB").

use thiserror::Error;

const KB: usize = 1024;
const MB: usize = 1024 * KB;
const GB: usize = 1024 * MB;

/// Recognised suffixes, longest first so "MB" wins over "B".
const SUFFIXES: [(&str, usize); 7] = [
    ("GB", GB),
    ("MB", MB),
    ("KB", KB),
    ("G", GB),
    ("M", MB),
    ("K", KB),
    ("B", 1),
];

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid size '{input}', expected a whole number with an optional KB/MB/GB suffix")]
pub struct SizeParseError {
    input: String,
}

/// Parses a size such as `"64MB"`, `"512 kb"` or `"1048576"` into bytes.
///
/// Suffixes are binary (1 KB = 1024 bytes) and case-insensitive; a bare
/// number is taken as bytes.
///
/// # Examples
///
/// ```
/// use webimage::config::parse_size;
///
/// assert_eq!(parse_size("64MB").unwrap(), 64 * 1024 * 1024);
/// assert_eq!(parse_size("512 kb").unwrap(), 512 * 1024);
/// assert_eq!(parse_size("100").unwrap(), 100);
/// assert!(parse_size("1.5GB").is_err());
/// ```
pub fn parse_size(input: &str) -> Result<usize, SizeParseError> {
    let error = || SizeParseError {
        input: input.to_string(),
    };

    let trimmed = input.trim();
    let upper = trimmed.to_ascii_uppercase();

    let (digits, multiplier) = SUFFIXES
        .iter()
        .find_map(|(suffix, multiplier)| {
            upper
                .strip_suffix(suffix)
                .map(|rest| (rest.trim_end(), *multiplier))
        })
        .unwrap_or((upper.as_str(), 1));

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(error());
    }

    digits
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(error)
}

/// Formats a byte count using the largest suffix that divides it exactly.
///
/// ```
/// use webimage::config::format_size;
///
/// assert_eq!(format_size(64 * 1024 * 1024), "64MB");
/// assert_eq!(format_size(1500), "1500B");
/// ```
pub fn format_size(bytes: usize) -> String {
    match bytes {
        0 => "0B".to_string(),
        b if b % GB == 0 => format!("{}GB", b / GB),
        b if b % MB == 0 => format!("{}MB", b / MB),
        b if b % KB == 0 => format!("{}KB", b / KB),
        b => format!("{}B", b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_bytes() {
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("4096B").unwrap(), 4096);
    }

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(parse_size("8K").unwrap(), 8 * KB);
        assert_eq!(parse_size("8kb").unwrap(), 8 * KB);
        assert_eq!(parse_size("64M").unwrap(), 64 * MB);
        assert_eq!(parse_size("64Mb").unwrap(), 64 * MB);
        assert_eq!(parse_size("1GB").unwrap(), GB);
    }

    #[test]
    fn test_parse_whitespace() {
        assert_eq!(parse_size("  64MB ").unwrap(), 64 * MB);
        assert_eq!(parse_size("64 MB").unwrap(), 64 * MB);
    }

    #[test]
    fn test_parse_invalid() {
        for input in ["", "MB", "abc", "-1MB", "1.5GB", "2TB", "+5K", "9999999999999999999999GB"] {
            assert!(parse_size(input).is_err(), "{input:?} should be rejected");
        }
    }

    #[test]
    fn test_error_keeps_input() {
        let err = parse_size("lots").unwrap_err();
        assert!(err.to_string().contains("'lots'"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0B");
        assert_eq!(format_size(KB), "1KB");
        assert_eq!(format_size(64 * MB), "64MB");
        assert_eq!(format_size(2 * GB), "2GB");
        assert_eq!(format_size(1536), "1536B");
    }
}
