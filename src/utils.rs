/// Field-level normalization helpers for gateway telemetry
use lazy_static::lazy_static;
use regex::Regex;
use time::{format_description, OffsetDateTime};

use crate::decoder::DecodeError;

/// Seconds between the Unix epoch and 2000-01-01T00:00:00Z, the gateway's epoch
pub const Y2K_EPOCH_OFFSET: i64 = 946_684_800;

/// Gateway scaled values are kilowatt based; records carry watts
const WATTS_PER_KILOWATT: f64 = 1000.0;

lazy_static! {
    static ref MAC_RE: Regex = Regex::new(
        r"^(?:0[xX])?([0-9A-Fa-f]{2})[:.-]?([0-9A-Fa-f]{2})[:.-]?([0-9A-Fa-f]{2})[:.-]?([0-9A-Fa-f]{2})[:.-]?([0-9A-Fa-f]{2})[:.-]?([0-9A-Fa-f]{2})(?:[:.-]?([0-9A-Fa-f]{2})[:.-]?([0-9A-Fa-f]{2}))?$"
    )
    .unwrap();
}

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    match format_description::parse("[day].[month].[year] - [hour]:[minute]:[second]") {
        Ok(format) => dt.format(&format).unwrap_or_else(|_| dt.to_string()),
        Err(_) => dt.to_string(),
    }
}

/// Canonicalize a hardware address into lowercase hyphenated octets
///
/// Accepts an optional `0x` prefix and any mix of `:`, `.`, `-` or no
/// separator between octets. Six or eight octets are recognised; anything
/// else yields `None`.
///
/// # Examples
/// `0xDEADBEEF0000661A` and `de:ad:be:ef:00:00:66:1a` both become
/// `de-ad-be-ef-00-00-66-1a`.
pub fn normalize_mac(mac: &str) -> Option<String> {
    let captures = MAC_RE.captures(mac.trim())?;
    let octets: Vec<String> = captures
        .iter()
        .skip(1)
        .flatten()
        .map(|octet| octet.as_str().to_ascii_lowercase())
        .collect();
    Some(octets.join("-"))
}

/// Parse a gateway hex field such as `0x000003e8`
///
/// The `0x` prefix is optional. Signs, whitespace inside the digits and
/// empty strings are rejected rather than coerced.
pub fn parse_hex(field: &str, text: &str) -> Result<u64, DecodeError> {
    let invalid = || DecodeError::InvalidHex {
        field: field.to_string(),
        value: text.to_string(),
    };

    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    u64::from_str_radix(digits, 16).map_err(|_| invalid())
}

/// Apply multiplier/divisor scaling and convert to watts
///
/// A zero multiplier or divisor means "unset" and counts as 1.
pub fn scaled_watts(value: u64, multiplier: u64, divisor: u64) -> f64 {
    let multiplier = if multiplier == 0 { 1 } else { multiplier };
    let divisor = if divisor == 0 { 1 } else { divisor };
    value as f64 * multiplier as f64 / divisor as f64 * WATTS_PER_KILOWATT
}

/// Convert seconds since 2000-01-01T00:00:00Z into an absolute UTC time
pub fn y2k_to_datetime(seconds: u64) -> Result<OffsetDateTime, DecodeError> {
    let unix = i64::try_from(seconds)
        .ok()
        .and_then(|s| s.checked_add(Y2K_EPOCH_OFFSET))
        .ok_or(DecodeError::InvalidTimestamp(seconds))?;
    OffsetDateTime::from_unix_timestamp(unix).map_err(|_| DecodeError::InvalidTimestamp(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn normalizes_prefixed_eight_octet_address() {
        assert_eq!(
            normalize_mac("0xdeadbeef0000661a").as_deref(),
            Some("de-ad-be-ef-00-00-66-1a")
        );
    }

    #[test]
    fn normalizes_mixed_separators_and_case() {
        assert_eq!(
            normalize_mac("DE:AD.BE-EF0000").as_deref(),
            Some("de-ad-be-ef-00-00")
        );
        assert_eq!(
            normalize_mac("0XAA-bb-CC-dd-EE-ff-00-11").as_deref(),
            Some("aa-bb-cc-dd-ee-ff-00-11")
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["0xdeadbeef00e33f60", "01:23:45:67:89:ab", "a1.b2.c3.d4.e5.f6.07.08"] {
            let once = normalize_mac(raw).unwrap();
            assert_eq!(normalize_mac(&once).as_deref(), Some(once.as_str()));
        }
    }

    #[test]
    fn rejects_malformed_addresses() {
        for raw in [
            "not-a-mac",
            "",
            "0x",
            "deadbeef00",          // five octets
            "deadbeef0000661",     // odd digit count
            "deadbeef0000661a1b",  // nine octets
            "deadbeef00006",       // six and a half
            "deadbeef00e3zz60",    // non-hex
            "de:ad:be:ef:00:00:66", // seven octets
        ] {
            assert_eq!(normalize_mac(raw), None, "accepted {:?}", raw);
        }
    }

    #[test]
    fn parses_hex_with_and_without_prefix() {
        assert_eq!(parse_hex("Demand", "0x000b79").unwrap(), 0xb79);
        assert_eq!(parse_hex("Demand", "3E8").unwrap(), 1000);
        assert_eq!(
            parse_hex("SummationDelivered", "0x000000000324b034").unwrap(),
            0x324b034
        );
    }

    #[test]
    fn rejects_malformed_hex() {
        for raw in ["", "0x", "12g4", "-0x10", "+10", "0x 10", "1.5"] {
            let err = parse_hex("Demand", raw).unwrap_err();
            assert!(
                matches!(err, DecodeError::InvalidHex { ref field, .. } if field == "Demand"),
                "accepted {:?}",
                raw
            );
        }
    }

    #[test]
    fn zero_multiplier_or_divisor_counts_as_one() {
        assert_eq!(scaled_watts(5, 0, 1), scaled_watts(5, 1, 1));
        assert_eq!(scaled_watts(5, 2, 0), scaled_watts(5, 2, 1));
        assert_eq!(scaled_watts(5, 0, 0), 5000.0);
    }

    #[test]
    fn scales_to_watts() {
        assert!((scaled_watts(0xb79, 1, 0x3e8) - 2937.0).abs() < 1e-6);
        assert_eq!(scaled_watts(3, 2, 1), 6000.0);
    }

    #[test]
    fn vendor_epoch_starts_at_y2k() {
        assert_eq!(y2k_to_datetime(0).unwrap(), datetime!(2000-01-01 0:00 UTC));
    }

    #[test]
    fn vendor_epoch_is_a_pure_offset() {
        let ts = y2k_to_datetime(0x1f441da9).unwrap();
        assert_eq!(ts.unix_timestamp(), 946_684_800 + 0x1f441da9);
    }

    #[test]
    fn format_datetime_is_readable() {
        let ts = y2k_to_datetime(0).unwrap();
        assert_eq!(format_datetime(&ts), "01.01.2000 - 00:00:00");
    }
}
