//! BOLT11 payment request amount extraction

use crate::error::{Error, Result};

/// Extract the amount in millisatoshis from a BOLT11 payment request.
///
/// Only the human-readable amount prefix is inspected: `ln`, a two-letter
/// currency code, digits, an optional multiplier (m/u/n/p), then the `1`
/// separator. Returns `None` when the request is amountless, malformed, or
/// the amount overflows 64-bit arithmetic.
pub fn amount_msats(payment_request: &str) -> Option<u64> {
    let req = payment_request.trim().to_ascii_lowercase();
    let bytes = req.as_bytes();

    if bytes.len() < 5 || !req.starts_with("ln") {
        return None;
    }
    if !bytes[2].is_ascii_lowercase() || !bytes[3].is_ascii_lowercase() {
        return None;
    }

    let mut idx = 4usize;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == 4 {
        // No digits after the currency code: amountless request
        return None;
    }
    let value = req[4..idx].parse::<u64>().ok()?;

    let mut multiplier = None;
    if idx < bytes.len() && matches!(bytes[idx], b'm' | b'u' | b'n' | b'p') {
        multiplier = Some(bytes[idx]);
        idx += 1;
    }

    if idx >= bytes.len() || bytes[idx] != b'1' {
        return None;
    }

    scale_to_msats(value, multiplier)
}

/// Extract the amount in satoshis, truncating sub-satoshi precision.
///
/// Fails with [`Error::InvalidAmount`] when the request is malformed,
/// amountless, or encodes less than one satoshi.
pub fn amount_sats(payment_request: &str) -> Result<u64> {
    let msats = amount_msats(payment_request).ok_or_else(|| {
        Error::InvalidAmount("payment request carries no decodable amount".to_string())
    })?;

    let sats = msats / 1000;
    if sats == 0 {
        return Err(Error::InvalidAmount(format!(
            "payment request amount of {} msat is below one satoshi",
            msats
        )));
    }
    Ok(sats)
}

fn scale_to_msats(value: u64, multiplier: Option<u8>) -> Option<u64> {
    match multiplier {
        Some(b'm') => value.checked_mul(100_000_000),
        Some(b'u') => value.checked_mul(100_000),
        Some(b'n') => value.checked_mul(100),
        // Pico is tenths of a millisatoshi; sub-msat precision is invalid
        Some(b'p') => (value % 10 == 0).then_some(value / 10),
        None => value.checked_mul(100_000_000_000),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_msats_multipliers() {
        assert_eq!(amount_msats("lnbc1m1mock"), Some(100_000_000));
        assert_eq!(amount_msats("lnbc2500u1mock"), Some(250_000_000));
        assert_eq!(amount_msats("lnbc250n1mock"), Some(25_000));
        assert_eq!(amount_msats("lnbc420n1mock"), Some(42_000));
        assert_eq!(amount_msats("lnbc10p1mock"), Some(1));
        assert_eq!(amount_msats("lnbc1000p1mock"), Some(100));
    }

    #[test]
    fn test_amount_msats_is_case_insensitive() {
        assert_eq!(amount_msats("LNBC250N1MOCK"), Some(25_000));
    }

    #[test]
    fn test_amount_msats_rejects_amountless_request() {
        assert_eq!(amount_msats("lnbc1amountless"), None);
        // A bare separator with no amount before it
        assert_eq!(amount_msats("lnbc1"), None);
    }

    #[test]
    fn test_amount_msats_rejects_malformed_requests() {
        assert_eq!(amount_msats(""), None);
        assert_eq!(amount_msats("not-an-invoice"), None);
        assert_eq!(amount_msats("lnbc10x1mock"), None);
        // 'p' amounts must be divisible by ten
        assert_eq!(amount_msats("lnbc1p1mock"), None);
        // Missing separator
        assert_eq!(amount_msats("lnbc250n"), None);
    }

    #[test]
    fn test_amount_msats_rejects_overflow() {
        let value = u64::MAX / 100_000_000 + 1;
        let request = format!("lnbc{}m1mock", value);
        assert_eq!(amount_msats(&request), None);
    }

    #[test]
    fn test_amount_sats_truncates_msats() {
        // 250n = 25_000 msat = 25 sats
        assert_eq!(amount_sats("lnbc250n1mock").unwrap(), 25);
        // 259n = 25_900 msat, truncated to 25 sats
        assert_eq!(amount_sats("lnbc259n1mock").unwrap(), 25);
    }

    #[test]
    fn test_amount_sats_rejects_sub_satoshi() {
        // 10p = 1 msat
        assert!(matches!(
            amount_sats("lnbc10p1mock"),
            Err(Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_amount_sats_rejects_undecodable() {
        assert!(matches!(
            amount_sats("garbage"),
            Err(Error::InvalidAmount(_))
        ));
    }
}
