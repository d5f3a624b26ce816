//! RFC 6238 one-time codes over the stored account secrets: HMAC-SHA1,
//! 30 second steps, 6 digits, which is what every mainstream authenticator
//! app produces.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use hmac::{Hmac, Mac};
use sha1::Sha1;

const STEP_SECONDS: u64 = 30;
const DIGITS: u32 = 6;

/// Code for the current time step.
pub fn generate(secret: &str) -> Result<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before the unix epoch")?
        .as_secs();
    generate_at(secret, now)
}

/// Code for an explicit unix timestamp. Split out so tests can pin time.
pub fn generate_at(secret: &str, unix_time: u64) -> Result<String> {
    let key = decode_base32(secret)?;
    let counter = unix_time / STEP_SECONDS;

    let mut mac = Hmac::<Sha1>::new_from_slice(&key)
        .context("Failed to initialize HMAC from decoded secret")?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation per RFC 4226 section 5.3.
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    let code = binary % 10u32.pow(DIGITS);
    Ok(format!("{:0width$}", code, width = DIGITS as usize))
}

/// RFC 4648 base32 decode, tolerant of lowercase, spaces and trailing
/// padding. Authenticator secrets are frequently pasted in any of those
/// shapes.
fn decode_base32(input: &str) -> Result<Vec<u8>> {
    const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

    let mut bits: u32 = 0;
    let mut bit_count: u32 = 0;
    let mut out = Vec::with_capacity(input.len() * 5 / 8);

    for ch in input.chars() {
        if ch == '=' || ch.is_whitespace() {
            continue;
        }
        let upper = ch.to_ascii_uppercase();
        let value = ALPHABET
            .iter()
            .position(|&a| a as char == upper)
            .map(|v| v as u32);
        let Some(value) = value else {
            bail!("Invalid base32 character {:?} in secret", ch);
        };
        bits = (bits << 5) | value;
        bit_count += 5;
        if bit_count >= 8 {
            bit_count -= 8;
            out.push((bits >> bit_count) as u8);
        }
    }

    if out.is_empty() {
        bail!("Secret decodes to nothing");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 6238 appendix B, SHA-1 rows. The test secret there is the ASCII
    // string "12345678901234567890", base32-encoded below. The reference
    // vectors are 8 digits; we compare the 6-digit tail.
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn known_vectors() {
        assert_eq!(generate_at(RFC_SECRET, 59).unwrap(), "287082");
        assert_eq!(generate_at(RFC_SECRET, 1111111109).unwrap(), "081804");
        assert_eq!(generate_at(RFC_SECRET, 1234567890).unwrap(), "005924");
        assert_eq!(generate_at(RFC_SECRET, 2000000000).unwrap(), "279037");
    }

    #[test]
    fn stable_within_a_step_and_changes_across() {
        let a = generate_at(RFC_SECRET, 30).unwrap();
        let b = generate_at(RFC_SECRET, 59).unwrap();
        let c = generate_at(RFC_SECRET, 60).unwrap();
        assert_eq!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn lowercase_padding_and_spaces_accepted() {
        let canonical = generate_at(RFC_SECRET, 59).unwrap();
        assert_eq!(
            generate_at("gezdgnbvgy3tqojqgezdgnbvgy3tqojq", 59).unwrap(),
            canonical
        );
        assert_eq!(
            generate_at("GEZD GNBV GY3T QOJQ GEZD GNBV GY3T QOJQ==", 59).unwrap(),
            canonical
        );
    }

    #[test]
    fn empty_and_invalid_secrets_rejected() {
        assert!(generate_at("", 59).is_err());
        assert!(generate_at("====", 59).is_err());
        assert!(generate_at("not!base32", 59).is_err());
    }
}
