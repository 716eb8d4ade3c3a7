//! Push-notification signatures
//!
//! Both signatures are lowercase hex SHA-1 digests of the lexicographically
//! sorted inputs, concatenated without separators:
//!
//! * `signature = SHA1(sort(token, timestamp, nonce))`
//! * `msg_signature = SHA1(sort(token, timestamp, nonce, ciphertext))`

use ring::digest;
use subtle::ConstantTimeEq;

/// Computes the request signature over the shared token, timestamp and nonce
pub fn sign(token: &str, timestamp: &str, nonce: &str) -> String {
    digest_sorted(&mut [token, timestamp, nonce])
}

/// Computes the message signature, which additionally covers the ciphertext
pub fn msg_sign(token: &str, timestamp: &str, nonce: &str, encrypted: &str) -> String {
    digest_sorted(&mut [token, timestamp, nonce, encrypted])
}

fn digest_sorted(parts: &mut [&str]) -> String {
    parts.sort_unstable();

    let mut ctx = digest::Context::new(&digest::SHA1_FOR_LEGACY_USE_ONLY);
    for part in parts.iter() {
        ctx.update(part.as_bytes());
    }

    hex::encode(ctx.finish())
}

/// Compares two byte strings in time independent of their contents
///
/// When the lengths differ, the expected value is still compared against
/// itself so that the work done does not reveal how long the expected value
/// is or where a mismatch would have occurred.
pub fn secure_compare(given: &[u8], expected: &[u8]) -> bool {
    let same_len = (given.len() as u64).ct_eq(&(expected.len() as u64));
    let candidate = if bool::from(same_len) { given } else { expected };
    let same_bytes = candidate.ct_eq(expected);

    bool::from(same_len & same_bytes)
}

/// Verifies both signatures carried by an encrypted delivery
///
/// Returns `false` if any input is empty or if either signature fails to
/// match. Both comparisons are always performed.
pub fn verify(
    signature: &str,
    timestamp: &str,
    nonce: &str,
    shared_secret: &str,
    ciphertext: &str,
    msg_signature: &str,
) -> bool {
    if [signature, timestamp, nonce, ciphertext, msg_signature]
        .iter()
        .any(|field| field.is_empty())
    {
        return false;
    }

    let expected = sign(shared_secret, timestamp, nonce);
    let expected_msg = msg_sign(shared_secret, timestamp, nonce, ciphertext);

    let signature_ok = secure_compare(signature.as_bytes(), expected.as_bytes());
    let msg_signature_ok = secure_compare(msg_signature.as_bytes(), expected_msg.as_bytes());

    signature_ok & msg_signature_ok
}

/// Verifies the request signature of a plaintext delivery
///
/// Plaintext deliveries carry no ciphertext, so only the request signature
/// over the token, timestamp and nonce can be checked.
pub fn verify_plain(signature: &str, timestamp: &str, nonce: &str, shared_secret: &str) -> bool {
    if [signature, timestamp, nonce].iter().any(|field| field.is_empty()) {
        return false;
    }

    let expected = sign(shared_secret, timestamp, nonce);
    secure_compare(signature.as_bytes(), expected.as_bytes())
}
