//! Authentication primitives for inbound push notifications
//!
//! The remote platform signs every push it delivers with a SHA-1 digest over
//! the sorted concatenation of a shared token, a timestamp, a nonce, and
//! (for encrypted deliveries) the ciphertext itself. The [`signature`]
//! module computes and checks those digests without leaking timing
//! information about where a forged signature first diverges.
//!
//! Encrypted deliveries wrap the real payload with AES-256-CBC. The
//! [`MessageCipher`] trait is the seam through which the rest of the
//! pipeline decrypts and re-encrypts payloads; [`AesMessageCipher`] is the
//! platform's own scheme.
//!
//! ```
//! use wxopen_crypto::signature;
//!
//! let token = "QDG6eK";
//! let sig = signature::sign(token, "1409659813", "1372623149");
//! let msg_sig = signature::msg_sign(token, "1409659813", "1372623149", "ciphertext");
//!
//! assert!(signature::verify(&sig, "1409659813", "1372623149", token, "ciphertext", &msg_sig));
//! assert!(!signature::verify(&sig, "1409659813", "1372623149", token, "tampered", &msg_sig));
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    unsafe_code,
    unused_must_use
)]

mod cipher;
pub mod error;
pub mod signature;

pub use cipher::{AesMessageCipher, Decrypted, EncodingAesKey, MessageCipher};
pub use error::CipherError;
