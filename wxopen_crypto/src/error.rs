//! Common errors

use thiserror::Error;

/// An error while decrypting or encrypting a notification payload
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CipherError {
    /// The encoding AES key is not 43 characters of base64
    #[error("encoding AES key must be 43 base64 characters")]
    InvalidKey,

    /// The ciphertext could not be decoded from base64
    #[error("ciphertext is not valid base64")]
    Base64(#[from] base64::DecodeError),

    /// The ciphertext is empty or not a whole number of AES blocks
    #[error("ciphertext length is not a whole number of AES blocks")]
    BlockLength,

    /// The trailing padding of the decrypted payload is malformed
    #[error("malformed PKCS#7 padding")]
    Padding,

    /// The decrypted payload is shorter than its framing declares
    #[error("decrypted payload is truncated")]
    Truncated,

    /// The payload names an app other than the one this cipher serves
    #[error("payload was encrypted for a different app")]
    AppIdMismatch,

    /// The message cannot be framed with a 32-bit length prefix
    #[error("message too long to encrypt")]
    MessageTooLong,

    /// The system random number generator failed
    #[error("random number generator failure")]
    Random,
}

impl CipherError {
    /// Whether the error indicates tampering or a key mismatch rather than a
    /// local configuration problem
    #[must_use]
    pub fn is_untrusted_payload(&self) -> bool {
        matches!(
            self,
            Self::Base64(_)
                | Self::BlockLength
                | Self::Padding
                | Self::Truncated
                | Self::AppIdMismatch
        )
    }
}
