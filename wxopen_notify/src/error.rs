//! Errors raised while authenticating and decoding push notifications

use std::error::Error as StdError;

use thiserror::Error;
use wxopen_crypto::CipherError;

/// A boxed error returned by a [`NotificationHandler`][crate::NotificationHandler]
pub type HandlerError = Box<dyn StdError + Send + Sync + 'static>;

/// A notification that could not be decoded
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The body is not UTF-8
    #[error("notification body is not UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    /// The body or decrypted payload is not the expected XML document
    #[error("malformed notification XML")]
    Xml(#[from] quick_xml::DeError),

    /// The envelope carries no ciphertext
    #[error("encrypted envelope has no ciphertext")]
    MissingCiphertext,

    /// The ciphertext could not be decrypted
    #[error("unable to decrypt notification payload")]
    Cipher(#[from] CipherError),
}

/// A reply that could not be encoded
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EncodeError {
    /// The reply could not be encrypted
    #[error("unable to encrypt reply payload")]
    Cipher(#[from] CipherError),
}

/// An inbound request that was not acknowledged
///
/// None of these reach the HTTP layer as a failure status. The router logs
/// them and answers without a body, so the platform re-delivers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InboundError {
    /// The request signature did not verify
    #[error("notification signature did not verify")]
    SignatureInvalid,

    /// The request could not be decoded
    #[error("unable to decode notification")]
    DecodeFailure(#[from] DecodeError),

    /// The request named an `encrypt_type` this router does not understand
    #[error("unsupported encrypt_type {0:?}")]
    UnsupportedEncoding(String),

    /// The verify ticket could not be cached
    #[error("unable to cache verify ticket")]
    TicketStore(#[source] wxopen_tokens::Error),

    /// The external handler failed
    #[error("notification handler failed")]
    Handler(#[source] HandlerError),

    /// The handler's reply could not be encoded
    #[error("unable to encode reply")]
    Reply(#[from] EncodeError),
}

impl InboundError {
    /// Whether the request failed authentication or decoding and is likely
    /// a probe rather than a genuine delivery
    #[must_use]
    pub fn is_untrusted(&self) -> bool {
        matches!(
            self,
            Self::SignatureInvalid | Self::DecodeFailure(_) | Self::UnsupportedEncoding(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_failures_are_untrusted() {
        assert!(InboundError::SignatureInvalid.is_untrusted());
        assert!(InboundError::DecodeFailure(DecodeError::MissingCiphertext).is_untrusted());
        assert!(InboundError::UnsupportedEncoding("rsa".into()).is_untrusted());
        assert!(!InboundError::Handler("boom".into()).is_untrusted());
    }
}
