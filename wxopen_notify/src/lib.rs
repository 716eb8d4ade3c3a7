//! Verification, decoding and routing of platform push notifications
//!
//! The platform delivers two streams of pushes to a component: notifications
//! addressed to the component itself (verify tickets and authorization
//! changes), and messages from end users of the authorizers it serves. Both
//! arrive as XML, optionally wrapped in an encrypted envelope, and both are
//! signed with the component's shared token.
//!
//! A [`NotificationRouter`] takes each request through the same steps:
//!
//! 1. the `encrypt_type` selects the encrypted or plaintext path (component
//!    notifications must be encrypted),
//! 2. the signatures are verified, and nothing further happens unless they do,
//! 3. the [`EnvelopeCodec`] decrypts and parses the payload into a closed
//!    sum type,
//! 4. verify tickets are cached, authorization changes are acknowledged, and
//!    anything else goes to the supplied [`NotificationHandler`].
//!
//! Requests that fail along the way are answered without a body, which the
//! platform treats as a reason to deliver again.
//!
//! ```
//! use std::sync::Arc;
//!
//! use wxopen_crypto::{AesMessageCipher, EncodingAesKey};
//! use wxopen_notify::{AcknowledgeAll, EnvelopeCodec, InboundRequest, NotificationRouter};
//! use wxopen_tokens::{cache::InMemoryCache, store::TokenStore, AppId};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let key = EncodingAesKey::parse("abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG")?;
//! let codec = EnvelopeCodec::new("token", Arc::new(AesMessageCipher::new("wx_abc", key)));
//!
//! let router = NotificationRouter::new(
//!     AppId::from_static("wx_abc"),
//!     codec,
//!     TokenStore::new(Arc::new(InMemoryCache::new())),
//!     Arc::new(AcknowledgeAll),
//! );
//!
//! let unsigned = InboundRequest {
//!     encrypt_type: Some("aes".into()),
//!     body: b"<xml><Encrypt>...</Encrypt></xml>".to_vec(),
//!     ..InboundRequest::default()
//! };
//! assert_eq!(router.handle_platform(&unsigned).await.body(), None);
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod envelope;
pub mod error;
mod message;
mod router;
mod xml;

pub use envelope::{EncryptedEnvelope, EnvelopeCodec};
pub use error::{DecodeError, EncodeError, HandlerError, InboundError};
pub use message::{
    AuthorizationGrant, DecodedNotification, FastRegisterInfo, FastRegisterResult, MessageBody,
    MessageHeader, OutboundMessage, PlatformEvent, PlatformHeader, PlatformNotification,
    UserMessage,
};
pub use router::{
    AcknowledgeAll, Disposition, InboundRequest, NotificationHandler, NotificationRouter,
    RouterResponse, TransportEncoding, ACKNOWLEDGEMENT,
};
