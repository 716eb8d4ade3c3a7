//! Cache-aside management of component and authorizer access tokens
//!
//! A third-party component acting on behalf of many tenant accounts holds
//! three kinds of credential:
//!
//! * a _verify ticket_, pushed to the component periodically by the platform,
//! * a _component access token_, obtained by presenting the app secret and
//!   the latest verify ticket, and
//! * one _authorizer token pair_ per tenant that has granted access.
//!
//! Every credential lives in a shared [`KeyValueCache`][cache::KeyValueCache]
//! under a namespaced key (see [`store`]), so that several instances of a
//! service can cooperate on the same tokens. Within one process, refreshes of
//! the same key are single-flight: concurrent callers wait for the one
//! refresh in progress and then read its result from the cache.
//!
//! Expiry is always computed by [`CredentialLifetime`], which subtracts a
//! safety margin from the lifetime the platform declares. A credential is
//! only written to the cache after the platform answered successfully.
//!
//! ```
//! use std::sync::Arc;
//!
//! use wxopen_tokens::{
//!     cache::InMemoryCache, endpoint::Endpoints, store::TokenStore, transport::ReqwestTransport,
//!     AppId, AppSecret, AuthorizerTokenManager, ComponentTokenManager,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = TokenStore::new(Arc::new(InMemoryCache::new()));
//! let component = Arc::new(ComponentTokenManager::new(
//!     AppId::from_static("wx_component"),
//!     AppSecret::from_static("secret"),
//!     store,
//!     Arc::new(ReqwestTransport::default()),
//!     Endpoints::parse("https://api.weixin.qq.com")?,
//! ));
//!
//! let authorizers = AuthorizerTokenManager::new(component.clone());
//! # /* Commented out due to this trying to interact with the world.
//! let token = component.get_token().await?;
//! let tenant = authorizers.access_token(AuthorizerAppIdRef::from_static("wx_tenant")).await?;
//! # */
//! # let _ = authorizers;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! * `default-tls`: (default) uses the platform's native TLS stack for outbound requests.
//! * `rustls-tls`: uses `rustls` for outbound requests.

#![cfg_attr(docsrs, feature(doc_cfg))]
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

mod authorizer;
mod braids;
pub mod cache;
mod component;
mod config;
mod credentials;
pub mod dto;
pub mod endpoint;
pub mod error;
mod guard;
pub mod remote;
pub mod store;
pub mod transport;

#[cfg(test)]
mod testing;

pub use authorizer::AuthorizerTokenManager;
pub use braids::*;
pub use component::ComponentTokenManager;
pub use config::ClientConfig;
pub use credentials::{
    AuthorizerCredential, ComponentCredential, CredentialLifetime, WebAuthorizationCredential,
};
pub use error::{Error, NetworkError};
