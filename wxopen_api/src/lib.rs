//! Typed calls to the platform API on behalf of authorizers
//!
//! An [`OpenPlatformClient`] wraps the token managers of `wxopen_tokens` and
//! resolves the right credential for each call:
//!
//! * component calls, such as [`create_pre_auth_code`] or [`template_list`],
//!   use the component token,
//! * web authorization calls exchange and refresh end-user tokens, caching
//!   them separately from the authorizer's own,
//! * mini-program management calls, such as [`commit`] or [`release`], use
//!   the access token of the authorizer named in the call and refresh it
//!   when it has expired.
//!
//! Failures share the [`Error`] taxonomy of the token managers. A response
//! carrying a non-zero `errcode` is reported as [`Error::RemoteApi`], even
//! from endpoints that answer with an image on success.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use wxopen_api::{AuthType, OpenPlatformClient};
//! use wxopen_tokens::{
//!     cache::InMemoryCache, endpoint::Endpoints, store::TokenStore, transport::ReqwestTransport,
//!     AppId, AppSecret, AuthorizerTokenManager, ComponentTokenManager,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let component = Arc::new(ComponentTokenManager::new(
//!     AppId::from_static("wx_component"),
//!     AppSecret::from_static("secret"),
//!     TokenStore::new(Arc::new(InMemoryCache::new())),
//!     Arc::new(ReqwestTransport::default()),
//!     Endpoints::parse("https://api.weixin.qq.com")?,
//! ));
//! let client = OpenPlatformClient::new(Arc::new(AuthorizerTokenManager::new(component)));
//!
//! let url = client
//!     .authorization_url("https://example.com/authorized", AuthType::MiniProgram)
//!     .await?;
//! println!("grant access at {url}");
//! # Ok(())
//! # }
//! ```
//!
//! [`create_pre_auth_code`]: OpenPlatformClient::create_pre_auth_code
//! [`template_list`]: OpenPlatformClient::template_list
//! [`commit`]: OpenPlatformClient::commit
//! [`release`]: OpenPlatformClient::release

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

mod client;
mod component;
pub mod dto;
mod miniprogram;
mod web;

#[cfg(test)]
mod testing;

use client::EmptyResponse;
pub use client::OpenPlatformClient;
pub use dto::{
    AuditStatus, AuthType, AuthorizerInfo, CodeTemplate, CommitRequest, CustomMessage,
    CustomMessageBody, DomainAction, FastRegisterQuery, FastRegisterRequest, MediaContent,
    MiniProgramSession, PreAuthCode, ServerDomains, Tester, TextContent, WxaCodeRequest,
};
pub use wxopen_tokens::Error;
