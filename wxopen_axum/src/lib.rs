//! Axum endpoints for receiving platform push notifications
//!
//! [`routes`] mounts the two endpoints the platform delivers to: the
//! component notification endpoint at [`NOTIFY_PATH`] and the end-user
//! message endpoint at [`EVENT_PATH`]. Each extracts the signing parameters
//! from the query string and hands the raw body to a
//! [`NotificationRouter`].
//!
//! Whatever happens inside the router, the platform is answered with
//! `200 OK`. Only the body differs: the acknowledgement literal, a reply
//! document, or nothing at all when the delivery should be retried.
//!
//! ```
//! use std::sync::Arc;
//!
//! use wxopen_crypto::{AesMessageCipher, EncodingAesKey};
//! use wxopen_notify::{AcknowledgeAll, EnvelopeCodec, NotificationRouter};
//! use wxopen_tokens::{cache::InMemoryCache, store::TokenStore, AppId};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let key = EncodingAesKey::parse("abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG")?;
//! let router = NotificationRouter::new(
//!     AppId::from_static("wx_abc"),
//!     EnvelopeCodec::new("token", Arc::new(AesMessageCipher::new("wx_abc", key))),
//!     TokenStore::new(Arc::new(InMemoryCache::new())),
//!     Arc::new(AcknowledgeAll),
//! );
//!
//! let app: axum::Router = wxopen_axum::routes(Arc::new(router));
//! # let _ = app;
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

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use wxopen_clock::Clock;
use wxopen_notify::{InboundRequest, NotificationRouter, RouterResponse};

/// Where the platform delivers component notifications
pub const NOTIFY_PATH: &str = "/api/notify";

/// Where the platform delivers end-user messages and events
pub const EVENT_PATH: &str = "/api/event";

/// The signing parameters the platform appends to every delivery
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NotifyQuery {
    /// Signature over the token, timestamp and nonce
    #[serde(default)]
    pub signature: String,
    /// Delivery timestamp
    #[serde(default)]
    pub timestamp: String,
    /// Delivery nonce
    #[serde(default)]
    pub nonce: String,
    /// Signature additionally covering the ciphertext
    #[serde(default)]
    pub msg_signature: Option<String>,
    /// `aes` for encrypted deliveries
    #[serde(default)]
    pub encrypt_type: Option<String>,
}

impl NotifyQuery {
    /// Combines the query with the request body
    pub fn into_request(self, body: Bytes) -> InboundRequest {
        InboundRequest {
            signature: self.signature,
            timestamp: self.timestamp,
            nonce: self.nonce,
            msg_signature: self.msg_signature,
            encrypt_type: self.encrypt_type,
            body: body.to_vec(),
        }
    }
}

/// Converts a [`RouterResponse`] into an HTTP response
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouterReply(pub RouterResponse);

impl IntoResponse for RouterReply {
    fn into_response(self) -> Response {
        match self.0 {
            RouterResponse::Acknowledge => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                wxopen_notify::ACKNOWLEDGEMENT,
            )
                .into_response(),
            RouterResponse::Reply(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
                body,
            )
                .into_response(),
            RouterResponse::Drop => StatusCode::OK.into_response(),
        }
    }
}

/// Builds the notification endpoints over `router`
pub fn routes<C>(router: Arc<NotificationRouter<C>>) -> Router
where
    C: Clock + Send + Sync + 'static,
{
    Router::new()
        .route(NOTIFY_PATH, post(notify::<C>))
        .route(EVENT_PATH, post(event::<C>))
        .with_state(router)
}

async fn notify<C>(
    State(router): State<Arc<NotificationRouter<C>>>,
    query: Option<Query<NotifyQuery>>,
    body: Bytes,
) -> RouterReply
where
    C: Clock + Send + Sync + 'static,
{
    let Some(Query(query)) = query else {
        tracing::warn!("dropping notification with unreadable query string");
        return RouterReply(RouterResponse::Drop);
    };

    RouterReply(router.handle_platform(&query.into_request(body)).await)
}

async fn event<C>(
    State(router): State<Arc<NotificationRouter<C>>>,
    query: Option<Query<NotifyQuery>>,
    body: Bytes,
) -> RouterReply
where
    C: Clock + Send + Sync + 'static,
{
    let Some(Query(query)) = query else {
        tracing::warn!("dropping message with unreadable query string");
        return RouterReply(RouterResponse::Drop);
    };

    RouterReply(router.handle_message(&query.into_request(body)).await)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use tower::ServiceExt;
    use wxopen_crypto::{signature, AesMessageCipher, EncodingAesKey, MessageCipher};
    use wxopen_notify::{AcknowledgeAll, EnvelopeCodec};
    use wxopen_tokens::{
        cache::{InMemoryCache, KeyValueCache},
        store::TokenStore,
        AppId,
    };

    use super::*;

    const TOKEN: &str = "QDG6eK";
    const AES_KEY: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG";
    const TIMESTAMP: &str = "1409659813";
    const NONCE: &str = "1372623149";

    struct Fixture {
        cache: Arc<InMemoryCache>,
        cipher: AesMessageCipher,
        app: Router,
    }

    fn fixture() -> Fixture {
        let cache = Arc::new(InMemoryCache::new());
        let cipher = AesMessageCipher::new("wx_abc", EncodingAesKey::parse(AES_KEY).unwrap());
        let router = NotificationRouter::new(
            AppId::from_static("wx_abc"),
            EnvelopeCodec::new(TOKEN, Arc::new(cipher.clone())),
            TokenStore::new(cache.clone()),
            Arc::new(AcknowledgeAll),
        );

        Fixture {
            cache,
            cipher,
            app: routes(Arc::new(router)),
        }
    }

    impl Fixture {
        fn signed_request(&self, path: &str, plaintext: &str) -> Request<Body> {
            let encrypt = self.cipher.encrypt(plaintext.as_bytes()).unwrap();
            let uri = format!(
                "{path}?signature={}&timestamp={TIMESTAMP}&nonce={NONCE}&encrypt_type=aes&msg_signature={}",
                signature::sign(TOKEN, TIMESTAMP, NONCE),
                signature::msg_sign(TOKEN, TIMESTAMP, NONCE, &encrypt),
            );
            let body = format!(
                "<xml><AppId><![CDATA[wx_abc]]></AppId><Encrypt><![CDATA[{encrypt}]]></Encrypt></xml>"
            );

            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::from(body))
                .unwrap()
        }
    }

    async fn body_of(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn verify_ticket_push_is_acknowledged_and_cached() -> color_eyre::Result<()> {
        let f = fixture();
        let plaintext = "<xml><AppId><![CDATA[wx_abc]]></AppId><CreateTime>1413192605</CreateTime>\
            <InfoType><![CDATA[component_verify_ticket]]></InfoType>\
            <ComponentVerifyTicket><![CDATA[TCK123]]></ComponentVerifyTicket></xml>";

        let response = f
            .app
            .clone()
            .oneshot(f.signed_request(NOTIFY_PATH, plaintext))
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, "success");
        assert_eq!(
            f.cache.get("TICKET::wx_abc").await?.as_deref(),
            Some(br#"{"component_verify_ticket":"TCK123"}"#.as_slice())
        );
        assert_eq!(f.cache.ttl("TICKET::wx_abc").map(|t| t.0), Some(600));
        Ok(())
    }

    #[tokio::test]
    async fn malformed_body_gets_no_body_and_changes_nothing() -> color_eyre::Result<()> {
        let f = fixture();
        let request = Request::builder()
            .method("POST")
            .uri(format!(
                "{NOTIFY_PATH}?signature=x&timestamp={TIMESTAMP}&nonce={NONCE}&encrypt_type=aes&msg_signature=y"
            ))
            .body(Body::from("<xml><Encrypt>"))?;

        let response = f.app.clone().oneshot(request).await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, "");
        assert!(f.cache.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn event_endpoint_acknowledges_user_messages() -> color_eyre::Result<()> {
        let f = fixture();
        let plaintext = "<xml><ToUserName>gh_123</ToUserName><FromUserName>openid-1</FromUserName>\
            <CreateTime>1</CreateTime><MsgType>text</MsgType><Content>hi</Content></xml>";

        let response = f
            .app
            .clone()
            .oneshot(f.signed_request(EVENT_PATH, plaintext))
            .await?;

        assert_eq!(body_of(response).await, "success");
        Ok(())
    }

    #[tokio::test]
    async fn unsigned_request_is_dropped() -> color_eyre::Result<()> {
        let f = fixture();
        let request = Request::builder()
            .method("POST")
            .uri(EVENT_PATH)
            .body(Body::from("<xml><Encrypt>abc</Encrypt></xml>"))?;

        let response = f.app.clone().oneshot(request).await?;

        assert_eq!(body_of(response).await, "");
        Ok(())
    }

    #[test]
    fn drop_has_an_empty_ok_response() {
        let response = RouterReply(RouterResponse::Drop).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
    }
}
