//! Routing of verified notifications to built-in and external handling

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use wxopen_clock::{Clock, System};
use wxopen_crypto::signature;
use wxopen_tokens::{store::TokenStore, AppId};

use crate::{
    envelope::{EncryptedEnvelope, EnvelopeCodec},
    error::{HandlerError, InboundError},
    message::{OutboundMessage, PlatformEvent, PlatformNotification, UserMessage},
};

/// The exact body the platform requires to consider a delivery handled
///
/// Any other body, including an empty one, causes the platform to retry.
pub const ACKNOWLEDGEMENT: &str = "success";

/// How the payload of an inbound request is protected
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportEncoding {
    /// The body is an encrypted envelope (`encrypt_type=aes`)
    Aes,
    /// The body is the plaintext document (`encrypt_type` absent, `raw` or `plain`)
    Plain,
}

impl TransportEncoding {
    /// Interprets the `encrypt_type` query parameter
    pub fn from_query(encrypt_type: Option<&str>) -> Result<Self, InboundError> {
        match encrypt_type.map(str::trim) {
            Some("aes") => Ok(Self::Aes),
            None | Some("" | "raw" | "plain") => Ok(Self::Plain),
            Some(other) => Err(InboundError::UnsupportedEncoding(other.to_owned())),
        }
    }
}

/// The parts of an inbound HTTP request the router needs
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InboundRequest {
    /// The `signature` query parameter
    pub signature: String,
    /// The `timestamp` query parameter
    pub timestamp: String,
    /// The `nonce` query parameter
    pub nonce: String,
    /// The `msg_signature` query parameter
    pub msg_signature: Option<String>,
    /// The `encrypt_type` query parameter
    pub encrypt_type: Option<String>,
    /// The raw request body
    pub body: Vec<u8>,
}

/// What to answer the platform with
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouterResponse {
    /// Answer with [`ACKNOWLEDGEMENT`]
    Acknowledge,
    /// Answer with a reply document
    Reply(String),
    /// Answer without a body, so the platform re-delivers
    Drop,
}

impl RouterResponse {
    /// The response body, if any
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Acknowledge => Some(ACKNOWLEDGEMENT),
            Self::Reply(body) => Some(body),
            Self::Drop => None,
        }
    }
}

/// What an external handler decided about an end-user message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge without replying
    Acknowledge,
    /// Answer with a passive reply
    Reply(OutboundMessage),
}

/// External handling of notifications the router does not handle itself
///
/// Every method has a default that acknowledges, so implementors override
/// only what they care about. An error leaves the delivery unacknowledged.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    /// Observes an authorization change before the router acknowledges it
    ///
    /// The observation cannot change the acknowledgement.
    async fn authorization_changed(&self, notification: &PlatformNotification) {
        let _ = notification;
    }

    /// Handles a component notification with an unrecognized `InfoType`
    async fn platform_notification(
        &self,
        notification: &PlatformNotification,
    ) -> Result<(), HandlerError> {
        tracing::debug!(
            info_type = notification.event.info_type(),
            "no handler for component notification"
        );
        Ok(())
    }

    /// Handles an end-user message or event
    async fn user_message(&self, message: &UserMessage) -> Result<Disposition, HandlerError> {
        tracing::debug!(
            msg_type = message.body.msg_type(),
            "no handler for end-user message"
        );
        Ok(Disposition::Acknowledge)
    }
}

/// A handler that acknowledges everything
#[derive(Clone, Copy, Debug, Default)]
pub struct AcknowledgeAll;

impl NotificationHandler for AcknowledgeAll {}

/// Authenticates, decodes and dispatches inbound pushes
///
/// Requests that fail authentication or decoding are dropped after logging,
/// never surfaced as errors, because the endpoints are internet-facing.
pub struct NotificationRouter<C = System> {
    app_id: AppId,
    codec: EnvelopeCodec,
    store: TokenStore,
    handler: Arc<dyn NotificationHandler>,
    clock: C,
}

impl<C: fmt::Debug> fmt::Debug for NotificationRouter<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NotificationRouter")
            .field("app_id", &self.app_id)
            .field("codec", &self.codec)
            .field("store", &self.store)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl NotificationRouter<System> {
    /// Constructs a router for the component `app_id`
    pub fn new(
        app_id: AppId,
        codec: EnvelopeCodec,
        store: TokenStore,
        handler: Arc<dyn NotificationHandler>,
    ) -> Self {
        Self {
            app_id,
            codec,
            store,
            handler,
            clock: System,
        }
    }
}

impl<C> NotificationRouter<C> {
    /// Replaces the clock used to timestamp encrypted replies
    pub fn with_clock<D>(self, clock: D) -> NotificationRouter<D> {
        NotificationRouter {
            app_id: self.app_id,
            codec: self.codec,
            store: self.store,
            handler: self.handler,
            clock,
        }
    }

    /// Gets the component app id
    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }
}

impl<C: Clock + Send + Sync> NotificationRouter<C> {
    /// Handles a push to the component notification endpoint
    #[tracing::instrument(skip_all, fields(app_id = %self.app_id, encrypt_type = ?request.encrypt_type))]
    pub async fn handle_platform(&self, request: &InboundRequest) -> RouterResponse {
        let result = self.route_platform(request).await;
        settle(result)
    }

    /// Handles a push to the end-user message endpoint
    #[tracing::instrument(skip_all, fields(app_id = %self.app_id, encrypt_type = ?request.encrypt_type))]
    pub async fn handle_message(&self, request: &InboundRequest) -> RouterResponse {
        let result = self.route_message(request).await;
        settle(result)
    }

    async fn route_platform(&self, request: &InboundRequest) -> Result<RouterResponse, InboundError> {
        // Plain bodies are unsigned; only sealed envelopes may rotate the ticket.
        let encoding = TransportEncoding::from_query(request.encrypt_type.as_deref())?;
        if encoding != TransportEncoding::Aes {
            return Err(InboundError::UnsupportedEncoding(
                request.encrypt_type.clone().unwrap_or_default(),
            ));
        }

        let envelope = self.authenticate(request)?;
        let notification = self.codec.decode_platform(&envelope)?;

        let info_type = notification.event.info_type();
        tracing::debug!(info_type, "received component notification");

        match &notification.event {
            PlatformEvent::VerifyTicket(ticket) => {
                self.store
                    .store_ticket(&self.app_id, ticket)
                    .await
                    .map_err(InboundError::TicketStore)?;
                tracing::info!("verify ticket rotated");
            }
            PlatformEvent::Authorized(_)
            | PlatformEvent::AuthorizationUpdated(_)
            | PlatformEvent::Unauthorized { .. }
            | PlatformEvent::FastRegisterCompleted(_) => {
                self.handler.authorization_changed(&notification).await;
            }
            PlatformEvent::Other { .. } => {
                self.handler
                    .platform_notification(&notification)
                    .await
                    .map_err(InboundError::Handler)?;
            }
        }

        Ok(RouterResponse::Acknowledge)
    }

    async fn route_message(&self, request: &InboundRequest) -> Result<RouterResponse, InboundError> {
        let encoding = TransportEncoding::from_query(request.encrypt_type.as_deref())?;
        let message = match encoding {
            TransportEncoding::Aes => {
                let envelope = self.authenticate(request)?;
                self.codec.decode_message(&envelope)?
            }
            TransportEncoding::Plain => {
                self.authenticate_plain(request)?;
                self.codec.decode_plain_message(&request.body)?
            }
        };

        tracing::debug!(msg_type = message.body.msg_type(), "received end-user message");

        let disposition = self
            .handler
            .user_message(&message)
            .await
            .map_err(InboundError::Handler)?;

        match disposition {
            Disposition::Acknowledge => Ok(RouterResponse::Acknowledge),
            Disposition::Reply(reply) => {
                let plaintext = reply.to_xml();
                match encoding {
                    TransportEncoding::Plain => Ok(RouterResponse::Reply(plaintext)),
                    TransportEncoding::Aes => {
                        let timestamp = self.clock.now().0.to_string();
                        let sealed =
                            self.codec
                                .encode_reply(&plaintext, &timestamp, &request.nonce)?;
                        Ok(RouterResponse::Reply(sealed))
                    }
                }
            }
        }
    }

    fn authenticate(&self, request: &InboundRequest) -> Result<EncryptedEnvelope, InboundError> {
        let envelope = EncryptedEnvelope::parse(&request.body)?;

        let verified = signature::verify(
            &request.signature,
            &request.timestamp,
            &request.nonce,
            self.codec.token(),
            &envelope.encrypt,
            request.msg_signature.as_deref().unwrap_or_default(),
        );

        if verified {
            Ok(envelope)
        } else {
            Err(InboundError::SignatureInvalid)
        }
    }

    fn authenticate_plain(&self, request: &InboundRequest) -> Result<(), InboundError> {
        if signature::verify_plain(
            &request.signature,
            &request.timestamp,
            &request.nonce,
            self.codec.token(),
        ) {
            Ok(())
        } else {
            Err(InboundError::SignatureInvalid)
        }
    }
}

fn settle(result: Result<RouterResponse, InboundError>) -> RouterResponse {
    match result {
        Ok(response) => response,
        Err(err) if err.is_untrusted() => {
            tracing::warn!(error = %err, "dropping unauthenticated notification");
            RouterResponse::Drop
        }
        Err(err) => {
            tracing::warn!(error = %err, "leaving notification unacknowledged for re-delivery");
            RouterResponse::Drop
        }
    }
}
