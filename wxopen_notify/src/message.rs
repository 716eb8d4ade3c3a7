//! Decoded notification and message types
//!
//! Every document shares a small header; the variant-specific payload is
//! kept apart from it and the two meet only when a document is decoded or
//! written. Discriminators the router does not know are preserved verbatim
//! in an `Other` variant rather than silently coerced.

use serde::Deserialize;
use wxopen_tokens::{AuthorizationCode, AuthorizerAppId, VerifyTicket};

use crate::{error::DecodeError, xml::XmlWriter};

/// Any decoded push
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedNotification {
    /// A notification addressed to the component itself
    Platform(PlatformNotification),
    /// A message or event from an end user of an authorizer
    Message(UserMessage),
}

impl DecodedNotification {
    /// Parses a plaintext document of either kind
    ///
    /// Documents carrying an `InfoType` are component notifications; all
    /// others must carry a `MsgType`.
    pub fn from_xml(xml: &str) -> Result<Self, DecodeError> {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(rename = "InfoType", default)]
            info_type: Option<String>,
        }

        let probe: Probe = quick_xml::de::from_str(xml)?;
        if probe.info_type.is_some() {
            PlatformNotification::from_xml(xml).map(Self::Platform)
        } else {
            UserMessage::from_xml(xml).map(Self::Message)
        }
    }

    /// Writes the document
    pub fn to_xml(&self) -> String {
        match self {
            Self::Platform(n) => n.to_xml(),
            Self::Message(m) => m.to_xml(),
        }
    }
}

impl From<PlatformNotification> for DecodedNotification {
    fn from(n: PlatformNotification) -> Self {
        Self::Platform(n)
    }
}

impl From<UserMessage> for DecodedNotification {
    fn from(m: UserMessage) -> Self {
        Self::Message(m)
    }
}

/// The header of a component notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlatformHeader {
    /// The component the notification is addressed to
    pub app_id: String,
    /// When the notification was created, in Unix seconds
    pub create_time: i64,
}

/// A notification addressed to the component, discriminated by `InfoType`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlatformNotification {
    /// The shared header
    pub header: PlatformHeader,
    /// The variant-specific payload
    pub event: PlatformEvent,
}

/// The payload of a component notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlatformEvent {
    /// A rotated verify ticket (`component_verify_ticket`)
    VerifyTicket(VerifyTicket),
    /// An authorizer granted access (`authorized`)
    Authorized(AuthorizationGrant),
    /// An authorizer changed the permissions granted (`updateauthorized`)
    AuthorizationUpdated(AuthorizationGrant),
    /// An authorizer revoked access (`unauthorized`)
    Unauthorized {
        /// The authorizer that revoked access
        authorizer_app_id: AuthorizerAppId,
    },
    /// A fast mini-program registration completed (`notify_third_fasteregister`)
    FastRegisterCompleted(FastRegisterResult),
    /// Any other `InfoType`
    Other {
        /// The raw discriminator
        info_type: String,
        /// The complete decrypted document
        raw: String,
    },
}

/// The details of a granted or updated authorization
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationGrant {
    /// The authorizer that granted access
    pub authorizer_app_id: AuthorizerAppId,
    /// A one-time code to exchange for the authorizer's tokens
    pub authorization_code: AuthorizationCode,
    /// When the code expires, in Unix seconds
    pub authorization_code_expired_time: Option<i64>,
    /// The pre-authorization code the grant was made under
    pub pre_auth_code: Option<String>,
}

/// The outcome of a fast mini-program registration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FastRegisterResult {
    /// The new mini-program's app id, when registration succeeded
    pub app_id: Option<String>,
    /// Zero on success
    pub status: i64,
    /// A one-time code to exchange for the new mini-program's tokens
    pub auth_code: Option<String>,
    /// A human-readable description of `status`
    pub msg: Option<String>,
    /// The registration details that were submitted
    pub info: Option<FastRegisterInfo>,
}

/// The registration details echoed back by a fast-registration notification
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct FastRegisterInfo {
    /// The company name
    #[serde(default)]
    pub name: Option<String>,
    /// The company registration code
    #[serde(default)]
    pub code: Option<String>,
    /// The kind of registration code
    #[serde(default)]
    pub code_type: Option<i64>,
    /// The legal representative's WeChat id
    #[serde(default)]
    pub legal_persona_wechat: Option<String>,
    /// The legal representative's name
    #[serde(default)]
    pub legal_persona_name: Option<String>,
    /// The contact phone number of the component
    #[serde(default)]
    pub component_phone: Option<String>,
}

impl PlatformEvent {
    /// The `InfoType` discriminator of this payload
    pub fn info_type(&self) -> &str {
        match self {
            Self::VerifyTicket(_) => "component_verify_ticket",
            Self::Authorized(_) => "authorized",
            Self::AuthorizationUpdated(_) => "updateauthorized",
            Self::Unauthorized { .. } => "unauthorized",
            Self::FastRegisterCompleted(_) => "notify_third_fasteregister",
            Self::Other { info_type, .. } => info_type,
        }
    }

    /// Whether this payload reports a change to an authorization
    pub fn is_authorization_change(&self) -> bool {
        matches!(
            self,
            Self::Authorized(_)
                | Self::AuthorizationUpdated(_)
                | Self::Unauthorized { .. }
                | Self::FastRegisterCompleted(_)
        )
    }
}

#[derive(Deserialize)]
struct PlatformHeaderWire {
    #[serde(rename = "AppId", default)]
    app_id: String,
    #[serde(rename = "CreateTime", default)]
    create_time: i64,
    #[serde(rename = "InfoType")]
    info_type: String,
}

#[derive(Deserialize)]
struct TicketWire {
    #[serde(rename = "ComponentVerifyTicket")]
    component_verify_ticket: VerifyTicket,
}

#[derive(Deserialize)]
struct GrantWire {
    #[serde(rename = "AuthorizerAppid")]
    authorizer_app_id: AuthorizerAppId,
    #[serde(rename = "AuthorizationCode")]
    authorization_code: AuthorizationCode,
    #[serde(rename = "AuthorizationCodeExpiredTime", default)]
    authorization_code_expired_time: Option<i64>,
    #[serde(rename = "PreAuthCode", default)]
    pre_auth_code: Option<String>,
}

#[derive(Deserialize)]
struct RevokeWire {
    #[serde(rename = "AuthorizerAppid")]
    authorizer_app_id: AuthorizerAppId,
}

#[derive(Deserialize)]
struct FastRegisterWire {
    #[serde(default)]
    appid: Option<String>,
    status: i64,
    #[serde(default)]
    auth_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    info: Option<FastRegisterInfo>,
}

impl From<GrantWire> for AuthorizationGrant {
    fn from(wire: GrantWire) -> Self {
        Self {
            authorizer_app_id: wire.authorizer_app_id,
            authorization_code: wire.authorization_code,
            authorization_code_expired_time: wire.authorization_code_expired_time,
            pre_auth_code: wire.pre_auth_code,
        }
    }
}

impl PlatformNotification {
    /// Parses a plaintext notification document
    pub fn from_xml(xml: &str) -> Result<Self, DecodeError> {
        let header: PlatformHeaderWire = quick_xml::de::from_str(xml)?;

        let event = match header.info_type.as_str() {
            "component_verify_ticket" => {
                let wire: TicketWire = quick_xml::de::from_str(xml)?;
                PlatformEvent::VerifyTicket(wire.component_verify_ticket)
            }
            "authorized" => {
                PlatformEvent::Authorized(quick_xml::de::from_str::<GrantWire>(xml)?.into())
            }
            "updateauthorized" => PlatformEvent::AuthorizationUpdated(
                quick_xml::de::from_str::<GrantWire>(xml)?.into(),
            ),
            "unauthorized" => {
                let wire: RevokeWire = quick_xml::de::from_str(xml)?;
                PlatformEvent::Unauthorized {
                    authorizer_app_id: wire.authorizer_app_id,
                }
            }
            "notify_third_fasteregister" => {
                let wire: FastRegisterWire = quick_xml::de::from_str(xml)?;
                PlatformEvent::FastRegisterCompleted(FastRegisterResult {
                    app_id: wire.appid,
                    status: wire.status,
                    auth_code: wire.auth_code,
                    msg: wire.msg,
                    info: wire.info,
                })
            }
            _ => PlatformEvent::Other {
                info_type: header.info_type,
                raw: xml.to_owned(),
            },
        };

        Ok(Self {
            header: PlatformHeader {
                app_id: header.app_id,
                create_time: header.create_time,
            },
            event,
        })
    }

    /// Writes the notification as a plaintext document
    ///
    /// An `Other` payload is written back exactly as it was received.
    pub fn to_xml(&self) -> String {
        if let PlatformEvent::Other { raw, .. } = &self.event {
            return raw.clone();
        }

        let mut w = XmlWriter::new();
        w.text("AppId", &self.header.app_id)
            .number("CreateTime", self.header.create_time)
            .text("InfoType", self.event.info_type());

        match &self.event {
            PlatformEvent::VerifyTicket(ticket) => {
                w.text("ComponentVerifyTicket", ticket.as_str());
            }
            PlatformEvent::Authorized(grant) | PlatformEvent::AuthorizationUpdated(grant) => {
                w.text("AuthorizerAppid", grant.authorizer_app_id.as_str())
                    .text("AuthorizationCode", grant.authorization_code.as_str())
                    .optional_number(
                        "AuthorizationCodeExpiredTime",
                        grant.authorization_code_expired_time,
                    )
                    .optional_text("PreAuthCode", grant.pre_auth_code.as_deref());
            }
            PlatformEvent::Unauthorized { authorizer_app_id } => {
                w.text("AuthorizerAppid", authorizer_app_id.as_str());
            }
            PlatformEvent::FastRegisterCompleted(result) => {
                w.optional_text("appid", result.app_id.as_deref())
                    .number("status", result.status)
                    .optional_text("auth_code", result.auth_code.as_deref())
                    .optional_text("msg", result.msg.as_deref());
                if let Some(info) = &result.info {
                    w.nested("info", |w| {
                        w.optional_text("name", info.name.as_deref())
                            .optional_text("code", info.code.as_deref())
                            .optional_number("code_type", info.code_type)
                            .optional_text(
                                "legal_persona_wechat",
                                info.legal_persona_wechat.as_deref(),
                            )
                            .optional_text("legal_persona_name", info.legal_persona_name.as_deref())
                            .optional_text("component_phone", info.component_phone.as_deref());
                    });
                }
            }
            PlatformEvent::Other { .. } => {}
        }

        w.finish()
    }
}

/// The header shared by end-user messages and replies
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    /// The recipient
    pub to_user_name: String,
    /// The sender
    pub from_user_name: String,
    /// When the message was created, in Unix seconds
    pub create_time: i64,
}

impl MessageHeader {
    /// A header addressing a reply back to the sender of this one
    pub fn reply_to(&self, create_time: i64) -> Self {
        Self {
            to_user_name: self.from_user_name.clone(),
            from_user_name: self.to_user_name.clone(),
            create_time,
        }
    }
}

/// A message or event from an end user, discriminated by `MsgType`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserMessage {
    /// The shared header
    pub header: MessageHeader,
    /// The variant-specific payload
    pub body: MessageBody,
}

/// The payload of an end-user message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageBody {
    /// A text message (`text`)
    Text {
        /// The message text
        content: String,
        /// The platform's message id
        msg_id: Option<i64>,
    },
    /// An event (`event`)
    Event {
        /// The event name
        event: String,
        /// The event key, for events that carry one
        event_key: Option<String>,
    },
    /// Any other `MsgType`
    Other {
        /// The raw discriminator
        msg_type: String,
        /// The complete decrypted document
        raw: String,
    },
}

impl MessageBody {
    /// The `MsgType` discriminator of this payload
    pub fn msg_type(&self) -> &str {
        match self {
            Self::Text { .. } => "text",
            Self::Event { .. } => "event",
            Self::Other { msg_type, .. } => msg_type,
        }
    }
}

#[derive(Deserialize)]
struct MessageHeaderWire {
    #[serde(rename = "ToUserName", default)]
    to_user_name: String,
    #[serde(rename = "FromUserName", default)]
    from_user_name: String,
    #[serde(rename = "CreateTime", default)]
    create_time: i64,
    #[serde(rename = "MsgType")]
    msg_type: String,
}

#[derive(Deserialize)]
struct TextWire {
    #[serde(rename = "Content", default)]
    content: String,
    #[serde(rename = "MsgId", default)]
    msg_id: Option<i64>,
}

#[derive(Deserialize)]
struct EventWire {
    #[serde(rename = "Event")]
    event: String,
    #[serde(rename = "EventKey", default)]
    event_key: Option<String>,
}

impl UserMessage {
    /// Parses a plaintext message document
    pub fn from_xml(xml: &str) -> Result<Self, DecodeError> {
        let header: MessageHeaderWire = quick_xml::de::from_str(xml)?;

        let body = match header.msg_type.as_str() {
            "text" => {
                let wire: TextWire = quick_xml::de::from_str(xml)?;
                MessageBody::Text {
                    content: wire.content,
                    msg_id: wire.msg_id,
                }
            }
            "event" => {
                let wire: EventWire = quick_xml::de::from_str(xml)?;
                MessageBody::Event {
                    event: wire.event,
                    event_key: wire.event_key,
                }
            }
            _ => MessageBody::Other {
                msg_type: header.msg_type,
                raw: xml.to_owned(),
            },
        };

        Ok(Self {
            header: MessageHeader {
                to_user_name: header.to_user_name,
                from_user_name: header.from_user_name,
                create_time: header.create_time,
            },
            body,
        })
    }

    /// Writes the message as a plaintext document
    ///
    /// An `Other` payload is written back exactly as it was received.
    pub fn to_xml(&self) -> String {
        if let MessageBody::Other { raw, .. } = &self.body {
            return raw.clone();
        }

        let mut w = XmlWriter::new();
        write_message_header(&mut w, &self.header, self.body.msg_type());

        match &self.body {
            MessageBody::Text { content, msg_id } => {
                w.text("Content", content).optional_number("MsgId", *msg_id);
            }
            MessageBody::Event { event, event_key } => {
                w.text("Event", event)
                    .optional_text("EventKey", event_key.as_deref());
            }
            MessageBody::Other { .. } => {}
        }

        w.finish()
    }
}

/// A passive reply to an end-user message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundMessage {
    /// A text reply
    Text {
        /// The reply header, usually built with [`MessageHeader::reply_to`]
        header: MessageHeader,
        /// The reply text
        content: String,
    },
}

impl OutboundMessage {
    /// Writes the reply as a plaintext document
    pub fn to_xml(&self) -> String {
        let mut w = XmlWriter::new();
        match self {
            Self::Text { header, content } => {
                write_message_header(&mut w, header, "text");
                w.text("Content", content);
            }
        }
        w.finish()
    }
}

fn write_message_header(w: &mut XmlWriter, header: &MessageHeader, msg_type: &str) {
    w.text("ToUserName", &header.to_user_name)
        .text("FromUserName", &header.from_user_name)
        .number("CreateTime", header.create_time)
        .text("MsgType", msg_type);
}

#[cfg(test)]
mod tests {
    use super::*;

    mod platform {
        use super::*;

        #[test]
        fn parses_verify_ticket_in_platform_format() -> color_eyre::Result<()> {
            let xml = "<xml>\
                <AppId><![CDATA[wx_abc]]></AppId>\
                <CreateTime>1413192605</CreateTime>\
                <InfoType><![CDATA[component_verify_ticket]]></InfoType>\
                <ComponentVerifyTicket><![CDATA[TCK123]]></ComponentVerifyTicket>\
                </xml>";

            let n = PlatformNotification::from_xml(xml)?;

            assert_eq!(n.header.app_id, "wx_abc");
            assert_eq!(n.header.create_time, 1413192605);
            assert_eq!(
                n.event,
                PlatformEvent::VerifyTicket(VerifyTicket::from_static("TCK123"))
            );
            Ok(())
        }

        #[test]
        fn parses_authorization_grant() -> color_eyre::Result<()> {
            let xml = "<xml>\
                <AppId>wx_abc</AppId>\
                <CreateTime>1413192760</CreateTime>\
                <InfoType>authorized</InfoType>\
                <AuthorizerAppid>wx_tenant</AuthorizerAppid>\
                <AuthorizationCode>code-1</AuthorizationCode>\
                <AuthorizationCodeExpiredTime>1413196360</AuthorizationCodeExpiredTime>\
                <PreAuthCode>preauth-1</PreAuthCode>\
                </xml>";

            let n = PlatformNotification::from_xml(xml)?;

            let PlatformEvent::Authorized(grant) = &n.event else {
                panic!("expected a grant, got {:?}", n.event);
            };
            assert_eq!(grant.authorizer_app_id.as_str(), "wx_tenant");
            assert_eq!(grant.authorization_code.as_str(), "code-1");
            assert_eq!(grant.authorization_code_expired_time, Some(1413196360));
            assert_eq!(grant.pre_auth_code.as_deref(), Some("preauth-1"));
            assert!(n.event.is_authorization_change());
            Ok(())
        }

        #[test]
        fn unknown_info_type_keeps_raw_document() -> color_eyre::Result<()> {
            let xml = "<xml><AppId>wx_abc</AppId><CreateTime>1</CreateTime>\
                <InfoType>something_new</InfoType><Extra>1</Extra></xml>";

            let n = PlatformNotification::from_xml(xml)?;

            assert_eq!(n.event.info_type(), "something_new");
            assert!(!n.event.is_authorization_change());
            assert_eq!(n.to_xml(), xml);
            Ok(())
        }

        #[test]
        fn missing_discriminator_is_an_error() {
            let xml = "<xml><AppId>wx_abc</AppId><CreateTime>1</CreateTime></xml>";
            assert!(matches!(
                PlatformNotification::from_xml(xml),
                Err(DecodeError::Xml(_))
            ));
        }

        #[test]
        fn ticket_variant_without_ticket_is_an_error() {
            let xml = "<xml><AppId>wx_abc</AppId><CreateTime>1</CreateTime>\
                <InfoType>component_verify_ticket</InfoType></xml>";
            assert!(PlatformNotification::from_xml(xml).is_err());
        }

        #[test]
        fn every_variant_survives_a_round_trip() -> color_eyre::Result<()> {
            let header = PlatformHeader {
                app_id: "wx_abc".into(),
                create_time: 1_700_000_000,
            };
            let grant = AuthorizationGrant {
                authorizer_app_id: AuthorizerAppId::from_static("wx_tenant"),
                authorization_code: AuthorizationCode::from_static("code"),
                authorization_code_expired_time: Some(1_700_003_600),
                pre_auth_code: None,
            };
            let events = [
                PlatformEvent::VerifyTicket(VerifyTicket::from_static("TCK123")),
                PlatformEvent::Authorized(grant.clone()),
                PlatformEvent::AuthorizationUpdated(grant),
                PlatformEvent::Unauthorized {
                    authorizer_app_id: AuthorizerAppId::from_static("wx_tenant"),
                },
                PlatformEvent::FastRegisterCompleted(FastRegisterResult {
                    app_id: Some("wx_new".into()),
                    status: 0,
                    auth_code: Some("auth".into()),
                    msg: Some("OK".into()),
                    info: Some(FastRegisterInfo {
                        name: Some("Acme".into()),
                        code: Some("91110000".into()),
                        code_type: Some(1),
                        legal_persona_wechat: Some("legal".into()),
                        legal_persona_name: Some("Li".into()),
                        component_phone: Some("1234".into()),
                    }),
                }),
            ];

            for event in events {
                let n = PlatformNotification {
                    header: header.clone(),
                    event,
                };
                assert_eq!(PlatformNotification::from_xml(&n.to_xml())?, n);
            }
            Ok(())
        }
    }

    #[test]
    fn discriminator_selects_the_document_kind() -> color_eyre::Result<()> {
        let platform = "<xml><AppId>wx_abc</AppId><CreateTime>1</CreateTime>\
            <InfoType>unauthorized</InfoType><AuthorizerAppid>wx_t</AuthorizerAppid></xml>";
        let message = "<xml><ToUserName>gh</ToUserName><FromUserName>o</FromUserName>\
            <CreateTime>1</CreateTime><MsgType>event</MsgType><Event>subscribe</Event></xml>";

        assert!(matches!(
            DecodedNotification::from_xml(platform)?,
            DecodedNotification::Platform(_)
        ));
        let decoded = DecodedNotification::from_xml(message)?;
        assert!(matches!(decoded, DecodedNotification::Message(_)));
        assert_eq!(DecodedNotification::from_xml(&decoded.to_xml())?, decoded);
        Ok(())
    }

    mod user {
        use super::*;

        #[test]
        fn parses_text_message() -> color_eyre::Result<()> {
            let xml = "<xml>\
                <ToUserName><![CDATA[gh_123]]></ToUserName>\
                <FromUserName><![CDATA[openid-1]]></FromUserName>\
                <CreateTime>1348831860</CreateTime>\
                <MsgType><![CDATA[text]]></MsgType>\
                <Content><![CDATA[hello]]></Content>\
                <MsgId>1234567890123456</MsgId>\
                </xml>";

            let m = UserMessage::from_xml(xml)?;

            assert_eq!(m.header.to_user_name, "gh_123");
            assert_eq!(m.header.from_user_name, "openid-1");
            assert_eq!(
                m.body,
                MessageBody::Text {
                    content: "hello".into(),
                    msg_id: Some(1234567890123456),
                }
            );
            Ok(())
        }

        #[test]
        fn text_and_event_survive_a_round_trip() -> color_eyre::Result<()> {
            let header = MessageHeader {
                to_user_name: "gh_123".into(),
                from_user_name: "openid-1".into(),
                create_time: 1_700_000_000,
            };
            let bodies = [
                MessageBody::Text {
                    content: "a < b & c".into(),
                    msg_id: None,
                },
                MessageBody::Event {
                    event: "subscribe".into(),
                    event_key: Some("qrscene_1".into()),
                },
            ];

            for body in bodies {
                let m = UserMessage {
                    header: header.clone(),
                    body,
                };
                assert_eq!(UserMessage::from_xml(&m.to_xml())?, m);
            }
            Ok(())
        }

        #[test]
        fn reply_swaps_sender_and_recipient() {
            let inbound = MessageHeader {
                to_user_name: "gh_123".into(),
                from_user_name: "openid-1".into(),
                create_time: 1,
            };

            let reply = OutboundMessage::Text {
                header: inbound.reply_to(2),
                content: "hi".into(),
            };

            assert_eq!(
                reply.to_xml(),
                "<xml><ToUserName><![CDATA[openid-1]]></ToUserName>\
                 <FromUserName><![CDATA[gh_123]]></FromUserName>\
                 <CreateTime>2</CreateTime>\
                 <MsgType><![CDATA[text]]></MsgType>\
                 <Content><![CDATA[hi]]></Content></xml>"
            );
        }
    }
}
