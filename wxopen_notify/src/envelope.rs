//! The encrypted XML envelope wrapping push payloads

use std::{fmt, sync::Arc};

use serde::Deserialize;
use wxopen_crypto::{signature, MessageCipher};

use crate::{
    error::{DecodeError, EncodeError},
    message::{PlatformNotification, UserMessage},
    xml::XmlWriter,
};

/// An inbound encrypted envelope
///
/// Carries the base64 ciphertext that the `msg_signature` covers, plus the
/// plaintext addressing fields the platform adds alongside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    /// The addressed component, present on component notifications
    pub app_id: Option<String>,
    /// The addressed account, present on end-user messages
    pub to_user_name: Option<String>,
    /// The base64 ciphertext
    pub encrypt: String,
}

#[derive(Deserialize)]
struct EnvelopeWire {
    #[serde(rename = "AppId", default)]
    app_id: Option<String>,
    #[serde(rename = "ToUserName", default)]
    to_user_name: Option<String>,
    #[serde(rename = "Encrypt", default)]
    encrypt: String,
}

impl EncryptedEnvelope {
    /// Parses an envelope from a raw request body
    pub fn parse(body: &[u8]) -> Result<Self, DecodeError> {
        let xml = std::str::from_utf8(body)?;
        let wire: EnvelopeWire = quick_xml::de::from_str(xml)?;

        if wire.encrypt.is_empty() {
            return Err(DecodeError::MissingCiphertext);
        }

        Ok(Self {
            app_id: wire.app_id,
            to_user_name: wire.to_user_name,
            encrypt: wire.encrypt,
        })
    }
}

/// Opens inbound envelopes and seals reply envelopes
///
/// The codec owns the shared token used to sign replies and the cipher used
/// in both directions. Inbound signatures are checked before decoding, by
/// the router.
#[derive(Clone)]
pub struct EnvelopeCodec {
    token: String,
    cipher: Arc<dyn MessageCipher>,
}

impl fmt::Debug for EnvelopeCodec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EnvelopeCodec").finish_non_exhaustive()
    }
}

impl EnvelopeCodec {
    /// Constructs a codec signing replies with `token`
    pub fn new(token: impl Into<String>, cipher: Arc<dyn MessageCipher>) -> Self {
        Self {
            token: token.into(),
            cipher,
        }
    }

    /// Gets the shared token
    pub(crate) fn token(&self) -> &str {
        &self.token
    }

    /// Decrypts and parses a component notification
    pub fn decode_platform(
        &self,
        envelope: &EncryptedEnvelope,
    ) -> Result<PlatformNotification, DecodeError> {
        let plaintext = self.open(envelope)?;
        PlatformNotification::from_xml(&plaintext)
    }

    /// Decrypts and parses an end-user message
    pub fn decode_message(&self, envelope: &EncryptedEnvelope) -> Result<UserMessage, DecodeError> {
        let plaintext = self.open(envelope)?;
        UserMessage::from_xml(&plaintext)
    }

    /// Parses an unencrypted component notification
    pub fn decode_plain_platform(&self, body: &[u8]) -> Result<PlatformNotification, DecodeError> {
        PlatformNotification::from_xml(std::str::from_utf8(body)?)
    }

    /// Parses an unencrypted end-user message
    pub fn decode_plain_message(&self, body: &[u8]) -> Result<UserMessage, DecodeError> {
        UserMessage::from_xml(std::str::from_utf8(body)?)
    }

    /// Encrypts and signs a plaintext reply document
    ///
    /// The result is a complete response body carrying `Encrypt`,
    /// `MsgSignature`, `TimeStamp` and `Nonce`.
    pub fn encode_reply(
        &self,
        plaintext: &str,
        timestamp: &str,
        nonce: &str,
    ) -> Result<String, EncodeError> {
        let encrypt = self.cipher.encrypt(plaintext.as_bytes())?;
        let msg_signature = signature::msg_sign(&self.token, timestamp, nonce, &encrypt);

        let mut w = XmlWriter::new();
        w.text("Encrypt", &encrypt)
            .text("MsgSignature", &msg_signature)
            .text("TimeStamp", timestamp)
            .text("Nonce", nonce);
        Ok(w.finish())
    }

    fn open(&self, envelope: &EncryptedEnvelope) -> Result<String, DecodeError> {
        let decrypted = self.cipher.decrypt(&envelope.encrypt)?;
        let plaintext = String::from_utf8(decrypted.message)
            .map_err(|err| DecodeError::Utf8(err.utf8_error()))?;
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use wxopen_crypto::{AesMessageCipher, EncodingAesKey};
    use wxopen_tokens::VerifyTicket;

    use super::*;
    use crate::message::{MessageBody, MessageHeader, PlatformEvent, PlatformHeader};

    const TOKEN: &str = "QDG6eK";
    const AES_KEY: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG";

    fn codec() -> EnvelopeCodec {
        let key = EncodingAesKey::parse(AES_KEY).unwrap();
        EnvelopeCodec::new(TOKEN, Arc::new(AesMessageCipher::new("wx_abc", key)))
    }

    #[test]
    fn envelope_exposes_ciphertext() -> color_eyre::Result<()> {
        let body = b"<xml><AppId><![CDATA[wx_abc]]></AppId><Encrypt><![CDATA[abc=]]></Encrypt></xml>";

        let envelope = EncryptedEnvelope::parse(body)?;

        assert_eq!(envelope.app_id.as_deref(), Some("wx_abc"));
        assert_eq!(envelope.to_user_name, None);
        assert_eq!(envelope.encrypt, "abc=");
        Ok(())
    }

    #[test]
    fn envelope_without_ciphertext_is_rejected() {
        let body = b"<xml><AppId>wx_abc</AppId></xml>";
        assert!(matches!(
            EncryptedEnvelope::parse(body),
            Err(DecodeError::MissingCiphertext)
        ));
    }

    #[test]
    fn malformed_xml_is_rejected() {
        assert!(matches!(
            EncryptedEnvelope::parse(b"<xml><Encrypt>abc</xml"),
            Err(DecodeError::Xml(_))
        ));
    }

    #[test]
    fn reply_is_signed_over_its_ciphertext() -> color_eyre::Result<()> {
        let codec = codec();

        let reply = codec.encode_reply("<xml/>", "1409659813", "1372623149")?;

        let envelope = EncryptedEnvelope::parse(reply.as_bytes())?;
        let expected = signature::msg_sign(TOKEN, "1409659813", "1372623149", &envelope.encrypt);
        assert!(reply.contains(&format!("<MsgSignature><![CDATA[{expected}]]></MsgSignature>")));
        assert!(reply.contains("<TimeStamp><![CDATA[1409659813]]></TimeStamp>"));
        assert!(reply.contains("<Nonce><![CDATA[1372623149]]></Nonce>"));
        Ok(())
    }

    #[test]
    fn platform_notification_round_trips_through_envelope() -> color_eyre::Result<()> {
        let codec = codec();
        let notification = PlatformNotification {
            header: PlatformHeader {
                app_id: "wx_abc".into(),
                create_time: 1_413_192_605,
            },
            event: PlatformEvent::VerifyTicket(VerifyTicket::from_static("TCK123")),
        };

        let sealed = codec.encode_reply(&notification.to_xml(), "1", "2")?;
        let opened = codec.decode_platform(&EncryptedEnvelope::parse(sealed.as_bytes())?)?;

        assert_eq!(opened, notification);
        Ok(())
    }

    #[test]
    fn user_message_round_trips_through_envelope() -> color_eyre::Result<()> {
        let codec = codec();
        let message = UserMessage {
            header: MessageHeader {
                to_user_name: "gh_123".into(),
                from_user_name: "openid-1".into(),
                create_time: 1_700_000_000,
            },
            body: MessageBody::Text {
                content: "hello".into(),
                msg_id: Some(42),
            },
        };

        let sealed = codec.encode_reply(&message.to_xml(), "1", "2")?;
        let opened = codec.decode_message(&EncryptedEnvelope::parse(sealed.as_bytes())?)?;

        assert_eq!(opened, message);
        Ok(())
    }

    #[test]
    fn ciphertext_for_another_app_is_rejected() -> color_eyre::Result<()> {
        let key = EncodingAesKey::parse(AES_KEY)?;
        let other = AesMessageCipher::new("wx_other", key);
        let encrypt = other.encrypt(b"<xml><InfoType>authorized</InfoType></xml>")?;

        let err = codec()
            .decode_platform(&EncryptedEnvelope {
                app_id: None,
                to_user_name: None,
                encrypt,
            })
            .unwrap_err();

        assert!(matches!(err, DecodeError::Cipher(_)));
        Ok(())
    }

    #[test]
    fn plain_documents_decode_without_the_cipher() -> color_eyre::Result<()> {
        let body = b"<xml><AppId>wx_abc</AppId><CreateTime>1</CreateTime>\
            <InfoType>unauthorized</InfoType><AuthorizerAppid>wx_tenant</AuthorizerAppid></xml>";

        let n = codec().decode_plain_platform(body)?;

        assert!(matches!(n.event, PlatformEvent::Unauthorized { .. }));
        Ok(())
    }
}
