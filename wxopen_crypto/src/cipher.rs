use std::{convert::TryFrom, fmt};

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{
    alphabet,
    engine::{general_purpose, GeneralPurpose},
    Engine as _,
};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::CipherError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Keys handed out by the platform are not always canonical base64 in their
/// final character.
const KEY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    general_purpose::PAD.with_decode_allow_trailing_bits(true),
);

const ENCODED_KEY_LEN: usize = 43;
const RANDOM_LEN: usize = 16;
const LENGTH_PREFIX_LEN: usize = 4;
const PAD_BLOCK: usize = 32;
const AES_BLOCK: usize = 16;

/// The symmetric key shared with the platform for envelope encryption
///
/// The platform distributes it as 43 characters of base64 with the trailing
/// `=` removed.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodingAesKey {
    key: [u8; 32],
}

impl fmt::Debug for EncodingAesKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("EncodingAesKey { *** }")
    }
}

impl EncodingAesKey {
    /// Parses the key as it is shown in the platform console
    ///
    /// # Errors
    ///
    /// The key is not exactly 43 characters of base64 decoding to 32 bytes.
    pub fn parse(encoded: &str) -> Result<Self, CipherError> {
        let encoded = encoded.trim();
        if encoded.len() != ENCODED_KEY_LEN {
            return Err(CipherError::InvalidKey);
        }

        let mut padded = String::with_capacity(ENCODED_KEY_LEN + 1);
        padded.push_str(encoded);
        padded.push('=');

        let bytes = KEY_ENGINE
            .decode(padded)
            .map_err(|_| CipherError::InvalidKey)?;
        let key = <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| CipherError::InvalidKey)?;

        Ok(Self { key })
    }

    fn iv(&self) -> &[u8] {
        &self.key[..AES_BLOCK]
    }
}

/// A decrypted notification payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decrypted {
    /// The random prefix chosen by the encrypting side
    pub random: [u8; RANDOM_LEN],
    /// The plaintext message, usually an XML document
    pub message: Vec<u8>,
}

/// Decrypts and encrypts notification payloads
///
/// The app id and key are bound when the cipher is constructed, so callers
/// only deal in ciphertext and plaintext.
pub trait MessageCipher: Send + Sync {
    /// Decrypts base64 ciphertext taken from an inbound envelope
    fn decrypt(&self, ciphertext: &str) -> Result<Decrypted, CipherError>;

    /// Encrypts a plaintext message into base64 ciphertext for a reply envelope
    fn encrypt(&self, plaintext: &[u8]) -> Result<String, CipherError>;
}

/// The platform's AES-256-CBC envelope scheme
///
/// Plaintext is framed as 16 random bytes, a big-endian `u32` message length,
/// the message, and finally the app id, then padded PKCS#7-style to a
/// multiple of 32 bytes. The IV is the first 16 bytes of the key.
#[derive(Clone, Debug)]
pub struct AesMessageCipher {
    app_id: String,
    key: EncodingAesKey,
    rng: SystemRandom,
}

impl AesMessageCipher {
    /// Constructs a cipher for the given app
    pub fn new(app_id: impl Into<String>, key: EncodingAesKey) -> Self {
        Self {
            app_id: app_id.into(),
            key,
            rng: SystemRandom::new(),
        }
    }

    /// Encrypts with a caller-chosen random prefix
    ///
    /// Deterministic; intended for reproducing known ciphertexts.
    pub fn encrypt_with_random(
        &self,
        random: [u8; RANDOM_LEN],
        plaintext: &[u8],
    ) -> Result<String, CipherError> {
        let msg_len = u32::try_from(plaintext.len()).map_err(|_| CipherError::MessageTooLong)?;

        let mut buf = Vec::with_capacity(
            RANDOM_LEN + LENGTH_PREFIX_LEN + plaintext.len() + self.app_id.len() + PAD_BLOCK,
        );
        buf.extend_from_slice(&random);
        buf.extend_from_slice(&msg_len.to_be_bytes());
        buf.extend_from_slice(plaintext);
        buf.extend_from_slice(self.app_id.as_bytes());
        pad(&mut buf);

        let encryptor = Aes256CbcEnc::new_from_slices(&self.key.key, self.key.iv())
            .map_err(|_| CipherError::InvalidKey)?;
        let ciphertext = encryptor.encrypt_padded_vec_mut::<NoPadding>(&buf);

        Ok(general_purpose::STANDARD.encode(ciphertext))
    }
}

impl MessageCipher for AesMessageCipher {
    fn decrypt(&self, ciphertext: &str) -> Result<Decrypted, CipherError> {
        let raw = general_purpose::STANDARD.decode(ciphertext.trim())?;
        if raw.is_empty() || raw.len() % AES_BLOCK != 0 {
            return Err(CipherError::BlockLength);
        }

        let decryptor = Aes256CbcDec::new_from_slices(&self.key.key, self.key.iv())
            .map_err(|_| CipherError::InvalidKey)?;
        let padded = decryptor
            .decrypt_padded_vec_mut::<NoPadding>(&raw)
            .map_err(|_| CipherError::BlockLength)?;
        let plain = unpad(&padded)?;

        if plain.len() < RANDOM_LEN + LENGTH_PREFIX_LEN {
            return Err(CipherError::Truncated);
        }

        let (random, rest) = plain.split_at(RANDOM_LEN);
        let (len_prefix, body) = rest.split_at(LENGTH_PREFIX_LEN);

        let random = <[u8; RANDOM_LEN]>::try_from(random).map_err(|_| CipherError::Truncated)?;
        let len_prefix =
            <[u8; LENGTH_PREFIX_LEN]>::try_from(len_prefix).map_err(|_| CipherError::Truncated)?;
        let msg_len = usize::try_from(u32::from_be_bytes(len_prefix))
            .map_err(|_| CipherError::Truncated)?;

        if msg_len > body.len() {
            return Err(CipherError::Truncated);
        }

        let (message, app_id) = body.split_at(msg_len);
        if app_id != self.app_id.as_bytes() {
            return Err(CipherError::AppIdMismatch);
        }

        Ok(Decrypted {
            random,
            message: message.to_vec(),
        })
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<String, CipherError> {
        let mut random = [0u8; RANDOM_LEN];
        self.rng
            .fill(&mut random)
            .map_err(|_| CipherError::Random)?;
        self.encrypt_with_random(random, plaintext)
    }
}

fn pad(buf: &mut Vec<u8>) {
    let amount = PAD_BLOCK - buf.len() % PAD_BLOCK;
    // `amount` is in 1..=32
    buf.resize(buf.len() + amount, amount as u8);
}

fn unpad(buf: &[u8]) -> Result<&[u8], CipherError> {
    let amount = usize::from(*buf.last().ok_or(CipherError::Padding)?);
    if amount == 0 || amount > PAD_BLOCK || amount > buf.len() {
        return Err(CipherError::Padding);
    }

    let (content, padding) = buf.split_at(buf.len() - amount);
    if padding.iter().any(|&b| usize::from(b) != amount) {
        return Err(CipherError::Padding);
    }

    Ok(content)
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::*;

    const KEY: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG";
    const APP_ID: &str = "wx_abc";
    const RANDOM: [u8; 16] = *b"0123456789abcdef";
    const HELLO_CIPHERTEXT: &str = "Q3stYC6hdFzMh9T8HCvyDDnlUH/Bja9UtyXsKZErE7k=";

    fn cipher() -> AesMessageCipher {
        AesMessageCipher::new(APP_ID, EncodingAesKey::parse(KEY).unwrap())
    }

    #[test]
    fn parses_key_with_non_canonical_trailing_bits() {
        assert!(EncodingAesKey::parse(KEY).is_ok());
    }

    #[test]
    fn rejects_short_key() {
        assert!(matches!(
            EncodingAesKey::parse("abc"),
            Err(CipherError::InvalidKey)
        ));
    }

    #[test]
    fn key_debug_is_redacted() {
        let key = EncodingAesKey::parse(KEY).unwrap();
        assert!(!format!("{:?}", key).contains("abcdef"));
    }

    #[test]
    fn encrypts_known_vector() -> Result<()> {
        let encrypted = cipher().encrypt_with_random(RANDOM, b"hello")?;
        assert_eq!(encrypted, HELLO_CIPHERTEXT);
        Ok(())
    }

    #[test]
    fn decrypts_known_vector() -> Result<()> {
        let decrypted = cipher().decrypt(HELLO_CIPHERTEXT)?;
        assert_eq!(decrypted.random, RANDOM);
        assert_eq!(decrypted.message, b"hello");
        Ok(())
    }

    #[test]
    fn random_prefix_survives_encryption() -> Result<()> {
        let cipher = cipher();
        let encrypted = cipher.encrypt("<xml>reply</xml>".as_bytes())?;
        let decrypted = cipher.decrypt(&encrypted)?;
        assert_eq!(decrypted.message, b"<xml>reply</xml>");
        Ok(())
    }

    #[test]
    fn rejects_payload_for_another_app() {
        let other = AesMessageCipher::new("wx_other", EncodingAesKey::parse(KEY).unwrap());
        assert!(matches!(
            other.decrypt(HELLO_CIPHERTEXT),
            Err(CipherError::AppIdMismatch)
        ));
    }

    #[test]
    fn rejects_partial_blocks() {
        assert!(matches!(
            cipher().decrypt("AAAA"),
            Err(CipherError::BlockLength)
        ));
    }

    #[test]
    fn rejects_non_base64() {
        let err = cipher().decrypt("not base64!").unwrap_err();
        assert!(err.is_untrusted_payload());
    }

    #[test]
    fn unpad_rejects_inconsistent_padding() {
        assert!(matches!(unpad(&[1, 2, 3, 2]), Err(CipherError::Padding)));
        assert!(matches!(unpad(&[1, 2, 0]), Err(CipherError::Padding)));
        assert_eq!(unpad(&[7, 2, 2]).unwrap(), &[7]);
    }
}
