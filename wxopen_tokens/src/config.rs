use std::fmt;

use serde::Deserialize;

use crate::{endpoint::DEFAULT_BASE_URL, AppId, AppSecret};

/// Configuration of the component application
///
/// `token` and `encoding_aes_key` authenticate inbound push notifications;
/// `app_id` and `app_secret` authenticate outbound calls.
#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    /// The component's app id
    pub app_id: AppId,
    /// The component's app secret
    pub app_secret: AppSecret,
    /// The token shared with the platform for signing push notifications
    pub token: String,
    /// The 43-character key used to encrypt push notifications
    pub encoding_aes_key: String,
    /// The base URL of the platform API
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_owned()
}

impl ClientConfig {
    /// Constructs a configuration against the default base URL
    pub fn new(
        app_id: AppId,
        app_secret: AppSecret,
        token: impl Into<String>,
        encoding_aes_key: impl Into<String>,
    ) -> Self {
        Self {
            app_id,
            app_secret,
            token: token.into(),
            encoding_aes_key: encoding_aes_key.into(),
            base_url: default_base_url(),
        }
    }

    /// Overrides the base URL of the platform API
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("app_id", &self.app_id)
            .field("app_secret", &self.app_secret)
            .field("token", &"***")
            .field("encoding_aes_key", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}
