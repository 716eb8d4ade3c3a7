//! Errors raised while obtaining or caching credentials

use thiserror::Error;

use crate::{cache::CacheError, transport::TransportError, AuthorizerAppId};

/// An error while obtaining, refreshing or caching a credential
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The platform could not be reached or did not answer successfully
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// The platform answered successfully but reported an application error
    #[error("platform API error {code}: {message}")]
    RemoteApi {
        /// The platform's `errcode`
        code: i64,
        /// The platform's `errmsg`
        message: String,
    },

    /// No credential is cached for the authorizer
    ///
    /// The authorizer must complete an authorization exchange first.
    #[error("no credential cached for authorizer {authorizer_app_id}")]
    CredentialNotFound {
        /// The authorizer that was looked up
        authorizer_app_id: AuthorizerAppId,
    },

    /// The cache backend failed
    #[error("credential cache failure")]
    Cache(#[from] CacheError),

    /// The platform's response body could not be understood
    #[error("malformed response from the platform")]
    MalformedResponse(#[source] serde_json::Error),

    /// A request body could not be serialized
    #[error("unable to serialize request body")]
    MalformedRequest(#[source] serde_json::Error),

    /// A cached value could not be understood
    #[error("malformed cache entry at {key}")]
    MalformedCacheEntry {
        /// The cache key holding the value
        key: String,
        /// The underlying deserialization error
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Whether the error is a transport failure or a non-success HTTP status
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Gets the platform's error code, if the platform reported one
    #[must_use]
    pub fn remote_code(&self) -> Option<i64> {
        match self {
            Self::RemoteApi { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        Self::Network(NetworkError::Transport(err))
    }
}

/// A failure to get a successful HTTP response from the platform
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The request could not be completed
    #[error("network error")]
    Transport(#[from] TransportError),

    /// The platform answered with a non-success status
    #[error("network error: platform responded with HTTP status {status}")]
    Status {
        /// The HTTP status code
        status: u16,
        /// The response body, lossily decoded
        body: String,
    },
}
