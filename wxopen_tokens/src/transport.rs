//! The HTTP capability used to reach the platform

use std::error;

use async_trait::async_trait;
use reqwest::Url;
use thiserror::Error;

/// An HTTP response reduced to what the platform calls need
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    /// The HTTP status code
    pub status: u16,
    /// The raw response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Constructs a response
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range
    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A failure to complete an HTTP exchange
#[derive(Debug, Error)]
pub enum TransportError {
    /// The exchange did not complete within the transport's timeout
    #[error("request timed out")]
    Timeout,

    /// The request could not be sent
    #[error("error sending request")]
    Send(#[source] Box<dyn error::Error + Send + Sync + 'static>),

    /// The response body could not be read
    #[error("error reading response body")]
    Body(#[source] Box<dyn error::Error + Send + Sync + 'static>),
}

/// Sends bytes and returns a status and bytes
///
/// Timeouts are the transport's own concern and are reported as
/// [`TransportError::Timeout`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issues a `GET`
    async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError>;

    /// Issues a `POST` with the given content type and body
    async fn post(
        &self,
        url: &Url,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<HttpResponse, TransportError>;
}

/// An [`HttpTransport`] backed by [`reqwest`]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Constructs a transport over an existing client
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<HttpResponse, TransportError> {
        let resp = request.send().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Send(Box::new(err))
            }
        })?;

        let status = resp.status().as_u16();
        tracing::debug!(response.status = status, "received response from platform");

        let body = resp.bytes().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Body(Box::new(err))
            }
        })?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
        self.execute(self.client.get(url.clone())).await
    }

    async fn post(
        &self,
        url: &Url,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<HttpResponse, TransportError> {
        let mut request = self.client.post(url.clone()).body(body);
        if !content_type.is_empty() {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        self.execute(request).await
    }
}
