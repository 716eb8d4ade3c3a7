use std::{
    collections::{HashMap, VecDeque},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Url;

use crate::transport::{HttpResponse, HttpTransport, TransportError};

#[derive(Clone, Debug)]
pub(crate) struct RecordedCall {
    pub(crate) method: &'static str,
    pub(crate) url: Url,
    pub(crate) body: Vec<u8>,
}

impl RecordedCall {
    pub(crate) fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// A scripted transport that records every call
///
/// Responses are scripted per URL path. The last scripted response for a
/// path repeats; unscripted paths answer 404.
#[derive(Debug, Default)]
pub(crate) struct RecordingTransport {
    routes: Mutex<HashMap<String, VecDeque<HttpResponse>>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl RecordingTransport {
    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub(crate) fn respond(&self, path: &str, status: u16, body: serde_json::Value) -> &Self {
        self.routes
            .lock()
            .entry(path.to_owned())
            .or_default()
            .push_back(HttpResponse::new(status, body.to_string()));
        self
    }

    pub(crate) fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.url.path() == path)
            .cloned()
            .collect()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    async fn answer(&self, method: &'static str, url: &Url, body: Vec<u8>) -> HttpResponse {
        self.calls.lock().push(RecordedCall {
            method,
            url: url.clone(),
            body,
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut routes = self.routes.lock();
        match routes.get_mut(url.path()) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => HttpResponse::new(404, "not scripted"),
        }
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
        Ok(self.answer("GET", url, Vec::new()).await)
    }

    async fn post(
        &self,
        url: &Url,
        _content_type: &str,
        body: Vec<u8>,
    ) -> Result<HttpResponse, TransportError> {
        Ok(self.answer("POST", url, body).await)
    }
}

/// A transport whose every request fails
#[derive(Debug, Default)]
pub(crate) struct FailingTransport;

#[async_trait]
impl HttpTransport for FailingTransport {
    async fn get(&self, _url: &Url) -> Result<HttpResponse, TransportError> {
        Err(TransportError::Timeout)
    }

    async fn post(
        &self,
        _url: &Url,
        _content_type: &str,
        _body: Vec<u8>,
    ) -> Result<HttpResponse, TransportError> {
        Err(TransportError::Timeout)
    }
}
