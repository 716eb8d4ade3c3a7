//! The key-value capability used to hold credentials and verify tickets
//!
//! The store behind [`KeyValueCache`] is an external collaborator, such as
//! Redis. It is responsible for the atomicity of individual operations;
//! nothing here assumes atomicity across keys.

use std::error;

use async_trait::async_trait;
use thiserror::Error;
use wxopen_clock::DurationSecs;

mod in_memory;

pub use in_memory::InMemoryCache;

/// A key-value store with optional per-key expiry
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Stores a value with no expiry
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError>;

    /// Stores a value that the store discards after `ttl`
    async fn set_with_expiry(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: DurationSecs,
    ) -> Result<(), CacheError>;

    /// Gets the value stored at `key`, if any
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Whether a value is currently stored at `key`
    ///
    /// Backends that cannot answer report `false`.
    async fn exists(&self, key: &str) -> bool;
}

/// A failure reported by a cache backend
#[derive(Debug, Error)]
#[error("cache backend failure")]
pub struct CacheError {
    #[source]
    source: Box<dyn error::Error + Send + Sync + 'static>,
}

impl CacheError {
    /// Wraps a backend-specific error
    pub fn new(source: impl Into<Box<dyn error::Error + Send + Sync + 'static>>) -> Self {
        Self {
            source: source.into(),
        }
    }
}
