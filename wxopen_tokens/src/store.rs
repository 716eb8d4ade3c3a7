//! Cache-key conventions and serialization of cached credentials
//!
//! Each credential kind lives under its own key prefix, so no two kinds can
//! ever write to the same key:
//!
//! | Prefix | Value |
//! |---|---|
//! | `TICKET::<appId>` | `{"component_verify_ticket": ...}` |
//! | `COMPONENT_TOKEN::<appId>` | [`ComponentCredential`] |
//! | `AUTHORIZER_TOKEN::<authorizerAppId>` | [`AuthorizerCredential`] |
//! | `AUTHORIZER_WEB_TOKEN::<authorizerAppId>::<openId>` | [`WebAuthorizationCredential`] |
//!
//! Component credentials expire from the cache together with their access
//! token. Authorizer and web-authorization entries carry a refresh token that
//! outlives the access token, so they are written without a TTL and replaced
//! on refresh.

use std::{fmt, sync::Arc};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use wxopen_clock::{DurationSecs, UnixTime};

use crate::{
    cache::KeyValueCache, AppIdRef, AuthorizerAppIdRef, AuthorizerCredential,
    ComponentCredential, Error, VerifyTicket, VerifyTicketRef, WebAuthorizationCredential,
};

/// A namespaced cache key
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// The key holding the component's most recent verify ticket
    pub fn ticket(app_id: &AppIdRef) -> Self {
        Self(format!("TICKET::{}", app_id.as_str()))
    }

    /// The key holding the component's access token
    pub fn component_token(app_id: &AppIdRef) -> Self {
        Self(format!("COMPONENT_TOKEN::{}", app_id.as_str()))
    }

    /// The key holding an authorizer's token pair
    pub fn authorizer_token(authorizer_app_id: &AuthorizerAppIdRef) -> Self {
        Self(format!("AUTHORIZER_TOKEN::{}", authorizer_app_id.as_str()))
    }

    /// The key holding one end user's web-authorization token pair
    pub fn authorizer_web_token(authorizer_app_id: &AuthorizerAppIdRef, open_id: &str) -> Self {
        Self(format!(
            "AUTHORIZER_WEB_TOKEN::{}::{}",
            authorizer_app_id.as_str(),
            open_id
        ))
    }

    /// Gets the key as a string
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How long a verify ticket is kept
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TicketPolicy {
    /// The cache TTL of a verify ticket
    pub ttl: DurationSecs,
}

impl Default for TicketPolicy {
    /// Keeps tickets for 600 seconds, the platform's push interval
    fn default() -> Self {
        Self {
            ttl: DurationSecs(600),
        }
    }
}

#[derive(Serialize)]
struct TicketRecord<'a> {
    component_verify_ticket: &'a VerifyTicketRef,
}

#[derive(Deserialize)]
struct OwnedTicketRecord {
    component_verify_ticket: VerifyTicket,
}

/// Typed access to credentials held in a [`KeyValueCache`]
#[derive(Clone)]
pub struct TokenStore {
    cache: Arc<dyn KeyValueCache>,
    ticket_policy: TicketPolicy,
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("ticket_policy", &self.ticket_policy)
            .finish_non_exhaustive()
    }
}

impl TokenStore {
    /// Constructs a store over `cache`
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self {
            cache,
            ticket_policy: TicketPolicy::default(),
        }
    }

    /// Overrides how long verify tickets are kept
    pub fn with_ticket_policy(mut self, ticket_policy: TicketPolicy) -> Self {
        self.ticket_policy = ticket_policy;
        self
    }

    /// Gets the underlying cache
    pub fn cache(&self) -> &Arc<dyn KeyValueCache> {
        &self.cache
    }

    /// Records a verify ticket pushed by the platform
    pub async fn store_ticket(
        &self,
        app_id: &AppIdRef,
        ticket: &VerifyTicketRef,
    ) -> Result<(), Error> {
        let key = CacheKey::ticket(app_id);
        let value = crate::remote::to_json(&TicketRecord {
            component_verify_ticket: ticket,
        })?;

        self.cache
            .set_with_expiry(key.as_str(), value, self.ticket_policy.ttl)
            .await?;

        tracing::debug!(cache.key = %key, ttl = self.ticket_policy.ttl.0, "stored verify ticket");
        Ok(())
    }

    /// Loads the most recent verify ticket, if one is cached
    pub async fn load_ticket(&self, app_id: &AppIdRef) -> Result<Option<VerifyTicket>, Error> {
        let record: Option<OwnedTicketRecord> = self.load(&CacheKey::ticket(app_id)).await?;
        Ok(record.map(|r| r.component_verify_ticket))
    }

    /// Loads the component credential, if one is cached
    pub async fn load_component(
        &self,
        app_id: &AppIdRef,
    ) -> Result<Option<ComponentCredential>, Error> {
        self.load(&CacheKey::component_token(app_id)).await
    }

    /// Writes through a freshly issued component credential
    pub async fn store_component(
        &self,
        app_id: &AppIdRef,
        credential: &ComponentCredential,
        now: UnixTime,
    ) -> Result<(), Error> {
        self.store(
            &CacheKey::component_token(app_id),
            credential,
            Some(credential.remaining_at(now)),
        )
        .await
    }

    /// Loads an authorizer's credential, if one is cached
    pub async fn load_authorizer(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
    ) -> Result<Option<AuthorizerCredential>, Error> {
        self.load(&CacheKey::authorizer_token(authorizer_app_id)).await
    }

    /// Writes through an authorizer's credential, keyed by the authorizer it names
    ///
    /// The entry stays readable after its access token expires, so the
    /// refresh token remains available for the next refresh.
    pub async fn store_authorizer(&self, credential: &AuthorizerCredential) -> Result<(), Error> {
        self.store(
            &CacheKey::authorizer_token(credential.authorizer_app_id()),
            credential,
            None,
        )
        .await
    }

    /// Loads an end user's web-authorization credential, if one is cached
    pub async fn load_web_authorization(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        open_id: &str,
    ) -> Result<Option<WebAuthorizationCredential>, Error> {
        self.load(&CacheKey::authorizer_web_token(authorizer_app_id, open_id))
            .await
    }

    /// Writes through a web-authorization credential, keyed by the authorizer
    /// and end user it names
    pub async fn store_web_authorization(
        &self,
        credential: &WebAuthorizationCredential,
    ) -> Result<(), Error> {
        self.store(
            &CacheKey::authorizer_web_token(credential.authorizer_app_id(), credential.open_id()),
            credential,
            None,
        )
        .await
    }

    async fn load<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>, Error> {
        if !self.cache.exists(key.as_str()).await {
            tracing::trace!(cache.key = %key, "cache miss");
            return Ok(None);
        }

        let Some(bytes) = self.cache.get(key.as_str()).await? else {
            tracing::trace!(cache.key = %key, "cache entry vanished before read");
            return Ok(None);
        };

        let value = serde_json::from_slice(&bytes).map_err(|source| Error::MalformedCacheEntry {
            key: key.to_string(),
            source,
        })?;

        tracing::trace!(cache.key = %key, "cache hit");
        Ok(Some(value))
    }

    async fn store<T: Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Option<DurationSecs>,
    ) -> Result<(), Error> {
        let bytes = crate::remote::to_json(value)?;
        match ttl {
            Some(ttl) => {
                let ttl = ttl.max(DurationSecs(1));
                self.cache.set_with_expiry(key.as_str(), bytes, ttl).await?;
                tracing::trace!(cache.key = %key, ttl = ttl.0, "cache write");
            }
            None => {
                self.cache.set(key.as_str(), bytes).await?;
                tracing::trace!(cache.key = %key, "cache write without expiry");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use wxopen_clock::{Clock, ManualClock};

    use super::*;
    use crate::{
        cache::InMemoryCache, AccessToken, AppId, AuthorizerAppId, CredentialLifetime, RefreshToken,
    };

    #[test]
    fn key_namespaces_do_not_collide() {
        let app_id = AppId::from_static("wx_abc");
        let authorizer = crate::AuthorizerAppId::from_static("wx_abc");

        let keys = [
            CacheKey::ticket(&app_id),
            CacheKey::component_token(&app_id),
            CacheKey::authorizer_token(&authorizer),
            CacheKey::authorizer_web_token(&authorizer, "openid-1"),
        ];

        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(keys[0].as_str(), "TICKET::wx_abc");
        assert_eq!(keys[1].as_str(), "COMPONENT_TOKEN::wx_abc");
        assert_eq!(keys[2].as_str(), "AUTHORIZER_TOKEN::wx_abc");
        assert_eq!(keys[3].as_str(), "AUTHORIZER_WEB_TOKEN::wx_abc::openid-1");
    }

    #[tokio::test]
    async fn ticket_is_stored_as_json_with_ttl() -> color_eyre::Result<()> {
        let cache = Arc::new(InMemoryCache::with_clock(ManualClock::new(UnixTime(1_000))));
        let store = TokenStore::new(cache.clone());
        let app_id = AppId::from_static("wx_abc");

        store
            .store_ticket(&app_id, &VerifyTicket::from_static("TCK123"))
            .await?;

        assert_eq!(
            cache.get("TICKET::wx_abc").await?.as_deref(),
            Some(br#"{"component_verify_ticket":"TCK123"}"#.as_slice())
        );
        assert_eq!(cache.ttl("TICKET::wx_abc"), Some(DurationSecs(600)));
        assert_eq!(
            store.load_ticket(&app_id).await?,
            Some(VerifyTicket::from_static("TCK123"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn component_credential_ttl_matches_remaining_lifetime() -> color_eyre::Result<()> {
        let clock = ManualClock::new(UnixTime(1_000));
        let cache = Arc::new(InMemoryCache::with_clock(clock.clone()));
        let store = TokenStore::new(cache.clone());
        let lifetime = CredentialLifetime::default().with_clock(clock.clone());
        let app_id = AppId::from_static("wx_abc");

        let cred = lifetime.create_component(AccessToken::from_static("ctok"), None);
        store.store_component(&app_id, &cred, lifetime.now()).await?;

        assert_eq!(cache.ttl("COMPONENT_TOKEN::wx_abc"), Some(DurationSecs(6600)));
        assert_eq!(store.load_component(&app_id).await?, Some(cred));
        Ok(())
    }

    #[tokio::test]
    async fn authorizer_credential_outlives_its_access_token() -> color_eyre::Result<()> {
        let clock = ManualClock::new(UnixTime(1_000));
        let cache = Arc::new(InMemoryCache::with_clock(clock.clone()));
        let store = TokenStore::new(cache.clone());
        let lifetime = CredentialLifetime::default().with_clock(clock.clone());
        let authorizer = AuthorizerAppId::from_static("wx_tenant");

        let cred = lifetime.create_authorizer(
            authorizer.clone(),
            AccessToken::from_static("atok"),
            RefreshToken::from_static("rtok"),
            None,
        );
        store.store_authorizer(&cred).await?;
        clock.advance(DurationSecs(6_600));

        assert_eq!(cache.ttl("AUTHORIZER_TOKEN::wx_tenant"), None);
        let cached = store.load_authorizer(&authorizer).await?;
        assert_eq!(cached.as_ref(), Some(&cred));
        assert!(cred.is_expired_at(clock.now()));
        Ok(())
    }

    #[tokio::test]
    async fn web_credentials_of_different_end_users_are_kept_apart() -> color_eyre::Result<()> {
        let store = TokenStore::new(Arc::new(InMemoryCache::new()));
        let lifetime = CredentialLifetime::default();
        let authorizer = AuthorizerAppId::from_static("wx_tenant");
        let web = |access: &'static str, open_id: &str| {
            lifetime.create_web_authorization(
                authorizer.clone(),
                AccessToken::from_static(access),
                RefreshToken::from_static("wrtok"),
                open_id.to_owned(),
                None,
                None,
            )
        };

        store.store_web_authorization(&web("access-a", "openid-a")).await?;
        store.store_web_authorization(&web("access-b", "openid-b")).await?;

        let a = store.load_web_authorization(&authorizer, "openid-a").await?;
        let b = store.load_web_authorization(&authorizer, "openid-b").await?;
        assert_eq!(a.map(|c| c.access_token().as_str().to_owned()).as_deref(), Some("access-a"));
        assert_eq!(b.map(|c| c.access_token().as_str().to_owned()).as_deref(), Some("access-b"));
        Ok(())
    }

    #[tokio::test]
    async fn garbage_entries_are_reported_with_their_key() -> color_eyre::Result<()> {
        let cache = Arc::new(InMemoryCache::new());
        cache.set("COMPONENT_TOKEN::wx_abc", b"not json".to_vec()).await?;
        let store = TokenStore::new(cache);

        let err = store
            .load_component(&AppId::from_static("wx_abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedCacheEntry { ref key, .. } if key == "COMPONENT_TOKEN::wx_abc"));
        Ok(())
    }
}
