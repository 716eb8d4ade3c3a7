//! The component-wide access token

use std::{fmt, sync::Arc};

use wxopen_clock::{Clock, System};

use crate::{
    dto::{ComponentTokenRequest, ComponentTokenResponse},
    endpoint::Endpoints,
    guard::RefreshGuards,
    remote::{self, JSON_CONTENT_TYPE},
    store::{CacheKey, TokenStore},
    transport::HttpTransport,
    AppId, AppIdRef, AppSecret, ComponentCredential, CredentialLifetime, Error, VerifyTicket,
};

/// Owns the single component access token
///
/// The token is read cache-aside: a cached, unexpired token is returned as
/// is; otherwise a new one is requested using the most recent verify ticket
/// and written through to the cache. Concurrent callers in this process share
/// one in-flight refresh.
pub struct ComponentTokenManager<C = System> {
    app_id: AppId,
    app_secret: AppSecret,
    store: TokenStore,
    transport: Arc<dyn HttpTransport>,
    endpoints: Endpoints,
    lifetime: CredentialLifetime<C>,
    guards: RefreshGuards,
}

impl<C: fmt::Debug> fmt::Debug for ComponentTokenManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ComponentTokenManager")
            .field("app_id", &self.app_id)
            .field("app_secret", &self.app_secret)
            .field("store", &self.store)
            .field("endpoints", &self.endpoints)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl ComponentTokenManager<System> {
    /// Constructs a manager with the default lifetime policy
    pub fn new(
        app_id: AppId,
        app_secret: AppSecret,
        store: TokenStore,
        transport: Arc<dyn HttpTransport>,
        endpoints: Endpoints,
    ) -> Self {
        Self {
            app_id,
            app_secret,
            store,
            transport,
            endpoints,
            lifetime: CredentialLifetime::default(),
            guards: RefreshGuards::default(),
        }
    }
}

impl<C> ComponentTokenManager<C> {
    /// Replaces the lifetime policy
    pub fn with_lifetime<D>(self, lifetime: CredentialLifetime<D>) -> ComponentTokenManager<D> {
        ComponentTokenManager {
            app_id: self.app_id,
            app_secret: self.app_secret,
            store: self.store,
            transport: self.transport,
            endpoints: self.endpoints,
            lifetime,
            guards: self.guards,
        }
    }

    /// Gets the component's app id
    #[inline]
    pub fn app_id(&self) -> &AppIdRef {
        &self.app_id
    }

    /// Gets the credential store
    #[inline]
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Gets the transport used to reach the platform
    #[inline]
    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    /// Gets the platform endpoints
    #[inline]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Gets the lifetime policy
    #[inline]
    pub fn lifetime(&self) -> &CredentialLifetime<C> {
        &self.lifetime
    }
}

impl<C: Clock + Send + Sync> ComponentTokenManager<C> {
    /// Gets a usable component token, refreshing it if it is absent or expired
    #[tracing::instrument(err, skip(self), fields(app_id = %self.app_id))]
    pub async fn get_token(&self) -> Result<ComponentCredential, Error> {
        if let Some(credential) = self.cached_unexpired().await? {
            return Ok(credential);
        }

        let _guard = self
            .guards
            .acquire(&CacheKey::component_token(&self.app_id))
            .await;

        if let Some(credential) = self.cached_unexpired().await? {
            tracing::debug!("component token was refreshed by a concurrent caller");
            return Ok(credential);
        }

        self.fetch().await
    }

    /// Requests a new component token regardless of what is cached
    #[tracing::instrument(err, skip(self), fields(app_id = %self.app_id))]
    pub async fn refresh(&self) -> Result<ComponentCredential, Error> {
        let _guard = self
            .guards
            .acquire(&CacheKey::component_token(&self.app_id))
            .await;

        self.fetch().await
    }

    async fn cached_unexpired(&self) -> Result<Option<ComponentCredential>, Error> {
        let cached = match self.store.load_component(&self.app_id).await {
            Ok(cached) => cached,
            Err(Error::MalformedCacheEntry { key, source }) => {
                tracing::warn!(cache.key = %key, error = &source as &dyn std::error::Error, "discarding unreadable component token");
                None
            }
            Err(err) => return Err(err),
        };

        let now = self.lifetime.now();
        match cached {
            Some(credential) if !credential.is_expired_at(now) => {
                tracing::trace!(expires_at = credential.expires_at().0, "using cached component token");
                Ok(Some(credential))
            }
            Some(credential) => {
                tracing::debug!(
                    expires_at = credential.expires_at().0,
                    now = now.0,
                    "cached component token has expired"
                );
                Ok(None)
            }
            None => {
                tracing::debug!("no component token cached");
                Ok(None)
            }
        }
    }

    async fn fetch(&self) -> Result<ComponentCredential, Error> {
        let ticket = match self.store.load_ticket(&self.app_id).await? {
            Some(ticket) => ticket,
            None => {
                tracing::warn!("no verify ticket cached, requesting component token with an empty ticket");
                VerifyTicket::from_static("")
            }
        };

        let body = remote::to_json(&ComponentTokenRequest {
            component_appid: &self.app_id,
            component_appsecret: &self.app_secret,
            component_verify_ticket: &ticket,
        })?;

        tracing::trace!("requesting component token from platform");
        let response = self
            .transport
            .post(&self.endpoints.component_access_token(), JSON_CONTENT_TYPE, body)
            .await?;
        let response: ComponentTokenResponse = remote::parse_json(response)?;

        let credential = self
            .lifetime
            .create_component(response.component_access_token, response.expires_in);
        self.store
            .store_component(&self.app_id, &credential, self.lifetime.now())
            .await?;

        tracing::info!(
            expires_at = credential.expires_at().0,
            "received new component token"
        );

        Ok(credential)
    }
}
