//! Access and refresh tokens held on behalf of authorizers

use std::{fmt, sync::Arc};

use wxopen_clock::{Clock, System};

use crate::{
    component::ComponentTokenManager,
    dto::{AuthorizerTokenRequest, AuthorizerTokenResponse, QueryAuthRequest, QueryAuthResponse},
    guard::RefreshGuards,
    remote::{self, JSON_CONTENT_TYPE},
    store::CacheKey,
    AccessToken, AuthorizationCodeRef, AuthorizerAppIdRef, AuthorizerCredential, Error,
    RefreshToken, RefreshTokenRef,
};

/// Owns one access and refresh token pair per authorizer
///
/// Credentials enter the cache through [`exchange_authorization_code`] when
/// an authorizer grants access, and are renewed through [`refresh_token`].
/// [`get_token`] is a pure cache read; [`access_token`] additionally
/// refreshes an expired credential using its cached refresh token.
///
/// A refresh response that omits the refresh token keeps the previous one.
///
/// [`exchange_authorization_code`]: Self::exchange_authorization_code
/// [`refresh_token`]: Self::refresh_token
/// [`get_token`]: Self::get_token
/// [`access_token`]: Self::access_token
pub struct AuthorizerTokenManager<C = System> {
    component: Arc<ComponentTokenManager<C>>,
    guards: RefreshGuards,
}

impl<C: fmt::Debug> fmt::Debug for AuthorizerTokenManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AuthorizerTokenManager")
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}

impl<C> AuthorizerTokenManager<C> {
    /// Constructs a manager that resolves component tokens through `component`
    pub fn new(component: Arc<ComponentTokenManager<C>>) -> Self {
        Self {
            component,
            guards: RefreshGuards::default(),
        }
    }

    /// Gets the component token manager
    #[inline]
    pub fn component(&self) -> &Arc<ComponentTokenManager<C>> {
        &self.component
    }
}

impl<C: Clock + Send + Sync> AuthorizerTokenManager<C> {
    /// Reads an authorizer's cached credential
    ///
    /// Never refreshes. Fails with [`Error::CredentialNotFound`] if the
    /// authorizer has no cached credential.
    #[tracing::instrument(err, skip(self), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn get_token(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
    ) -> Result<AuthorizerCredential, Error> {
        self.component
            .store()
            .load_authorizer(authorizer_app_id)
            .await?
            .ok_or_else(|| Error::CredentialNotFound {
                authorizer_app_id: authorizer_app_id.to_owned(),
            })
    }

    /// Refreshes an authorizer's tokens using `refresh_token`
    #[tracing::instrument(err, skip(self, refresh_token), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn refresh_token(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        refresh_token: &RefreshTokenRef,
    ) -> Result<AuthorizerCredential, Error> {
        let _guard = self
            .guards
            .acquire(&CacheKey::authorizer_token(authorizer_app_id))
            .await;

        self.refresh_locked(authorizer_app_id, refresh_token).await
    }

    /// Gets a usable access token for an authorizer
    ///
    /// An expired credential is refreshed with its cached refresh token.
    /// Fails with [`Error::CredentialNotFound`] if nothing is cached.
    #[tracing::instrument(err, skip(self), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn access_token(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
    ) -> Result<AccessToken, Error> {
        let now = self.component.lifetime().now();
        let cached = self.get_token(authorizer_app_id).await?;
        if !cached.is_expired_at(now) {
            tracing::trace!(expires_at = cached.expires_at().0, "using cached authorizer token");
            return Ok(cached.access_token().to_owned());
        }

        let _guard = self
            .guards
            .acquire(&CacheKey::authorizer_token(authorizer_app_id))
            .await;

        let cached = self.get_token(authorizer_app_id).await?;
        if !cached.is_expired_at(self.component.lifetime().now()) {
            tracing::debug!("authorizer token was refreshed by a concurrent caller");
            return Ok(cached.access_token().to_owned());
        }

        tracing::debug!(
            expires_at = cached.expires_at().0,
            "cached authorizer token has expired"
        );
        let refreshed = self
            .refresh_locked(authorizer_app_id, cached.refresh_token())
            .await?;
        Ok(refreshed.access_token().to_owned())
    }

    /// Exchanges a one-time authorization code for an authorizer's tokens
    ///
    /// The credential is cached under the authorizer named in the platform's
    /// response.
    #[tracing::instrument(err, skip(self, code))]
    pub async fn exchange_authorization_code(
        &self,
        code: &AuthorizationCodeRef,
    ) -> Result<AuthorizerCredential, Error> {
        let component_token = self.component.get_token().await?;
        let body = remote::to_json(&QueryAuthRequest {
            component_appid: self.component.app_id(),
            authorization_code: code,
        })?;

        let url = self
            .component
            .endpoints()
            .query_auth(component_token.access_token());
        let response = self
            .component
            .transport()
            .post(&url, JSON_CONTENT_TYPE, body)
            .await?;
        let response: QueryAuthResponse = remote::parse_json(response)?;
        let info = response.authorization_info;

        let refresh_token = match non_empty(info.authorizer_refresh_token) {
            Some(refresh_token) => refresh_token,
            None => self.previous_refresh_token(&info.authorizer_appid).await?,
        };

        let lifetime = self.component.lifetime();
        let credential = lifetime.create_authorizer(
            info.authorizer_appid,
            info.authorizer_access_token,
            refresh_token,
            info.expires_in,
        );
        self.component
            .store()
            .store_authorizer(&credential)
            .await?;

        tracing::info!(
            authorizer_app_id = %credential.authorizer_app_id(),
            expires_at = credential.expires_at().0,
            "authorizer granted access"
        );

        Ok(credential)
    }

    async fn refresh_locked(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        refresh_token: &RefreshTokenRef,
    ) -> Result<AuthorizerCredential, Error> {
        let component_token = self.component.get_token().await?;
        let body = remote::to_json(&AuthorizerTokenRequest {
            component_appid: self.component.app_id(),
            authorizer_appid: authorizer_app_id,
            authorizer_refresh_token: refresh_token,
        })?;

        let url = self
            .component
            .endpoints()
            .authorizer_token(component_token.access_token());
        let response = self
            .component
            .transport()
            .post(&url, JSON_CONTENT_TYPE, body)
            .await?;
        let response: AuthorizerTokenResponse = remote::parse_json(response)?;

        let refresh_token = match non_empty(response.authorizer_refresh_token) {
            Some(rotated) => {
                tracing::debug!("received rotated refresh token");
                rotated
            }
            None => {
                tracing::warn!("refresh response omitted the refresh token, keeping the previous one");
                refresh_token.to_owned()
            }
        };

        let lifetime = self.component.lifetime();
        let credential = lifetime.create_authorizer(
            authorizer_app_id.to_owned(),
            response.authorizer_access_token,
            refresh_token,
            response.expires_in,
        );
        self.component
            .store()
            .store_authorizer(&credential)
            .await?;

        tracing::info!(
            expires_at = credential.expires_at().0,
            "received new authorizer token"
        );

        Ok(credential)
    }

    async fn previous_refresh_token(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
    ) -> Result<RefreshToken, Error> {
        match self.component.store().load_authorizer(authorizer_app_id).await? {
            Some(previous) => {
                tracing::warn!(
                    authorizer_app_id = %authorizer_app_id,
                    "authorization response omitted the refresh token, keeping the previous one"
                );
                Ok(previous.refresh_token().to_owned())
            }
            None => Err(Error::MalformedResponse(serde::de::Error::missing_field(
                "authorizer_refresh_token",
            ))),
        }
    }
}

fn non_empty(token: Option<RefreshToken>) -> Option<RefreshToken> {
    token.filter(|t| !t.as_str().is_empty())
}
