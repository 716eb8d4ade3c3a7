//! Web authorization of end users on behalf of an authorizer
//!
//! An end user visiting an authorizer's web page is sent to the
//! [`oauth2_authorize_url`](OpenPlatformClient::oauth2_authorize_url). The
//! code the platform redirects back with is exchanged for a token pair that
//! is cached per end user under its own namespace, separate from the
//! authorizer's access token.

use serde::de::Error as _;
use wxopen_clock::Clock;
use wxopen_tokens::{
    endpoint::Url, AuthorizerAppIdRef, Error, RefreshTokenRef, WebAuthorizationCredential,
};

use crate::{dto::WebTokenResponse, OpenPlatformClient};

impl<C: Clock + Send + Sync> OpenPlatformClient<C> {
    /// Builds the page an end user visits to authorize `authorizer_app_id`
    pub fn oauth2_authorize_url(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        redirect_uri: &str,
        scope: &str,
        state: &str,
    ) -> Url {
        self.endpoints().oauth2_authorize(
            authorizer_app_id,
            redirect_uri,
            scope,
            state,
            self.component().app_id(),
        )
    }

    /// Exchanges a web-authorization code and caches the resulting tokens
    #[tracing::instrument(err, skip(self, code), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn oauth2_access_token(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        code: &str,
    ) -> Result<WebAuthorizationCredential, Error> {
        let token = self.component_token().await?;
        let url = self.endpoints().oauth2_access_token(
            authorizer_app_id,
            code,
            self.component().app_id(),
            &token,
        );
        let response: WebTokenResponse = self.get_json(&url).await?;

        let refresh_token = response
            .refresh_token
            .filter(|t| !t.as_str().is_empty())
            .ok_or_else(|| {
                Error::MalformedResponse(serde_json::Error::missing_field("refresh_token"))
            })?;
        let open_id = response
            .openid
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::MalformedResponse(serde_json::Error::missing_field("openid")))?;

        let credential = self.component().lifetime().create_web_authorization(
            authorizer_app_id.to_owned(),
            response.access_token,
            refresh_token,
            open_id,
            response.scope,
            response.expires_in,
        );

        self.component()
            .store()
            .store_web_authorization(&credential)
            .await?;

        tracing::info!(
            expires_at = credential.expires_at().0,
            "issued web-authorization token"
        );
        Ok(credential)
    }

    /// Refreshes the web-authorization token pair of the end user `open_id`
    /// and caches the result
    ///
    /// When the platform omits the refresh token or the scope, the values
    /// already known are kept.
    #[tracing::instrument(err, skip(self, refresh_token), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn oauth2_refresh_token(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        open_id: &str,
        refresh_token: &RefreshTokenRef,
    ) -> Result<WebAuthorizationCredential, Error> {
        let token = self.component_token().await?;
        let url = self.endpoints().oauth2_refresh_token(
            authorizer_app_id,
            self.component().app_id(),
            &token,
            refresh_token,
        );
        let response: WebTokenResponse = self.get_json(&url).await?;

        let store = self.component().store();
        let previous = store
            .load_web_authorization(authorizer_app_id, open_id)
            .await?;

        let refresh_token = match response.refresh_token.filter(|t| !t.as_str().is_empty()) {
            Some(issued) => issued,
            None => {
                tracing::debug!("platform omitted the refresh token; keeping the one used");
                refresh_token.to_owned()
            }
        };
        let scope = response
            .scope
            .or_else(|| previous.as_ref().and_then(|p| p.scope().map(str::to_owned)));

        let credential = self.component().lifetime().create_web_authorization(
            authorizer_app_id.to_owned(),
            response.access_token,
            refresh_token,
            open_id.to_owned(),
            scope,
            response.expires_in,
        );

        store.store_web_authorization(&credential).await?;

        tracing::info!(
            expires_at = credential.expires_at().0,
            "refreshed web-authorization token"
        );
        Ok(credential)
    }

    /// Reads the cached web-authorization credential of one end user
    ///
    /// Never refreshes. Fails with [`Error::CredentialNotFound`] if nothing
    /// is cached.
    #[tracing::instrument(err, skip(self), fields(authorizer_app_id = %authorizer_app_id))]
    pub async fn web_authorization(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        open_id: &str,
    ) -> Result<WebAuthorizationCredential, Error> {
        self.component()
            .store()
            .load_web_authorization(authorizer_app_id, open_id)
            .await?
            .ok_or_else(|| Error::CredentialNotFound {
                authorizer_app_id: authorizer_app_id.to_owned(),
            })
    }
}
