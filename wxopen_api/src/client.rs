use std::{fmt, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use wxopen_clock::{Clock, System};
use wxopen_tokens::{
    endpoint::{Endpoints, Url},
    remote::{self, JSON_CONTENT_TYPE},
    AccessToken, AuthorizerAppIdRef, AuthorizerTokenManager, ComponentTokenManager, Error,
};

/// A success response whose body carries nothing beyond the status
pub(crate) type EmptyResponse = serde::de::IgnoredAny;

/// Calls the platform API as a component
///
/// Every call resolves its credential through the token managers: component
/// calls use the component token, and calls made on behalf of an authorizer
/// use that authorizer's access token, refreshing it when it has expired.
pub struct OpenPlatformClient<C = System> {
    authorizers: Arc<AuthorizerTokenManager<C>>,
}

impl<C: fmt::Debug> fmt::Debug for OpenPlatformClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("OpenPlatformClient")
            .field("authorizers", &self.authorizers)
            .finish()
    }
}

impl<C> Clone for OpenPlatformClient<C> {
    fn clone(&self) -> Self {
        Self {
            authorizers: Arc::clone(&self.authorizers),
        }
    }
}

impl<C> OpenPlatformClient<C> {
    /// Constructs a client over the given authorizer token manager
    ///
    /// The component token manager is reached through it.
    pub fn new(authorizers: Arc<AuthorizerTokenManager<C>>) -> Self {
        Self { authorizers }
    }

    /// Gets the authorizer token manager
    #[inline]
    pub fn authorizers(&self) -> &Arc<AuthorizerTokenManager<C>> {
        &self.authorizers
    }

    /// Gets the component token manager
    #[inline]
    pub fn component(&self) -> &ComponentTokenManager<C> {
        self.authorizers.component()
    }

    pub(crate) fn endpoints(&self) -> &Endpoints {
        self.component().endpoints()
    }
}

impl<C: Clock + Send + Sync> OpenPlatformClient<C> {
    pub(crate) async fn component_token(&self) -> Result<AccessToken, Error> {
        let credential = self.component().get_token().await?;
        Ok(credential.access_token().to_owned())
    }

    pub(crate) async fn authorizer_token(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
    ) -> Result<AccessToken, Error> {
        self.authorizers.access_token(authorizer_app_id).await
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, Error> {
        tracing::debug!(request.path = url.path(), "GET");
        let response = self.component().transport().get(url).await?;
        remote::parse_json(response)
    }

    pub(crate) async fn post_json<B, T>(&self, url: &Url, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = remote::to_json(body)?;
        tracing::debug!(request.path = url.path(), "POST");
        let response = self
            .component()
            .transport()
            .post(url, JSON_CONTENT_TYPE, body)
            .await?;
        remote::parse_json(response)
    }

    /// Fetches a body that is binary on success and a JSON error otherwise
    pub(crate) async fn get_binary(&self, url: &Url) -> Result<Vec<u8>, Error> {
        tracing::debug!(request.path = url.path(), "GET");
        let response = remote::check_status(self.component().transport().get(url).await?)?;
        remote::check_remote_status(&response.body)?;
        Ok(response.body)
    }

    pub(crate) async fn post_binary<B>(&self, url: &Url, body: &B) -> Result<Vec<u8>, Error>
    where
        B: Serialize + ?Sized,
    {
        let body = remote::to_json(body)?;
        tracing::debug!(request.path = url.path(), "POST");
        let response = remote::check_status(
            self.component()
                .transport()
                .post(url, JSON_CONTENT_TYPE, body)
                .await?,
        )?;
        remote::check_remote_status(&response.body)?;
        Ok(response.body)
    }
}
