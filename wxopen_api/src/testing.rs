use std::sync::Arc;

use httpmock::MockServer;
use wxopen_tokens::{
    cache::InMemoryCache, endpoint::Endpoints, store::TokenStore, transport::ReqwestTransport,
    AccessToken, AppId, AppSecret, AuthorizerAppId, AuthorizerTokenManager,
    ComponentTokenManager, RefreshToken,
};

use crate::OpenPlatformClient;

pub(crate) const COMPONENT_APP_ID: &str = "wx_component";
pub(crate) const COMPONENT_TOKEN: &str = "component-token";
pub(crate) const AUTHORIZER_TOKEN: &str = "authorizer-token";

pub(crate) struct Fixture {
    pub(crate) server: MockServer,
    pub(crate) cache: Arc<InMemoryCache>,
    pub(crate) client: OpenPlatformClient,
}

/// A client pointed at a local mock server
///
/// The component token and the credential of `wx_tenant` are already cached.
pub(crate) async fn fixture() -> color_eyre::Result<Fixture> {
    let server = MockServer::start_async().await;
    let cache = Arc::new(InMemoryCache::new());
    let store = TokenStore::new(cache.clone());

    let component = Arc::new(ComponentTokenManager::new(
        AppId::from_static(COMPONENT_APP_ID),
        AppSecret::from_static("component-secret"),
        store.clone(),
        Arc::new(ReqwestTransport::default()),
        Endpoints::parse(&server.base_url())?,
    ));

    let lifetime = component.lifetime();
    store
        .store_component(
            component.app_id(),
            &lifetime.create_component(AccessToken::from_static(COMPONENT_TOKEN), None),
            lifetime.now(),
        )
        .await?;
    store
        .store_authorizer(
            &lifetime.create_authorizer(
                AuthorizerAppId::from_static("wx_tenant"),
                AccessToken::from_static(AUTHORIZER_TOKEN),
                RefreshToken::from_static("authorizer-refresh"),
                None,
            ),
        )
        .await?;

    let client = OpenPlatformClient::new(Arc::new(AuthorizerTokenManager::new(component)));

    Ok(Fixture {
        server,
        cache,
        client,
    })
}
