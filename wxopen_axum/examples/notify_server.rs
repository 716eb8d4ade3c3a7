use std::{net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use clap::Parser;
use wxopen_crypto::{AesMessageCipher, EncodingAesKey};
use wxopen_notify::{
    EnvelopeCodec, NotificationHandler, NotificationRouter, PlatformEvent, PlatformNotification,
};
use wxopen_tokens::{
    cache::InMemoryCache,
    endpoint::{Endpoints, DEFAULT_BASE_URL},
    store::TokenStore,
    transport::ReqwestTransport,
    AppId, AppSecret, AuthorizerTokenManager, ClientConfig, ComponentTokenManager,
};

#[derive(Debug, Parser)]
struct Opts {
    /// The component's app id
    #[arg(long, env = "WXOPEN_APP_ID")]
    app_id: String,

    /// The component's app secret
    #[arg(long, env = "WXOPEN_APP_SECRET", hide_env_values = true)]
    app_secret: String,

    /// The token shared with the platform for signing pushes
    #[arg(long, env = "WXOPEN_TOKEN", hide_env_values = true)]
    token: String,

    /// The 43-character encoding AES key
    #[arg(long, env = "WXOPEN_AES_KEY", hide_env_values = true)]
    aes_key: String,

    /// The base URL of the platform API
    #[arg(long, env = "WXOPEN_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// The address to listen on
    #[arg(long, env = "WXOPEN_LISTEN", default_value = "127.0.0.1:9595")]
    listen: SocketAddr,
}

/// Exchanges authorization codes as soon as an authorizer grants access
#[derive(Debug)]
struct ExchangeOnGrant {
    authorizers: Arc<AuthorizerTokenManager>,
}

#[async_trait]
impl NotificationHandler for ExchangeOnGrant {
    async fn authorization_changed(&self, notification: &PlatformNotification) {
        match &notification.event {
            PlatformEvent::Authorized(grant) | PlatformEvent::AuthorizationUpdated(grant) => {
                let authorizers = self.authorizers.clone();
                let code = grant.authorization_code.clone();

                // The platform expects an answer within five seconds
                tokio::spawn(async move {
                    match authorizers.exchange_authorization_code(&code).await {
                        Ok(credential) => tracing::info!(
                            authorizer_app_id = %credential.authorizer_app_id(),
                            "authorizer credentials cached"
                        ),
                        Err(error) => {
                            tracing::error!(%error, "unable to exchange authorization code")
                        }
                    }
                });
            }
            PlatformEvent::Unauthorized { authorizer_app_id } => {
                tracing::info!(%authorizer_app_id, "authorizer revoked access");
            }
            other => {
                tracing::info!(info_type = other.info_type(), "authorization changed");
            }
        }
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let config = ClientConfig::new(
        AppId::from(opts.app_id),
        AppSecret::from(opts.app_secret),
        opts.token,
        opts.aes_key,
    )
    .with_base_url(opts.base_url);

    let store = TokenStore::new(Arc::new(InMemoryCache::new()));

    let component = Arc::new(ComponentTokenManager::new(
        config.app_id.clone(),
        config.app_secret.clone(),
        store.clone(),
        Arc::new(ReqwestTransport::default()),
        Endpoints::parse(&config.base_url)?,
    ));
    let authorizers = Arc::new(AuthorizerTokenManager::new(component));

    let key = EncodingAesKey::parse(&config.encoding_aes_key)?;
    let codec = EnvelopeCodec::new(
        config.token.clone(),
        Arc::new(AesMessageCipher::new(config.app_id.as_str(), key)),
    );

    let router = NotificationRouter::new(
        config.app_id.clone(),
        codec,
        store,
        Arc::new(ExchangeOnGrant { authorizers }),
    );

    let app = wxopen_axum::routes(Arc::new(router));

    let listener = tokio::net::TcpListener::bind(opts.listen).await?;
    tracing::info!(address = %opts.listen, "listening for platform pushes");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
