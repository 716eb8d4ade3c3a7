//! URLs of the platform's remote API
//!
//! Every URL is derived from a configurable base so that tests and staging
//! environments can point the client elsewhere. Query values are
//! percent-encoded by [`Url`].

pub use reqwest::Url;
use thiserror::Error;

use crate::{AccessTokenRef, AppIdRef, AuthorizerAppIdRef, RefreshTokenRef};

/// The default base URL of the platform API
pub const DEFAULT_BASE_URL: &str = "https://api.weixin.qq.com";

/// The default base URL of the authorization login page
pub const DEFAULT_LOGIN_PAGE_BASE_URL: &str = "https://mp.weixin.qq.com";

/// Builds the URLs of the platform API
#[derive(Clone, Debug)]
pub struct Endpoints {
    base: Url,
    login_page_base: Url,
}

/// A base URL that cannot anchor the platform's endpoints
#[derive(Debug, Error)]
#[error("invalid base URL {url}: {reason}")]
pub struct InvalidBaseUrl {
    url: String,
    reason: String,
}

impl Endpoints {
    /// Constructs endpoints relative to `base`, with the login page served
    /// from `login_page_base`
    pub fn new(base: Url, login_page_base: Url) -> Self {
        Self {
            base,
            login_page_base,
        }
    }

    /// Parses `base` and uses the default login page base
    pub fn parse(base: &str) -> Result<Self, InvalidBaseUrl> {
        Ok(Self::new(
            parse_base(base)?,
            parse_base(DEFAULT_LOGIN_PAGE_BASE_URL)?,
        ))
    }

    /// Gets the base URL
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Url {
        join(&self.base, path, query)
    }

    /// Exchanges the app secret and verify ticket for a component token
    pub fn component_access_token(&self) -> Url {
        self.url("/cgi-bin/component/api_component_token", &[])
    }

    /// Creates a pre-authorization code
    pub fn create_pre_auth_code(&self, component_token: &AccessTokenRef) -> Url {
        self.url(
            "/cgi-bin/component/api_create_preauthcode",
            &[("component_access_token", component_token.as_str())],
        )
    }

    /// Exchanges an authorization code for an authorizer token pair
    pub fn query_auth(&self, component_token: &AccessTokenRef) -> Url {
        self.url(
            "/cgi-bin/component/api_query_auth",
            &[("component_access_token", component_token.as_str())],
        )
    }

    /// Refreshes an authorizer token pair
    pub fn authorizer_token(&self, component_token: &AccessTokenRef) -> Url {
        self.url(
            "/cgi-bin/component/api_authorizer_token",
            &[("component_access_token", component_token.as_str())],
        )
    }

    /// Gets an authorizer's account information
    pub fn authorizer_info(&self, component_token: &AccessTokenRef) -> Url {
        self.url(
            "/cgi-bin/component/api_get_authorizer_info",
            &[("component_access_token", component_token.as_str())],
        )
    }

    /// Creates a mini-program registration task, or searches for its result
    pub fn fast_register_weapp(&self, component_token: &AccessTokenRef, action: &str) -> Url {
        self.url(
            "/cgi-bin/component/fastregisterweapp",
            &[
                ("action", action),
                ("component_access_token", component_token.as_str()),
            ],
        )
    }

    /// Lists code templates
    pub fn template_list(&self, component_token: &AccessTokenRef) -> Url {
        self.url(
            "/wxa/gettemplatelist",
            &[("access_token", component_token.as_str())],
        )
    }

    /// Exchanges a mini-program login code for a session
    pub fn jscode2session(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        js_code: &str,
        component_app_id: &AppIdRef,
        component_token: &AccessTokenRef,
    ) -> Url {
        self.url(
            "/sns/component/jscode2session",
            &[
                ("appid", authorizer_app_id.as_str()),
                ("js_code", js_code),
                ("grant_type", "authorization_code"),
                ("component_appid", component_app_id.as_str()),
                ("component_access_token", component_token.as_str()),
            ],
        )
    }

    /// The page an authorizer's administrator visits to grant access
    pub fn component_login_page(
        &self,
        component_app_id: &AppIdRef,
        pre_auth_code: &str,
        redirect_uri: &str,
        auth_type: u8,
    ) -> Url {
        let auth_type = auth_type.to_string();
        join(
            &self.login_page_base,
            "/cgi-bin/componentloginpage",
            &[
                ("component_appid", component_app_id.as_str()),
                ("pre_auth_code", pre_auth_code),
                ("redirect_uri", redirect_uri),
                ("auth_type", &auth_type),
            ],
        )
    }

    /// The page an end user visits to grant web authorization to an authorizer
    pub fn oauth2_authorize(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        redirect_uri: &str,
        scope: &str,
        state: &str,
        component_app_id: &AppIdRef,
    ) -> Url {
        let mut url = self.url(
            "/connect/oauth2/authorize",
            &[
                ("appid", authorizer_app_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope),
                ("state", state),
                ("component_appid", component_app_id.as_str()),
            ],
        );
        url.set_fragment(Some("wechat_redirect"));
        url
    }

    /// Exchanges a web-authorization code for an access token
    pub fn oauth2_access_token(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        code: &str,
        component_app_id: &AppIdRef,
        component_token: &AccessTokenRef,
    ) -> Url {
        self.url(
            "/sns/oauth2/component/access_token",
            &[
                ("appid", authorizer_app_id.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("component_appid", component_app_id.as_str()),
                ("component_access_token", component_token.as_str()),
            ],
        )
    }

    /// Refreshes a web-authorization access token
    pub fn oauth2_refresh_token(
        &self,
        authorizer_app_id: &AuthorizerAppIdRef,
        component_app_id: &AppIdRef,
        component_token: &AccessTokenRef,
        refresh_token: &RefreshTokenRef,
    ) -> Url {
        self.url(
            "/sns/oauth2/component/refresh_token",
            &[
                ("appid", authorizer_app_id.as_str()),
                ("grant_type", "refresh_token"),
                ("component_appid", component_app_id.as_str()),
                ("component_access_token", component_token.as_str()),
                ("refresh_token", refresh_token.as_str()),
            ],
        )
    }

    /// A call made with an authorizer's access token
    ///
    /// `path` is relative to the base, such as `/wxa/commit`.
    pub fn authorizer_call(&self, path: &str, authorizer_token: &AccessTokenRef) -> Url {
        self.url(path, &[("access_token", authorizer_token.as_str())])
    }

    /// An authorizer call carrying additional query parameters
    pub fn authorizer_call_with_query(
        &self,
        path: &str,
        authorizer_token: &AccessTokenRef,
        query: &[(&str, &str)],
    ) -> Url {
        let mut url = self.authorizer_call(path, authorizer_token);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter());
        }
        url
    }
}

fn join(base: &Url, path: &str, query: &[(&str, &str)]) -> Url {
    let mut url = base.clone();
    let full_path = format!("{}{}", base.path().trim_end_matches('/'), path);
    url.set_path(&full_path);
    url.set_query(None);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter());
    }
    url
}

fn parse_base(url: &str) -> Result<Url, InvalidBaseUrl> {
    let parsed = Url::parse(url).map_err(|err| InvalidBaseUrl {
        url: url.to_owned(),
        reason: err.to_string(),
    })?;

    if parsed.cannot_be_a_base() {
        return Err(InvalidBaseUrl {
            url: url.to_owned(),
            reason: "URL cannot be a base".to_owned(),
        });
    }

    Ok(parsed)
}
