//! Wire types of the platform's credential exchanges

use serde::{Deserialize, Serialize};
use wxopen_clock::DurationSecs;

use crate::{
    AccessToken, AppIdRef, AppSecretRef, AuthorizationCodeRef, AuthorizerAppId,
    AuthorizerAppIdRef, RefreshToken, RefreshTokenRef, VerifyTicketRef,
};

/// Request for a component access token
#[derive(Debug, Serialize)]
pub struct ComponentTokenRequest<'a> {
    /// The component's app id
    pub component_appid: &'a AppIdRef,
    /// The component's app secret
    pub component_appsecret: &'a AppSecretRef,
    /// The most recent verify ticket, or empty if none has arrived
    pub component_verify_ticket: &'a VerifyTicketRef,
}

/// A component access token as issued by the platform
#[derive(Debug, Deserialize)]
pub struct ComponentTokenResponse {
    /// The token
    pub component_access_token: AccessToken,
    /// The declared lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<DurationSecs>,
}

/// Request to refresh an authorizer's tokens
#[derive(Debug, Serialize)]
pub struct AuthorizerTokenRequest<'a> {
    /// The component's app id
    pub component_appid: &'a AppIdRef,
    /// The authorizer's app id
    pub authorizer_appid: &'a AuthorizerAppIdRef,
    /// The authorizer's current refresh token
    pub authorizer_refresh_token: &'a RefreshTokenRef,
}

/// A refreshed authorizer token pair as issued by the platform
#[derive(Debug, Deserialize)]
pub struct AuthorizerTokenResponse {
    /// The new access token
    pub authorizer_access_token: AccessToken,
    /// The declared lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<DurationSecs>,
    /// A rotated refresh token, if the platform issued one
    #[serde(default)]
    pub authorizer_refresh_token: Option<RefreshToken>,
}

/// Request to exchange an authorization code
#[derive(Debug, Serialize)]
pub struct QueryAuthRequest<'a> {
    /// The component's app id
    pub component_appid: &'a AppIdRef,
    /// The one-time code from the authorization redirect or notification
    pub authorization_code: &'a AuthorizationCodeRef,
}

/// The result of exchanging an authorization code
#[derive(Debug, Deserialize)]
pub struct QueryAuthResponse {
    /// The granted authorization
    pub authorization_info: AuthorizationInfo,
}

/// A granted authorization
#[derive(Debug, Deserialize)]
pub struct AuthorizationInfo {
    /// The authorizer that granted access
    pub authorizer_appid: AuthorizerAppId,
    /// The authorizer's access token
    pub authorizer_access_token: AccessToken,
    /// The declared lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<DurationSecs>,
    /// The authorizer's refresh token
    #[serde(default)]
    pub authorizer_refresh_token: Option<RefreshToken>,
    /// The permission sets granted, as returned by the platform
    #[serde(default)]
    pub func_info: Option<serde_json::Value>,
}

/// The application-level status carried by many platform responses
#[derive(Debug, Default, Deserialize)]
pub struct RemoteStatus {
    /// Zero on success
    #[serde(default)]
    pub errcode: Option<i64>,
    /// A human-readable description of `errcode`
    #[serde(default)]
    pub errmsg: Option<String>,
}
