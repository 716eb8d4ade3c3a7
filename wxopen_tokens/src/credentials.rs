use serde::{Deserialize, Serialize};
use wxopen_clock::{Clock, DurationSecs, System, UnixTime};

use crate::{AccessToken, AccessTokenRef, AuthorizerAppId, AuthorizerAppIdRef, RefreshToken, RefreshTokenRef};

/// The component-wide access token
///
/// Only [`CredentialLifetime::create_component`] stamps the expiry, so every
/// issuing call path applies the same validity policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentCredential {
    #[serde(rename = "component_access_token")]
    access_token: AccessToken,
    expires_at: UnixTime,
}

impl ComponentCredential {
    /// Gets the access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// Gets the time at which the token must no longer be used
    #[inline]
    pub fn expires_at(&self) -> UnixTime {
        self.expires_at
    }

    /// Whether the token has expired as of `time`
    #[inline]
    pub fn is_expired_at(&self, time: UnixTime) -> bool {
        time >= self.expires_at
    }

    /// How much longer the token remains usable as of `time`
    #[inline]
    pub fn remaining_at(&self, time: UnixTime) -> DurationSecs {
        self.expires_at - time
    }
}

/// The access and refresh token pair of one authorizer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizerCredential {
    #[serde(rename = "authorizer_appid")]
    authorizer_app_id: AuthorizerAppId,
    #[serde(rename = "authorizer_access_token")]
    access_token: AccessToken,
    #[serde(rename = "authorizer_refresh_token")]
    refresh_token: RefreshToken,
    expires_at: UnixTime,
}

impl AuthorizerCredential {
    /// Gets the authorizer this credential belongs to
    #[inline]
    pub fn authorizer_app_id(&self) -> &AuthorizerAppIdRef {
        &self.authorizer_app_id
    }

    /// Gets the access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// Gets the refresh token
    #[inline]
    pub fn refresh_token(&self) -> &RefreshTokenRef {
        &self.refresh_token
    }

    /// Gets the time at which the access token must no longer be used
    #[inline]
    pub fn expires_at(&self) -> UnixTime {
        self.expires_at
    }

    /// Whether the access token has expired as of `time`
    #[inline]
    pub fn is_expired_at(&self, time: UnixTime) -> bool {
        time >= self.expires_at
    }

    /// How much longer the access token remains usable as of `time`
    #[inline]
    pub fn remaining_at(&self, time: UnixTime) -> DurationSecs {
        self.expires_at - time
    }
}

/// A web-authorization (OAuth2) token obtained for an authorizer's end user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebAuthorizationCredential {
    #[serde(rename = "authorizer_appid")]
    authorizer_app_id: AuthorizerAppId,
    access_token: AccessToken,
    refresh_token: RefreshToken,
    #[serde(rename = "openid")]
    open_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    expires_at: UnixTime,
}

impl WebAuthorizationCredential {
    /// Gets the authorizer the end user authorized
    #[inline]
    pub fn authorizer_app_id(&self) -> &AuthorizerAppIdRef {
        &self.authorizer_app_id
    }

    /// Gets the access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// Gets the refresh token
    #[inline]
    pub fn refresh_token(&self) -> &RefreshTokenRef {
        &self.refresh_token
    }

    /// Gets the end user's open id
    #[inline]
    pub fn open_id(&self) -> &str {
        &self.open_id
    }

    /// Gets the granted scope, if the platform returned one
    #[inline]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Gets the time at which the access token must no longer be used
    #[inline]
    pub fn expires_at(&self) -> UnixTime {
        self.expires_at
    }

    /// How much longer the access token remains usable as of `time`
    #[inline]
    pub fn remaining_at(&self, time: UnixTime) -> DurationSecs {
        self.expires_at - time
    }
}

/// The single policy for stamping credential expiry
///
/// A credential issued at `now` with a declared lifetime of `expires_in`
/// expires at `now + expires_in - safety_margin`. When the platform omits
/// `expires_in`, `default_validity` is assumed.
#[derive(Clone, Debug)]
pub struct CredentialLifetime<C = System> {
    safety_margin: DurationSecs,
    default_validity: DurationSecs,
    clock: C,
}

impl Default for CredentialLifetime {
    /// Default lifetime policy
    ///
    /// Uses a safety margin of 600 seconds, a default validity of 7200 seconds,
    /// and the system clock.
    fn default() -> Self {
        Self {
            safety_margin: DurationSecs(600),
            default_validity: DurationSecs(7200),
            clock: System,
        }
    }
}

impl CredentialLifetime {
    /// Constructs a new lifetime policy using the system clock
    pub fn new(safety_margin: DurationSecs, default_validity: DurationSecs) -> Self {
        Self {
            safety_margin,
            default_validity,
            clock: System,
        }
    }
}

impl<C> CredentialLifetime<C> {
    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> CredentialLifetime<D> {
        CredentialLifetime {
            safety_margin: self.safety_margin,
            default_validity: self.default_validity,
            clock,
        }
    }

    /// Gets the clock used to stamp credentials
    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Gets the safety margin subtracted from declared lifetimes
    #[inline]
    pub fn safety_margin(&self) -> DurationSecs {
        self.safety_margin
    }

    fn usable_lifetime(&self, expires_in: Option<DurationSecs>) -> DurationSecs {
        let declared = expires_in
            .filter(|d| d.0 > 0)
            .unwrap_or(self.default_validity);

        // Lifetimes shorter than the margin keep half of what was declared.
        if declared > self.safety_margin {
            declared - self.safety_margin
        } else {
            DurationSecs(declared.0 / 2).max(DurationSecs(1))
        }
    }
}

impl<C: Clock> CredentialLifetime<C> {
    /// Gets the current time according to the policy's clock
    #[inline]
    pub fn now(&self) -> UnixTime {
        self.clock.now()
    }

    fn expiry(&self, expires_in: Option<DurationSecs>) -> UnixTime {
        self.clock.now() + self.usable_lifetime(expires_in)
    }

    /// Stamps a freshly issued component token
    pub fn create_component(
        &self,
        access_token: AccessToken,
        expires_in: Option<DurationSecs>,
    ) -> ComponentCredential {
        ComponentCredential {
            access_token,
            expires_at: self.expiry(expires_in),
        }
    }

    /// Stamps a freshly issued authorizer token pair
    pub fn create_authorizer(
        &self,
        authorizer_app_id: AuthorizerAppId,
        access_token: AccessToken,
        refresh_token: RefreshToken,
        expires_in: Option<DurationSecs>,
    ) -> AuthorizerCredential {
        AuthorizerCredential {
            authorizer_app_id,
            access_token,
            refresh_token,
            expires_at: self.expiry(expires_in),
        }
    }

    /// Stamps a freshly issued web-authorization token pair
    pub fn create_web_authorization(
        &self,
        authorizer_app_id: AuthorizerAppId,
        access_token: AccessToken,
        refresh_token: RefreshToken,
        open_id: String,
        scope: Option<String>,
        expires_in: Option<DurationSecs>,
    ) -> WebAuthorizationCredential {
        WebAuthorizationCredential {
            authorizer_app_id,
            access_token,
            refresh_token,
            open_id,
            scope,
            expires_at: self.expiry(expires_in),
        }
    }
}

#[cfg(test)]
mod tests {
    use wxopen_clock::ManualClock;

    use super::*;

    fn lifetime_at(time: u64) -> CredentialLifetime<ManualClock> {
        CredentialLifetime::default().with_clock(ManualClock::new(UnixTime(time)))
    }

    #[test]
    fn expiry_subtracts_safety_margin() {
        let lifetime = lifetime_at(1_000);
        let cred = lifetime.create_component(
            AccessToken::from_static("token"),
            Some(DurationSecs(7200)),
        );
        assert_eq!(cred.expires_at(), UnixTime(1_000 + 7200 - 600));
    }

    #[test]
    fn missing_lifetime_uses_default_validity() {
        let lifetime = lifetime_at(1_000);
        let cred = lifetime.create_component(AccessToken::from_static("token"), None);
        assert_eq!(cred.expires_at(), UnixTime(1_000 + 6600));

        let cred = lifetime.create_component(AccessToken::from_static("token"), Some(DurationSecs(0)));
        assert_eq!(cred.expires_at(), UnixTime(1_000 + 6600));
    }

    #[test]
    fn short_lifetimes_still_expire_in_the_future() {
        let lifetime = lifetime_at(1_000);
        let cred = lifetime.create_component(AccessToken::from_static("token"), Some(DurationSecs(300)));
        assert_eq!(cred.expires_at(), UnixTime(1_150));

        let cred = lifetime.create_component(AccessToken::from_static("token"), Some(DurationSecs(1)));
        assert_eq!(cred.expires_at(), UnixTime(1_001));
    }

    #[test]
    fn credential_expires_exactly_at_expiry() {
        let lifetime = lifetime_at(1_000);
        let cred = lifetime.create_component(AccessToken::from_static("token"), None);
        assert!(!cred.is_expired_at(UnixTime(7_599)));
        assert!(cred.is_expired_at(UnixTime(7_600)));
        assert_eq!(cred.remaining_at(UnixTime(7_000)), DurationSecs(600));
        assert_eq!(cred.remaining_at(UnixTime(8_000)), DurationSecs(0));
    }

    #[test]
    fn authorizer_credential_serializes_with_platform_field_names() {
        let lifetime = lifetime_at(1_000);
        let cred = lifetime.create_authorizer(
            AuthorizerAppId::from_static("wx_tenant"),
            AccessToken::from_static("access"),
            RefreshToken::from_static("refresh"),
            Some(DurationSecs(7200)),
        );

        let value = serde_json::to_value(&cred).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "authorizer_appid": "wx_tenant",
                "authorizer_access_token": "access",
                "authorizer_refresh_token": "refresh",
                "expires_at": 7_600,
            })
        );

        let back: AuthorizerCredential = serde_json::from_value(value).unwrap();
        assert_eq!(back, cred);
    }
}
