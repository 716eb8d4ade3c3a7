use aliri_braid::braid;
use std::fmt;

macro_rules! limited_reveal {
    ($ty:ty: $hidden:literal, $default:literal) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    f.write_str("\"")?;
                    limited_reveal(&self.0, &mut *f, $default)?;
                    f.write_str("\"")
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    limited_reveal(&self.0, &mut *f, usize::MAX)
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }
    };
}

/// Writes at most `width` (or `default_len`) characters of a secret, marking
/// truncation with an ellipsis
fn limited_reveal(unprotected: &str, f: &mut fmt::Formatter, default_len: usize) -> fmt::Result {
    let max_len = f.width().unwrap_or(default_len);
    if max_len <= 1 {
        f.write_str("…")
    } else if max_len > unprotected.len() {
        f.write_str(unprotected)
    } else {
        match unprotected.char_indices().nth(max_len - 2) {
            Some((idx, c)) if idx + c.len_utf8() < unprotected.len() => {
                f.write_str(&unprotected[0..idx + c.len_utf8()])?;
                f.write_str("…")
            }
            _ => f.write_str(unprotected),
        }
    }
}

/// The app id of the component application
#[braid(serde)]
pub struct AppId;

/// The app secret of the component application
#[braid(serde, debug = "owned", display = "owned")]
pub struct AppSecret;

limited_reveal!(AppSecretRef: "APP SECRET", 5);

/// The app id of an authorizer account that has delegated access to the component
#[braid(serde)]
pub struct AuthorizerAppId;

/// An access token, either component-wide or for a single authorizer
#[braid(serde, debug = "owned", display = "owned")]
pub struct AccessToken;

limited_reveal!(AccessTokenRef: "ACCESS TOKEN", 15);

/// A refresh token for an authorizer
#[braid(serde, debug = "owned", display = "owned")]
pub struct RefreshToken;

limited_reveal!(RefreshTokenRef: "REFRESH TOKEN", 5);

/// The rotating ticket pushed by the platform, required to mint component tokens
#[braid(serde, debug = "owned", display = "owned")]
pub struct VerifyTicket;

limited_reveal!(VerifyTicketRef: "VERIFY TICKET", 5);

/// A one-time authorization code handed out when an authorizer grants access
#[braid(serde, debug = "owned", display = "owned")]
pub struct AuthorizationCode;

limited_reveal!(AuthorizationCodeRef: "AUTHORIZATION CODE", 5);
