//! Interpreting platform responses
//!
//! The platform reports most failures with HTTP 200 and a JSON body carrying
//! a non-zero `errcode`. These helpers turn both kinds of failure into
//! [`Error`] values.

use serde::{de::DeserializeOwned, Serialize};

use crate::{
    dto::RemoteStatus,
    error::{Error, NetworkError},
    transport::HttpResponse,
};

/// The content type of JSON request bodies
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Rejects a response with a non-success HTTP status
pub fn check_status(response: HttpResponse) -> Result<HttpResponse, Error> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(NetworkError::Status {
            status: response.status,
            body: String::from_utf8_lossy(&response.body).into_owned(),
        }
        .into())
    }
}

/// Rejects a response body carrying a non-zero `errcode`
///
/// Bodies that are not JSON objects pass through untouched, so binary
/// payloads such as images are accepted.
pub fn check_remote_status(body: &[u8]) -> Result<(), Error> {
    let Ok(status) = serde_json::from_slice::<RemoteStatus>(body) else {
        return Ok(());
    };

    match status.errcode {
        Some(code) if code != 0 => Err(Error::RemoteApi {
            code,
            message: status.errmsg.unwrap_or_default(),
        }),
        _ => Ok(()),
    }
}

/// Checks a response fully and deserializes its JSON body
pub fn parse_json<T: DeserializeOwned>(response: HttpResponse) -> Result<T, Error> {
    let response = check_status(response)?;
    check_remote_status(&response.body)?;
    serde_json::from_slice(&response.body).map_err(Error::MalformedResponse)
}

/// Serializes a JSON request body
pub fn to_json<T: Serialize + ?Sized>(body: &T) -> Result<Vec<u8>, Error> {
    serde_json::to_vec(body).map_err(Error::MalformedRequest)
}
