//! Status classification and construction of HTTP-status errors.

use bytes::Bytes;
use url::Url;

use crate::error::{Error, StatusError};
use crate::http::HttpResponse;

/// The one status code the client follows by itself.
pub const REDIRECT_STATUS: u16 = 302;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub is_redirect: bool,
    pub is_success: bool,
}

pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

pub fn classify_status(status: u16) -> Classification {
    Classification {
        is_redirect: status == REDIRECT_STATUS,
        is_success: is_success(status),
    }
}

pub fn classify(response: &HttpResponse) -> Classification {
    classify_status(response.status)
}

pub fn build_http_error(status: u16, raw_body: Bytes) -> Error {
    Error::Status(StatusError::new(status, raw_body))
}

/// Drain a failed response and turn it into [`Error::Status`].
///
/// The body is consumed (and so released) before the error is built; a body
/// that cannot be read yields [`Error::Network`] instead.
pub async fn status_error(response: HttpResponse) -> Error {
    let status = response.status;
    match response.body.read_all().await {
        Ok(raw) => build_http_error(status, raw),
        Err(e) => Error::Network(e),
    }
}

/// Where a redirect response points, resolved against the URL that produced
/// it. A missing `Location` header resolves to the empty string.
pub fn redirect_target(request_url: &Url, response: &HttpResponse) -> String {
    match response.header("Location") {
        None => String::new(),
        Some(location) => request_url
            .join(location)
            .map(String::from)
            .unwrap_or_else(|_| location.to_string()),
    }
}
