//! Construction of outbound requests.
//!
//! # Design
//! `build_request` is the only place that turns caller input into an
//! `HttpRequest`. It performs no I/O: an empty target fails before anything
//! else happens, and the default headers are always overwritten so the
//! request shape does not depend on what a previous hop or hook set.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::Serialize;
use url::Url;

use crate::error::Error;
use crate::http::{HttpMethod, HttpRequest};

pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Query parameters for a request.
///
/// Keys are kept sorted so the encoded query string is deterministic; values
/// for a key keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: BTreeMap<String, Vec<String>>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all values for `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), vec![value.into()]);
        self
    }

    /// Append a value for `key`.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.entry(key.into()).or_default().push(value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(|vs| vs.first())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `application/x-www-form-urlencoded` form, sorted by key.
    pub fn encode(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, values) in &self.values {
            for value in values {
                serializer.append_pair(key, value);
            }
        }
        serializer.finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.add(k, v);
        }
        params
    }
}

/// Build a ready-to-send request.
///
/// `params`, when present, replace the target's query string. `payload`,
/// when present, is serialized to JSON and sent as the body.
pub fn build_request<P>(
    user_agent: &str,
    method: HttpMethod,
    target: &str,
    params: Option<&Params>,
    payload: Option<&P>,
) -> Result<HttpRequest, Error>
where
    P: Serialize + ?Sized,
{
    if target.is_empty() {
        return Err(Error::EmptyTarget);
    }

    let mut url = Url::parse(target)?;
    if let Some(params) = params {
        let query = params.encode();
        url.set_query((!query.is_empty()).then_some(query.as_str()));
    }

    let body = payload
        .map(|p| serde_json::to_vec(p))
        .transpose()
        .map_err(Error::Encoding)?;

    let mut request = HttpRequest::new(method, url);
    request.set_header("User-Agent", user_agent);
    request.set_header("Accept", JSON_MEDIA_TYPE);
    if let Some(body) = body {
        request.set_header("Content-Type", JSON_MEDIA_TYPE);
        request.body = Some(Bytes::from(body));
    }
    Ok(request)
}
