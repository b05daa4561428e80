//! reqwest-based production transport

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Transport, TransportError, TransportFactory};
use crate::http::{Body, BoxError, HttpMethod, HttpRequest, HttpResponse};

/// Factory for [`ReqwestTransport`] handles.
///
/// The default configuration never reuses connections (no idle pool) and
/// never follows redirects on its own; redirect handling belongs to the
/// client pipeline. Use [`from_reqwest`](Self::from_reqwest) to supply a
/// differently configured `reqwest::Client`, e.g. one with pooling enabled.
#[derive(Debug, Clone)]
pub struct ReqwestTransportFactory {
    client: reqwest::Client,
}

impl ReqwestTransportFactory {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_connect_timeout(None)
    }

    pub fn with_connect_timeout(connect_timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build().map_err(TransportError::Build)?;
        Ok(Self { client })
    }

    pub fn from_reqwest(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl TransportFactory for ReqwestTransportFactory {
    fn create(&self) -> Box<dyn Transport> {
        Box::new(ReqwestTransport {
            client: self.client.clone(),
            abort: CancellationToken::new(),
        })
    }
}

/// One request attempt over a `reqwest::Client`.
#[derive(Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    abort: CancellationToken,
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

/// Header values that are not valid UTF-8 are kept as lossy text, so a
/// malformed `Location` still reaches redirect handling.
fn header_pairs(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn perform(&self, request: &HttpRequest) -> Result<HttpResponse, BoxError> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = tokio::select! {
            biased;
            _ = self.abort.cancelled() => return Err(TransportError::Aborted.into()),
            sent = builder.send() => sent.map_err(TransportError::from)?,
        };

        let status = response.status().as_u16();
        let headers = header_pairs(response.headers());

        Ok(HttpResponse {
            status,
            headers,
            body: Body::from_stream(response.bytes_stream()),
        })
    }

    fn abort(&self, request: &HttpRequest) {
        debug!(method = %request.method, url = %request.url, "aborting in-flight request");
        self.abort.cancel();
    }
}
