//! Caller-facing client: the request pipeline and the verb shortcuts.
//!
//! # Design
//! `do_request` runs build → authorize → execute → classify → (redirect | decode).
//! A 302 re-enters the pipeline as a GET against the `Location` target with
//! no params and no payload, so auth and header defaults apply again on each
//! hop. Hops recurse without a depth limit: a redirect cycle keeps going
//! until the signal fires or resources run out.
//!
//! [`HttpClient`] is the seam callers code against; [`Client`] is the real
//! implementation and [`crate::mock::MockClient`] a canned one for tests.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::Serialize;
use tracing::debug;

use crate::builder::{build_request, Params};
use crate::classify::{classify, redirect_target, status_error};
use crate::config::ClientConfig;
use crate::decode::Decode;
use crate::error::Error;
use crate::executor::Executor;
use crate::http::{HttpMethod, HttpRequest};
use crate::signal::Signal;
use crate::transport::{ReqwestTransportFactory, TransportFactory};

/// Authorizes a request after it is built and before it is sent. Usually
/// returns the request it was given with extra headers, but may return a
/// different request altogether.
pub type AuthFn = Arc<dyn Fn(HttpRequest) -> HttpRequest + Send + Sync>;

/// JSON-over-HTTP operations, each bounded by a [`Signal`].
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue `method` against `target` and decode a 2xx body into `T`.
    ///
    /// The signal bounds the whole call, including reading the response
    /// body; a body that stalls after the headers arrive is dropped when the
    /// signal fires.
    async fn do_request<P, T>(
        &self,
        signal: &Signal,
        method: HttpMethod,
        target: &str,
        params: Option<&Params>,
        payload: Option<&P>,
    ) -> Result<T, Error>
    where
        P: Serialize + ?Sized + Sync,
        T: Decode + Send + 'static;

    async fn get<T>(&self, signal: &Signal, target: &str, params: Option<&Params>) -> Result<T, Error>
    where
        T: Decode + Send + 'static,
    {
        self.do_request::<(), T>(signal, HttpMethod::Get, target, params, None)
            .await
    }

    async fn post<P, T>(&self, signal: &Signal, target: &str, payload: &P) -> Result<T, Error>
    where
        P: Serialize + ?Sized + Sync,
        T: Decode + Send + 'static,
    {
        self.do_request(signal, HttpMethod::Post, target, None, Some(payload))
            .await
    }

    async fn put<P, T>(&self, signal: &Signal, target: &str, payload: &P) -> Result<T, Error>
    where
        P: Serialize + ?Sized + Sync,
        T: Decode + Send + 'static,
    {
        self.do_request(signal, HttpMethod::Put, target, None, Some(payload))
            .await
    }

    async fn delete(&self, signal: &Signal, target: &str) -> Result<(), Error> {
        self.do_request::<(), ()>(signal, HttpMethod::Delete, target, None, None)
            .await
    }
}

/// HTTP client running every request through a cancellable [`Executor`].
#[derive(Clone)]
pub struct Client {
    config: ClientConfig,
    executor: Executor,
    auth: Option<AuthFn>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("auth", &self.auth.is_some())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// A client with default configuration, no auth, and the reqwest
    /// transport.
    pub fn new() -> Result<Self, Error> {
        Self::builder().build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn send<'a, T>(
        &'a self,
        signal: &'a Signal,
        request: HttpRequest,
        hop: usize,
    ) -> BoxFuture<'a, Result<T, Error>>
    where
        T: Decode + Send + 'static,
    {
        Box::pin(async move {
            let request = match &self.auth {
                Some(authorize) => authorize(request),
                None => request,
            };
            let url = request.url.clone();

            let response = self.executor.execute(signal, request).await?;
            let class = classify(&response);

            if class.is_redirect {
                let location = redirect_target(&url, &response);
                drop(response);
                debug!(hop = hop + 1, %location, "following redirect");
                let next = build_request::<()>(
                    &self.config.user_agent,
                    HttpMethod::Get,
                    &location,
                    None,
                    None,
                )?;
                return self.send(signal, next, hop + 1).await;
            }

            if !class.is_success {
                let (Ok(err) | Err(err)) = until_signal(signal, status_error(response)).await;
                return Err(err);
            }

            let raw = until_signal(signal, response.body.read_all())
                .await?
                .map_err(Error::Network)?;
            T::decode(raw)
        })
    }
}

/// Run `fut` unless `signal` fires first; the future is dropped on cancel.
async fn until_signal<F: Future>(signal: &Signal, fut: F) -> Result<F::Output, Error> {
    tokio::select! {
        biased;
        reason = signal.cancelled() => {
            debug!(%reason, "signal fired while reading response body");
            Err(Error::Cancelled(reason))
        }
        output = fut => Ok(output),
    }
}

#[async_trait]
impl HttpClient for Client {
    async fn do_request<P, T>(
        &self,
        signal: &Signal,
        method: HttpMethod,
        target: &str,
        params: Option<&Params>,
        payload: Option<&P>,
    ) -> Result<T, Error>
    where
        P: Serialize + ?Sized + Sync,
        T: Decode + Send + 'static,
    {
        let request = build_request(&self.config.user_agent, method, target, params, payload)?;
        match self.config.timeout() {
            Some(timeout) => {
                let scoped = signal.child_with_timeout(timeout);
                self.send(&scoped, request, 0).await
            }
            None => self.send(signal, request, 0).await,
        }
    }
}

/// Builder for [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    factory: Option<Arc<dyn TransportFactory>>,
    auth: Option<AuthFn>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("custom_transport", &self.factory.is_some())
            .field("auth", &self.auth.is_some())
            .finish()
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl ClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = Some(duration_millis(timeout));
        self
    }

    /// Only used when the default reqwest transport is built.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = Some(duration_millis(timeout));
        self
    }

    /// Replace the default reqwest transport.
    pub fn transport<F>(mut self, factory: F) -> Self
    where
        F: TransportFactory + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn auth<F>(mut self, authorize: F) -> Self
    where
        F: Fn(HttpRequest) -> HttpRequest + Send + Sync + 'static,
    {
        self.auth = Some(Arc::new(authorize));
        self
    }

    pub fn build(self) -> Result<Client, Error> {
        let factory = match self.factory {
            Some(factory) => factory,
            None => {
                let factory = ReqwestTransportFactory::with_connect_timeout(self.config.connect_timeout())
                    .map_err(|e| Error::Build(Box::new(e)))?;
                Arc::new(factory)
            }
        };
        Ok(Client {
            config: self.config,
            executor: Executor::new(factory),
            auth: self.auth,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Instant;

    use super::*;
    use crate::decode::Json;
    use crate::http::{Body, BoxError, HttpResponse};
    use crate::signal::CancelReason;
    use crate::transport::fake::{FakeReply, FakeTransportFactory};
    use crate::transport::Transport;

    type Map = HashMap<String, String>;

    fn hello() -> Map {
        HashMap::from([("hello".to_string(), "world".to_string())])
    }

    fn client(factory: &FakeTransportFactory) -> Client {
        Client::builder().transport(factory.clone()).build().unwrap()
    }

    #[tokio::test]
    async fn get_decodes_json_after_delay() {
        let delay = Duration::from_millis(100);
        let factory = FakeTransportFactory::new(FakeReply::json(200, &hello()).with_delay(delay));

        let started = Instant::now();
        let Json(result) = client(&factory)
            .get::<Json<Map>>(&Signal::new(), "http://www.google.com", None)
            .await
            .unwrap();

        assert!(started.elapsed() >= delay);
        assert_eq!(result, hello());
    }

    /// Sends the response head at once, then never delivers the body.
    struct StalledBody;

    #[async_trait]
    impl Transport for StalledBody {
        async fn perform(&self, _request: &HttpRequest) -> Result<HttpResponse, BoxError> {
            let body = futures_util::stream::pending::<Result<bytes::Bytes, BoxError>>();
            Ok(HttpResponse::new(200, Body::from_stream(body)))
        }

        fn abort(&self, _request: &HttpRequest) {}
    }

    fn stalled_client() -> Client {
        let factory = || Box::new(StalledBody) as Box<dyn Transport>;
        Client::builder().transport(factory).build().unwrap()
    }

    #[tokio::test]
    async fn signal_interrupts_stalled_success_body() {
        let started = Instant::now();
        let err = stalled_client()
            .get::<Json<Map>>(
                &Signal::with_timeout(Duration::from_millis(30)),
                "http://www.google.com",
                None,
            )
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn signal_interrupts_stalled_error_body() {
        struct StalledError;

        #[async_trait]
        impl Transport for StalledError {
            async fn perform(&self, _request: &HttpRequest) -> Result<HttpResponse, BoxError> {
                let body = futures_util::stream::pending::<Result<bytes::Bytes, BoxError>>();
                Ok(HttpResponse::new(503, Body::from_stream(body)))
            }

            fn abort(&self, _request: &HttpRequest) {}
        }

        let factory = || Box::new(StalledError) as Box<dyn Transport>;
        let client = Client::builder().transport(factory).build().unwrap();
        let signal = Signal::new();
        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let err = client
            .get::<()>(&signal, "http://www.google.com", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled(CancelReason::Cancelled)));
    }

    #[tokio::test]
    async fn cancelled_get_returns_early() {
        let delay = Duration::from_millis(100);
        let factory = FakeTransportFactory::new(FakeReply::json(200, &hello()).with_delay(delay));
        let signal = Signal::new();
        let trigger = signal.clone();

        let started = Instant::now();
        tokio::spawn(async move { trigger.cancel() });
        let err = client(&factory)
            .get::<()>(&signal, "http://www.google.com", None)
            .await
            .unwrap_err();

        assert!(started.elapsed() < delay);
        assert!(matches!(err, Error::Cancelled(CancelReason::Cancelled)));
    }

    #[tokio::test]
    async fn error_status_carries_decodable_body() {
        let factory = FakeTransportFactory::new(FakeReply::json(500, &hello()));
        let err = client(&factory)
            .get::<Json<Map>>(&Signal::new(), "http://www.google.com", None)
            .await
            .unwrap_err();

        match err {
            Error::Status(status) => {
                assert_eq!(status.status, 500);
                assert_eq!(status.decode::<Map>().unwrap(), hello());
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn post_sends_json_payload() {
        let factory = FakeTransportFactory::new(FakeReply::json(200, &hello()));
        let Json(echoed) = client(&factory)
            .post::<_, Json<Map>>(&Signal::new(), "http://www.google.com", &hello())
            .await
            .unwrap();
        assert_eq!(echoed, hello());

        let sent = &factory.requests()[0];
        assert_eq!(sent.method, HttpMethod::Post);
        assert_eq!(sent.header("Content-Type"), Some("application/json"));
        let body: Map = serde_json::from_slice(sent.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, hello());
    }

    #[tokio::test]
    async fn put_and_delete_use_their_verbs() {
        let factory = FakeTransportFactory::new(FakeReply::status(204));
        let c = client(&factory);
        c.put::<_, ()>(&Signal::new(), "http://www.google.com/a", &hello())
            .await
            .unwrap();
        c.delete(&Signal::new(), "http://www.google.com/a").await.unwrap();

        let methods: Vec<HttpMethod> = factory.requests().iter().map(|r| r.method).collect();
        assert_eq!(methods, vec![HttpMethod::Put, HttpMethod::Delete]);
    }

    #[tokio::test]
    async fn empty_target_never_creates_transport() {
        let factory = FakeTransportFactory::new(FakeReply::status(200));
        let err = client(&factory)
            .get::<()>(&Signal::new(), "", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyTarget));
        assert_eq!(factory.created(), 0);
    }

    #[tokio::test]
    async fn redirect_reissues_plain_get() {
        let factory = FakeTransportFactory::new(FakeReply::json(200, &hello()));
        factory.push_reply(FakeReply::redirect("/moved?from=post"));

        let Json(result) = client(&factory)
            .post::<_, Json<Map>>(&Signal::new(), "http://api.example.com/things", &hello())
            .await
            .unwrap();
        assert_eq!(result, hello());

        let requests = factory.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].method, HttpMethod::Get);
        assert_eq!(requests[1].url.as_str(), "http://api.example.com/moved?from=post");
        assert!(requests[1].body.is_none());
        assert_eq!(requests[1].header("Content-Type"), None);
    }

    #[tokio::test]
    async fn redirect_without_location_is_empty_target() {
        let factory = FakeTransportFactory::new(FakeReply::status(302));
        let err = client(&factory)
            .get::<()>(&Signal::new(), "http://api.example.com/", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyTarget));
    }

    #[tokio::test]
    async fn other_redirect_codes_are_status_errors() {
        let factory = FakeTransportFactory::new(FakeReply::status(200));
        factory.push_reply(FakeReply::status(301).with_header("Location", "/elsewhere"));
        let err = client(&factory)
            .get::<()>(&Signal::new(), "http://api.example.com/", None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(301));
        assert_eq!(factory.performed(), 1);
    }

    #[tokio::test]
    async fn auth_runs_on_every_hop_and_may_replace_request() {
        let factory = FakeTransportFactory::new(FakeReply::status(200));
        factory.push_reply(FakeReply::redirect("http://api.example.com/final"));

        let c = Client::builder()
            .transport(factory.clone())
            .auth(|request: HttpRequest| {
                let mut replaced = HttpRequest::new(request.method, request.url.clone());
                replaced.headers = request.headers.clone();
                replaced.set_header("Authorization", "Bearer token");
                replaced
            })
            .build()
            .unwrap();
        c.get::<()>(&Signal::new(), "http://api.example.com/start", None)
            .await
            .unwrap();

        let requests = factory.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests
            .iter()
            .all(|r| r.header("Authorization") == Some("Bearer token")));
    }

    #[tokio::test]
    async fn configured_user_agent_is_sent() {
        let factory = FakeTransportFactory::new(FakeReply::status(200));
        let c = Client::builder()
            .transport(factory.clone())
            .user_agent("weather-bot/2")
            .build()
            .unwrap();
        c.get::<()>(&Signal::new(), "http://api.example.com/", None)
            .await
            .unwrap();
        assert_eq!(factory.requests()[0].header("User-Agent"), Some("weather-bot/2"));
        assert_eq!(factory.requests()[0].header("Accept"), Some("application/json"));
    }

    #[tokio::test]
    async fn configured_timeout_expires_request() {
        let factory = FakeTransportFactory::new(FakeReply::hanging());
        let c = Client::builder()
            .transport(factory.clone())
            .timeout(Duration::from_millis(30))
            .build()
            .unwrap();
        let signal = Signal::new();
        let err = c
            .get::<()>(&signal, "http://api.example.com/", None)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(!signal.is_fired());
        assert_eq!(factory.aborted(), 1);
    }

    #[tokio::test]
    async fn raw_targets_skip_json_parsing() {
        let factory = FakeTransportFactory::new(FakeReply::status(200).with_body("not json"));
        let c = client(&factory);
        let text: String = c
            .get(&Signal::new(), "http://api.example.com/", None)
            .await
            .unwrap();
        let bytes: Vec<u8> = c
            .get(&Signal::new(), "http://api.example.com/", None)
            .await
            .unwrap();
        assert_eq!(text, "not json");
        assert_eq!(bytes, b"not json".to_vec());
    }

    #[tokio::test]
    async fn malformed_success_body_is_decode_error() {
        let factory = FakeTransportFactory::new(FakeReply::status(200).with_body("<html>"));
        let err = client(&factory)
            .get::<Json<Map>>(&Signal::new(), "http://api.example.com/", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
