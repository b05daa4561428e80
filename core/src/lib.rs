//! Cancellable JSON-over-HTTP client.
//!
//! # Overview
//! Every request runs through one pipeline: build the request, let an
//! optional auth hook rewrite it, execute it on a fresh transport while
//! racing a cancellation [`Signal`], then classify the status and decode the
//! body into the caller's target type.
//!
//! # Design
//! - The transport is a trait object created per request by an injected
//!   [`TransportFactory`]; the default is reqwest with connection reuse off.
//! - Cancellation and timeouts are the same thing: a [`Signal`] that fires
//!   with a [`CancelReason`]. A fired signal aborts the transport and the
//!   executor waits for the background task before returning.
//! - A `302 Found` is followed by re-entering the pipeline as a GET; every
//!   other non-2xx status becomes [`Error::Status`] with the raw body.
//! - The target type chooses how a success body is decoded (see [`Decode`]).
//!
//! ```no_run
//! use std::collections::HashMap;
//!
//! use httpctx::{Client, HttpClient, Json, Params, Signal};
//!
//! # async fn example() -> Result<(), httpctx::Error> {
//! let client = Client::new()?;
//! let mut params = Params::new();
//! params.set("q", "London,uk");
//!
//! let Json(weather): Json<HashMap<String, serde_json::Value>> = client
//!     .get(&Signal::new(), "http://api.openweathermap.org/data/2.5/weather", Some(&params))
//!     .await?;
//! println!("{:?}", weather.get("main"));
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod classify;
pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod executor;
pub mod http;
pub mod mock;
pub mod signal;
pub mod transport;

pub use builder::{build_request, Params};
pub use client::{AuthFn, Client, ClientBuilder, HttpClient};
pub use config::{ClientConfig, ConfigError};
pub use decode::{decode, Decode, Json};
pub use error::{Error, StatusError};
pub use executor::Executor;
pub use http::{Body, BoxError, HttpMethod, HttpRequest, HttpResponse};
pub use mock::{MockClient, MockFailure};
pub use signal::{CancelReason, Signal};
pub use transport::{Transport, TransportError, TransportFactory};
