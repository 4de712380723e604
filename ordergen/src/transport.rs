//! The pooled HTTP/2 capable transport.
//!
//! A hyper client over TLS that negotiates HTTP/2 through ALPN and falls back
//! to HTTP/1.1. Connections are pooled and kept alive. Every timeout of the
//! transport is configurable:
//!
//! * dial: bounds the TCP connect, set on the [`HttpConnector`]
//! * TLS handshake: bounds the TLS handshake that follows a successful dial
//! * response header: bounds the wait between sending a request and receiving
//!   the response head
//! * idle: pooled connections unused for this long are closed
//!
//! No connection is opened until the first request.
//!
//! [`Transport`] is handed to the AWS SDK as its HTTP client, so every request
//! the SDK makes, including retries, goes through this pool.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use aws_smithy_runtime_api::client::{
    http::{
        HttpClient, HttpConnector as SdkConnector, HttpConnectorFuture, HttpConnectorSettings,
        SharedHttpConnector,
    },
    orchestrator::{HttpRequest, HttpResponse},
    result::ConnectorError,
    runtime_components::RuntimeComponents,
};
use aws_smithy_types::{body::SdkBody, timeout::TimeoutConfig};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, Uri};
use hyper_tls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::{TokioExecutor, TokioTimer},
};
use serde::Deserialize;
use tower::Service;
use tracing::debug;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn default_idle_timeout_seconds() -> u64 {
    90
}

fn default_max_idle_connections() -> usize {
    5_000
}

fn default_dial_timeout_seconds() -> u64 {
    30
}

fn default_keep_alive_seconds() -> u64 {
    30
}

fn default_tls_handshake_timeout_seconds() -> u64 {
    10
}

fn default_response_header_timeout_seconds() -> u64 {
    20
}

fn default_expect_continue_timeout_seconds() -> u64 {
    1
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
/// Configuration of the transport.
pub struct Config {
    /// Close pooled connections after they sit idle this long
    #[serde(default = "default_idle_timeout_seconds")]
    pub idle_timeout_seconds: u64,
    /// Maximum number of idle connections kept in the pool
    #[serde(default = "default_max_idle_connections")]
    pub max_idle_connections: usize,
    /// Bound on establishing the TCP connection
    #[serde(default = "default_dial_timeout_seconds")]
    pub dial_timeout_seconds: u64,
    /// TCP keep-alive interval
    #[serde(default = "default_keep_alive_seconds")]
    pub keep_alive_seconds: u64,
    /// Bound on the TLS handshake
    #[serde(default = "default_tls_handshake_timeout_seconds")]
    pub tls_handshake_timeout_seconds: u64,
    /// Bound on waiting for response headers once a request is written
    #[serde(default = "default_response_header_timeout_seconds")]
    pub response_header_timeout_seconds: u64,
    /// Wait for a `100 Continue` before sending a body. The client never sends
    /// `Expect: 100-continue`, so this is recorded but has no effect.
    #[serde(default = "default_expect_continue_timeout_seconds")]
    pub expect_continue_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: default_idle_timeout_seconds(),
            max_idle_connections: default_max_idle_connections(),
            dial_timeout_seconds: default_dial_timeout_seconds(),
            keep_alive_seconds: default_keep_alive_seconds(),
            tls_handshake_timeout_seconds: default_tls_handshake_timeout_seconds(),
            response_header_timeout_seconds: default_response_header_timeout_seconds(),
            expect_continue_timeout_seconds: default_expect_continue_timeout_seconds(),
        }
    }
}

impl Config {
    /// Budget for establishing a connection, dial plus TLS handshake.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.dial_timeout_seconds
                .saturating_add(self.tls_handshake_timeout_seconds),
        )
    }

    /// The same bounds expressed as SDK timeouts.
    #[must_use]
    pub fn sdk_timeouts(&self) -> TimeoutConfig {
        TimeoutConfig::builder()
            .connect_timeout(self.connect_timeout())
            .read_timeout(Duration::from_secs(self.response_header_timeout_seconds))
            .build()
    }
}

#[derive(thiserror::Error, Debug)]
/// Errors produced by [`Transport`].
pub enum Error {
    /// The TLS backend could not be initialized.
    #[error("Failed to build TLS connector: {0}")]
    Tls(#[from] native_tls::Error),
    /// The request could not be sent or the connection failed.
    #[error("Request failed: {0}")]
    Client(#[from] hyper_util::client::legacy::Error),
    /// The response body could not be read.
    #[error("Failed to read response body: {0}")]
    Body(#[from] hyper::Error),
    /// No response head arrived in time.
    #[error("No response headers after {0:?}")]
    ResponseHeaderTimeout(Duration),
}

#[derive(thiserror::Error, Debug, Clone, Copy)]
#[error("Connection not established after {0:?}")]
/// A connection attempt exceeded its dial and handshake budget.
pub struct ConnectTimeout(Duration);

/// Wraps a connector so the whole connect, dial plus TLS handshake, is
/// bounded.
///
/// The inner [`HttpConnector`] enforces the dial timeout on its own; the
/// budget here is the dial timeout plus the handshake timeout.
#[derive(Debug, Clone)]
pub struct TimeoutConnector<C> {
    inner: C,
    timeout: Duration,
}

impl<C> TimeoutConnector<C> {
    /// Create a new [`TimeoutConnector`].
    #[must_use]
    pub fn new(inner: C, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl<C> Service<Uri> for TimeoutConnector<C>
where
    C: Service<Uri>,
    C::Error: Into<BoxError>,
    C::Future: Send + 'static,
    C::Response: Send + 'static,
{
    type Response = C::Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let timeout = self.timeout;
        let connecting = self.inner.call(uri);
        Box::pin(async move {
            match tokio::time::timeout(timeout, connecting).await {
                Ok(connected) => connected.map_err(Into::into),
                Err(_elapsed) => Err(Box::new(ConnectTimeout(timeout)) as BoxError),
            }
        })
    }
}

type Connector = TimeoutConnector<HttpsConnector<HttpConnector>>;

/// A pooled client plus the per-request response header timeout.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client<Connector, Full<Bytes>>,
    response_header_timeout: Duration,
}

impl Transport {
    /// Build a [`Transport`] from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform TLS backend cannot be initialized.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let dial_timeout = Duration::from_secs(config.dial_timeout_seconds);

        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        http.set_connect_timeout(Some(dial_timeout));
        http.set_keepalive(Some(Duration::from_secs(config.keep_alive_seconds)));

        let tls = native_tls::TlsConnector::builder()
            .request_alpns(&["h2", "http/1.1"])
            .build()?;
        let https = HttpsConnector::from((http, tokio_native_tls::TlsConnector::from(tls)));
        let connector = TimeoutConnector::new(https, config.connect_timeout());

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .pool_max_idle_per_host(config.max_idle_connections)
            .pool_timer(TokioTimer::new())
            .build(connector);

        debug!(
            idle_timeout_seconds = config.idle_timeout_seconds,
            max_idle_connections = config.max_idle_connections,
            dial_timeout_seconds = config.dial_timeout_seconds,
            keep_alive_seconds = config.keep_alive_seconds,
            tls_handshake_timeout_seconds = config.tls_handshake_timeout_seconds,
            response_header_timeout_seconds = config.response_header_timeout_seconds,
            expect_continue_timeout_seconds = config.expect_continue_timeout_seconds,
            "transport configured"
        );

        Ok(Self {
            client,
            response_header_timeout: Duration::from_secs(config.response_header_timeout_seconds),
        })
    }

    /// Send `request` and collect the full response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails, if no response head arrives
    /// within the response header timeout, or if the body cannot be read.
    pub async fn send(&self, request: Request<Full<Bytes>>) -> Result<Response<Bytes>, Error> {
        let response = tokio::time::timeout(
            self.response_header_timeout,
            self.client.request(request),
        )
        .await
        .map_err(|_| Error::ResponseHeaderTimeout(self.response_header_timeout))??;

        let (parts, body) = response.into_parts();
        let body = body.collect().await?.to_bytes();
        Ok(Response::from_parts(parts, body))
    }
}

fn connector_error(err: Error) -> ConnectorError {
    match err {
        Error::ResponseHeaderTimeout(_) => ConnectorError::timeout(Box::new(err)),
        Error::Client(_) | Error::Body(_) => ConnectorError::io(Box::new(err)),
        Error::Tls(_) => ConnectorError::other(Box::new(err), None),
    }
}

impl SdkConnector for Transport {
    fn call(&self, request: HttpRequest) -> HttpConnectorFuture {
        let transport = self.clone();
        HttpConnectorFuture::new(async move {
            let request = request
                .try_into_http1x()
                .map_err(|err| ConnectorError::user(Box::new(err)))?;
            let (parts, body) = request.into_parts();
            let body = body.bytes().map(Bytes::copy_from_slice).ok_or_else(|| {
                ConnectorError::user("streaming request bodies are not supported".into())
            })?;

            let response = transport
                .send(Request::from_parts(parts, Full::new(body)))
                .await
                .map_err(connector_error)?;
            let (parts, body) = response.into_parts();
            HttpResponse::try_from(Response::from_parts(parts, SdkBody::from(body)))
                .map_err(|err| ConnectorError::other(Box::new(err), None))
        })
    }
}

impl HttpClient for Transport {
    // Timeouts are fixed when the transport is built from the same config the
    // SDK timeouts come from.
    fn http_connector(
        &self,
        _settings: &HttpConnectorSettings,
        _components: &RuntimeComponents,
    ) -> SharedHttpConnector {
        SharedHttpConnector::new(self.clone())
    }
}
