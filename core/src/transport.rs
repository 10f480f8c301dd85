//! The transport seam and its default `ureq` implementation.
//!
//! # Design
//! `Transport` is the only place I/O happens. It takes a built `HttpRequest`
//! and always returns an `Envelope`; failures travel inside the envelope so
//! the decoders can classify them together with everything else. Tests
//! replace it with fakes that hand back canned envelopes.
//!
//! `UreqTransport` runs the blocking `ureq` agent on tokio's blocking pool.
//! Status codes are never treated as errors here; interpreting them is the
//! decoder's job.
//! Bodies are read whole unless `TransportConfig::max_body_bytes` caps them.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use ureq::Agent;

use crate::error::TransportError;
use crate::http::{Envelope, Headers, HttpRequest, HttpResponse};

/// Performs one HTTP exchange.
///
/// Implementations must return exactly one envelope per call and must not
/// panic on network failures.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn perform(&self, request: HttpRequest) -> Envelope;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn perform(&self, request: HttpRequest) -> Envelope {
        (**self).perform(request).await
    }
}

/// Settings for [`UreqTransport`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Upper bound for a whole exchange, in seconds. `None` waits forever.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Largest response body accepted, in bytes. `None` reads bodies of any
    /// size.
    #[serde(default)]
    pub max_body_bytes: Option<u64>,
}

impl TransportConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn body_limit(&self) -> u64 {
        self.max_body_bytes.unwrap_or(u64::MAX)
    }
}

/// Default transport backed by a blocking `ureq` agent.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
    config: TransportConfig,
}

impl UreqTransport {
    pub fn new(config: TransportConfig) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout())
            .build()
            .new_agent();
        Self { agent, config }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for UreqTransport {
    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    async fn perform(&self, request: HttpRequest) -> Envelope {
        let agent = self.agent.clone();
        let limit = self.config.body_limit();
        let outgoing = request.clone();
        let joined = tokio::task::spawn_blocking(move || execute(&agent, &outgoing, limit)).await;

        let envelope = match joined {
            Ok(Ok((response, body))) => {
                debug!(status = response.status, bytes = body.len(), "exchange completed");
                Envelope::completed(response, Some(body))
            }
            Ok(Err(err)) => {
                warn!(%err, "exchange failed");
                Envelope::failed(err)
            }
            Err(join) if join.is_cancelled() => Envelope::failed(TransportError::Cancelled),
            Err(join) => {
                warn!(%join, "transport worker panicked");
                Envelope::failed(TransportError::Other(join.to_string()))
            }
        };
        envelope.with_request(request)
    }
}

fn execute(
    agent: &Agent,
    request: &HttpRequest,
    body_limit: u64,
) -> Result<(HttpResponse, Vec<u8>), TransportError> {
    let mut builder = ureq::http::Request::builder()
        .method(request.method.as_str())
        .uri(request.url.as_str());
    for (name, value) in request.headers.iter() {
        builder = builder.header(name, value);
    }

    let mut response = match &request.body {
        Some(body) => agent.run(builder.body(body.as_slice()).map_err(invalid_request)?)?,
        None => agent.run(builder.body(()).map_err(invalid_request)?)?,
    };

    let headers: Headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some((name.as_str().to_string(), value.to_string()))
        })
        .collect();
    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .with_config()
        .limit(body_limit)
        .read_to_vec()?;

    Ok((HttpResponse { status, headers }, body))
}

fn invalid_request(err: ureq::http::Error) -> TransportError {
    TransportError::Other(format!("invalid request: {err}"))
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Timeout(_) => TransportError::Timeout,
            ureq::Error::Io(io) => TransportError::Io(io),
            ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => {
                TransportError::Connection(err.to_string())
            }
            other => TransportError::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_timeout() {
        assert_eq!(TransportConfig::default().timeout(), None);
        let config = TransportConfig {
            timeout_secs: Some(5),
            ..TransportConfig::default()
        };
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn body_limit_defaults_to_unbounded() {
        assert_eq!(TransportConfig::default().body_limit(), u64::MAX);
        let config = TransportConfig {
            max_body_bytes: Some(1024),
            ..TransportConfig::default()
        };
        assert_eq!(config.body_limit(), 1024);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: TransportConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TransportConfig::default());

        let config: TransportConfig =
            serde_json::from_str(r#"{"timeout_secs":30,"max_body_bytes":4096}"#).unwrap();
        assert_eq!(config.timeout_secs, Some(30));
        assert_eq!(config.max_body_bytes, Some(4096));
    }

    #[test]
    fn ureq_errors_are_classified() {
        assert!(matches!(
            TransportError::from(ureq::Error::HostNotFound),
            TransportError::Connection(_)
        ));
        assert!(matches!(
            TransportError::from(ureq::Error::ConnectionFailed),
            TransportError::Connection(_)
        ));
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        assert!(matches!(
            TransportError::from(ureq::Error::Io(io)),
            TransportError::Io(_)
        ));
    }

    #[test]
    fn debug_hides_agent() {
        let transport = UreqTransport::default();
        assert!(format!("{transport:?}").starts_with("UreqTransport"));
    }
}
