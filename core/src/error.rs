//! Error types for the request/response pipeline.
//!
//! # Design
//! `Error` is a closed taxonomy. Every stage maps its failure to exactly one
//! variant: the builder produces `InvalidUrl` and `Encoding`, the transport
//! produces `Service`, and the decoders produce the rest. The first three
//! mean the exchange never completed; the remaining four mean it completed
//! but the content was not what the caller asked for.
//!
//! `Error` has no `From<serde_json::Error>` impl: a JSON failure is an
//! `Encoding` error on the way out and an `UnableToDecodeJson` error on the
//! way back, and each call site says which.

use std::io;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced to callers of `Service` and `RequestHandle`.
#[derive(Debug, Error)]
pub enum Error {
    /// The URL string did not parse to an absolute URL, or could not be
    /// re-serialized after query items were appended.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The transport failed to complete the exchange.
    #[error("Request error: {0}")]
    Service(#[from] TransportError),

    /// The transport completed without producing any response metadata.
    #[error("Response is missing")]
    ResponseMissing,

    /// The response carried no body and its status allows one.
    #[error("Empty response data")]
    EmptyData,

    /// The body is not valid text in the selected character encoding.
    #[error("Unable to decode text using {encoding}")]
    UnableToDecodeText {
        /// Name of the encoding that rejected the body.
        encoding: &'static str,
    },

    /// The body is not valid JSON, or does not match the requested type.
    #[error("Unable to decode JSON: {0}")]
    UnableToDecodeJson(#[source] serde_json::Error),

    /// The request payload could not be encoded for the selected mode.
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

impl Error {
    /// True when the exchange itself did not happen: bad URL, payload
    /// encoding failure, or transport failure.
    pub fn is_exchange_failure(&self) -> bool {
        matches!(
            self,
            Error::InvalidUrl(_) | Error::Service(_) | Error::Encoding(_)
        )
    }

    /// True when a response arrived but its content did not match what the
    /// caller asked for.
    pub fn is_content_failure(&self) -> bool {
        !self.is_exchange_failure()
    }
}

/// Failures raised by a `Transport` while performing an exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote host could not be resolved or reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The exchange exceeded the configured timeout.
    #[error("Request timeout")]
    Timeout,

    /// An I/O failure while reading or writing the exchange.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The exchange was abandoned before it completed.
    #[error("Request cancelled")]
    Cancelled,

    /// Anything the transport could not classify further.
    #[error("{0}")]
    Other(String),
}

/// Failures raised while turning a payload into query items or body bytes.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// JSON serialization of the payload failed.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload holds a value with no parameter representation, such as
    /// `null` or a non-finite float.
    #[error("unsupported parameter value: {0}")]
    UnsupportedValue(String),

    /// Query and form encodings need named parameters at the top level.
    #[error("{found} cannot be flattened into key/value pairs, expected a map")]
    NotAMap {
        /// Kind of value found at the top level.
        found: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_url_display() {
        let err = Error::InvalidUrl("not an url".to_string());
        assert_eq!(err.to_string(), "Invalid URL: not an url");
    }

    #[test]
    fn service_error_wraps_transport_cause() {
        let err: Error = TransportError::Timeout.into();
        assert!(matches!(err, Error::Service(TransportError::Timeout)));
        assert_eq!(err.to_string(), "Request error: Request timeout");
    }

    #[test]
    fn encoding_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{")
            .expect_err("truncated JSON should fail");
        let err: Error = EncodingError::from(json_err).into();
        assert!(matches!(err, Error::Encoding(EncodingError::Json(_))));
    }

    #[test]
    fn exchange_and_content_failures_are_disjoint() {
        let exchange = [
            Error::InvalidUrl(String::new()),
            Error::Service(TransportError::Cancelled),
            Error::Encoding(EncodingError::NotAMap { found: "list" }),
        ];
        for err in &exchange {
            assert!(err.is_exchange_failure(), "{err}");
            assert!(!err.is_content_failure(), "{err}");
        }

        let content = [
            Error::ResponseMissing,
            Error::EmptyData,
            Error::UnableToDecodeText { encoding: "UTF-8" },
        ];
        for err in &content {
            assert!(err.is_content_failure(), "{err}");
        }
    }

    #[test]
    fn unable_to_decode_text_names_encoding() {
        let err = Error::UnableToDecodeText { encoding: "UTF-8" };
        assert_eq!(err.to_string(), "Unable to decode text using UTF-8");
    }
}
