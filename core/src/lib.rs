//! Fluent HTTP requests with typed response decoding over a pluggable
//! transport.
//!
//! # Overview
//! A `Service` hands out `RequestHandle`s. A handle collects method, URL,
//! headers and a payload, builds an `HttpRequest` (encoding the payload as a
//! query string, a form body or JSON), runs it through a `Transport`, and
//! decodes the resulting `Envelope` as bytes, text, a JSON value or any
//! `Deserialize` type.
//!
//! # Design
//! - The pipeline is encode → build → transport → decode. Only the transport
//!   performs I/O; everything else is a pure function over plain data.
//! - `Transport` is a one-method trait. `UreqTransport` is the default; tests
//!   supply fakes that return canned envelopes.
//! - Every failure is one variant of `Error`. Build failures stop before the
//!   transport is called.
//! - No process-wide state: configuration is a `ServiceConfig` value passed
//!   at construction.
//!
//! ```no_run
//! use courier_core::{Param, Service};
//!
//! # async fn example() -> courier_core::Result<()> {
//! let service = Service::default();
//! let args = service
//!     .get("https://httpbin.org/get")
//!     .payload(Param::map([("q", "rust"), ("page", "2")]))
//!     .json(Some("args"))
//!     .await?;
//! println!("{args}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod encoding;
pub mod error;
pub mod http;
pub mod params;
pub mod response;
pub mod transport;

pub use client::{RequestHandle, RequestTask, Service, ServiceConfig};
pub use encoding::ParameterEncoding;
pub use error::{EncodingError, Error, Result, TransportError};
pub use http::{Envelope, Headers, HttpMethod, HttpRequest, HttpResponse};
pub use params::Param;
pub use transport::{Transport, TransportConfig, UreqTransport};
