//! Fluent request building and result delivery.
//!
//! # Design
//! `Service` holds a transport and the configured default headers, nothing
//! else, and carries no mutable state between calls. Each call produces a
//! `RequestHandle`: the handle is configured fluently, then consumed by one
//! terminal operation that builds the `HttpRequest`, runs it through the
//! transport and decodes the envelope.
//!
//! Building is pure and happens before the transport is touched, so a bad
//! URL or an unencodable payload never reaches the network.
//!
//! Terminal operations come in two shapes. The `async` ones (`bytes`,
//! `text`, `json`, `object`) return the decoded result. The `on_*` ones
//! spawn the exchange and hand the result to a callback, exactly once, on an
//! optional delivery runtime.

use std::collections::BTreeMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use encoding_rs::Encoding;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, instrument};
use url::Url;

use crate::encoding::{append_query, encode, Encoded, ParameterEncoding};
use crate::error::{EncodingError, Error, Result, TransportError};
use crate::http::{Envelope, Headers, HttpMethod, HttpRequest};
use crate::params::Param;
use crate::response;
use crate::transport::{Transport, TransportConfig, UreqTransport};

/// Construction-time settings for a [`Service`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Headers sent with every request unless the request sets its own.
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,

    /// Settings for the default transport built by [`Service::from_config`].
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Entry point: creates request handles bound to one transport.
#[derive(Debug, Clone)]
pub struct Service {
    transport: Arc<dyn Transport>,
    default_headers: Headers,
    runtime: Option<Handle>,
}

impl Service {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            default_headers: Headers::new(),
            runtime: None,
        }
    }

    /// A service over `transport` with the default headers from `config`.
    /// `config.transport` is ignored; it only applies to [`Self::from_config`].
    pub fn with_config(transport: impl Transport + 'static, config: &ServiceConfig) -> Self {
        let mut service = Self::new(transport);
        service.default_headers = config.default_headers.clone().into_iter().collect();
        service
    }

    /// A service over a [`UreqTransport`] built from `config.transport`.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::with_config(UreqTransport::new(config.transport.clone()), config)
    }

    /// Run callback-style exchanges on `runtime` instead of the runtime the
    /// `on_*` method is called from.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn request(&self, method: HttpMethod, url: impl Into<String>) -> RequestHandle {
        RequestHandle {
            transport: Arc::clone(&self.transport),
            runtime: self.runtime.clone(),
            method,
            url: url.into(),
            headers: self.default_headers.clone(),
            payload: None,
            body: None,
            encoding: None,
        }
    }

    /// Positional form of [`Self::request`]: optional payload, headers and
    /// encoding override in one call.
    pub fn build_request(
        &self,
        method: HttpMethod,
        url: impl Into<String>,
        payload: Option<Param>,
        headers: Option<Headers>,
        encoding: Option<ParameterEncoding>,
    ) -> RequestHandle {
        let mut handle = self.request(method, url);
        if let Some(payload) = payload {
            handle = handle.payload(payload);
        }
        if let Some(headers) = headers {
            handle = handle.headers(headers.iter());
        }
        if let Some(encoding) = encoding {
            handle = handle.encoding(encoding);
        }
        handle
    }

    pub fn get(&self, url: impl Into<String>) -> RequestHandle {
        self.request(HttpMethod::Get, url)
    }

    pub fn post(&self, url: impl Into<String>) -> RequestHandle {
        self.request(HttpMethod::Post, url)
    }

    pub fn put(&self, url: impl Into<String>) -> RequestHandle {
        self.request(HttpMethod::Put, url)
    }

    pub fn delete(&self, url: impl Into<String>) -> RequestHandle {
        self.request(HttpMethod::Delete, url)
    }

    pub fn head(&self, url: impl Into<String>) -> RequestHandle {
        self.request(HttpMethod::Head, url)
    }
}

impl Default for Service {
    fn default() -> Self {
        Self::new(UreqTransport::default())
    }
}

/// One pending request. Configure it, then consume it with a terminal
/// operation.
#[derive(Debug)]
#[must_use]
pub struct RequestHandle {
    transport: Arc<dyn Transport>,
    runtime: Option<Handle>,
    method: HttpMethod,
    url: String,
    headers: Headers,
    payload: Option<Result<Param, EncodingError>>,
    body: Option<Vec<u8>>,
    encoding: Option<ParameterEncoding>,
}

impl RequestHandle {
    /// Set a header, replacing any header with the same name in any casing.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.extend(headers);
        self
    }

    /// Structured payload, encoded according to the encoding mode.
    pub fn payload(mut self, payload: impl Into<Param>) -> Self {
        self.payload = Some(Ok(payload.into()));
        self
    }

    /// Structured payload from any serializable value. Conversion errors are
    /// reported when the request is built.
    pub fn serialize<T: Serialize + ?Sized>(mut self, payload: &T) -> Self {
        self.payload = Some(Param::from_serialize(payload));
        self
    }

    /// Raw body bytes. Takes precedence over any structured payload.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Override the method's default encoding mode.
    pub fn encoding(mut self, encoding: ParameterEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Assemble the request without sending it.
    pub fn build(self) -> Result<HttpRequest> {
        self.split().1
    }

    /// Send the request and return the undecoded envelope.
    #[instrument(skip(self), fields(method = %self.method, url = %self.url))]
    pub async fn perform(self) -> Result<Envelope> {
        let (transport, request) = self.split();
        let request = request?;
        debug!(
            headers = request.headers.len(),
            body = request.body.as_ref().map_or(0, Vec::len),
            "sending request"
        );
        Ok(transport.perform(request).await)
    }

    pub async fn bytes(self) -> Result<Vec<u8>> {
        response::decode_bytes(self.perform().await?)
    }

    /// Body as text, in the charset announced by the response or UTF-8.
    pub async fn text(self) -> Result<String> {
        response::decode_text(self.perform().await?, None)
    }

    /// Body as text in `encoding`, whatever the response announces.
    pub async fn text_with_encoding(self, encoding: &'static Encoding) -> Result<String> {
        response::decode_text(self.perform().await?, Some(encoding))
    }

    pub async fn json(self, key_path: Option<&str>) -> Result<Value> {
        response::decode_json(self.perform().await?, key_path)
    }

    pub async fn object<T: DeserializeOwned>(self, key_path: Option<&str>) -> Result<T> {
        response::decode_object(self.perform().await?, key_path)
    }

    /// Callback form of [`Self::bytes`].
    pub fn on_bytes<F>(self, delivery: Option<Handle>, callback: F) -> RequestTask
    where
        F: FnOnce(Result<Vec<u8>>) + Send + 'static,
    {
        let runtime = self.runtime.clone();
        dispatch(runtime, delivery, self.bytes(), callback)
    }

    /// Callback form of [`Self::text`].
    pub fn on_text<F>(self, delivery: Option<Handle>, callback: F) -> RequestTask
    where
        F: FnOnce(Result<String>) + Send + 'static,
    {
        let runtime = self.runtime.clone();
        dispatch(runtime, delivery, self.text(), callback)
    }

    /// Callback form of [`Self::json`].
    pub fn on_json<F>(self, key_path: Option<String>, delivery: Option<Handle>, callback: F) -> RequestTask
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        let runtime = self.runtime.clone();
        let work = async move { self.json(key_path.as_deref()).await };
        dispatch(runtime, delivery, work, callback)
    }

    /// Callback form of [`Self::object`].
    pub fn on_object<T, F>(self, key_path: Option<String>, delivery: Option<Handle>, callback: F) -> RequestTask
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let runtime = self.runtime.clone();
        let work = async move { self.object(key_path.as_deref()).await };
        dispatch(runtime, delivery, work, callback)
    }

    fn split(self) -> (Arc<dyn Transport>, Result<HttpRequest>) {
        let RequestHandle {
            transport,
            method,
            url,
            headers,
            payload,
            body,
            encoding,
            ..
        } = self;
        let encoding = encoding.unwrap_or_else(|| ParameterEncoding::for_method(method));
        let request = assemble(method, &url, headers, payload, body, encoding);
        (transport, request)
    }
}

fn assemble(
    method: HttpMethod,
    raw_url: &str,
    mut headers: Headers,
    payload: Option<Result<Param, EncodingError>>,
    body: Option<Vec<u8>>,
    encoding: ParameterEncoding,
) -> Result<HttpRequest> {
    let mut url = parse_url(raw_url)?;

    let body = match (body, payload) {
        (Some(body), payload) => {
            if payload.is_some() {
                debug!("raw body given, structured payload ignored");
            }
            Some(body)
        }
        (None, None) => None,
        (None, Some(payload)) => match encode(&payload?, encoding)? {
            Encoded::Query(pairs) => {
                append_query(&mut url, &pairs);
                url = parse_url(url.as_str())?;
                None
            }
            Encoded::Body(bytes) => Some(bytes),
            Encoded::Nothing => None,
        },
    };

    if body.is_some() && !headers.contains("content-type") {
        headers.insert("Content-Type", encoding.content_type());
    }

    Ok(HttpRequest {
        method,
        url,
        headers,
        body,
        encoding,
    })
}

/// Parse an absolute URL with a host.
fn parse_url(raw: &str) -> Result<Url> {
    match Url::parse(raw) {
        Ok(url) if url.has_host() => Ok(url),
        _ => Err(Error::InvalidUrl(raw.to_string())),
    }
}

/// Handle to an exchange started by one of the `on_*` methods.
///
/// Cancellation is advisory: if the exchange already finished, the callback
/// may still receive the real result. Otherwise it receives
/// `Error::Service(TransportError::Cancelled)`. Either way it runs once.
#[derive(Debug)]
pub struct RequestTask {
    handle: Option<JoinHandle<()>>,
}

impl RequestTask {
    pub fn cancel(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait until the exchange has finished and its result has been handed
    /// to the callback or to the delivery runtime.
    pub async fn join(self) {
        if let Some(handle) = self.handle {
            // An aborted task has already delivered `Cancelled` on drop.
            let _ = handle.await;
        }
    }
}

/// Owns the callback until a result is delivered. Dropping it undelivered
/// (the task was aborted) delivers `Cancelled`.
struct Completion<T, F>
where
    T: Send + 'static,
    F: FnOnce(Result<T>) + Send + 'static,
{
    callback: Option<F>,
    delivery: Option<Handle>,
    _result: PhantomData<fn(T)>,
}

impl<T, F> Completion<T, F>
where
    T: Send + 'static,
    F: FnOnce(Result<T>) + Send + 'static,
{
    fn new(delivery: Option<Handle>, callback: F) -> Self {
        Self {
            callback: Some(callback),
            delivery,
            _result: PhantomData,
        }
    }

    fn deliver(&mut self, result: Result<T>) {
        let Some(callback) = self.callback.take() else {
            return;
        };
        match &self.delivery {
            Some(delivery) => {
                delivery.spawn(async move { callback(result) });
            }
            None => callback(result),
        }
    }
}

impl<T, F> Drop for Completion<T, F>
where
    T: Send + 'static,
    F: FnOnce(Result<T>) + Send + 'static,
{
    fn drop(&mut self) {
        self.deliver(Err(Error::Service(TransportError::Cancelled)));
    }
}

fn dispatch<T, W, F>(runtime: Option<Handle>, delivery: Option<Handle>, work: W, callback: F) -> RequestTask
where
    T: Send + 'static,
    W: Future<Output = Result<T>> + Send + 'static,
    F: FnOnce(Result<T>) + Send + 'static,
{
    let mut completion = Completion::new(delivery, callback);
    let Some(runtime) = runtime.or_else(|| Handle::try_current().ok()) else {
        completion.deliver(Err(Error::Service(TransportError::Other(
            "no async runtime to run the request on".to_string(),
        ))));
        return RequestTask { handle: None };
    };

    let handle = runtime.spawn(async move {
        let result = work.await;
        completion.deliver(result);
    });
    RequestTask {
        handle: Some(handle),
    }
}
