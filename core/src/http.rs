//! HTTP exchange types shared by the builder, the transport and the decoders.
//!
//! # Design
//! These types describe requests and responses as plain data. The builder
//! produces an `HttpRequest`, a `Transport` turns it into an `Envelope`, and
//! the decoders read the envelope. None of them perform I/O.
//!
//! All fields use owned types so values can move freely between the task
//! that performs the exchange and the one that delivers the result.

use std::fmt;

use url::Url;

use crate::encoding::ParameterEncoding;
use crate::error::TransportError;

/// HTTP method for a request.
///
/// See <https://tools.ietf.org/html/rfc7231#section-4.3>.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header mapping with case-insensitive, unique names.
///
/// Insertion order is kept. Inserting a name that already exists under any
/// casing replaces the previous entry in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, replacing any entry with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(index) => self.entries[index] = (name, value),
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|index| self.entries[index].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        headers.extend(iter);
        headers
    }
}

impl<K, V> Extend<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

/// A fully-formed request, ready for a `Transport`.
///
/// Built by `RequestHandle::build`. Fields are public for transports and
/// tests to read; nothing in the crate mutates a request after building it.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
    pub encoding: ParameterEncoding,
}

/// Response metadata: status code and headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Headers,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }
}

/// Everything one exchange produced: response metadata, body bytes and any
/// transport failure. Any of them may be absent.
///
/// A `Transport` creates exactly one envelope per request; the decoders in
/// `response` consume it.
#[derive(Debug, Default)]
pub struct Envelope {
    pub request: Option<HttpRequest>,
    pub response: Option<HttpResponse>,
    pub body: Option<Vec<u8>>,
    pub error: Option<TransportError>,
}

impl Envelope {
    /// An exchange that produced a status line.
    pub fn completed(response: HttpResponse, body: Option<Vec<u8>>) -> Self {
        Self {
            response: Some(response),
            body,
            ..Self::default()
        }
    }

    /// An exchange that failed in the transport.
    pub fn failed(error: TransportError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Attach the request that produced this envelope.
    pub fn with_request(mut self, request: HttpRequest) -> Self {
        self.request = Some(request);
        self
    }

    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|response| response.status)
    }
}
