//! Response decoding: bytes, text, JSON values and typed objects.
//!
//! # Design
//! Every decoder runs the same checks before looking at the body:
//!
//! 1. a transport error wins and becomes `Error::Service`;
//! 2. no response metadata means `Error::ResponseMissing`;
//! 3. status 204 or 205 short-circuits to an empty value;
//! 4. a missing body otherwise means `Error::EmptyData`.
//!
//! "Empty value" depends on the target: no bytes, an empty string, JSON
//! `null`, and for typed objects whatever `T` decodes from `null`. That makes
//! `Option<T>` and `()` succeed on a no-content response while a struct fails
//! with `UnableToDecodeJson`.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::http::{Envelope, HttpResponse};

/// Status codes whose responses carry no body.
const NO_CONTENT_STATUS_CODES: [u16; 2] = [204, 205];

/// What the shared checks left to decode.
enum Payload {
    NoContent,
    Body(Vec<u8>),
}

fn payload(envelope: Envelope) -> Result<(HttpResponse, Payload)> {
    if let Some(error) = envelope.error {
        return Err(Error::Service(error));
    }
    let response = envelope.response.ok_or(Error::ResponseMissing)?;
    if NO_CONTENT_STATUS_CODES.contains(&response.status) {
        return Ok((response, Payload::NoContent));
    }
    let body = envelope.body.ok_or(Error::EmptyData)?;
    Ok((response, Payload::Body(body)))
}

/// The raw body.
pub fn decode_bytes(envelope: Envelope) -> Result<Vec<u8>> {
    match payload(envelope)? {
        (_, Payload::NoContent) => Ok(Vec::new()),
        (_, Payload::Body(body)) => Ok(body),
    }
}

/// The body as text.
///
/// The character encoding is `encoding` when given, otherwise the `charset`
/// of the response `Content-Type`, otherwise UTF-8. Malformed input is an
/// error, never replaced.
pub fn decode_text(envelope: Envelope, encoding: Option<&'static Encoding>) -> Result<String> {
    let (response, payload) = payload(envelope)?;
    let body = match payload {
        Payload::NoContent => return Ok(String::new()),
        Payload::Body(body) => body,
    };

    let encoding = encoding.unwrap_or_else(|| charset(&response).unwrap_or(UTF_8));
    match encoding.decode_without_bom_handling_and_without_replacement(&body) {
        Some(Cow::Borrowed(text)) => Ok(text.to_string()),
        Some(Cow::Owned(text)) => Ok(text),
        None => {
            debug!(encoding = encoding.name(), "body is not valid text");
            Err(Error::UnableToDecodeText {
                encoding: encoding.name(),
            })
        }
    }
}

/// The body as a JSON value of any shape, optionally narrowed by a
/// dot-separated key path.
pub fn decode_json(envelope: Envelope, key_path: Option<&str>) -> Result<Value> {
    let value = match payload(envelope)?.1 {
        Payload::NoContent => Value::Null,
        Payload::Body(body) => parse_json(&body)?,
    };
    Ok(match key_path {
        Some(path) => project(value, path),
        None => value,
    })
}

/// The body deserialized into `T`, optionally after key-path projection.
pub fn decode_object<T: DeserializeOwned>(envelope: Envelope, key_path: Option<&str>) -> Result<T> {
    let (_, payload) = payload(envelope)?;
    let result = match (payload, key_path) {
        (Payload::Body(body), None) => serde_json::from_slice(&body),
        (Payload::Body(body), Some(path)) => serde_json::from_value(project(parse_json(&body)?, path)),
        (Payload::NoContent, _) => serde_json::from_value(Value::Null),
    };
    result.map_err(|err| {
        debug!(%err, "body does not match the requested type");
        Error::UnableToDecodeJson(err)
    })
}

/// Narrow `value` by indexing into nested objects one path segment at a
/// time.
///
/// A missing key yields `null`, and `null` stays `null` for the rest of the
/// path. A segment applied to anything other than an object leaves the
/// current value unchanged. An empty path returns `value` unchanged.
pub fn project(value: Value, key_path: &str) -> Value {
    if key_path.is_empty() {
        return value;
    }
    key_path.split('.').fold(value, |current, key| match current {
        Value::Object(mut map) => map.remove(key).unwrap_or(Value::Null),
        other => other,
    })
}

fn parse_json(body: &[u8]) -> Result<Value> {
    serde_json::from_slice(body).map_err(|err| {
        debug!(%err, "body is not valid JSON");
        Error::UnableToDecodeJson(err)
    })
}

fn charset(response: &HttpResponse) -> Option<&'static Encoding> {
    let mime: mime::Mime = response.content_type()?.parse().ok()?;
    let label = mime.get_param(mime::CHARSET)?;
    Encoding::for_label(label.as_str().as_bytes())
}
