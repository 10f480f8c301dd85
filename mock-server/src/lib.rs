use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{Path, Query},
    http::{header, HeaderMap, Method, StatusCode},
    routing::{any, delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::debug;

/// Body served by `/bytes`.
pub const BYTES_BODY: &[u8] = &[0x00, 0x9f, 0x92, 0x96, 0xff];

/// "olá" in ISO-8859-1, served by `/encoding/latin1`.
pub const LATIN1_BODY: &[u8] = &[0x6f, 0x6c, 0xe1];

/// What the echo routes send back: everything they saw in the request.
///
/// Repeated query or form keys collapse into a JSON array, in order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    #[serde(default)]
    pub args: BTreeMap<String, Value>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub form: BTreeMap<String, Value>,
    #[serde(default)]
    pub json: Option<Value>,
    #[serde(default)]
    pub data: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/get", get(echo))
        .route("/post", post(echo))
        .route("/put", put(echo))
        .route("/delete", delete(echo))
        .route("/status/{code}", any(status))
        .route("/bytes", get(bytes))
        .route("/bytes/{size}", get(sized_bytes))
        .route("/encoding/latin1", get(latin1))
        .route("/keypath", get(keypath))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(
    method: Method,
    Query(args): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Echo> {
    debug!(%method, args = args.len(), bytes = body.len(), "echo");

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let form = if content_type.starts_with("application/x-www-form-urlencoded") {
        serde_urlencoded::from_bytes::<Vec<(String, String)>>(&body)
            .map(collapse)
            .unwrap_or_default()
    } else {
        BTreeMap::new()
    };

    let json = if content_type.starts_with("application/json") {
        serde_json::from_slice(&body).ok()
    } else {
        None
    };

    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some((name.as_str().to_string(), value.to_string()))
        })
        .collect();

    Json(Echo {
        method: method.to_string(),
        args: collapse(args),
        headers,
        form,
        json,
        data: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn status(Path(code): Path<u16>) -> Result<StatusCode, StatusCode> {
    StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)
}

async fn bytes() -> ([(header::HeaderName, &'static str); 1], &'static [u8]) {
    ([(header::CONTENT_TYPE, "application/octet-stream")], BYTES_BODY)
}

/// `size` bytes of `x`.
async fn sized_bytes(Path(size): Path<usize>) -> ([(header::HeaderName, &'static str); 1], Vec<u8>) {
    ([(header::CONTENT_TYPE, "application/octet-stream")], vec![b'x'; size])
}

async fn latin1() -> ([(header::HeaderName, &'static str); 1], &'static [u8]) {
    ([(header::CONTENT_TYPE, "text/plain; charset=ISO-8859-1")], LATIN1_BODY)
}

async fn keypath() -> Json<Value> {
    Json(serde_json::json!({
        "key": {
            "property_one": "value one",
            "property_two": "value two",
        }
    }))
}

/// Fold ordered pairs into a map; a key seen more than once maps to an array.
fn collapse(pairs: Vec<(String, String)>) -> BTreeMap<String, Value> {
    let mut map = BTreeMap::new();
    for (key, value) in pairs {
        match map.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(Value::String(value));
            }
            Entry::Occupied(mut entry) => match entry.get_mut() {
                Value::Array(items) => items.push(Value::String(value)),
                existing => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, Value::String(value)]);
                }
            },
        }
    }
    map
}
