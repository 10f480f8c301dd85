//! Parameter encoding: query strings, form bodies and JSON bodies.
//!
//! # Design
//! Query and form modes share one flattening pass that turns a `Param` tree
//! into ordered `(key, value)` pairs:
//!
//! - map entry `k2` under `k` becomes `k[k2]`, recursively;
//! - each list element under `k` becomes its own `k[]` pair;
//! - booleans render as `1` / `0`;
//! - other scalars use their display form.
//!
//! Form mode percent-encodes the pairs into a body; query mode appends them
//! to the URL. JSON mode skips flattening and serializes the tree as is.
//! Every function here is pure.

use tracing::trace;
use url::form_urlencoded;
use url::Url;

use crate::error::EncodingError;
use crate::http::HttpMethod;
use crate::params::Param;

/// How a request payload is attached to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterEncoding {
    /// Flattened pairs appended to the URL query.
    Query,
    /// Flattened pairs in an `application/x-www-form-urlencoded` body.
    Form,
    /// The tree serialized as a JSON body.
    Json,
    /// The payload is not attached.
    None,
}

impl ParameterEncoding {
    /// Default mode for a method: bodiless methods use the query string,
    /// the rest send JSON.
    pub fn for_method(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get | HttpMethod::Delete | HttpMethod::Head => ParameterEncoding::Query,
            HttpMethod::Post | HttpMethod::Put => ParameterEncoding::Json,
        }
    }

    /// `Content-Type` announced for a body produced under this mode.
    pub fn content_type(&self) -> &'static str {
        match self {
            ParameterEncoding::Json => "application/json",
            ParameterEncoding::Form => "application/x-www-form-urlencoded",
            ParameterEncoding::Query | ParameterEncoding::None => "text/plain",
        }
    }
}

/// Result of running the encoder for one mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoded {
    /// Pairs to append to the URL query.
    Query(Vec<(String, String)>),
    /// Bytes to send as the request body.
    Body(Vec<u8>),
    /// Nothing to attach.
    Nothing,
}

/// Encode `params` for `mode`.
pub fn encode(params: &Param, mode: ParameterEncoding) -> Result<Encoded, EncodingError> {
    match mode {
        ParameterEncoding::Query => query_pairs(params).map(Encoded::Query),
        ParameterEncoding::Form => form_body(params).map(Encoded::Body),
        ParameterEncoding::Json => json_body(params).map(Encoded::Body),
        ParameterEncoding::None => Ok(Encoded::Nothing),
    }
}

/// Flatten a map into ordered `(key, value)` pairs.
pub fn query_pairs(params: &Param) -> Result<Vec<(String, String)>, EncodingError> {
    let Param::Map(map) = params else {
        return Err(EncodingError::NotAMap {
            found: params.kind(),
        });
    };

    let mut pairs = Vec::new();
    for (key, value) in map {
        flatten_into(key.clone(), value, &mut pairs);
    }
    trace!(count = pairs.len(), "flattened parameters");
    Ok(pairs)
}

/// Flattened pairs as an `application/x-www-form-urlencoded` body.
pub fn form_body(params: &Param) -> Result<Vec<u8>, EncodingError> {
    let pairs = query_pairs(params)?;
    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(&pairs)
        .finish();
    Ok(encoded.into_bytes())
}

/// The tree as a UTF-8 JSON body.
pub fn json_body(params: &Param) -> Result<Vec<u8>, EncodingError> {
    Ok(serde_json::to_vec(params)?)
}

/// Append `pairs` after whatever query the URL already has.
pub fn append_query(url: &mut Url, pairs: &[(String, String)]) {
    if pairs.is_empty() {
        return;
    }
    url.query_pairs_mut().extend_pairs(pairs);
}

fn flatten_into(key: String, value: &Param, out: &mut Vec<(String, String)>) {
    match value {
        Param::Map(map) => {
            for (nested, value) in map {
                flatten_into(format!("{key}[{nested}]"), value, out);
            }
        }
        Param::List(items) => {
            let key = format!("{key}[]");
            for item in items {
                flatten_into(key.clone(), item, out);
            }
        }
        Param::Bool(b) => out.push((key, if *b { "1" } else { "0" }.to_string())),
        Param::Number(n) => out.push((key, n.to_string())),
        Param::String(s) => out.push((key, s.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn default_encoding_per_method() {
        assert_eq!(ParameterEncoding::for_method(HttpMethod::Get), ParameterEncoding::Query);
        assert_eq!(ParameterEncoding::for_method(HttpMethod::Delete), ParameterEncoding::Query);
        assert_eq!(ParameterEncoding::for_method(HttpMethod::Head), ParameterEncoding::Query);
        assert_eq!(ParameterEncoding::for_method(HttpMethod::Post), ParameterEncoding::Json);
        assert_eq!(ParameterEncoding::for_method(HttpMethod::Put), ParameterEncoding::Json);
    }

    #[test]
    fn content_type_mapping() {
        assert_eq!(ParameterEncoding::Json.content_type(), "application/json");
        assert_eq!(
            ParameterEncoding::Form.content_type(),
            "application/x-www-form-urlencoded"
        );
        assert_eq!(ParameterEncoding::Query.content_type(), "text/plain");
        assert_eq!(ParameterEncoding::None.content_type(), "text/plain");
    }

    #[test]
    fn booleans_render_as_digits() {
        let params = Param::map([("bool", true), ("falseBool", false)]);
        assert_eq!(
            query_pairs(&params).unwrap(),
            pairs(&[("bool", "1"), ("falseBool", "0")])
        );
    }

    #[test]
    fn nested_map_keys_use_brackets() {
        let params = Param::map([(
            "a",
            Param::map([("b", Param::map([("c", "deep")]))]),
        )]);
        assert_eq!(query_pairs(&params).unwrap(), pairs(&[("a[b][c]", "deep")]));
    }

    #[test]
    fn list_elements_repeat_key() {
        let params = Param::map([("array", Param::list(["valor1", "valor2", "valor1"]))]);
        assert_eq!(
            query_pairs(&params).unwrap(),
            pairs(&[
                ("array[]", "valor1"),
                ("array[]", "valor2"),
                ("array[]", "valor1"),
            ])
        );
    }

    #[test]
    fn list_of_maps() {
        let params = Param::map([(
            "users",
            Param::list([Param::map([("id", 1)]), Param::map([("id", 2)])]),
        )]);
        assert_eq!(
            query_pairs(&params).unwrap(),
            pairs(&[("users[][id]", "1"), ("users[][id]", "2")])
        );
    }

    #[test]
    fn top_level_must_be_a_map() {
        let err = query_pairs(&Param::list([1, 2])).unwrap_err();
        assert!(matches!(err, EncodingError::NotAMap { found: "list" }));
    }

    #[test]
    fn form_body_round_trips_flat_map() {
        let body = form_body(&Param::map([("x", "y")])).unwrap();
        assert_eq!(body, b"x=y");

        let decoded: Vec<(String, String)> = form_urlencoded::parse(&body).into_owned().collect();
        assert_eq!(decoded, pairs(&[("x", "y")]));
    }

    #[test]
    fn form_body_percent_encodes() {
        let body = form_body(&Param::map([("user", Param::map([("nome", "a b&c")]))])).unwrap();
        assert_eq!(String::from_utf8(body).unwrap(), "user%5Bnome%5D=a+b%26c");
    }

    #[test]
    fn json_body_keeps_booleans() {
        let body = json_body(&Param::map([("flag", true)])).unwrap();
        assert_eq!(body, br#"{"flag":true}"#);
    }

    #[test]
    fn append_query_keeps_existing_items_first() {
        let mut url = Url::parse("http://test.url/get?page=2").unwrap();
        append_query(&mut url, &pairs(&[("q", "rust"), ("tag[]", "a")]));

        let items: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(items, pairs(&[("page", "2"), ("q", "rust"), ("tag[]", "a")]));
    }

    #[test]
    fn append_query_without_pairs_leaves_url_untouched() {
        let mut url = Url::parse("http://test.url/get").unwrap();
        append_query(&mut url, &[]);
        assert_eq!(url.as_str(), "http://test.url/get");
    }

    #[test]
    fn none_mode_encodes_nothing() {
        let encoded = encode(&Param::map([("a", 1)]), ParameterEncoding::None).unwrap();
        assert_eq!(encoded, Encoded::Nothing);
    }
}
