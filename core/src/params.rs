//! The parameter tree carried by a request payload.
//!
//! # Design
//! `Param` is a closed sum type, so the encoders in `encoding` match on it
//! exhaustively. Maps are `BTreeMap`s: flattened query strings and form
//! bodies come out in key order, which keeps them reproducible.
//!
//! Any `Serialize` value can be lifted into a tree with
//! [`Param::from_serialize`]; values without a parameter representation
//! (`null`, non-finite floats) are rejected there rather than at send time.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Number, Value};

use crate::error::EncodingError;

/// A recursive request parameter: string, number, boolean, map or list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Param {
    String(String),
    Number(Number),
    Bool(bool),
    Map(BTreeMap<String, Param>),
    List(Vec<Param>),
}

impl Param {
    /// Build a map from `(key, value)` pairs. Later duplicates win.
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Param>,
    {
        Param::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a list, preserving element order.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Param>,
    {
        Param::List(items.into_iter().map(Into::into).collect())
    }

    /// Convert any serializable value into a parameter tree.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, EncodingError> {
        let json = serde_json::to_value(value)?;
        Param::try_from(json)
    }

    /// Float parameter. Fails for NaN and infinities, which have no JSON or
    /// query representation.
    pub fn float(value: f64) -> Result<Self, EncodingError> {
        Number::from_f64(value)
            .map(Param::Number)
            .ok_or_else(|| EncodingError::UnsupportedValue(value.to_string()))
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Param::String(_) => "string",
            Param::Number(_) => "number",
            Param::Bool(_) => "boolean",
            Param::Map(_) => "map",
            Param::List(_) => "list",
        }
    }
}

impl TryFrom<Value> for Param {
    type Error = EncodingError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Ok(match value {
            Value::Null => return Err(EncodingError::UnsupportedValue("null".to_string())),
            Value::Bool(b) => Param::Bool(b),
            Value::Number(n) => Param::Number(n),
            Value::String(s) => Param::String(s),
            Value::Array(items) => Param::List(
                items
                    .into_iter()
                    .map(Param::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => Param::Map(
                map.into_iter()
                    .map(|(k, v)| Param::try_from(v).map(|param| (k, param)))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::String(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::String(value)
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Param::Bool(value)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Param {
                fn from(value: $ty) -> Self {
                    Param::Number(Number::from(value))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl<V: Into<Param>> From<Vec<V>> for Param {
    fn from(items: Vec<V>) -> Self {
        Param::list(items)
    }
}

impl From<BTreeMap<String, Param>> for Param {
    fn from(map: BTreeMap<String, Param>) -> Self {
        Param::Map(map)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn from_serialize_struct() {
        #[derive(Serialize)]
        struct Login<'a> {
            user: &'a str,
            remember: bool,
            attempts: u32,
        }

        let param = Param::from_serialize(&Login {
            user: "alfredo",
            remember: true,
            attempts: 3,
        })
        .unwrap();

        assert_eq!(
            param,
            Param::map([
                ("user", Param::from("alfredo")),
                ("remember", Param::from(true)),
                ("attempts", Param::from(3)),
            ])
        );
    }

    #[test]
    fn from_serialize_rejects_null() {
        let err = Param::from_serialize(&json!({ "a": null })).unwrap_err();
        assert!(matches!(err, EncodingError::UnsupportedValue(v) if v == "null"));
    }

    #[test]
    fn float_rejects_nan() {
        assert!(Param::float(f64::NAN).is_err());
        assert!(Param::float(f64::INFINITY).is_err());
        assert_eq!(Param::float(2.5).unwrap(), Param::Number(Number::from_f64(2.5).unwrap()));
    }

    #[test]
    fn nested_conversion_keeps_list_order() {
        let param = Param::try_from(json!({ "array": ["valor2", "valor1"] })).unwrap();
        let Param::Map(map) = param else {
            panic!("expected map");
        };
        assert_eq!(map["array"], Param::list(["valor2", "valor1"]));
    }

    #[test]
    fn serializes_as_plain_json() {
        let param = Param::map([
            ("bool", Param::from(true)),
            ("numero", Param::from(10)),
            ("user", Param::map([("nome", "alfredo")])),
        ]);
        assert_eq!(
            serde_json::to_value(&param).unwrap(),
            json!({ "bool": true, "numero": 10, "user": { "nome": "alfredo" } })
        );
    }

    #[test]
    fn kind_names() {
        assert_eq!(Param::from("x").kind(), "string");
        assert_eq!(Param::list(Vec::<Param>::new()).kind(), "list");
    }
}
