//! Typed codec for `serde` types.
//!
//! Values are bridged through `ciborium::Value`, which keeps the data model
//! identical to the one used for canonical CBOR elsewhere in the stack.

use crate::codec::Codec;
use crate::error::{join_field, join_index, ValidationError, ValidationResult, Violation};
use crate::value::Value;
use ciborium::Value as Cbor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::type_name;
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// Codec for any type that implements `Serialize` and `DeserializeOwned`.
///
/// Decoding fails when the stored value cannot be deserialized into `T`
/// (missing fields, wrong kinds, ...). Encoding fails when `T` serializes to
/// something a [`Value`] cannot hold, such as a map with non-text keys or an
/// integer outside the `i64` range.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use shapedb_codec::{Codec, SerdeCodec, Value};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// let codec = SerdeCodec::<User>::new();
/// let raw = codec.encode(&User { id: 1, name: "James".into() }).unwrap();
/// assert_eq!(raw.get("name"), Some(&Value::from("James")));
///
/// assert!(codec.decode(&Value::record([("id", Value::from(1))])).is_err());
/// ```
pub struct SerdeCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeCodec<T> {
    /// Creates the codec.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SerdeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SerdeCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for SerdeCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SerdeCodec<{}>", type_name::<T>())
    }
}

impl<T> Codec for SerdeCodec<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    type Output = T;

    fn describe(&self) -> String {
        type_name::<T>().to_string()
    }

    fn decode(&self, raw: &Value) -> ValidationResult<T> {
        to_cbor(raw)
            .deserialized::<T>()
            .map_err(|e| ValidationError::single("", type_name::<T>(), format!("{} ({e})", raw.describe())))
    }

    fn encode(&self, value: &T) -> ValidationResult<Value> {
        let cbor = Cbor::serialized(value)
            .map_err(|e| ValidationError::single("", type_name::<T>(), e.to_string()))?;
        let mut violations = Vec::new();
        let converted = from_cbor(cbor, "", &mut violations);
        if violations.is_empty() {
            Ok(converted)
        } else {
            Err(ValidationError::new(violations))
        }
    }
}

fn to_cbor(value: &Value) -> Cbor {
    match value {
        Value::Null => Cbor::Null,
        Value::Bool(b) => Cbor::Bool(*b),
        Value::Integer(n) => Cbor::Integer((*n).into()),
        Value::Float(n) => Cbor::Float(*n),
        Value::Text(s) => Cbor::Text(s.clone()),
        Value::Bytes(b) => Cbor::Bytes(b.clone()),
        Value::Array(items) => Cbor::Array(items.iter().map(to_cbor).collect()),
        Value::Map(fields) => Cbor::Map(
            fields
                .iter()
                .map(|(k, v)| (Cbor::Text(k.clone()), to_cbor(v)))
                .collect(),
        ),
    }
}

fn from_cbor(cbor: Cbor, path: &str, out: &mut Vec<Violation>) -> Value {
    match cbor {
        Cbor::Null => Value::Null,
        Cbor::Bool(b) => Value::Bool(b),
        Cbor::Integer(n) => match i64::try_from(n) {
            Ok(n) => Value::Integer(n),
            Err(_) => {
                out.push(Violation::new(
                    path,
                    "integer in i64 range",
                    format!("integer {}", i128::from(n)),
                ));
                Value::Null
            }
        },
        Cbor::Float(n) => Value::Float(n),
        Cbor::Text(s) => Value::Text(s),
        Cbor::Bytes(b) => Value::Bytes(b),
        Cbor::Tag(_, inner) => from_cbor(*inner, path, out),
        Cbor::Array(items) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| from_cbor(item, &join_index(path, i), out))
                .collect(),
        ),
        Cbor::Map(entries) => {
            let mut fields = BTreeMap::new();
            for (key, value) in entries {
                match key {
                    Cbor::Text(name) => {
                        let converted = from_cbor(value, &join_field(path, &name), out);
                        fields.insert(name, converted);
                    }
                    other => out.push(Violation::new(
                        path,
                        "text field name",
                        format!("{other:?}"),
                    )),
                }
            }
            Value::Map(fields)
        }
        other => {
            out.push(Violation::new(path, "value", format!("{other:?}")));
            Value::Null
        }
    }
}
