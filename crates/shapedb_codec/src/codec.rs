//! The codec capability.

use crate::error::{ValidationError, ValidationResult};
use crate::value::Value;
use std::any::{Any, TypeId};

/// A validator that converts between stored values and application values.
///
/// `decode` must reject any value that does not conform to the declared
/// shape; `encode` may reject application values that cannot be
/// represented. Both failures are validation failures.
///
/// # Example
///
/// ```
/// use shapedb_codec::{Codec, ValidationError, ValidationResult, Value};
///
/// struct Celsius;
///
/// impl Codec for Celsius {
///     type Output = i64;
///
///     fn describe(&self) -> String {
///         "temperature".into()
///     }
///
///     fn decode(&self, raw: &Value) -> ValidationResult<i64> {
///         match raw.as_integer() {
///             Some(t) if t >= -273 => Ok(t),
///             _ => Err(ValidationError::single("", "temperature", raw.describe())),
///         }
///     }
///
///     fn encode(&self, value: &i64) -> ValidationResult<Value> {
///         Ok(Value::Integer(*value))
///     }
/// }
///
/// assert_eq!(Celsius.decode(&Value::from(20)), Ok(20));
/// assert!(Celsius.decode(&Value::from(-300)).is_err());
/// ```
pub trait Codec: Send + Sync + 'static {
    /// The application-side type produced by `decode`.
    type Output: Send + 'static;

    /// Describes the accepted shape, for error messages and diagnostics.
    fn describe(&self) -> String;

    /// Validates a stored value and converts it.
    fn decode(&self, raw: &Value) -> ValidationResult<Self::Output>;

    /// Converts an application value into its stored form.
    fn encode(&self, value: &Self::Output) -> ValidationResult<Value>;
}

/// Decodes every element of a sequence with one codec.
///
/// Fails if any element fails; the error carries the violations of every
/// failing element, each prefixed with its index.
pub fn decode_all<C: Codec + ?Sized>(codec: &C, raws: &[Value]) -> ValidationResult<Vec<C::Output>> {
    let mut decoded = Vec::with_capacity(raws.len());
    let mut failure: Option<ValidationError> = None;

    for (index, raw) in raws.iter().enumerate() {
        match codec.decode(raw) {
            Ok(value) => decoded.push(value),
            Err(err) => {
                let err = err.at_index(index);
                match failure.as_mut() {
                    Some(f) => f.merge(err),
                    None => failure = Some(err),
                }
            }
        }
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(decoded),
    }
}

/// Object-safe form of [`Codec`].
///
/// Every `Codec` is a `DynCodec`. Schemas hold collections of differently
/// typed codecs through this trait; callers recover the concrete output
/// type by downcasting.
pub trait DynCodec: Send + Sync {
    /// `TypeId` of the codec's output type.
    fn output_type(&self) -> TypeId;

    /// Name of the codec's output type.
    fn output_type_name(&self) -> &'static str;

    /// Describes the accepted shape.
    fn describe_dyn(&self) -> String;

    /// Decodes a stored value into a boxed output value.
    fn decode_dyn(&self, raw: &Value) -> ValidationResult<Box<dyn Any + Send>>;

    /// Decodes a sequence; see [`decode_all`].
    fn decode_all_dyn(&self, raws: &[Value]) -> ValidationResult<Vec<Box<dyn Any + Send>>>;

    /// Encodes an output value. Values of any other type are rejected.
    fn encode_dyn(&self, value: &dyn Any) -> ValidationResult<Value>;
}

impl<C: Codec> DynCodec for C {
    fn output_type(&self) -> TypeId {
        TypeId::of::<C::Output>()
    }

    fn output_type_name(&self) -> &'static str {
        std::any::type_name::<C::Output>()
    }

    fn describe_dyn(&self) -> String {
        self.describe()
    }

    fn decode_dyn(&self, raw: &Value) -> ValidationResult<Box<dyn Any + Send>> {
        let value = self.decode(raw)?;
        Ok(Box::new(value))
    }

    fn decode_all_dyn(&self, raws: &[Value]) -> ValidationResult<Vec<Box<dyn Any + Send>>> {
        let values = decode_all(self, raws)?;
        Ok(values
            .into_iter()
            .map(|v| Box::new(v) as Box<dyn Any + Send>)
            .collect())
    }

    fn encode_dyn(&self, value: &dyn Any) -> ValidationResult<Value> {
        match value.downcast_ref::<C::Output>() {
            Some(v) => self.encode(v),
            None => Err(ValidationError::single(
                "",
                std::any::type_name::<C::Output>(),
                "a value of another type",
            )),
        }
    }
}
