//! # ShapeDB Codec
//!
//! Dynamic values and shape-checking codecs for ShapeDB.
//!
//! Everything that crosses the storage boundary is a [`Value`]. A
//! [`Codec`] turns a stored value into an application value (`decode`) and
//! back (`encode`), rejecting anything that does not conform to the declared
//! shape with a [`ValidationError`].
//!
//! ## Codecs
//!
//! - [`Shape`] - structural validator over raw values (records, arrays,
//!   optionals, unions, literals)
//! - [`SerdeCodec`] - typed codec for any `serde` type
//!
//! ## Usage
//!
//! ```
//! use shapedb_codec::{Codec, Shape, Value};
//!
//! let user = Shape::record([("id", Shape::Integer), ("name", Shape::Text)]);
//!
//! let ok = Value::record([("id", Value::from(1)), ("name", Value::from("James"))]);
//! assert!(user.decode(&ok).is_ok());
//!
//! let bad = Value::record([("id", Value::from("one"))]);
//! let err = user.decode(&bad).unwrap_err();
//! assert_eq!(err.violations().len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod serde_codec;
mod shape;
mod value;

pub use codec::{decode_all, Codec, DynCodec};
pub use error::{ValidationError, ValidationResult, Violation};
pub use serde_codec::SerdeCodec;
pub use shape::Shape;
pub use value::Value;
