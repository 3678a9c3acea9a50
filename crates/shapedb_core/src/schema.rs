//! Schema model.
//!
//! A [`Schema`] names a database version and the collections that exist at
//! that version. Each collection is keyed by one field of its records and
//! guarded by a codec.

use crate::error::{CoreError, CoreResult};
use shapedb_codec::{Codec, DynCodec};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Declaration of one collection.
#[derive(Clone)]
pub struct CollectionSpec {
    primary_key: String,
    codec: Arc<dyn DynCodec>,
}

impl CollectionSpec {
    /// Declares a collection keyed by `primary_key` and guarded by `codec`.
    pub fn new<C: Codec>(primary_key: impl Into<String>, codec: C) -> Self {
        Self {
            primary_key: primary_key.into(),
            codec: Arc::new(codec),
        }
    }

    /// Declares a collection from an already shared codec.
    pub fn from_shared(primary_key: impl Into<String>, codec: Arc<dyn DynCodec>) -> Self {
        Self {
            primary_key: primary_key.into(),
            codec,
        }
    }

    /// Name of the field holding each record's key.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// The collection's codec.
    pub fn codec(&self) -> &dyn DynCodec {
        self.codec.as_ref()
    }
}

impl fmt::Debug for CollectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionSpec")
            .field("primary_key", &self.primary_key)
            .field("codec", &self.codec.describe_dyn())
            .finish()
    }
}

/// A versioned set of collection declarations.
///
/// Immutable once built; connections share it through an `Arc`.
///
/// # Example
///
/// ```rust
/// use shapedb_core::{Schema, Shape};
///
/// let schema = Schema::builder(1)
///     .collection("users", "id", Shape::record([("id", Shape::Number), ("name", Shape::Text)]))
///     .build()
///     .unwrap();
///
/// assert_eq!(schema.version(), 1);
/// assert_eq!(schema.find_collection("users").unwrap().primary_key(), "id");
/// assert!(schema.find_collection("posts").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Schema {
    version: u32,
    collections: BTreeMap<String, CollectionSpec>,
}

impl Schema {
    /// Starts a schema at `version`.
    pub fn builder(version: u32) -> SchemaBuilder {
        SchemaBuilder {
            version,
            collections: BTreeMap::new(),
        }
    }

    /// Schema version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Looks up a collection by name.
    pub fn find_collection(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.get(name)
    }

    /// Collection names, sorted.
    pub fn collection_names(&self) -> Vec<&str> {
        self.collections.keys().map(String::as_str).collect()
    }

    /// Iterates over collections in name order.
    pub fn collections(&self) -> impl Iterator<Item = (&str, &CollectionSpec)> {
        self.collections.iter().map(|(name, spec)| (name.as_str(), spec))
    }
}

/// Builder for [`Schema`].
#[derive(Debug)]
#[must_use]
pub struct SchemaBuilder {
    version: u32,
    collections: BTreeMap<String, CollectionSpec>,
}

impl SchemaBuilder {
    /// Declares a collection. A repeated name replaces the earlier
    /// declaration.
    pub fn collection<C: Codec>(
        self,
        name: impl Into<String>,
        primary_key: impl Into<String>,
        codec: C,
    ) -> Self {
        self.spec(name, CollectionSpec::new(primary_key, codec))
    }

    /// Declares a collection from a prepared spec.
    pub fn spec(mut self, name: impl Into<String>, spec: CollectionSpec) -> Self {
        self.collections.insert(name.into(), spec);
        self
    }

    /// Finishes the schema.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` if the version is 0 or a collection has an
    /// empty name or primary key.
    pub fn build(self) -> CoreResult<Schema> {
        if self.version == 0 {
            return Err(CoreError::invalid_schema("version must be at least 1"));
        }
        for (name, spec) in &self.collections {
            if name.is_empty() {
                return Err(CoreError::invalid_schema("collection name is empty"));
            }
            if spec.primary_key.is_empty() {
                return Err(CoreError::invalid_schema(format!(
                    "collection {name} has an empty primary key"
                )));
            }
        }
        Ok(Schema {
            version: self.version,
            collections: self.collections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapedb_codec::{SerdeCodec, Shape, Value};
    use std::any::TypeId;

    #[test]
    fn build_and_lookup() {
        let schema = Schema::builder(2)
            .collection("users", "id", Shape::Any)
            .collection("posts", "slug", SerdeCodec::<String>::new())
            .build()
            .unwrap();

        assert_eq!(schema.version(), 2);
        assert_eq!(schema.collection_names(), vec!["posts", "users"]);

        let posts = schema.find_collection("posts").unwrap();
        assert_eq!(posts.primary_key(), "slug");
        assert_eq!(posts.codec().output_type(), TypeId::of::<String>());

        let users = schema.find_collection("users").unwrap();
        assert_eq!(users.codec().output_type(), TypeId::of::<Value>());
    }

    #[test]
    fn duplicate_name_last_wins() {
        let schema = Schema::builder(1)
            .collection("users", "id", Shape::Any)
            .collection("users", "email", Shape::Any)
            .build()
            .unwrap();
        assert_eq!(schema.collection_names().len(), 1);
        assert_eq!(schema.find_collection("users").unwrap().primary_key(), "email");
    }

    #[test]
    fn empty_schema_is_valid() {
        let schema = Schema::builder(1).build().unwrap();
        assert!(schema.collection_names().is_empty());
        assert_eq!(schema.collections().count(), 0);
    }

    #[test]
    fn rejects_version_zero() {
        let err = Schema::builder(0).build().unwrap_err();
        assert!(matches!(err, CoreError::InvalidSchema { .. }));
    }

    #[test]
    fn rejects_empty_primary_key() {
        let err = Schema::builder(1)
            .collection("users", "", Shape::Any)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("users"));
    }

    #[test]
    fn shared_codec_spec() {
        let codec: Arc<dyn DynCodec> = Arc::new(Shape::Text);
        let schema = Schema::builder(1)
            .spec("a", CollectionSpec::from_shared("k", Arc::clone(&codec)))
            .spec("b", CollectionSpec::from_shared("k", codec))
            .build()
            .unwrap();
        assert_eq!(
            schema.find_collection("b").unwrap().codec().describe_dyn(),
            "string"
        );
        assert!(format!("{:?}", schema.find_collection("a").unwrap()).contains("string"));
    }
}
