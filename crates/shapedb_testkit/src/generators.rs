//! Property-based test generators using proptest.
//!
//! Provides strategies for generating records that do, or deliberately do
//! not, match the fixture schemas.

use crate::fixtures::User;
use proptest::prelude::*;
use shapedb_codec::Value;
use shapedb_storage::Key;
use std::collections::BTreeMap;

/// Strategy for generating user names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][a-z]{0,15}").expect("Invalid regex")
}

/// Strategy for generating a [`User`].
pub fn user_strategy() -> impl Strategy<Value = User> {
    (any::<i64>(), name_strategy()).prop_map(|(id, name)| User { id, name })
}

/// Strategy for generating users with distinct ids.
pub fn distinct_users_strategy(max: usize) -> impl Strategy<Value = Vec<User>> {
    prop::collection::btree_map(any::<i64>(), name_strategy(), 0..max)
        .prop_map(|users| users.into_iter().map(|(id, name)| User { id, name }).collect())
}

/// Strategy for generating values accepted by the user shape.
///
/// Some values carry extra fields, which the shape allows.
pub fn user_value_strategy() -> impl Strategy<Value = Value> {
    (
        any::<i64>(),
        name_strategy(),
        prop::option::of(any::<bool>()),
    )
        .prop_map(|(id, name, extra)| {
            let mut fields = BTreeMap::new();
            fields.insert("id".to_string(), Value::from(id));
            fields.insert("name".to_string(), Value::from(name));
            if let Some(flag) = extra {
                fields.insert("active".to_string(), Value::from(flag));
            }
            Value::Map(fields)
        })
}

/// Strategy for generating values rejected by the user shape, all with a
/// usable integer `id`.
pub fn invalid_user_value_strategy() -> impl Strategy<Value = Value> {
    let id = any::<i64>();
    prop_oneof![
        // Missing name.
        id.prop_map(|id| Value::record([("id", Value::from(id))])),
        // Name of the wrong kind.
        (any::<i64>(), any::<i64>())
            .prop_map(|(id, n)| Value::record([("id", Value::from(id)), ("name", Value::from(n))])),
        // Null name.
        any::<i64>().prop_map(|id| Value::record([("id", Value::from(id)), ("name", Value::Null)])),
    ]
}

/// Strategy for generating primary keys.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    let leaf = prop_oneof![
        any::<i64>().prop_map(Key::Integer),
        (-1.0e9f64..1.0e9).prop_map(Key::from),
        "[a-z]{0,8}".prop_map(Key::Text),
        prop::collection::vec(any::<u8>(), 0..8).prop_map(Key::Bytes),
    ];
    leaf.prop_recursive(2, 8, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(Key::Array)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::user_shape;

    proptest! {
        #[test]
        fn generated_user_values_match_shape(value in user_value_strategy()) {
            prop_assert!(user_shape().accepts(&value));
        }

        #[test]
        fn generated_invalid_values_fail_shape(value in invalid_user_value_strategy()) {
            prop_assert!(!user_shape().accepts(&value));
        }

        #[test]
        fn distinct_users_have_distinct_ids(users in distinct_users_strategy(16)) {
            let mut ids: Vec<_> = users.iter().map(|u| u.id).collect();
            ids.dedup();
            prop_assert_eq!(ids.len(), users.len());
        }

        #[test]
        fn keys_roundtrip_through_values(key in key_strategy()) {
            prop_assert_eq!(Key::from_value(&key.to_value()), Some(key));
        }
    }
}
