//! Benchmark utilities.

#![warn(missing_docs)]

use rand::distributions::Alphanumeric;
use rand::Rng;
use shapedb_codec::Value;
use shapedb_testkit::User;

/// Generate a random alphanumeric name of the specified length.
pub fn random_name(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate users with ids `0..count`.
pub fn generate_users(count: usize) -> Vec<User> {
    (0..count)
        .map(|id| User::new(id as i64, random_name(12)))
        .collect()
}

/// Generate user records as raw values with ids `0..count`.
pub fn generate_user_values(count: usize) -> Vec<Value> {
    generate_users(count)
        .into_iter()
        .map(|u| Value::record([("id", Value::from(u.id)), ("name", Value::from(u.name))]))
        .collect()
}

/// A current-thread runtime for driving async operations from `b.iter`.
pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}
