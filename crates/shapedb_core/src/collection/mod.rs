//! Typed collection API.
//!
//! Provides `Collection<T>`: validated, gate-serialized CRUD over one
//! collection of an open connection.

mod typed;

pub use typed::Collection;
