//! Core domain types for the user store.
//!
//! One record type, one flat collection: the store persists an ordered JSON
//! array of [`User`] records and nothing else.

use serde::{Deserialize, Serialize};

/// A single persisted user record.
///
/// The store assigns `id` at creation time and never reassigns it; `name` is
/// arbitrary UTF-8 text, mutable via update. On disk a record is one JSON
/// object `{"id": <integer>, "name": <string>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Store-assigned unique identifier. Unique across the live collection.
    pub id: u64,
    /// Display name.
    pub name: String,
}
