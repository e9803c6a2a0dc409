//! A small durable user-record store exposed through named, schema-declared
//! operations.
//!
//! The [`store::Store`] owns a single JSON collection file and performs every
//! mutation as an atomic full-file rewrite. A single worker task
//! ([`worker::spawn_store`]) serializes all operations; the
//! [`dispatcher::Dispatcher`] validates incoming argument bundles against the
//! declared operation catalog and formats structured responses for an
//! external transport.

pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod store;
pub mod types;
pub mod worker;

pub use dispatcher::{Dispatcher, OperationDescriptor, ToolResponse, catalog};
pub use error::Error;
pub use store::Store;
pub use types::User;
pub use worker::{StoreHandle, spawn_store};
