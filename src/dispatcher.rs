//! Operation dispatcher for the user store.
//!
//! This module holds the fixed registry of named operations the store exposes
//! to the transport, the JSON-Schema-style descriptors the transport's
//! capability listing consumes, and the `Dispatcher` that validates argument
//! bundles, invokes the store through the worker handle, and formats
//! structured text responses. Validation runs before any store access, so the
//! store is never invoked with an invalid bundle.

use metrics::counter;
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::Error;
use crate::types::User;
use crate::worker::StoreHandle;

/// Declaration of one named operation: its name, a human-readable
/// description, and a JSON-Schema-style object describing the required
/// argument fields and their primitive types.
#[derive(Debug, Clone, Serialize)]
pub struct OperationDescriptor {
    /// Operation name as invoked by the transport.
    pub name: &'static str,
    /// Human-readable description for capability listings.
    pub description: &'static str,
    /// JSON-Schema-style argument declaration.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// The operation catalog: all four operations, in registry order.
///
/// Consumed by the transport's capability/tool-listing mechanism. A single
/// implicit schema version -- there is no versioning field.
pub fn catalog() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor {
            name: "createUser",
            description: "Create a new user",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Name of the user" }
                },
                "required": ["name"]
            }),
        },
        OperationDescriptor {
            name: "updateUser",
            description: "Update the name of an existing user",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "id": { "type": "integer" },
                    "name": { "type": "string" }
                },
                "required": ["id", "name"]
            }),
        },
        OperationDescriptor {
            name: "deleteUser",
            description: "Delete a user by id",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "id": { "type": "integer" }
                },
                "required": ["id"]
            }),
        },
        OperationDescriptor {
            name: "getAllUsers",
            description: "Fetch the full list of users",
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
    ]
}

/// A structured text response to one operation.
///
/// `text` embeds the affected record or collection on success, or a
/// recognizable marker otherwise. `is_error` is `true` for validation,
/// corrupt-state, I/O, and unknown-operation payloads -- but `false` for
/// not-found, which the contract treats as a normal result distinct from
/// success.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResponse {
    /// Payload text.
    pub text: String,
    /// Whether this payload reports a failed operation.
    pub is_error: bool,
}

impl ToolResponse {
    /// A normal (non-error) payload.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    /// An error payload.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// Maps incoming operation names plus argument bundles to store calls and
/// formats the results. Holds only the cloneable worker handle.
pub struct Dispatcher {
    /// Handle for submitting operations to the store worker task.
    store: StoreHandle,
}

impl Dispatcher {
    /// Create a new `Dispatcher` over the given store handle.
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Validate and execute one named operation.
    ///
    /// Never panics and never returns a transport-terminating condition:
    /// every failure mode is folded into a `ToolResponse` scoped to this one
    /// operation.
    pub async fn dispatch(&self, operation: &str, args: &Value) -> ToolResponse {
        // Unknown names share one counter label to bound cardinality.
        let label = match operation {
            "createUser" | "updateUser" | "deleteUser" | "getAllUsers" => operation.to_string(),
            _ => "unknown".to_string(),
        };
        counter!("user_store_requests_total", "operation" => label).increment(1);

        match operation {
            "createUser" => self.create_user(args).await,
            "updateUser" => self.update_user(args).await,
            "deleteUser" => self.delete_user(args).await,
            "getAllUsers" => self.get_all_users().await,
            other => error_response(&Error::UnknownOperation {
                name: other.to_string(),
            }),
        }
    }

    async fn create_user(&self, args: &Value) -> ToolResponse {
        let name = match require_string(args, "name") {
            Ok(name) => name,
            Err(e) => return error_response(&e),
        };

        match self.store.create(name).await {
            Ok(user) => record_response("created user", &user),
            Err(e) => error_response(&e),
        }
    }

    async fn update_user(&self, args: &Value) -> ToolResponse {
        let id = match require_id(args, "id") {
            Ok(id) => id,
            Err(e) => return error_response(&e),
        };
        let name = match require_string(args, "name") {
            Ok(name) => name,
            Err(e) => return error_response(&e),
        };

        match self.store.update(id, name).await {
            Ok(Some(user)) => record_response("updated user", &user),
            Ok(None) => not_found(id),
            Err(e) => error_response(&e),
        }
    }

    async fn delete_user(&self, args: &Value) -> ToolResponse {
        let id = match require_id(args, "id") {
            Ok(id) => id,
            Err(e) => return error_response(&e),
        };

        match self.store.delete(id).await {
            Ok(true) => ToolResponse::text(format!("deleted user: {id}")),
            Ok(false) => not_found(id),
            Err(e) => error_response(&e),
        }
    }

    async fn get_all_users(&self) -> ToolResponse {
        match self.store.list().await {
            Ok(users) => match serde_json::to_string_pretty(&users) {
                Ok(body) => ToolResponse::text(body),
                Err(e) => ToolResponse::error(format!("failed to serialize collection: {e}")),
            },
            Err(e) => error_response(&e),
        }
    }
}

/// The distinct not-found payload. A normal result, not an error: the caller
/// asked about an id that simply is not in the collection.
fn not_found(id: u64) -> ToolResponse {
    ToolResponse::text(format!("user not found: {id}"))
}

/// Success payload embedding the affected record as compact JSON after a
/// stable marker, e.g. `created user: {"id":1,"name":"Alice"}`.
fn record_response(marker: &str, user: &User) -> ToolResponse {
    match serde_json::to_string(user) {
        Ok(body) => ToolResponse::text(format!("{marker}: {body}")),
        Err(e) => ToolResponse::error(format!("failed to serialize record: {e}")),
    }
}

/// Map a store or protocol error to an error payload.
fn error_response(err: &Error) -> ToolResponse {
    ToolResponse::error(err.to_string())
}

/// Extract a required string field from the argument bundle.
///
/// Presence and primitive type are checked, nothing else; an empty string is
/// a valid name.
fn require_string(args: &Value, field: &str) -> Result<String, Error> {
    match args.get(field) {
        None => Err(Error::InvalidArgument(format!(
            "missing required field \"{field}\""
        ))),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(Error::InvalidArgument(format!(
            "field \"{field}\" must be a string"
        ))),
    }
}

/// Extract a required integer id field from the argument bundle.
///
/// Rejects non-numbers, floats, and negative values -- ids are non-negative
/// integers.
fn require_id(args: &Value, field: &str) -> Result<u64, Error> {
    match args.get(field) {
        None => Err(Error::InvalidArgument(format!(
            "missing required field \"{field}\""
        ))),
        Some(v) => v.as_u64().ok_or_else(|| {
            Error::InvalidArgument(format!("field \"{field}\" must be a non-negative integer"))
        }),
    }
}
