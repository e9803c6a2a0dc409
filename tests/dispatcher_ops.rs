//! Integration tests for the operation dispatcher over a live store worker:
//! the four operation flows, argument validation, unknown operations, and the
//! distinct success / not-found / error payloads.

use serde_json::json;
use user_store::{Dispatcher, Store, User, spawn_store};

/// Helper: spawn a worker over a fresh store and wrap it in a dispatcher.
fn temp_dispatcher() -> (Dispatcher, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let path = dir.path().join("users.json");
    let store = Store::open(&path).expect("Store::open should succeed");
    let (handle, _join_handle) = spawn_store(store, 8);
    (Dispatcher::new(handle), dir)
}

/// Helper: parse the record JSON out of a `<marker>: {...}` success payload.
fn record_in(text: &str, marker: &str) -> User {
    let body = text
        .strip_prefix(&format!("{marker}: "))
        .unwrap_or_else(|| panic!("payload should start with '{marker}: ', got: {text}"));
    serde_json::from_str(body).expect("payload suffix should be a record")
}

#[tokio::test]
async fn create_user_returns_created_record() {
    let (dispatcher, _dir) = temp_dispatcher();

    let response = dispatcher
        .dispatch("createUser", &json!({"name": "Alice"}))
        .await;
    assert!(!response.is_error, "unexpected error: {}", response.text);

    let created = record_in(&response.text, "created user");
    assert_eq!(created.name, "Alice");
}

#[tokio::test]
async fn get_all_users_on_fresh_store_is_empty() {
    let (dispatcher, _dir) = temp_dispatcher();

    let response = dispatcher.dispatch("getAllUsers", &json!({})).await;
    assert!(!response.is_error);

    let users: Vec<User> = serde_json::from_str(&response.text).expect("collection should parse");
    assert!(users.is_empty());
}

#[tokio::test]
async fn update_user_round_trip() {
    let (dispatcher, _dir) = temp_dispatcher();

    let created = record_in(
        &dispatcher
            .dispatch("createUser", &json!({"name": "Alice"}))
            .await
            .text,
        "created user",
    );

    let response = dispatcher
        .dispatch("updateUser", &json!({"id": created.id, "name": "Alicia"}))
        .await;
    assert!(!response.is_error, "unexpected error: {}", response.text);

    let updated = record_in(&response.text, "updated user");
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.name, "Alicia");
}

#[tokio::test]
async fn update_unknown_id_is_distinct_not_found() {
    let (dispatcher, _dir) = temp_dispatcher();

    let response = dispatcher
        .dispatch("updateUser", &json!({"id": 999, "name": "x"}))
        .await;

    // Not-found is a normal result, recognizably distinct from success.
    assert!(!response.is_error);
    assert_eq!(response.text, "user not found: 999");
}

#[tokio::test]
async fn delete_user_true_then_false() {
    let (dispatcher, _dir) = temp_dispatcher();

    let created = record_in(
        &dispatcher
            .dispatch("createUser", &json!({"name": "Alice"}))
            .await
            .text,
        "created user",
    );

    let first = dispatcher
        .dispatch("deleteUser", &json!({"id": created.id}))
        .await;
    assert!(!first.is_error);
    assert_eq!(first.text, format!("deleted user: {}", created.id));

    let second = dispatcher
        .dispatch("deleteUser", &json!({"id": created.id}))
        .await;
    assert!(!second.is_error);
    assert_eq!(second.text, format!("user not found: {}", created.id));
}

#[tokio::test]
async fn validation_failure_precedes_store_access() {
    let (dispatcher, _dir) = temp_dispatcher();

    let cases = [
        ("createUser", json!({}), "name"),
        ("createUser", json!({"name": 7}), "name"),
        ("updateUser", json!({"name": "x"}), "id"),
        ("updateUser", json!({"id": "9", "name": "x"}), "id"),
        ("updateUser", json!({"id": 9}), "name"),
        ("deleteUser", json!({}), "id"),
        ("deleteUser", json!({"id": 1.5}), "id"),
    ];

    for (operation, args, field) in cases {
        let response = dispatcher.dispatch(operation, &args).await;
        assert!(
            response.is_error,
            "{operation} with {args} should be rejected"
        );
        assert!(
            response.text.contains(field),
            "{operation} rejection should name \"{field}\": {}",
            response.text
        );
    }

    // None of the rejected bundles reached the store.
    let listed = dispatcher.dispatch("getAllUsers", &json!({})).await;
    let users: Vec<User> = serde_json::from_str(&listed.text).expect("collection should parse");
    assert!(users.is_empty(), "rejected operations must not mutate");
}

#[tokio::test]
async fn unknown_operation_is_distinct_and_non_fatal() {
    let (dispatcher, _dir) = temp_dispatcher();

    let response = dispatcher.dispatch("dropAllUsers", &json!({})).await;
    assert!(response.is_error);
    assert_eq!(response.text, "unrecognized operation: dropAllUsers");

    // The dispatcher keeps serving after an unknown name.
    let next = dispatcher
        .dispatch("createUser", &json!({"name": "Alice"}))
        .await;
    assert!(!next.is_error);
}

#[tokio::test]
async fn scenario_create_list_delete_list() {
    let (dispatcher, _dir) = temp_dispatcher();

    let bob = record_in(
        &dispatcher
            .dispatch("createUser", &json!({"name": "Bob"}))
            .await
            .text,
        "created user",
    );
    let carol = record_in(
        &dispatcher
            .dispatch("createUser", &json!({"name": "Carol"}))
            .await
            .text,
        "created user",
    );
    assert_ne!(bob.id, carol.id, "same-instant creates must not collide");

    let both = dispatcher.dispatch("getAllUsers", &json!({})).await;
    let users: Vec<User> = serde_json::from_str(&both.text).expect("collection should parse");
    assert_eq!(users.len(), 2);

    let deleted = dispatcher
        .dispatch("deleteUser", &json!({"id": bob.id}))
        .await;
    assert_eq!(deleted.text, format!("deleted user: {}", bob.id));

    let remaining = dispatcher.dispatch("getAllUsers", &json!({})).await;
    let users: Vec<User> =
        serde_json::from_str(&remaining.text).expect("collection should parse");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "Carol");
}
