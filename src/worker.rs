//! Single-worker task for the user store.
//!
//! This module provides the `StoreCommand` enum and the `StoreHandle` that the
//! dispatcher uses to submit operations to the worker task via a bounded
//! `tokio::mpsc` channel. The worker task owns the [`Store`] and processes one
//! command at a time to completion, so no load-mutate-save cycle can ever
//! interleave with another -- the lost-update race is structurally impossible.

use crate::error::Error;
use crate::store::Store;
use crate::types::User;

/// One store operation, sent to the worker task via the mpsc channel.
///
/// Each variant carries the operation's arguments and a oneshot channel for
/// sending the result back to the caller.
pub enum StoreCommand {
    /// Append a new record with a store-assigned id.
    Create {
        /// Name for the new record.
        name: String,
        /// Oneshot channel for sending the result back to the caller.
        reply: tokio::sync::oneshot::Sender<Result<User, Error>>,
    },
    /// Replace the name of an existing record. `None` means the id was absent.
    Update {
        /// Id of the record to update.
        id: u64,
        /// Replacement name.
        name: String,
        /// Oneshot channel for sending the result back to the caller.
        reply: tokio::sync::oneshot::Sender<Result<Option<User>, Error>>,
    },
    /// Remove a record. `false` means the id was absent.
    Delete {
        /// Id of the record to remove.
        id: u64,
        /// Oneshot channel for sending the result back to the caller.
        reply: tokio::sync::oneshot::Sender<Result<bool, Error>>,
    },
    /// Read the full collection.
    List {
        /// Oneshot channel for sending the result back to the caller.
        reply: tokio::sync::oneshot::Sender<Result<Vec<User>, Error>>,
    },
}

impl StoreCommand {
    /// The operation name, for logging.
    fn op(&self) -> &'static str {
        match self {
            StoreCommand::Create { .. } => "create",
            StoreCommand::Update { .. } => "update",
            StoreCommand::Delete { .. } => "delete",
            StoreCommand::List { .. } => "list",
        }
    }
}

/// Cloneable handle for submitting operations to the store worker task.
///
/// The dispatcher holds a `StoreHandle` and calls the async operation methods
/// to enqueue work. The worker task processes commands sequentially on the
/// other end of the bounded channel. Cloning a handle produces a second sender
/// into the same channel, so multiple callers may submit concurrently; their
/// commands still execute one at a time.
#[derive(Clone)]
pub struct StoreHandle {
    /// Sender half of the bounded mpsc channel to the worker task.
    tx: tokio::sync::mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    /// Submit a command and await the reply over the provided oneshot.
    ///
    /// If the channel is closed (worker shut down) or the worker drops the
    /// reply sender, returns `Error::InvalidArgument("store worker closed")`.
    async fn submit<T>(
        &self,
        command: StoreCommand,
        reply_rx: tokio::sync::oneshot::Receiver<Result<T, Error>>,
    ) -> Result<T, Error> {
        self.tx
            .send(command)
            .await
            .map_err(|_| Error::InvalidArgument("store worker closed".into()))?;

        reply_rx
            .await
            .map_err(|_| Error::InvalidArgument("store worker closed".into()))?
    }

    /// Create a record with a fresh unique id. See [`Store::create`].
    pub async fn create(&self, name: String) -> Result<User, Error> {
        let (reply, reply_rx) = tokio::sync::oneshot::channel();
        self.submit(StoreCommand::Create { name, reply }, reply_rx)
            .await
    }

    /// Replace the name of an existing record. See [`Store::update`].
    pub async fn update(&self, id: u64, name: String) -> Result<Option<User>, Error> {
        let (reply, reply_rx) = tokio::sync::oneshot::channel();
        self.submit(StoreCommand::Update { id, name, reply }, reply_rx)
            .await
    }

    /// Remove a record. See [`Store::delete`].
    pub async fn delete(&self, id: u64) -> Result<bool, Error> {
        let (reply, reply_rx) = tokio::sync::oneshot::channel();
        self.submit(StoreCommand::Delete { id, reply }, reply_rx)
            .await
    }

    /// Read the full collection. See [`Store::load`].
    pub async fn list(&self) -> Result<Vec<User>, Error> {
        let (reply, reply_rx) = tokio::sync::oneshot::channel();
        self.submit(StoreCommand::List { reply }, reply_rx).await
    }
}

/// Run the worker task loop.
///
/// Receives `StoreCommand`s from the bounded mpsc channel and runs each
/// against the owned `Store` to completion before receiving the next. Every
/// command is an independent load-mutate-save (or load-only) cycle against the
/// file; serial execution here is what upholds the uniqueness and
/// single-well-formed-file invariants under concurrent callers.
///
/// If a reply receiver has been dropped before the result is sent, a
/// `tracing::warn!` is logged and the result is discarded. The loop exits
/// cleanly when all handles are dropped (`rx.recv()` returns `None`).
pub(crate) async fn run_store(mut store: Store, mut rx: tokio::sync::mpsc::Receiver<StoreCommand>) {
    while let Some(command) = rx.recv().await {
        let op = command.op();
        let dropped = match command {
            StoreCommand::Create { name, reply } => reply.send(store.create(&name)).is_err(),
            StoreCommand::Update { id, name, reply } => {
                reply.send(store.update(id, &name)).is_err()
            }
            StoreCommand::Delete { id, reply } => reply.send(store.delete(id)).is_err(),
            StoreCommand::List { reply } => reply.send(store.load()).is_err(),
        };

        if dropped {
            tracing::warn!(operation = op, "store worker: reply receiver dropped");
        }
    }
    // Channel closed -- all StoreHandle senders have been dropped. Exit cleanly.
}

/// Spawn the store worker task on the tokio runtime.
///
/// Creates a bounded mpsc channel, moves the store into the spawned task, and
/// returns the handle for submitting commands plus the `JoinHandle` to await
/// graceful shutdown.
///
/// # Arguments
///
/// * `store` - The storage engine to move into the worker task.
/// * `channel_capacity` - Bound on the mpsc channel. Controls backpressure.
pub fn spawn_store(
    store: Store,
    channel_capacity: usize,
) -> (StoreHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = tokio::sync::mpsc::channel(channel_capacity);
    let handle = StoreHandle { tx };
    let join_handle = tokio::spawn(run_store(store, rx));
    (handle, join_handle)
}
