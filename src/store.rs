//! Storage engine for the user store.
//!
//! This module owns the on-disk JSON collection file. It provides methods for
//! opening (or creating) the store and for the record operations: load, save,
//! get-by-id, create, update, delete. Every mutation is a full
//! read-modify-write cycle -- load the current collection from disk, apply the
//! single change, atomically rewrite the whole file -- so each operation
//! observes exactly the collection most recently persisted and no in-memory
//! cache survives across operations.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::types::User;

/// Parse raw file bytes as the persisted collection.
///
/// Any parse failure -- including valid JSON that is not an array of records --
/// is reported as [`Error::CorruptState`]. The caller decides whether that is
/// fatal to the operation or to startup; the file bytes are never touched.
fn parse_collection(data: &[u8]) -> Result<Vec<User>, Error> {
    serde_json::from_slice(data).map_err(|e| Error::CorruptState {
        detail: e.to_string(),
    })
}

/// Serialize and durably write `users` to `path`, replacing prior content.
///
/// The write is atomic with respect to process crash: the collection is
/// serialized to a sibling temporary file, fsynced, then renamed over the
/// target, and the parent directory is fsynced so the rename itself is
/// durable. At every instant the target path holds either the old or the new
/// complete array.
///
/// Output is pretty-printed with 2-space indentation, matching what readers of
/// the file expect; only round-trip fidelity is contractual.
fn write_collection(path: &Path, users: &[User]) -> Result<(), Error> {
    let data = serde_json::to_vec_pretty(users).map_err(std::io::Error::other)?;

    let tmp_name = {
        let mut name = path
            .file_name()
            .expect("store path must name a file")
            .to_os_string();
        name.push(".tmp");
        name
    };
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = File::create(&tmp_path)?;
    file.write_all(&data)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&tmp_path, path)?;

    // Fsync the parent directory so the renamed entry is durable. Without
    // this, a crash after the rename could still resurface the old file.
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)?.sync_all()?;
    }

    Ok(())
}

/// The record store: owns the JSON collection file at a fixed path.
///
/// Holds no record data between operations -- only the path and the id
/// counter. All reads go to disk; all writes replace the file atomically.
///
/// The store itself is not synchronized. Callers that serve operations
/// concurrently must serialize every load-mutate-save cycle; the crate does
/// this by moving the store into the single worker task in [`crate::worker`].
#[derive(Debug)]
pub struct Store {
    /// Path to the JSON collection file.
    path: PathBuf,
    /// Next id to assign. Monotonically increasing within the process,
    /// seeded from the max existing id at open, re-clamped on every create.
    next_id: u64,
}

impl Store {
    /// Open or create the user store at the given file path.
    ///
    /// If the file does not exist, it is created holding an empty collection
    /// (`[]`) with the same durability discipline as every later save, so
    /// first use starts from a well-formed persisted state. If the file
    /// exists, its content is parsed to seed the id counter.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the JSON collection file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read or created.
    /// Returns [`Error::CorruptState`] if an existing file does not parse as
    /// a collection; the content is left untouched for inspection rather than
    /// reset to `[]`.
    pub fn open(path: &Path) -> Result<Store, Error> {
        if !path.exists() {
            write_collection(path, &[])?;
            tracing::info!(path = %path.display(), "Initialized empty collection");
            return Ok(Store {
                path: path.to_path_buf(),
                next_id: 1,
            });
        }

        let data = std::fs::read(path)?;
        let users = parse_collection(&data)?;
        let next_id = users.iter().map(|u| u.id).max().map_or(1, |max| max + 1);

        Ok(Store {
            path: path.to_path_buf(),
            next_id,
        })
    }

    /// Read and deserialize the persisted collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read (permissions, or the
    /// file was deleted out from under the store).
    /// Returns [`Error::CorruptState`] if the content is not a well-formed
    /// collection.
    pub fn load(&self) -> Result<Vec<User>, Error> {
        let data = std::fs::read(&self.path)?;
        parse_collection(&data)
    }

    /// Serialize and durably write the full collection, replacing prior
    /// content. See [`write_collection`] for the atomicity discipline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if any write, fsync, or rename fails.
    pub fn save(&self, users: &[User]) -> Result<(), Error> {
        write_collection(&self.path, users)
    }

    /// Find a record by id via a linear scan of the freshly loaded collection.
    ///
    /// Returns `Ok(None)` when no record has the id. By the uniqueness
    /// invariant the first match is the only match.
    pub fn get_by_id(&self, id: u64) -> Result<Option<User>, Error> {
        Ok(self.load()?.into_iter().find(|u| u.id == id))
    }

    /// Create a record with a fresh unique id and persist the grown
    /// collection.
    ///
    /// The id is the process-local counter clamped to one above the max id
    /// present in the loaded collection. The clamp keeps ids unique even when
    /// the file gained records the counter never saw (external edits), and
    /// the counter keeps rapid successive creates collision-free within the
    /// process -- no wall-clock involvement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] / [`Error::CorruptState`] from the underlying
    /// load or save; the collection is unchanged on error.
    pub fn create(&mut self, name: &str) -> Result<User, Error> {
        let mut users = self.load()?;

        let floor = users.iter().map(|u| u.id).max().map_or(1, |max| max + 1);
        let id = self.next_id.max(floor);

        let user = User {
            id,
            name: name.to_string(),
        };
        users.push(user.clone());
        self.save(&users)?;

        // Advance only after a durable save; a failed save must not burn ids.
        self.next_id = id + 1;
        Ok(user)
    }

    /// Replace the name of the record with the given id and persist the full
    /// collection.
    ///
    /// Returns `Ok(None)` -- not an error -- when no record has the id; the
    /// collection is not rewritten in that case.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] / [`Error::CorruptState`] from the underlying
    /// load or save.
    pub fn update(&mut self, id: u64, name: &str) -> Result<Option<User>, Error> {
        let mut users = self.load()?;

        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.name = name.to_string();
        let updated = user.clone();

        self.save(&users)?;
        Ok(Some(updated))
    }

    /// Remove the record with the given id, if present, and persist the
    /// reduced collection.
    ///
    /// Returns whether a removal occurred. `Ok(false)` means the id was
    /// absent and the file was not rewritten.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] / [`Error::CorruptState`] from the underlying
    /// load or save.
    pub fn delete(&mut self, id: u64) -> Result<bool, Error> {
        let mut users = self.load()?;

        let before = users.len();
        users.retain(|u| u.id != id);
        if users.len() == before {
            return Ok(false);
        }

        self.save(&users)?;
        Ok(true)
    }
}
