//! Filesystem Store
//!
//! System of record for sample bytes. Layout below the store root:
//!
//! ```text
//! <root>/
//! ├── <preset folder>/
//! │   ├── kick.wav
//! │   └── snare.wav
//! └── <preset folder>/
//! ```
//!
//! Folder and file arguments are single path components produced by the
//! name codec; adapters reject anything else.

use async_trait::async_trait;
use thiserror::Error;

pub mod local;

pub use local::LocalFileStore;

/// Filesystem Store errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Target of a create or rename is already taken
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid path component '{0}'")]
    InvalidPath(String),

    #[error("Filesystem call timed out")]
    Timeout,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Write a new sample file, creating the folder if needed. Never
    /// overwrites: `AlreadyExists` if the file is present.
    async fn write_sample(&self, folder: &str, filename: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Replace the contents of a sample file (or create it). The new bytes
    /// become visible all at once.
    async fn overwrite_sample(&self, folder: &str, filename: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Remove a sample file; a missing file is not an error
    async fn remove_sample(&self, folder: &str, filename: &str) -> StorageResult<()>;

    /// Rename a sample file within its folder, refusing to overwrite
    async fn rename_sample(&self, folder: &str, from: &str, to: &str) -> StorageResult<()>;

    async fn sample_exists(&self, folder: &str, filename: &str) -> StorageResult<bool>;

    async fn folder_exists(&self, folder: &str) -> StorageResult<bool>;

    /// Rename a preset folder, refusing to overwrite
    async fn rename_folder(&self, from: &str, to: &str) -> StorageResult<()>;

    /// Recursively remove a preset folder; a missing folder is not an error
    async fn remove_folder(&self, folder: &str) -> StorageResult<()>;

    /// Preset folders below the root (hidden entries excluded)
    async fn list_folders(&self) -> StorageResult<Vec<String>>;

    /// Sample files in a folder (hidden entries excluded)
    async fn list_samples(&self, folder: &str) -> StorageResult<Vec<String>>;
}
