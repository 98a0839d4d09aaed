//! Metadata Store
//!
//! The catalog of presets: system of record for what exists and what it is
//! called. Two adapters implement [`MetadataStore`]:
//!
//! - [`sqlite::SqliteMetadataStore`]: one row per preset, samples embedded as
//!   a JSON array column
//! - [`memory::InMemoryMetadataStore`]: mutex-guarded list, no persistence
//!
//! Concurrent uploads are serialized by [`MetadataStore::append_sample_if`],
//! a single conditional write. All other mutations are last-write-wins on one
//! resolved document.

use async_trait::async_trait;
use sampler_common::{Preset, PresetFilter, Sample};
use thiserror::Error;

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryMetadataStore;
pub use sqlite::SqliteMetadataStore;

/// Metadata Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique preset name collision
    #[error("Preset '{0}' already exists")]
    Duplicate(String),

    #[error("Preset '{0}' not found")]
    NotFound(String),

    #[error("Metadata store call timed out")]
    Timeout,

    #[error("Metadata store error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(format!("corrupt sample list: {}", err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Document store of presets keyed by unique name
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Get a preset by exact name
    async fn get(&self, name: &str) -> StoreResult<Option<Preset>>;

    /// List presets matching the filter, in insertion order
    async fn find(&self, filter: &PresetFilter) -> StoreResult<Vec<Preset>>;

    /// Insert a new preset; `Duplicate` if the name is taken
    async fn insert(&self, preset: &Preset) -> StoreResult<()>;

    /// Append `sample` to the preset's list only if the preset exists, no
    /// sample has the same display name and fewer than `capacity` samples
    /// are present. Returns false when any condition fails.
    async fn append_sample_if(&self, name: &str, sample: &Sample, capacity: usize)
        -> StoreResult<bool>;

    /// Overwrite the document currently named `current_name` with `preset`
    /// (which may carry a new name). `NotFound` if it vanished, `Duplicate`
    /// if the new name is taken.
    async fn replace(&self, current_name: &str, preset: &Preset) -> StoreResult<()>;

    /// Delete by name, returning the removed document
    async fn delete(&self, name: &str) -> StoreResult<Option<Preset>>;

    /// Remove every descriptor whose filename is `filename`. Returns the
    /// updated preset, or None if the preset does not exist.
    async fn remove_sample(&self, name: &str, filename: &str) -> StoreResult<Option<Preset>>;

    /// Insert, or replace all fields except `id`/`createdAt` of the document
    /// with the same name
    async fn upsert(&self, preset: &Preset) -> StoreResult<UpsertOutcome>;
}
