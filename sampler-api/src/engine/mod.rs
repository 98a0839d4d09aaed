//! Consistency Engine
//!
//! Orchestrates the Metadata Store and the Filesystem Store for every catalog
//! operation. There is no cross-store transaction; each operation follows a
//! fixed step order instead:
//!
//! | Operation      | First step          | Then                 | On second-step failure   |
//! |----------------|---------------------|----------------------|--------------------------|
//! | upload sample  | write file          | conditional append   | delete own file on 409   |
//! | rename preset  | rename folder       | save document        | rename folder back       |
//! | rename sample  | rename file         | save document        | rename file back         |
//! | delete preset  | delete document     | remove folder        | log, keep going          |
//! | delete sample  | remove descriptor   | remove file          | log, keep going          |
//!
//! A failed rollback leaves the stores disagreeing about a name. That is
//! logged under the `irrecoverable` target and surfaced by [`ConsistencyEngine::audit`].

use sampler_common::{naming, Preset, PresetDefinition, PresetFilter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::{CatalogError, CatalogResult};
use crate::storage::{FileStore, StorageError, StorageResult};
use crate::store::{MetadataStore, StoreError, StoreResult};

mod audit;
mod presets;
mod samples;
mod upload;

pub use audit::{DriftReport, MissingFile};
pub use presets::{PresetPatch, UpdateMode};
pub use samples::SampleRename;
pub use upload::SampleUpload;

pub struct ConsistencyEngine {
    metadata: Arc<dyn MetadataStore>,
    files: Arc<dyn FileStore>,
    timeout: Duration,
}

impl ConsistencyEngine {
    pub fn new(metadata: Arc<dyn MetadataStore>, files: Arc<dyn FileStore>, timeout: Duration) -> Self {
        Self {
            metadata,
            files,
            timeout,
        }
    }

    /// Bound a Metadata Store call
    async fn meta<T>(&self, call: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(StoreError::Timeout))
    }

    /// Bound a Filesystem Store call
    async fn fs<T>(&self, call: impl Future<Output = StorageResult<T>>) -> StorageResult<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(StorageError::Timeout))
    }

    pub async fn get_preset(&self, name: &str) -> CatalogResult<Preset> {
        self.meta(self.metadata.get(name))
            .await
            .map_err(|e| metadata_failure("Failed to load preset", e))?
            .ok_or_else(|| CatalogError::NotFound(format!("Preset '{}' not found", name)))
    }

    pub async fn list_presets(&self, filter: &PresetFilter) -> CatalogResult<Vec<Preset>> {
        self.meta(self.metadata.find(filter))
            .await
            .map_err(|e| metadata_failure("Failed to list presets", e))
    }

    /// Create an empty or pre-filled preset document. No folder is created;
    /// the first upload does that.
    pub async fn create_preset(&self, definition: PresetDefinition) -> CatalogResult<Preset> {
        let preset = definition.into_preset(false)?;
        naming::folder_name(&preset.name)?;

        let existing = self
            .meta(self.metadata.get(&preset.name))
            .await
            .map_err(|e| metadata_failure("Failed to check preset name", e))?;
        if existing.is_some() {
            return Err(name_taken(&preset.name));
        }

        match self.meta(self.metadata.insert(&preset)).await {
            Ok(()) => {
                info!("Created preset '{}'", preset.name);
                Ok(preset)
            }
            Err(StoreError::Duplicate(name)) => Err(name_taken(&name)),
            Err(e) => Err(metadata_failure("Failed to create preset", e)),
        }
    }
}

fn name_taken(name: &str) -> CatalogError {
    CatalogError::Conflict(format!("A preset named '{}' already exists", name))
}

/// Translate a Metadata Store error, logging the underlying cause
fn metadata_failure(context: &str, err: StoreError) -> CatalogError {
    match err {
        StoreError::Duplicate(name) => name_taken(&name),
        StoreError::NotFound(name) => CatalogError::NotFound(format!("Preset '{}' not found", name)),
        other => {
            error!("{}: {}", context, other);
            CatalogError::MetadataFailure(format!("{}: {}", context, other))
        }
    }
}

/// Translate a Filesystem Store error, logging the underlying cause
fn storage_failure(context: &str, err: StorageError) -> CatalogError {
    match err {
        StorageError::InvalidPath(component) => {
            CatalogError::InvalidInput(format!("Invalid name '{}'", component))
        }
        other => {
            error!("{}: {}", context, other);
            CatalogError::StorageFailure(format!("{}: {}", context, other))
        }
    }
}

/// Log a rollback that could not be undone; the stores now disagree
fn irrecoverable(operation: &str, detail: &str, err: &StorageError) {
    error!(
        target: "irrecoverable",
        operation,
        "Rollback failed, stores are out of sync ({}): {}",
        detail,
        err
    );
}

/// Log a best-effort cleanup failure; leaves an orphan, never fails the call
fn cleanup_failed(what: &str, err: &StorageError) {
    warn!("{} (orphan left behind): {}", what, err);
}
