//! Rename and delete sample

use chrono::Utc;
use sampler_common::{naming, Sample};
use serde::Serialize;
use tracing::{info, warn};

use super::{cleanup_failed, irrecoverable, metadata_failure, storage_failure, ConsistencyEngine};
use crate::error::{CatalogError, CatalogResult};
use crate::storage::StorageError;

/// Result of a sample rename
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRename {
    pub old_name: String,
    pub new_name: String,
    pub sample: Sample,
}

fn sample_not_found(preset: &str, filename: &str) -> CatalogError {
    CatalogError::NotFound(format!("Sample '{}' not found in preset '{}'", filename, preset))
}

fn display_name_taken(display_name: &str) -> CatalogError {
    CatalogError::Conflict(format!("A sample named '{}' already exists in this preset", display_name))
}

impl ConsistencyEngine {
    /// Rename a sample file (keeping its extension) and its display name.
    /// The file moves first and is moved back if the document can't follow.
    pub async fn rename_sample(
        &self,
        preset_name: &str,
        filename: &str,
        new_base_name: &str,
    ) -> CatalogResult<SampleRename> {
        let folder = naming::folder_name(preset_name)
            .map_err(|_| CatalogError::NotFound(format!("Preset '{}' not found", preset_name)))?;
        if naming::sample_file_name(filename).ok().as_deref() != Some(filename) {
            return Err(sample_not_found(preset_name, filename));
        }

        let folder_exists = self
            .fs(self.files.folder_exists(&folder))
            .await
            .map_err(|e| storage_failure("Failed to inspect preset folder", e))?;
        if !folder_exists {
            return Err(CatalogError::NotFound(format!("Preset folder '{}' not found", folder)));
        }

        let file_exists = self
            .fs(self.files.sample_exists(&folder, filename))
            .await
            .map_err(|e| storage_failure("Failed to inspect sample file", e))?;
        if !file_exists {
            return Err(CatalogError::NotFound(format!("Sample file '{}' not found", filename)));
        }

        let new_base = new_base_name.trim();
        if new_base.is_empty() {
            return Err(CatalogError::InvalidInput("New name is required".to_string()));
        }
        let (_, extension) = naming::split_extension(filename);
        let new_filename = naming::sample_file_name(&format!("{}{}", new_base, extension))?;

        let name_clash = self
            .fs(self.files.sample_exists(&folder, &new_filename))
            .await
            .map_err(|e| storage_failure("Failed to inspect sample file", e))?;
        if name_clash {
            return Err(CatalogError::Conflict(format!(
                "A file named '{}' already exists",
                new_filename
            )));
        }

        // Cheap pre-check so a doomed rename never touches the disk
        let preset = self.get_preset(preset_name).await?;
        if preset
            .samples
            .iter()
            .any(|s| s.display_name == new_base && s.file_name() != filename)
        {
            return Err(display_name_taken(new_base));
        }

        match self
            .fs(self.files.rename_sample(&folder, filename, &new_filename))
            .await
        {
            Ok(()) => {}
            Err(StorageError::AlreadyExists(_)) => {
                return Err(CatalogError::Conflict(format!(
                    "A file named '{}' already exists",
                    new_filename
                )));
            }
            Err(StorageError::NotFound(_)) => {
                return Err(CatalogError::NotFound(format!("Sample file '{}' not found", filename)));
            }
            Err(e) => return Err(storage_failure("Failed to rename sample file", e)),
        }

        match self
            .record_sample_rename(preset_name, &folder, filename, &new_filename, new_base)
            .await
        {
            Ok(sample) => {
                info!(
                    "Renamed sample '{}' to '{}' in preset '{}'",
                    filename, new_filename, preset_name
                );
                Ok(SampleRename {
                    old_name: filename.to_string(),
                    new_name: new_filename,
                    sample,
                })
            }
            Err(err) => {
                self.roll_back_sample_rename(&folder, &new_filename, filename).await;
                Err(err)
            }
        }
    }

    /// Metadata half of a sample rename, run after the file moved
    async fn record_sample_rename(
        &self,
        preset_name: &str,
        folder: &str,
        old_filename: &str,
        new_filename: &str,
        new_display_name: &str,
    ) -> CatalogResult<Sample> {
        let mut preset = self
            .meta(self.metadata.get(preset_name))
            .await
            .map_err(|e| metadata_failure("Failed to load preset", e))?
            .ok_or_else(|| CatalogError::NotFound(format!("Preset '{}' not found", preset_name)))?;

        if preset
            .samples
            .iter()
            .any(|s| s.display_name == new_display_name && s.file_name() != old_filename)
        {
            return Err(display_name_taken(new_display_name));
        }

        let sample = preset
            .samples
            .iter_mut()
            .find(|s| s.file_name() == old_filename)
            .ok_or_else(|| sample_not_found(preset_name, old_filename))?;

        sample.storage_path = naming::storage_path(folder, new_filename);
        sample.stored_name = Some(new_filename.to_string());
        sample.display_name = new_display_name.to_string();
        let renamed = sample.clone();

        preset.updated_at = Utc::now();
        self.meta(self.metadata.replace(preset_name, &preset))
            .await
            .map_err(|e| metadata_failure("Failed to save sample rename", e))?;
        Ok(renamed)
    }

    async fn roll_back_sample_rename(&self, folder: &str, renamed: &str, original: &str) {
        match self.fs(self.files.rename_sample(folder, renamed, original)).await {
            Ok(()) => info!("Rolled back sample rename '{}' -> '{}'", renamed, original),
            Err(e) => irrecoverable(
                "rename_sample",
                &format!("file '{}/{}' should be '{}'", folder, renamed, original),
                &e,
            ),
        }
    }

    /// Remove the descriptor first, then the file best-effort
    pub async fn delete_sample(&self, preset_name: &str, filename: &str) -> CatalogResult<Sample> {
        let preset = self.get_preset(preset_name).await?;
        let sample = preset
            .find_sample(filename)
            .cloned()
            .ok_or_else(|| sample_not_found(preset_name, filename))?;

        self.meta(self.metadata.remove_sample(preset_name, filename))
            .await
            .map_err(|e| metadata_failure("Failed to remove sample", e))?
            .ok_or_else(|| CatalogError::NotFound(format!("Preset '{}' not found", preset_name)))?;

        // Only the preset's own folder is touched; a url pointing elsewhere
        // may name a file another preset still lists
        match naming::folder_name(preset_name) {
            Ok(folder) if sample.folder().map_or(true, |f| f == folder) => {
                if let Err(e) = self.fs(self.files.remove_sample(&folder, sample.file_name())).await {
                    cleanup_failed(
                        &format!("Failed to delete sample file '{}/{}'", folder, sample.file_name()),
                        &e,
                    );
                }
            }
            _ => warn!(
                "Not deleting '{}': outside the folder of preset '{}'",
                sample.storage_path, preset_name
            ),
        }

        info!("Deleted sample '{}' from preset '{}'", filename, preset_name);
        Ok(sample)
    }
}
