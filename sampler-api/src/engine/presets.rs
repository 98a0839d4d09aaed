//! Update / rename and delete preset

use chrono::Utc;
use sampler_common::{naming, Preset, Sample};
use serde::Deserialize;
use tracing::info;

use super::{cleanup_failed, irrecoverable, metadata_failure, name_taken, storage_failure, ConsistencyEngine};
use crate::error::{CatalogError, CatalogResult};
use crate::storage::StorageError;
use crate::store::StoreError;

/// PUT replaces the document, PATCH merges into it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Replace,
    Merge,
}

/// Preset fields supplied by an update request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub preset_type: Option<String>,
    #[serde(alias = "isFactoryPresets", default)]
    pub is_factory: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub samples: Option<Vec<Sample>>,
}

impl PresetPatch {
    /// Apply onto a copy of `current`
    fn apply(self, current: &Preset, mode: UpdateMode) -> CatalogResult<Preset> {
        let mut updated = current.clone();

        match mode {
            UpdateMode::Replace => {
                let name = self.name.ok_or_else(|| {
                    CatalogError::InvalidInput("Preset name is required".to_string())
                })?;
                updated.set_name(name.trim());
                updated.preset_type = self.preset_type.unwrap_or_default();
                updated.is_factory = self.is_factory.unwrap_or(false);
                updated.description = self.description;
                updated.samples = self.samples.unwrap_or_default();
            }
            UpdateMode::Merge => {
                if let Some(name) = self.name {
                    updated.set_name(name.trim());
                }
                if let Some(preset_type) = self.preset_type {
                    updated.preset_type = preset_type;
                }
                if let Some(is_factory) = self.is_factory {
                    updated.is_factory = is_factory;
                }
                if self.description.is_some() {
                    updated.description = self.description;
                }
                if let Some(samples) = self.samples {
                    updated.samples = samples;
                }
            }
        }

        updated.validate()?;
        updated.updated_at = Utc::now();
        Ok(updated)
    }
}

/// Point samples stored under `old_folder` at `new_folder`
fn move_sample_paths(samples: &mut [Sample], old_folder: &str, new_folder: &str) {
    for sample in samples.iter_mut() {
        if sample.folder() == Some(old_folder) {
            let filename = sample.file_name().to_string();
            sample.storage_path = naming::storage_path(new_folder, &filename);
        }
    }
}

impl ConsistencyEngine {
    /// Update a preset, renaming its folder first when the name changes
    pub async fn update_preset(
        &self,
        current_name: &str,
        patch: PresetPatch,
        mode: UpdateMode,
    ) -> CatalogResult<Preset> {
        let current = self.get_preset(current_name).await?;
        let mut updated = patch.apply(&current, mode)?;

        if updated.name == current.name {
            self.save_preset(&current.name, &updated).await?;
            info!("Updated preset '{}'", updated.name);
            return Ok(updated);
        }

        let taken = self
            .meta(self.metadata.get(&updated.name))
            .await
            .map_err(|e| metadata_failure("Failed to check preset name", e))?;
        if taken.is_some() {
            return Err(name_taken(&updated.name));
        }

        let old_folder = naming::folder_name(&current.name)?;
        let new_folder = naming::folder_name(&updated.name)?;

        if old_folder == new_folder {
            // Different names, same sanitized folder
            self.save_preset(&current.name, &updated).await?;
            info!("Renamed preset '{}' to '{}'", current.name, updated.name);
            return Ok(updated);
        }

        move_sample_paths(&mut updated.samples, &old_folder, &new_folder);

        let has_folder = self
            .fs(self.files.folder_exists(&old_folder))
            .await
            .map_err(|e| storage_failure("Failed to inspect preset folder", e))?;

        if !has_folder {
            self.save_preset(&current.name, &updated).await?;
            info!("Renamed preset '{}' to '{}' (no folder)", current.name, updated.name);
            return Ok(updated);
        }

        match self.fs(self.files.rename_folder(&old_folder, &new_folder)).await {
            Ok(()) => {}
            Err(StorageError::AlreadyExists(_)) => {
                return Err(CatalogError::Conflict(format!(
                    "A folder named '{}' already exists",
                    new_folder
                )));
            }
            Err(e) => return Err(storage_failure("Failed to rename preset folder", e)),
        }

        if let Err(err) = self.save_preset(&current.name, &updated).await {
            if let Err(rollback) = self.fs(self.files.rename_folder(&new_folder, &old_folder)).await {
                irrecoverable(
                    "rename_preset",
                    &format!("folder '{}' should be '{}'", new_folder, old_folder),
                    &rollback,
                );
            } else {
                info!("Rolled back folder rename '{}' -> '{}'", new_folder, old_folder);
            }
            return Err(err);
        }

        info!("Renamed preset '{}' to '{}'", current.name, updated.name);
        Ok(updated)
    }

    async fn save_preset(&self, current_name: &str, preset: &Preset) -> CatalogResult<()> {
        match self.meta(self.metadata.replace(current_name, preset)).await {
            Ok(()) => Ok(()),
            Err(StoreError::Duplicate(name)) => Err(name_taken(&name)),
            Err(e) => Err(metadata_failure("Failed to save preset", e)),
        }
    }

    /// Delete the document first, then clean up the folder best-effort.
    /// Once the catalog forgets a preset it is never listed again, even if
    /// its folder lingers.
    pub async fn delete_preset(&self, name: &str) -> CatalogResult<Preset> {
        let deleted = self
            .meta(self.metadata.delete(name))
            .await
            .map_err(|e| metadata_failure("Failed to delete preset", e))?
            .ok_or_else(|| CatalogError::NotFound(format!("Preset '{}' not found", name)))?;

        if let Ok(folder) = naming::folder_name(&deleted.name) {
            if let Err(e) = self.fs(self.files.remove_folder(&folder)).await {
                cleanup_failed(&format!("Failed to delete preset folder '{}'", folder), &e);
            }
        }

        info!("Deleted preset '{}'", deleted.name);
        Ok(deleted)
    }
}
