//! Upload sample
//!
//! The file is written first. The descriptor is then appended with one
//! conditional write that checks existence, name uniqueness and capacity
//! together, which is what serializes concurrent uploads to one preset.
//! An interrupted upload can leave a stray file but never a descriptor
//! without a file.

use sampler_common::models::DEFAULT_PRESET_TYPE;
use sampler_common::{naming, Preset, Sample, MAX_SAMPLES_PER_PRESET};
use tracing::{debug, info, warn};

use super::{cleanup_failed, metadata_failure, storage_failure, ConsistencyEngine};
use crate::error::{CatalogError, CatalogResult};
use crate::storage::StorageError;
use crate::store::StoreError;

/// Attempts at the conditional append when the preset changes under us
const APPEND_ATTEMPTS: usize = 3;

/// An uploaded file headed for a preset
#[derive(Debug, Clone)]
pub struct SampleUpload {
    pub preset_name: String,
    /// Client filename as sent in the multipart field
    pub file_name: String,
    /// Overrides the default display name (filename without extension)
    pub display_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl ConsistencyEngine {
    pub async fn upload_sample(&self, upload: SampleUpload) -> CatalogResult<Sample> {
        naming::validate_preset_name(&upload.preset_name)?;
        let preset_name = upload.preset_name.trim();
        let folder = naming::folder_name(preset_name)?;
        let filename = naming::sample_file_name(&upload.file_name)?;
        let display_name = upload
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| naming::display_name_from_file(&filename));

        let sample = Sample::new(display_name, &folder, &filename, upload.bytes.len() as u64);

        match self
            .fs(self.files.write_sample(&folder, &filename, &upload.bytes))
            .await
        {
            Ok(()) => {}
            Err(StorageError::AlreadyExists(_)) => {
                self.reclaim_stray_file(preset_name, &folder, &filename, &upload.bytes)
                    .await?;
            }
            Err(e) => return Err(storage_failure("Failed to store uploaded sample", e)),
        }

        for attempt in 1..=APPEND_ATTEMPTS {
            let appended = self
                .meta(self.metadata.append_sample_if(preset_name, &sample, MAX_SAMPLES_PER_PRESET))
                .await
                .map_err(|e| self.keep_stray_file(&sample, e))?;

            if appended {
                info!("Uploaded '{}' to preset '{}'", sample.storage_path, preset_name);
                return Ok(sample);
            }

            // Find out which condition failed
            let current = self
                .meta(self.metadata.get(preset_name))
                .await
                .map_err(|e| self.keep_stray_file(&sample, e))?;

            match current {
                None => return self.create_with_first_sample(preset_name, sample).await,
                Some(preset) if preset.has_sample_named(&sample.display_name) => {
                    self.discard_upload(preset_name, &folder, &filename).await;
                    return Err(CatalogError::Conflict(format!(
                        "Duplicate sample name '{}' in preset '{}'",
                        sample.display_name, preset_name
                    )));
                }
                Some(preset) if preset.is_full() => {
                    self.discard_upload(preset_name, &folder, &filename).await;
                    return Err(CatalogError::Conflict(format!(
                        "Capacity reached ({}) for preset '{}'",
                        MAX_SAMPLES_PER_PRESET, preset_name
                    )));
                }
                Some(_) => {
                    debug!(attempt, "Preset '{}' changed during upload, retrying", preset_name);
                }
            }
        }

        self.discard_upload(preset_name, &folder, &filename).await;
        Err(CatalogError::Conflict(format!(
            "Preset '{}' is being modified concurrently, please retry",
            preset_name
        )))
    }

    /// First upload into a preset that doesn't exist yet
    async fn create_with_first_sample(&self, name: &str, sample: Sample) -> CatalogResult<Sample> {
        let mut preset = Preset::new(name, DEFAULT_PRESET_TYPE, false);
        preset.samples.push(sample.clone());

        match self.meta(self.metadata.insert(&preset)).await {
            Ok(()) => {
                info!("Created preset '{}' with first sample '{}'", name, sample.storage_path);
                Ok(sample)
            }
            Err(StoreError::Duplicate(_)) => {
                // Another upload created it between our append and insert
                if let Some(folder) = sample.folder() {
                    self.discard_upload(name, folder, sample.file_name()).await;
                }
                Err(CatalogError::Conflict(format!(
                    "Preset '{}' was created concurrently, please retry",
                    name
                )))
            }
            Err(e) => Err(self.keep_stray_file(&sample, e)),
        }
    }

    /// The target file is already on disk. If a sample of the preset points
    /// at it the upload is a duplicate; otherwise it is a leftover of an
    /// earlier failed upload and gets overwritten.
    async fn reclaim_stray_file(
        &self,
        preset_name: &str,
        folder: &str,
        filename: &str,
        bytes: &[u8],
    ) -> CatalogResult<()> {
        let owner = self
            .meta(self.metadata.get(preset_name))
            .await
            .map_err(|e| metadata_failure("Failed to check existing sample file", e))?;
        if owner.is_some_and(|p| p.owns_file(folder, filename)) {
            return Err(CatalogError::Conflict(format!(
                "A file named '{}' already exists in preset '{}'",
                filename, preset_name
            )));
        }

        warn!("Overwriting stray file {}/{}", folder, filename);
        self.fs(self.files.overwrite_sample(folder, filename, bytes))
            .await
            .map_err(|e| storage_failure("Failed to store uploaded sample", e))
    }

    /// Remove the file this upload wrote, unless a sample of the preset
    /// has meanwhile claimed the same file
    async fn discard_upload(&self, preset_name: &str, folder: &str, filename: &str) {
        match self.meta(self.metadata.get(preset_name)).await {
            Ok(Some(preset)) if preset.owns_file(folder, filename) => {
                debug!("Keeping {}/{}: owned by another sample", folder, filename);
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Keeping {}/{}: ownership check failed: {}", folder, filename, e);
                return;
            }
        }

        if let Err(e) = self.fs(self.files.remove_sample(folder, filename)).await {
            cleanup_failed(&format!("Failed to remove rejected upload {}/{}", folder, filename), &e);
        }
    }

    /// The metadata step failed in a way that may or may not have committed
    /// (timeouts), so the file stays: a stray file is recoverable, a
    /// descriptor without a file is not.
    fn keep_stray_file(&self, sample: &Sample, err: StoreError) -> CatalogError {
        warn!("Keeping '{}' after metadata failure", sample.storage_path);
        metadata_failure("Failed to record uploaded sample", err)
    }
}
