//! Drift audit
//!
//! Compares the catalog with the sample tree and reports orphans in both
//! directions. Read-only: a file without a descriptor may belong to an
//! upload that is still in flight, so nothing is deleted here.

use sampler_common::{naming, PresetFilter};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use super::{metadata_failure, storage_failure, ConsistencyEngine};
use crate::error::CatalogResult;

/// Descriptor the audit flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingFile {
    pub preset: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub checked_presets: usize,
    pub missing_files: Vec<MissingFile>,
    /// `<folder>/<file>` on disk with no descriptor
    pub orphan_files: Vec<String>,
    /// Folders no preset maps to
    pub orphan_folders: Vec<String>,
    /// Descriptors whose file could not be checked (I/O error, timeout)
    pub unchecked_files: Vec<MissingFile>,
}

impl DriftReport {
    /// No drift found and every descriptor was checked
    pub fn is_clean(&self) -> bool {
        self.missing_files.is_empty()
            && self.orphan_files.is_empty()
            && self.orphan_folders.is_empty()
            && self.unchecked_files.is_empty()
    }
}

impl ConsistencyEngine {
    pub async fn audit(&self) -> CatalogResult<DriftReport> {
        let presets = self
            .meta(self.metadata.find(&PresetFilter::default()))
            .await
            .map_err(|e| metadata_failure("Failed to list presets for audit", e))?;

        let mut report = DriftReport {
            checked_presets: presets.len(),
            ..Default::default()
        };

        // folder -> filenames the catalog expects there
        let mut expected: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for preset in &presets {
            if let Ok(folder) = naming::folder_name(&preset.name) {
                expected.entry(folder).or_default();
            }
            for sample in &preset.samples {
                let Some(folder) = sample.folder() else { continue };
                expected
                    .entry(folder.to_string())
                    .or_default()
                    .insert(sample.file_name().to_string());

                match self.fs(self.files.sample_exists(folder, sample.file_name())).await {
                    Ok(true) => {}
                    Ok(false) => report.missing_files.push(MissingFile {
                        preset: preset.name.clone(),
                        url: sample.storage_path.clone(),
                    }),
                    Err(e) => {
                        warn!("Audit could not check '{}': {}", sample.storage_path, e);
                        report.unchecked_files.push(MissingFile {
                            preset: preset.name.clone(),
                            url: sample.storage_path.clone(),
                        });
                    }
                }
            }
        }

        let folders = self
            .fs(self.files.list_folders())
            .await
            .map_err(|e| storage_failure("Failed to list preset folders", e))?;

        for folder in folders {
            let Some(known_files) = expected.get(&folder) else {
                report.orphan_folders.push(folder);
                continue;
            };

            let files = self
                .fs(self.files.list_samples(&folder))
                .await
                .map_err(|e| storage_failure("Failed to list sample files", e))?;
            report.orphan_files.extend(
                files
                    .into_iter()
                    .filter(|f| !known_files.contains(f))
                    .map(|f| naming::storage_path(&folder, &f)),
            );
        }

        if report.is_clean() {
            info!("Audit: {} presets, no drift", report.checked_presets);
        } else {
            warn!(
                missing = report.missing_files.len(),
                orphan_files = report.orphan_files.len(),
                orphan_folders = report.orphan_folders.len(),
                unchecked = report.unchecked_files.len(),
                "Audit found drift between catalog and sample tree"
            );
        }

        Ok(report)
    }
}
