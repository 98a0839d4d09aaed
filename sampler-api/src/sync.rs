//! Startup reconciliation of canonical presets
//!
//! Upserts the bundled factory definitions (plus any `*.json` files in the
//! configured seed folder) into the Metadata Store. Idempotent, so it runs on
//! every start. Bad definitions are logged and skipped; sync never stops the
//! server from starting.

use sampler_common::{PresetDefinition, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::store::{MetadataStore, StoreError, UpsertOutcome};

/// Factory presets compiled into the binary
const BUNDLED_PRESETS: &str = include_str!("../factory/presets.json");

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Parse a definition file: one definition or an array of them. Entries that
/// don't deserialize are returned as errors alongside the good ones.
pub fn parse_definitions(text: &str) -> Result<Vec<Result<PresetDefinition>>> {
    let value: Value = serde_json::from_str(text)?;
    let entries = match value {
        Value::Array(items) => items,
        single => vec![single],
    };

    Ok(entries
        .into_iter()
        .map(|entry| serde_json::from_value(entry).map_err(Into::into))
        .collect())
}

pub fn bundled_definitions() -> Result<Vec<Result<PresetDefinition>>> {
    parse_definitions(BUNDLED_PRESETS)
}

/// Read every `*.json` file of `dir`, in filename order
pub async fn load_seed_dir(dir: &Path) -> Vec<Result<PresetDefinition>> {
    let mut files = Vec::new();
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) == Some("json") {
                        files.push(path);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Stopped reading seed folder {}: {}", dir.display(), e);
                    break;
                }
            }
        },
        Err(e) => {
            warn!("Cannot read seed folder {}: {}", dir.display(), e);
            return Vec::new();
        }
    }
    files.sort();

    let mut definitions = Vec::new();
    for path in files {
        let parsed = match tokio::fs::read_to_string(&path).await {
            Ok(text) => parse_definitions(&text),
            Err(e) => Err(e.into()),
        };
        match parsed {
            Ok(mut entries) => definitions.append(&mut entries),
            Err(e) => {
                error!("Failed to process {}: {}", path.display(), e);
                definitions.push(Err(e));
            }
        }
    }
    definitions
}

/// Upsert each definition by name
pub async fn upsert_definitions(
    store: &dyn MetadataStore,
    definitions: Vec<Result<PresetDefinition>>,
    timeout: Duration,
) -> SyncReport {
    let mut report = SyncReport::default();

    for definition in definitions {
        let preset = match definition.and_then(|d| d.into_preset(true)) {
            Ok(preset) => preset,
            Err(e) => {
                warn!("Skipping invalid preset definition: {}", e);
                report.failed += 1;
                continue;
            }
        };

        let outcome = tokio::time::timeout(timeout, store.upsert(&preset))
            .await
            .unwrap_or(Err(StoreError::Timeout));

        match outcome {
            Ok(UpsertOutcome::Created) => report.created += 1,
            Ok(UpsertOutcome::Updated) => report.updated += 1,
            Err(e) => {
                error!("Failed to sync preset '{}': {}", preset.name, e);
                report.failed += 1;
            }
        }
    }

    report
}

/// Run the full startup sync
pub async fn synchronize_presets(
    store: &dyn MetadataStore,
    seed_dir: Option<&Path>,
    timeout: Duration,
) -> SyncReport {
    info!("Synchronizing canonical presets");

    let mut definitions = match bundled_definitions() {
        Ok(definitions) => definitions,
        Err(e) => {
            error!("Bundled preset definitions are unreadable: {}", e);
            vec![Err(e)]
        }
    };

    if let Some(dir) = seed_dir {
        definitions.extend(load_seed_dir(dir).await);
    }

    let report = upsert_definitions(store, definitions, timeout).await;
    info!(
        "Sync complete: {} created, {} updated, {} failed",
        report.created, report.updated, report.failed
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_definitions_are_valid() {
        let definitions = bundled_definitions().unwrap();
        assert!(!definitions.is_empty());
        for definition in definitions {
            let preset = definition.unwrap().into_preset(true).unwrap();
            assert!(preset.is_factory);
        }
    }

    #[test]
    fn test_parse_single_object_and_bad_entries() {
        let single = parse_definitions(r#"{"name": "Solo"}"#).unwrap();
        assert_eq!(single.len(), 1);

        let mixed = parse_definitions(r#"[{"name": "Ok"}, {"type": "no name"}]"#).unwrap();
        assert!(mixed[0].is_ok());
        assert!(mixed[1].is_err());

        assert!(parse_definitions("not json").is_err());
    }
}
