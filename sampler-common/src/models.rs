//! Catalog data model
//!
//! A preset owns an ordered list of sample descriptors. Samples have no
//! identity outside their preset; they are value records embedded in it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::naming;
use crate::{Error, Result};

/// Hard capacity of a preset
pub const MAX_SAMPLES_PER_PRESET: usize = 16;

/// Type given to presets created implicitly by a first upload
pub const DEFAULT_PRESET_TYPE: &str = "Drumkit";

/// One audio file of a preset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// Human label, unique within the parent preset
    #[serde(rename = "name")]
    pub display_name: String,

    /// Path relative to the store root: `<folder>/<filename>`
    #[serde(rename = "url")]
    pub storage_path: String,

    /// Filename on disk (absent for some bundled definitions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_name: Option<String>,

    /// Size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Sample {
    pub fn new(display_name: impl Into<String>, folder: &str, filename: &str, size: u64) -> Self {
        Self {
            display_name: display_name.into(),
            storage_path: naming::storage_path(folder, filename),
            stored_name: Some(filename.to_string()),
            size: Some(size),
        }
    }

    /// Filename addressed by sample routes
    pub fn file_name(&self) -> &str {
        match &self.stored_name {
            Some(name) => name,
            None => self
                .storage_path
                .rsplit('/')
                .next()
                .unwrap_or(&self.storage_path),
        }
    }

    /// Folder component of the storage path, if it has one
    pub fn folder(&self) -> Option<&str> {
        self.storage_path
            .rsplit_once('/')
            .map(|(folder, _)| folder.trim_start_matches("./"))
    }
}

/// A named collection of samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[serde(rename = "type", default)]
    pub preset_type: String,
    #[serde(alias = "isFactoryPresets", default)]
    pub is_factory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub samples: Vec<Sample>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Preset {
    /// Create an empty preset; the slug is derived from the name
    pub fn new(name: impl Into<String>, preset_type: impl Into<String>, is_factory: bool) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            slug: naming::slugify(&name),
            name,
            preset_type: preset_type.into(),
            is_factory,
            description: None,
            samples: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rename, keeping the slug in step with the name
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.slug = naming::slugify(&self.name);
    }

    pub fn has_sample_named(&self, display_name: &str) -> bool {
        self.samples.iter().any(|s| s.display_name == display_name)
    }

    pub fn find_sample(&self, filename: &str) -> Option<&Sample> {
        self.samples.iter().find(|s| s.file_name() == filename)
    }

    /// Whether a sample of this preset points at `<folder>/<filename>`
    pub fn owns_file(&self, folder: &str, filename: &str) -> bool {
        self.samples
            .iter()
            .any(|s| s.folder() == Some(folder) && s.file_name() == filename)
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= MAX_SAMPLES_PER_PRESET
    }

    /// Check the preset invariants: usable name, capacity, unique sample names
    pub fn validate(&self) -> Result<()> {
        naming::validate_preset_name(&self.name)?;
        validate_samples(&self.samples)
    }
}

/// Check capacity and display-name uniqueness of a sample list
pub fn validate_samples(samples: &[Sample]) -> Result<()> {
    if samples.len() > MAX_SAMPLES_PER_PRESET {
        return Err(Error::InvalidInput(format!(
            "A preset holds at most {} samples",
            MAX_SAMPLES_PER_PRESET
        )));
    }

    let mut seen = HashSet::new();
    for sample in samples {
        if sample.display_name.trim().is_empty() {
            return Err(Error::InvalidInput("Sample name must not be empty".to_string()));
        }
        if !seen.insert(sample.display_name.as_str()) {
            return Err(Error::InvalidInput(format!(
                "Duplicate sample name '{}'",
                sample.display_name
            )));
        }
    }
    Ok(())
}

/// Preset payload as supplied by clients and bundled definition files
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetDefinition {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub preset_type: Option<String>,
    #[serde(alias = "isFactoryPresets", default)]
    pub is_factory: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub samples: Vec<Sample>,
}

impl PresetDefinition {
    /// Build a fresh preset document; `default_factory` applies when the
    /// definition does not say where it comes from
    pub fn into_preset(self, default_factory: bool) -> Result<Preset> {
        let mut preset = Preset::new(
            self.name.trim(),
            self.preset_type.unwrap_or_default(),
            self.is_factory.unwrap_or(default_factory),
        );
        if let Some(id) = self.id {
            preset.id = id;
        }
        preset.description = self.description;
        preset.samples = self.samples;
        preset.validate()?;
        Ok(preset)
    }
}

/// Listing filter
///
/// `limit`/`offset` page through the result set without changing how the
/// other fields filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresetFilter {
    /// Case-insensitive substring matched against preset name, sample names
    /// and sample paths
    #[serde(default)]
    pub q: Option<String>,
    /// Case-insensitive exact match on type
    #[serde(rename = "type", default)]
    pub preset_type: Option<String>,
    #[serde(default)]
    pub factory: Option<bool>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

impl PresetFilter {
    pub fn matches(&self, preset: &Preset) -> bool {
        if let Some(preset_type) = non_blank(&self.preset_type) {
            if preset.preset_type.to_lowercase() != preset_type.to_lowercase() {
                return false;
            }
        }

        if let Some(factory) = self.factory {
            if preset.is_factory != factory {
                return false;
            }
        }

        if let Some(q) = non_blank(&self.q) {
            let needle = q.to_lowercase();
            let hit = preset.name.to_lowercase().contains(&needle)
                || preset.samples.iter().any(|s| {
                    s.display_name.to_lowercase().contains(&needle)
                        || s.storage_path.to_lowercase().contains(&needle)
                });
            if !hit {
                return false;
            }
        }

        true
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kit() -> Preset {
        let mut preset = Preset::new("Basic Kit", "Drumkit", true);
        preset.samples.push(Sample::new("Kick", "Basic Kit", "kick.wav", 10));
        preset.samples.push(Sample::new("Snare", "Basic Kit", "snare.wav", 10));
        preset
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(kit()).unwrap();
        assert_eq!(json["name"], "Basic Kit");
        assert_eq!(json["slug"], "basic-kit");
        assert_eq!(json["type"], "Drumkit");
        assert_eq!(json["isFactory"], true);
        assert_eq!(json["samples"][0]["name"], "Kick");
        assert_eq!(json["samples"][0]["url"], "Basic Kit/kick.wav");
        assert_eq!(json["samples"][0]["storedName"], "kick.wav");
    }

    #[test]
    fn test_definition_accepts_legacy_factory_flag() {
        let def: PresetDefinition = serde_json::from_str(
            r#"{"name":"808","type":"Drumkit","isFactoryPresets":true,
                "samples":[{"name":"Kick","url":"./808/Kick 808X.wav"}]}"#,
        )
        .unwrap();
        let preset = def.into_preset(false).unwrap();
        assert!(preset.is_factory);
        assert_eq!(preset.samples[0].file_name(), "Kick 808X.wav");
        assert_eq!(preset.samples[0].folder(), Some("808"));
    }

    #[test]
    fn test_validate_rejects_duplicates_and_overflow() {
        let mut preset = kit();
        preset.samples.push(Sample::new("Kick", "Basic Kit", "kick2.wav", 1));
        assert!(preset.validate().is_err());

        let mut full = Preset::new("Full", "Drumkit", false);
        for i in 0..=MAX_SAMPLES_PER_PRESET {
            full.samples.push(Sample::new(format!("s{}", i), "Full", &format!("s{}.wav", i), 1));
        }
        assert!(full.validate().is_err());
    }

    #[test]
    fn test_filter_matching() {
        let preset = kit();

        let by_type = PresetFilter { preset_type: Some("drumKIT".into()), ..Default::default() };
        assert!(by_type.matches(&preset));

        let wrong_type = PresetFilter { preset_type: Some("Drum".into()), ..Default::default() };
        assert!(!wrong_type.matches(&preset));

        let by_sample = PresetFilter { q: Some("SNA".into()), ..Default::default() };
        assert!(by_sample.matches(&preset));

        let by_path = PresetFilter { q: Some("kick.wav".into()), ..Default::default() };
        assert!(by_path.matches(&preset));

        let user_only = PresetFilter { factory: Some(false), ..Default::default() };
        assert!(!user_only.matches(&preset));
    }
}
