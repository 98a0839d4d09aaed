//! In-memory Metadata Store
//!
//! Every operation runs under one mutex, so the conditional append is atomic
//! exactly like the single-statement update of the SQLite adapter.

use async_trait::async_trait;
use chrono::Utc;
use sampler_common::{Preset, PresetFilter, Sample};
use tokio::sync::Mutex;

use super::{MetadataStore, StoreError, StoreResult, UpsertOutcome};

#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    presets: Mutex<Vec<Preset>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn get(&self, name: &str) -> StoreResult<Option<Preset>> {
        let presets = self.presets.lock().await;
        Ok(presets.iter().find(|p| p.name == name).cloned())
    }

    async fn find(&self, filter: &PresetFilter) -> StoreResult<Vec<Preset>> {
        let presets = self.presets.lock().await;
        let offset = filter.offset.unwrap_or(0) as usize;
        let limit = filter.limit.map(|l| l as usize).unwrap_or(usize::MAX);

        Ok(presets
            .iter()
            .filter(|p| filter.matches(p))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert(&self, preset: &Preset) -> StoreResult<()> {
        let mut presets = self.presets.lock().await;
        if presets.iter().any(|p| p.name == preset.name) {
            return Err(StoreError::Duplicate(preset.name.clone()));
        }
        presets.push(preset.clone());
        Ok(())
    }

    async fn append_sample_if(
        &self,
        name: &str,
        sample: &Sample,
        capacity: usize,
    ) -> StoreResult<bool> {
        let mut presets = self.presets.lock().await;
        let Some(preset) = presets.iter_mut().find(|p| p.name == name) else {
            return Ok(false);
        };

        if preset.samples.len() >= capacity || preset.has_sample_named(&sample.display_name) {
            return Ok(false);
        }

        preset.samples.push(sample.clone());
        preset.updated_at = Utc::now();
        Ok(true)
    }

    async fn replace(&self, current_name: &str, preset: &Preset) -> StoreResult<()> {
        let mut presets = self.presets.lock().await;

        if preset.name != current_name && presets.iter().any(|p| p.name == preset.name) {
            return Err(StoreError::Duplicate(preset.name.clone()));
        }

        let slot = presets
            .iter_mut()
            .find(|p| p.name == current_name)
            .ok_or_else(|| StoreError::NotFound(current_name.to_string()))?;
        *slot = preset.clone();
        Ok(())
    }

    async fn delete(&self, name: &str) -> StoreResult<Option<Preset>> {
        let mut presets = self.presets.lock().await;
        Ok(presets
            .iter()
            .position(|p| p.name == name)
            .map(|idx| presets.remove(idx)))
    }

    async fn remove_sample(&self, name: &str, filename: &str) -> StoreResult<Option<Preset>> {
        let mut presets = self.presets.lock().await;
        let Some(preset) = presets.iter_mut().find(|p| p.name == name) else {
            return Ok(None);
        };

        preset.samples.retain(|s| s.file_name() != filename);
        preset.updated_at = Utc::now();
        Ok(Some(preset.clone()))
    }

    async fn upsert(&self, preset: &Preset) -> StoreResult<UpsertOutcome> {
        let mut presets = self.presets.lock().await;
        match presets.iter_mut().find(|p| p.name == preset.name) {
            Some(existing) => {
                let id = existing.id;
                let created_at = existing.created_at;
                *existing = preset.clone();
                existing.id = id;
                existing.created_at = created_at;
                existing.updated_at = Utc::now();
                Ok(UpsertOutcome::Updated)
            }
            None => {
                presets.push(preset.clone());
                Ok(UpsertOutcome::Created)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> Sample {
        Sample::new(name, "Kit", &format!("{}.wav", name), 4)
    }

    #[tokio::test]
    async fn test_append_respects_all_conditions() {
        let store = InMemoryMetadataStore::new();
        assert!(!store.append_sample_if("Kit", &sample("kick"), 2).await.unwrap());

        store.insert(&Preset::new("Kit", "Drumkit", false)).await.unwrap();
        assert!(store.append_sample_if("Kit", &sample("kick"), 2).await.unwrap());
        assert!(!store.append_sample_if("Kit", &sample("kick"), 2).await.unwrap());
        assert!(store.append_sample_if("Kit", &sample("snare"), 2).await.unwrap());
        assert!(!store.append_sample_if("Kit", &sample("hat"), 2).await.unwrap());

        let kit = store.get("Kit").await.unwrap().unwrap();
        assert_eq!(kit.samples.len(), 2);
    }

    #[tokio::test]
    async fn test_replace_detects_collisions_and_missing() {
        let store = InMemoryMetadataStore::new();
        store.insert(&Preset::new("A", "", false)).await.unwrap();
        store.insert(&Preset::new("B", "", false)).await.unwrap();

        let mut a = store.get("A").await.unwrap().unwrap();
        a.set_name("B");
        assert!(matches!(store.replace("A", &a).await, Err(StoreError::Duplicate(_))));

        a.set_name("C");
        assert!(matches!(store.replace("Z", &a).await, Err(StoreError::NotFound(_))));

        store.replace("A", &a).await.unwrap();
        assert!(store.get("A").await.unwrap().is_none());
        assert_eq!(store.get("C").await.unwrap().unwrap().slug, "c");
    }

    #[tokio::test]
    async fn test_upsert_keeps_identity() {
        let store = InMemoryMetadataStore::new();
        let first = Preset::new("808", "Drumkit", true);
        assert_eq!(store.upsert(&first).await.unwrap(), UpsertOutcome::Created);

        let second = Preset::new("808", "Electro", true);
        assert_eq!(store.upsert(&second).await.unwrap(), UpsertOutcome::Updated);

        let stored = store.get("808").await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.preset_type, "Electro");
    }
}
