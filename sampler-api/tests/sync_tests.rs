//! Startup sync tests against both Metadata Store adapters

use sampler_api::store::{sqlite, InMemoryMetadataStore, MetadataStore, SqliteMetadataStore};
use sampler_api::sync::{bundled_definitions, synchronize_presets};
use sampler_common::PresetFilter;
use std::time::Duration;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn sqlite_store(dir: &TempDir) -> SqliteMetadataStore {
    let pool = sqlite::init_database_pool(&dir.path().join("sampler.db")).await.unwrap();
    SqliteMetadataStore::new(pool).await.unwrap()
}

async fn assert_sync_is_idempotent(store: &dyn MetadataStore) {
    let bundled = bundled_definitions().unwrap().len();

    let first = synchronize_presets(store, None, TIMEOUT).await;
    assert_eq!(first.created, bundled);
    assert_eq!(first.updated, 0);
    assert_eq!(first.failed, 0);

    let before = store.get("808").await.unwrap().unwrap();

    let second = synchronize_presets(store, None, TIMEOUT).await;
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, bundled);

    let presets = store.find(&PresetFilter::default()).await.unwrap();
    assert_eq!(presets.len(), bundled);
    assert!(presets.iter().all(|p| p.is_factory));

    let after = store.get("808").await.unwrap().unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.samples, before.samples);
}

#[tokio::test]
async fn test_sync_idempotent_in_memory() {
    let store = InMemoryMetadataStore::new();
    assert_sync_is_idempotent(&store).await;
}

#[tokio::test]
async fn test_sync_idempotent_sqlite() {
    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir).await;
    assert_sync_is_idempotent(&store).await;
}

#[tokio::test]
async fn test_sync_reads_seed_dir_and_skips_bad_entries() {
    let dir = TempDir::new().unwrap();
    let seeds = dir.path().join("seeds");
    std::fs::create_dir_all(&seeds).unwrap();
    std::fs::write(
        seeds.join("extra.json"),
        r#"[{"name": "Lo-Fi", "type": "Drumkit"}, {"type": "missing name"}]"#,
    )
    .unwrap();
    std::fs::write(
        seeds.join("override.json"),
        r#"{"name": "808", "type": "Drumkit", "description": "edited"}"#,
    )
    .unwrap();
    std::fs::write(seeds.join("broken.json"), "{ not json").unwrap();
    std::fs::write(seeds.join("notes.txt"), "ignored").unwrap();

    let store = InMemoryMetadataStore::new();
    let bundled = bundled_definitions().unwrap().len();
    let report = synchronize_presets(&store, Some(&seeds), TIMEOUT).await;

    assert_eq!(report.created, bundled + 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.failed, 2);

    let lofi = store.get("Lo-Fi").await.unwrap().unwrap();
    assert!(lofi.is_factory);
    let edited = store.get("808").await.unwrap().unwrap();
    assert_eq!(edited.description.as_deref(), Some("edited"));
}

#[tokio::test]
async fn test_sync_with_missing_seed_dir_still_loads_bundled() {
    let dir = TempDir::new().unwrap();
    let store = InMemoryMetadataStore::new();
    let report = synchronize_presets(&store, Some(&dir.path().join("nope")), TIMEOUT).await;
    assert_eq!(report.created, bundled_definitions().unwrap().len());
    assert_eq!(report.failed, 0);
}
