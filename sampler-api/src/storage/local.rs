//! Local-disk Filesystem Store

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{FileStore, StorageError, StorageResult};

pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn folder_path(&self, folder: &str) -> StorageResult<PathBuf> {
        check_component(folder)?;
        Ok(self.root.join(folder))
    }

    fn sample_path(&self, folder: &str, filename: &str) -> StorageResult<PathBuf> {
        check_component(filename)?;
        Ok(self.folder_path(folder)?.join(filename))
    }
}

/// Accept only a single, non-special path component
fn check_component(component: &str) -> StorageResult<()> {
    if component.is_empty()
        || component == "."
        || component == ".."
        || component.contains('/')
        || component.contains('\\')
        || component.contains('\0')
    {
        return Err(StorageError::InvalidPath(component.to_string()));
    }
    Ok(())
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

async fn exists(path: &Path) -> StorageResult<bool> {
    fs::try_exists(path).await.map_err(|e| io_error(path, e))
}

/// Rename without clobbering an existing target
async fn rename_no_overwrite(from: &Path, to: &Path) -> StorageResult<()> {
    if exists(to).await? {
        return Err(StorageError::AlreadyExists(to.display().to_string()));
    }
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(StorageError::NotFound(from.display().to_string()))
        }
        Err(e) => Err(io_error(from, e)),
    }
}

async fn list_entries(dir: &Path, want_dirs: bool) -> StorageResult<Vec<String>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error(dir, e)),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(dir, e))? {
        let file_type = entry.file_type().await.map_err(|e| io_error(&entry.path(), e))?;
        if file_type.is_dir() != want_dirs {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Create `path` with `bytes`, never replacing an existing file
async fn write_new_file(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(StorageError::AlreadyExists(path.display().to_string()));
        }
        Err(e) => return Err(io_error(path, e)),
    };

    let written = async {
        file.write_all(bytes).await?;
        file.sync_all().await
    }
    .await;

    if let Err(e) = written {
        // Don't leave a truncated file behind
        drop(file);
        if let Err(cleanup) = fs::remove_file(path).await {
            warn!("Failed to remove partial file {}: {}", path.display(), cleanup);
        }
        return Err(io_error(path, e));
    }
    Ok(())
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn write_sample(&self, folder: &str, filename: &str, bytes: &[u8]) -> StorageResult<()> {
        let dir = self.folder_path(folder)?;
        let path = self.sample_path(folder, filename)?;

        fs::create_dir_all(&dir).await.map_err(|e| io_error(&dir, e))?;
        write_new_file(&path, bytes).await?;

        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    async fn overwrite_sample(&self, folder: &str, filename: &str, bytes: &[u8]) -> StorageResult<()> {
        let dir = self.folder_path(folder)?;
        let path = self.sample_path(folder, filename)?;

        fs::create_dir_all(&dir).await.map_err(|e| io_error(&dir, e))?;

        // Hidden, so listings never report it
        let staging = dir.join(format!(".{}.{}.tmp", filename, Uuid::new_v4()));
        write_new_file(&staging, bytes).await?;

        if let Err(e) = fs::rename(&staging, &path).await {
            if let Err(cleanup) = fs::remove_file(&staging).await {
                warn!("Failed to remove staging file {}: {}", staging.display(), cleanup);
            }
            return Err(io_error(&path, e));
        }

        debug!("Overwrote {} with {} bytes", path.display(), bytes.len());
        Ok(())
    }

    async fn remove_sample(&self, folder: &str, filename: &str) -> StorageResult<()> {
        let path = self.sample_path(folder, filename)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn rename_sample(&self, folder: &str, from: &str, to: &str) -> StorageResult<()> {
        let from = self.sample_path(folder, from)?;
        let to = self.sample_path(folder, to)?;
        rename_no_overwrite(&from, &to).await
    }

    async fn sample_exists(&self, folder: &str, filename: &str) -> StorageResult<bool> {
        exists(&self.sample_path(folder, filename)?).await
    }

    async fn folder_exists(&self, folder: &str) -> StorageResult<bool> {
        let path = self.folder_path(folder)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn rename_folder(&self, from: &str, to: &str) -> StorageResult<()> {
        let from = self.folder_path(from)?;
        let to = self.folder_path(to)?;
        rename_no_overwrite(&from, &to).await
    }

    async fn remove_folder(&self, folder: &str) -> StorageResult<()> {
        let path = self.folder_path(folder)?;
        match fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn list_folders(&self) -> StorageResult<Vec<String>> {
        list_entries(&self.root, true).await
    }

    async fn list_samples(&self, folder: &str) -> StorageResult<Vec<String>> {
        list_entries(&self.folder_path(folder)?, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());

        store.write_sample("Kit", "kick.wav", b"one").await.unwrap();
        let second = store.write_sample("Kit", "kick.wav", b"two").await;
        assert!(matches!(second, Err(StorageError::AlreadyExists(_))));

        let bytes = std::fs::read(dir.path().join("Kit").join("kick.wav")).unwrap();
        assert_eq!(bytes, b"one");
    }

    #[tokio::test]
    async fn test_overwrite_replaces_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());

        store.write_sample("Kit", "kick.wav", b"stale").await.unwrap();
        store.overwrite_sample("Kit", "kick.wav", b"fresh").await.unwrap();

        let bytes = std::fs::read(dir.path().join("Kit").join("kick.wav")).unwrap();
        assert_eq!(bytes, b"fresh");
        assert_eq!(std::fs::read_dir(dir.path().join("Kit")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());

        assert!(matches!(
            store.write_sample("..", "x.wav", b"x").await,
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            store.remove_sample("Kit", "../x.wav").await,
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_folder_refuses_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        store.write_sample("A", "a.wav", b"a").await.unwrap();
        store.write_sample("B", "b.wav", b"b").await.unwrap();

        assert!(matches!(
            store.rename_folder("A", "B").await,
            Err(StorageError::AlreadyExists(_))
        ));
        assert!(matches!(
            store.rename_folder("missing", "C").await,
            Err(StorageError::NotFound(_))
        ));

        store.rename_folder("A", "C").await.unwrap();
        assert!(!store.folder_exists("A").await.unwrap());
        assert!(store.sample_exists("C", "a.wav").await.unwrap());
    }

    #[tokio::test]
    async fn test_removals_tolerate_missing_targets() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());

        store.remove_sample("Kit", "none.wav").await.unwrap();
        store.remove_folder("Kit").await.unwrap();
    }

    #[tokio::test]
    async fn test_listing_skips_hidden_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        store.write_sample("Kit", "kick.wav", b"k").await.unwrap();
        store.write_sample("Kit", ".partial", b"p").await.unwrap();
        std::fs::create_dir(dir.path().join(".trash")).unwrap();
        std::fs::write(dir.path().join("808.json"), b"{}").unwrap();

        assert_eq!(store.list_folders().await.unwrap(), vec!["Kit".to_string()]);
        assert_eq!(store.list_samples("Kit").await.unwrap(), vec!["kick.wav".to_string()]);
        assert!(store.list_samples("Nope").await.unwrap().is_empty());
    }
}
