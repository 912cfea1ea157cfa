use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::checkpoint::CheckpointStore;
use crate::error::{ErrorKind, MigrateError, MigrateResult};
use crate::migrate_error;

/// Stores the resume key in a plain text file.
///
/// Writes go to a sibling temporary file which is then renamed over the checkpoint, so a crash
/// never leaves a truncated key behind.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    /// Creates a store backed by `path`.
    ///
    /// The file is only touched on the first load or store. Its parent directory must exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the checkpoint file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn checkpoint_error(&self, description: &'static str, err: io::Error) -> MigrateError {
        migrate_error!(
            ErrorKind::CheckpointFailed,
            description,
            self.path.display(),
            source: err
        )
    }

    fn temp_path(&self) -> PathBuf {
        let mut file_name = self.path.file_name().unwrap_or_default().to_os_string();
        file_name.push(".tmp");
        self.path.with_file_name(file_name)
    }
}

impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> MigrateResult<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let key = contents.trim();
                Ok((!key.is_empty()).then(|| key.to_string()))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.checkpoint_error("Failed to read the checkpoint file", err)),
        }
    }

    async fn store(&self, key: &str) -> MigrateResult<()> {
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, key.as_bytes())
            .await
            .map_err(|err| self.checkpoint_error("Failed to write the checkpoint file", err))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|err| self.checkpoint_error("Failed to replace the checkpoint file", err))?;

        debug!(key, path = %self.path.display(), "stored checkpoint");

        Ok(())
    }

    async fn clear(&self) -> MigrateResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.checkpoint_error("Failed to remove the checkpoint file", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_means_no_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("resume.txt"));

        assert_eq!(store.load().await.unwrap(), None);
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn stored_key_is_loaded_back_and_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("resume.txt"));

        store.store("companies/0042").await.unwrap();
        store.store("companies/0099").await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some("companies/0099".to_string()));
        assert!(!dir.path().join("resume.txt.tmp").exists());

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn unwritable_location_is_a_checkpoint_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("resume.txt");
        let store = FileCheckpointStore::new(&path);

        let err = store.store("key").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CheckpointFailed);
        assert_eq!(err.detail(), Some(path.display().to_string().as_str()));
    }

    #[tokio::test]
    async fn unreadable_checkpoint_is_a_checkpoint_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be cannot be read as text.
        let store = FileCheckpointStore::new(dir.path());

        let err = store.load().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CheckpointFailed);
    }
}
