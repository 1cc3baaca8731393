use super::{PreferenceEdit, PreferenceStore, StorageError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

type Entries = BTreeMap<String, String>;

/// Preference store persisted as a single JSON object on disk.
///
/// The document is read on first use and cached. Every edit rewrites the
/// whole file through a sibling temp file and a rename, so a crash leaves
/// either the old or the new document.
#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    cache: Mutex<Option<Entries>>,
}

impl FilePreferenceStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), cache: Mutex::new(None) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn entries<'a>(&self, cache: &'a mut Option<Entries>) -> Result<&'a mut Entries, StorageError> {
        if cache.is_none() {
            *cache = Some(read_entries(&self.path).await?);
        }
        Ok(cache.get_or_insert_with(Entries::new))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn persist(&self, entries: &Entries) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(entries)?).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

async fn read_entries(path: &Path) -> Result<Entries, StorageError> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Entries::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Entries::new()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl PreferenceStore for FilePreferenceStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut cache = self.cache.lock().await;
        Ok(self.entries(&mut cache).await?.get(key).cloned())
    }

    #[tracing::instrument(level = "debug", skip(self, edit), fields(path = %self.path.display()), err)]
    async fn edit(&self, edit: PreferenceEdit) -> Result<(), StorageError> {
        let mut cache = self.cache.lock().await;
        let mut next = match self.entries(&mut cache).await {
            Ok(entries) => entries.clone(),
            Err(StorageError::Corrupt(e)) => {
                tracing::warn!(error = %e, "Preference file is corrupt, rewriting from an empty document");
                Entries::new()
            }
            Err(e) => return Err(e),
        };
        edit.apply(&mut next);
        self.persist(&next).await?;
        *cache = Some(next);
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.path.display()), err)]
    async fn clear(&self) -> Result<(), StorageError> {
        let mut cache = self.cache.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        *cache = Some(Entries::new());
        Ok(())
    }
}
