//! File-backed view store with manifest-based atomic commits.
//!
//! Layout under the data directory:
//!
//! ```text
//! MANIFEST.json                  current generation -> file per collection
//! pairs-000000000007.json        one immutable file per written generation
//! swaps-000000000007.json
//! requests-000000000003.json
//! ```
//!
//! A commit writes each collection of the batch to a fresh generation
//! file (temp file, fsync, rename), then atomically replaces the manifest.
//! The manifest rename is the commit point: a crash before it leaves the
//! previous manifest and its files untouched, and orphaned generation
//! files are swept on the next [`FileViewStore::open`].
//!
//! The write itself runs on its own task holding the manifest lock, so a
//! caller that stops waiting (an I/O timeout, a dropped request) never
//! leaves the manifest on disk ahead of the one in memory. Later loads and
//! commits queue on the lock until that task finishes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use super::{Collection, StoreError, ViewStore};

const MANIFEST_FILE: &str = "MANIFEST.json";
const TEMP_SUFFIX: &str = "tmp";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Manifest {
    generation: u64,
    files: BTreeMap<Collection, String>,
}

/// [`ViewStore`] persisting each collection as a JSON file.
///
/// Commits are serialised by an internal lock; loads share it so a
/// reader never opens a generation file that is being swept.
#[derive(Debug)]
pub struct FileViewStore {
    dir: PathBuf,
    manifest: Arc<RwLock<Manifest>>,
}

impl FileViewStore {
    /// Opens (or initialises) a store rooted at `dir`.
    ///
    /// Creates the directory if needed, reads the manifest, and removes
    /// temp files and generation files left behind by interrupted commits.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created or
    /// read, and [`StoreError::CorruptManifest`] if the manifest does not
    /// decode.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let manifest = match tokio::fs::read(dir.join(MANIFEST_FILE)).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::CorruptManifest(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Manifest::default(),
            Err(e) => return Err(e.into()),
        };

        let store = Self {
            dir,
            manifest: Arc::new(RwLock::new(manifest)),
        };
        store.sweep().await?;
        tracing::info!(dir = %store.dir.display(), "file view store opened");
        Ok(store)
    }

    /// Root directory of the store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Removes every file in the directory that the manifest does not
    /// reference and that looks like a collection or temp file.
    async fn sweep(&self) -> Result<(), StoreError> {
        let manifest = self.manifest.read().await;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let referenced = manifest.files.values().any(|f| *f == name);
            if referenced || name == MANIFEST_FILE || !is_store_file(&name) {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => tracing::debug!(file = %name, "removed orphaned store file"),
                Err(e) => tracing::warn!(file = %name, error = %e, "failed to remove orphaned store file"),
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ViewStore for FileViewStore {
    async fn load(&self, collection: Collection) -> Result<Option<serde_json::Value>, StoreError> {
        let manifest = self.manifest.read().await;
        let Some(file) = manifest.files.get(&collection) else {
            return Ok(None);
        };
        let bytes = match tokio::fs::read(self.dir.join(file)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::Corrupt {
                    collection,
                    reason: format!("manifest references missing file {file}"),
                });
            }
            Err(e) => return Err(e.into()),
        };
        drop(manifest);

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                collection,
                reason: e.to_string(),
            })
    }

    async fn commit(&self, batch: Vec<(Collection, serde_json::Value)>) -> Result<(), StoreError> {
        let manifest = Arc::clone(&self.manifest).write_owned().await;
        let dir = self.dir.clone();
        tokio::spawn(write_generation(dir, manifest, batch))
            .await
            .map_err(|e| StoreError::Io(format!("commit task failed: {e}")))?
    }
}

/// Writes one generation and swaps the manifest, in memory and on disk,
/// while holding the manifest write lock.
async fn write_generation(
    dir: PathBuf,
    mut manifest: OwnedRwLockWriteGuard<Manifest>,
    batch: Vec<(Collection, serde_json::Value)>,
) -> Result<(), StoreError> {
    let generation = manifest.generation.saturating_add(1);

    let mut next = manifest.clone();
    next.generation = generation;
    for (collection, document) in &batch {
        let file = format!("{}-{generation:012}.json", collection.name());
        let bytes = serde_json::to_vec(document).map_err(|e| StoreError::Corrupt {
            collection: *collection,
            reason: format!("encode failed: {e}"),
        })?;
        write_atomic(&dir.join(&file), &bytes).await?;
        next.files.insert(*collection, file);
    }

    let manifest_bytes =
        serde_json::to_vec_pretty(&next).map_err(|e| StoreError::Io(e.to_string()))?;
    write_atomic(&dir.join(MANIFEST_FILE), &manifest_bytes).await?;
    sync_dir(&dir).await;

    let superseded: Vec<String> = batch
        .iter()
        .filter_map(|(collection, _)| manifest.files.get(collection).cloned())
        .collect();
    *manifest = next;
    drop(manifest);

    for file in superseded {
        if let Err(e) = tokio::fs::remove_file(dir.join(&file)).await {
            tracing::warn!(file = %file, error = %e, "failed to remove superseded generation");
        }
    }
    tracing::debug!(generation, collections = batch.len(), "view batch committed");
    Ok(())
}

/// Writes `bytes` to `path` through a synced temp file and a rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension(TEMP_SUFFIX);
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Flushes directory metadata so renames survive power loss. Best effort:
/// not every platform allows opening a directory for sync.
async fn sync_dir(dir: &Path) {
    if let Ok(handle) = tokio::fs::File::open(dir).await
        && let Err(e) = handle.sync_all().await
    {
        tracing::debug!(error = %e, "directory sync unsupported");
    }
}

fn is_store_file(name: &str) -> bool {
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return false;
    };
    if ext == TEMP_SUFFIX {
        return true;
    }
    ext == "json"
        && Collection::ALL
            .iter()
            .any(|c| stem.starts_with(&format!("{}-", c.name())))
}
