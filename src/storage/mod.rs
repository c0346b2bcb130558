//! Persistence layer.
//!
//! Owns the single live `StoreDocument` for the whole process and mirrors
//! it to a JSON file. Mutations happen in memory first; `commit()` then
//! snapshots the document and writes it in a background task. Each write
//! goes to a sibling temp file which is then renamed over the store, so the
//! file on disk is always one complete snapshot. Writes take turns on a
//! lock; when two commits race, the last one to run wins.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::types::{CatalogEntry, LendbotError, StoreDocument};

/// Default store file path.
pub const DEFAULT_STORE_FILE: &str = "database.json";

/// Handle to the process-wide store. Cloning shares the same document.
#[derive(Clone)]
pub struct PersistedStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    path: PathBuf,
    doc: RwLock<StoreDocument>,
    /// Held for the duration of one file write.
    writer: Mutex<()>,
}

/// Distinguishes temp files of writes issued by this process.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// A scheduled durable write.
///
/// Dropping the handle detaches the write; it still runs and logs its
/// outcome. Awaiting `wait()` surfaces the result to the caller.
#[must_use = "drop the handle to write in the background, or call wait()"]
pub struct CommitHandle {
    task: JoinHandle<Result<()>>,
}

impl CommitHandle {
    pub async fn wait(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| LendbotError::Storage(format!("commit task failed: {e}")))?
    }
}

impl PersistedStore {
    /// Read the store file at startup.
    ///
    /// A missing or malformed file is a startup failure; there is no
    /// fallback to an empty document.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let shown = path.display().to_string();

        let json = std::fs::read_to_string(path).map_err(|e| LendbotError::Startup {
            path: shown.clone(),
            message: e.to_string(),
        })?;

        let doc: StoreDocument = serde_json::from_str(&json).map_err(|e| LendbotError::Startup {
            path: shown.clone(),
            message: e.to_string(),
        })?;

        info!(
            path = %shown,
            catalog = doc.catalog.len(),
            watchlist = doc.watchlist.len(),
            last_updated = ?doc.last_updated,
            "Store loaded from disk"
        );

        Ok(Self::from_document(path, doc))
    }

    /// Wrap an already-built document. The file is only touched on commit.
    pub fn from_document(path: impl AsRef<Path>, doc: StoreDocument) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                path: path.as_ref().to_path_buf(),
                doc: RwLock::new(doc),
                writer: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Snapshot of the live document.
    pub fn get(&self) -> StoreDocument {
        self.read().clone()
    }

    /// Case-insensitive catalog lookup. The query is upper-cased and then
    /// matched against ids as stored.
    pub fn lookup(&self, ticker: &str) -> Option<CatalogEntry> {
        let id = ticker.to_uppercase();
        self.read().find(&id).cloned()
    }

    /// Overwrite the catalog and its refresh time. Never merges.
    pub fn replace_catalog(&self, entries: Vec<CatalogEntry>, timestamp: DateTime<Utc>) {
        let mut doc = self.write();
        debug!(old = doc.catalog.len(), new = entries.len(), "Replacing catalog");
        doc.catalog = entries;
        doc.last_updated = Some(timestamp);
    }

    /// Append the upper-cased ticker. Duplicates are kept.
    pub fn add_to_watchlist(&self, ticker: &str) -> String {
        let coin = ticker.to_uppercase();
        self.write().watchlist.push(coin.clone());
        coin
    }

    /// Remove the first occurrence of the upper-cased ticker.
    pub fn remove_from_watchlist(&self, ticker: &str) -> Result<String, LendbotError> {
        let coin = ticker.to_uppercase();
        let mut doc = self.write();
        match doc.watchlist.iter().position(|c| *c == coin) {
            Some(index) => {
                doc.watchlist.remove(index);
                Ok(coin)
            }
            None => Err(LendbotError::NotInWatchlist(coin)),
        }
    }

    /// Schedule a durable write of the whole document.
    ///
    /// Must be called from within a tokio runtime.
    pub fn commit(&self) -> CommitHandle {
        let inner = Arc::clone(&self.inner);
        let snapshot = serde_json::to_string(&*self.read());

        let task = tokio::spawn(async move {
            let _turn = inner.writer.lock().await;
            let path = &inner.path;
            let result = write_snapshot(path, snapshot).await;
            match &result {
                Ok(()) => info!(path = %path.display(), "Successfully saved store"),
                Err(e) => error!(path = %path.display(), error = %e, "Failed to save store"),
            }
            result
        });

        CommitHandle { task }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreDocument> {
        self.inner.doc.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreDocument> {
        self.inner.doc.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn write_snapshot(path: &Path, snapshot: serde_json::Result<String>) -> Result<()> {
    let json = snapshot.context("Failed to serialise store")?;
    let temp = temp_sibling(path);

    if let Err(e) = tokio::fs::write(&temp, json).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e).with_context(|| format!("Failed to write store to {}", temp.display()));
    }
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e).with_context(|| format!("Failed to replace store at {}", path.display()));
    }
    Ok(())
}

/// `dir/.name.<pid>.<seq>.tmp`, next to the store so the rename stays on
/// one filesystem.
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_STORE_FILE.to_string());
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
