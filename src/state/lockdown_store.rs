use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::lockdown_state::{GuildLockdownState, LockdownCollection};
use crate::error::{BotError, Result};

/// Durable per-guild lockdown records backed by a single JSON file.
///
/// The file is read lazily on first access. Every write replaces the whole
/// file through a temp file and an atomic rename, and all writes (for any
/// guild) are serialized by the same mutex.
pub struct LockdownStore {
    path: PathBuf,

    /// `None` until the file has been read
    collection: Mutex<Option<LockdownCollection>>,
}

impl LockdownStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            collection: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the lockdown record for a guild
    pub async fn get(&self, guild_id: &str) -> Result<Option<GuildLockdownState>> {
        let mut guard = self.collection.lock().await;
        let collection = ensure_loaded(&mut guard, &self.path).await?;
        Ok(collection.get(guild_id).cloned())
    }

    /// Set or replace the lockdown record for a guild
    pub async fn set(&self, guild_id: &str, state: GuildLockdownState) -> Result<()> {
        let mut guard = self.collection.lock().await;
        let collection = ensure_loaded(&mut guard, &self.path).await?;

        let mut next = collection.clone();
        next.insert(guild_id.to_string(), state);
        save_collection(&self.path, &next).await?;

        *collection = next;
        debug!("Persisted lockdown state for guild {}", guild_id);
        Ok(())
    }

    /// Remove the lockdown record for a guild; a no-op when absent
    pub async fn clear(&self, guild_id: &str) -> Result<()> {
        let mut guard = self.collection.lock().await;
        let collection = ensure_loaded(&mut guard, &self.path).await?;

        if !collection.contains_key(guild_id) {
            return Ok(());
        }

        let mut next = collection.clone();
        next.remove(guild_id);
        save_collection(&self.path, &next).await?;

        *collection = next;
        debug!("Cleared lockdown state for guild {}", guild_id);
        Ok(())
    }

    /// All records currently marked active
    pub async fn active_guilds(&self) -> Result<Vec<GuildLockdownState>> {
        let mut guard = self.collection.lock().await;
        let collection = ensure_loaded(&mut guard, &self.path).await?;

        let mut active: Vec<GuildLockdownState> = collection
            .values()
            .filter(|state| state.active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.guild_id.cmp(&b.guild_id));
        Ok(active)
    }
}

async fn ensure_loaded<'a>(
    slot: &'a mut Option<LockdownCollection>,
    path: &Path,
) -> Result<&'a mut LockdownCollection> {
    if slot.is_none() {
        let collection = load_collection(path).await?;
        info!(
            "Loaded {} lockdown record(s) from {}",
            collection.len(),
            path.display()
        );
        *slot = Some(collection);
    }

    Ok(slot.get_or_insert_with(LockdownCollection::new))
}

/// Read the collection; a missing file is an empty collection
async fn load_collection(path: &Path) -> Result<LockdownCollection> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(LockdownCollection::new())
        }
        Err(e) => {
            return Err(BotError::StateLoad {
                path: path.display().to_string(),
                source: e,
            })
        }
    };

    match parse_collection(path, &content) {
        Ok(collection) => Ok(collection),
        Err(BotError::StateCorrupt { source, .. }) => {
            let preserved = preserve_corrupt_file(path).await?;
            warn!(
                "Lockdown state file {} is corrupt ({}); moved it to {} and starting empty",
                path.display(),
                source,
                preserved.display()
            );
            Ok(LockdownCollection::new())
        }
        Err(e) => Err(e),
    }
}

fn parse_collection(path: &Path, content: &str) -> Result<LockdownCollection> {
    serde_json::from_str(content).map_err(|e| BotError::StateCorrupt {
        path: path.display().to_string(),
        source: e,
    })
}

/// Move an unreadable state file aside so it can be inspected later
async fn preserve_corrupt_file(path: &Path) -> Result<PathBuf> {
    let preserved = PathBuf::from(format!(
        "{}.corrupt-{}",
        path.display(),
        Utc::now().timestamp_millis()
    ));

    tokio::fs::rename(path, &preserved)
        .await
        .map_err(|e| BotError::StateLoad {
            path: path.display().to_string(),
            source: e,
        })?;

    Ok(preserved)
}

/// Save the collection atomically (temp file, fsync, rename)
async fn save_collection(path: &Path, collection: &LockdownCollection) -> Result<()> {
    let content = serde_json::to_string_pretty(collection)?;
    let save_err = |e: std::io::Error| BotError::StateSave {
        path: path.display().to_string(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(save_err)?;
    }

    let temp_path = PathBuf::from(format!("{}.tmp", path.display()));
    let mut file = tokio::fs::File::create(&temp_path)
        .await
        .map_err(save_err)?;
    file.write_all(content.as_bytes()).await.map_err(save_err)?;
    file.sync_all().await.map_err(save_err)?;
    drop(file);

    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(save_err)?;

    // Commit the rename itself
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fsync_directory(parent).await.map_err(save_err)?;

    Ok(())
}

async fn fsync_directory(dir: &Path) -> std::io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

/// Shared lockdown store type
pub type SharedLockdownStore = Arc<LockdownStore>;

pub fn create_shared_lockdown_store(path: impl Into<PathBuf>) -> SharedLockdownStore {
    Arc::new(LockdownStore::new(path))
}
