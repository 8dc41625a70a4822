//! Workspace lifecycle
//!
//! Each generation request gets its own directory under the scratch root,
//! named by a random UUID. The manager keeps one expiry record per live
//! workspace; whoever removes a record from the table is the one that
//! deletes the directory, so every workspace is deleted exactly once.

use folio_common::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How a workspace's output will be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceMode {
    /// Served over HTTP from the workspace until it expires
    Preview,
    /// Packaged into an archive and streamed once
    Download,
}

/// Time-to-live per workspace mode
#[derive(Debug, Clone, Copy)]
pub struct WorkspaceTtls {
    pub download: Duration,
    pub preview: Duration,
}

impl Default for WorkspaceTtls {
    fn default() -> Self {
        Self {
            download: Duration::from_secs(30),
            preview: Duration::from_secs(10 * 60),
        }
    }
}

impl WorkspaceTtls {
    pub fn for_mode(&self, mode: WorkspaceMode) -> Duration {
        match mode {
            WorkspaceMode::Download => self.download,
            WorkspaceMode::Preview => self.preview,
        }
    }

    /// Deadline for workspaces allocated but never scheduled
    fn pending_grace(&self) -> Duration {
        self.download.max(self.preview)
    }
}

/// An isolated directory owned by one request
#[derive(Debug, Clone)]
pub struct Workspace {
    pub id: Uuid,
    pub dir: PathBuf,
    pub mode: WorkspaceMode,
    pub created_at: Instant,
    pub expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordState {
    /// Allocated, output still being written
    Pending,
    /// An archive of the workspace is being streamed; never swept
    Streaming,
    /// Ready, deleted once `expires_at` passes
    Scheduled,
}

#[derive(Debug)]
struct ExpiryRecord {
    dir: PathBuf,
    mode: WorkspaceMode,
    expires_at: Instant,
    state: RecordState,
}

/// Allocates workspaces and reclaims them
pub struct WorkspaceManager {
    root: PathBuf,
    ttls: WorkspaceTtls,
    records: Mutex<HashMap<Uuid, ExpiryRecord>>,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>, ttls: WorkspaceTtls) -> Self {
        Self {
            root: root.into(),
            ttls,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ttls(&self) -> WorkspaceTtls {
        self.ttls
    }

    /// Create a fresh, empty workspace directory.
    ///
    /// The workspace is registered with a pending deadline right away, so it
    /// is reclaimed by the sweep even if the request never schedules it.
    pub async fn allocate(&self, mode: WorkspaceMode) -> Result<Workspace> {
        let id = Uuid::new_v4();
        let dir = self.root.join(id.to_string());

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::create_dir(&dir).await?;

        let created_at = Instant::now();
        let expires_at = created_at + self.ttls.pending_grace();

        self.records.lock().await.insert(
            id,
            ExpiryRecord {
                dir: dir.clone(),
                mode,
                expires_at,
                state: RecordState::Pending,
            },
        );

        debug!("Allocated {:?} workspace {}", mode, id);

        Ok(Workspace {
            id,
            dir,
            mode,
            created_at,
            expires_at,
        })
    }

    /// Register deletion of the workspace `ttl` from now.
    ///
    /// Marks the workspace as ready; previews are only served once scheduled.
    /// Returns false if the workspace was already reclaimed.
    pub async fn schedule_expiry(&self, workspace: &mut Workspace, ttl: Duration) -> bool {
        let expires_at = Instant::now() + ttl;
        let mut records = self.records.lock().await;

        match records.get_mut(&workspace.id) {
            Some(record) => {
                record.expires_at = expires_at;
                record.state = RecordState::Scheduled;
                workspace.expires_at = expires_at;
                debug!("Workspace {} expires in {:?}", workspace.id, ttl);
                true
            }
            None => {
                warn!("Cannot schedule expiry, workspace {} already reclaimed", workspace.id);
                false
            }
        }
    }

    /// Hold the workspace while its archive streams out.
    ///
    /// The sweep skips streaming workspaces however slow the client is; the
    /// stream's owner must finish with `schedule_expiry` or `destroy_now`.
    /// Returns false if the workspace was already reclaimed.
    pub async fn begin_streaming(&self, workspace: &Workspace) -> bool {
        let mut records = self.records.lock().await;

        match records.get_mut(&workspace.id) {
            Some(record) => {
                record.state = RecordState::Streaming;
                debug!("Workspace {} is streaming", workspace.id);
                true
            }
            None => {
                warn!("Cannot stream, workspace {} already reclaimed", workspace.id);
                false
            }
        }
    }

    /// Delete the workspace immediately.
    ///
    /// A no-op if the workspace was already reclaimed.
    pub async fn destroy_now(&self, workspace: &Workspace) {
        let record = self.records.lock().await.remove(&workspace.id);

        match record {
            Some(record) => {
                remove_tree(&record.dir).await;
                info!("Destroyed workspace {}", workspace.id);
            }
            None => debug!("Workspace {} already reclaimed", workspace.id),
        }
    }

    /// Delete every workspace past its deadline. Returns how many were reclaimed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();

        let expired: Vec<(Uuid, PathBuf)> = {
            let mut records = self.records.lock().await;
            let ids: Vec<Uuid> = records
                .iter()
                .filter(|(_, record)| {
                    record.state != RecordState::Streaming && record.expires_at <= now
                })
                .map(|(id, _)| *id)
                .collect();

            ids.into_iter()
                .filter_map(|id| records.remove(&id).map(|record| (id, record.dir)))
                .collect()
        };

        for (id, dir) in &expired {
            remove_tree(dir).await;
            debug!("Workspace {} expired", id);
        }

        if !expired.is_empty() {
            info!("Reclaimed {} expired workspace(s)", expired.len());
        }

        expired.len()
    }

    /// Resolve a client-supplied workspace id to the directory of a live,
    /// fully rendered preview workspace.
    pub async fn lookup(&self, raw_id: &str) -> Result<PathBuf> {
        let id = Uuid::parse_str(raw_id).map_err(|_| Error::PreviewExpired)?;

        let records = self.records.lock().await;
        match records.get(&id) {
            Some(record)
                if record.mode == WorkspaceMode::Preview
                    && record.state == RecordState::Scheduled
                    && record.expires_at > Instant::now() =>
            {
                Ok(record.dir.clone())
            }
            _ => Err(Error::PreviewExpired),
        }
    }

    /// Number of workspaces not yet reclaimed
    pub async fn live_count(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Remove directories left in the scratch root by a previous process.
    pub async fn purge_stale(&self) -> Result<usize> {
        if !self.root.exists() {
            return Ok(0);
        }

        let live: Vec<PathBuf> = self
            .records
            .lock()
            .await
            .values()
            .map(|record| record.dir.clone())
            .collect();

        let mut purged = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_workspace = path
                .file_name()
                .and_then(|s| s.to_str())
                .is_some_and(|name| Uuid::parse_str(name).is_ok());

            if is_workspace && !live.contains(&path) {
                remove_tree(&path).await;
                purged += 1;
            }
        }

        if purged > 0 {
            info!("Purged {} stale workspace(s) from {}", purged, self.root.display());
        }

        Ok(purged)
    }

    /// Run `sweep_expired` every `interval` on a background task
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Workspace sweeper started (every {:?})", interval);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                self.sweep_expired().await;
            }
        })
    }
}

/// Recursively delete `dir`. An already absent directory is fine; other
/// failures are logged and dropped.
async fn remove_tree(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Workspace directory already gone: {}", dir.display());
        }
        Err(e) => warn!("Failed to delete workspace {}: {}", dir.display(), e),
    }
}
