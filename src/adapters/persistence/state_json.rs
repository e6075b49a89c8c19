//! Implements StatePort using a JSON file plus a sibling lock file.
//!
//! The state file is rewritten atomically after every completed run. The lock
//! file (`<state>.lock`) marks a run in progress across processes.
//!
//! Lock protocol:
//! - A free lock is taken with `create_new`, so only one creator wins
//! - Replacing a stale lock and releasing a lock both run under a short-lived
//!   guard file (`<state>.lock.guard`, also `create_new`), so the existing lock
//!   is never read and replaced or removed by two processes at once
//! - Every lock carries a random token; a run only removes a lock whose token
//!   is its own

use crate::domain::{DomainError, RunState};
use crate::ports::StatePort;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Attempts to take the guard on unlock before giving up.
const GUARD_ATTEMPTS: u32 = 50;
const GUARD_RETRY: Duration = Duration::from_millis(20);
/// A guard lives for milliseconds; one this old was left by a crash.
const GUARD_STALE_AFTER: Duration = Duration::from_secs(60);

/// Contents of the lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    acquired_at: DateTime<Utc>,
    #[serde(default)]
    token: String,
}

impl LockInfo {
    fn fresh() -> Self {
        Self {
            pid: std::process::id(),
            acquired_at: Utc::now(),
            token: format!("{:016x}", rand::random::<u64>()),
        }
    }

    fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.acquired_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// JSON file-based state storage.
pub struct StateJson {
    path: PathBuf,
    lock_path: PathBuf,
    guard_path: PathBuf,
    stale_after: Duration,
    /// Token of the lock this instance holds.
    held: Mutex<Option<String>>,
}

impl StateJson {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut lock = path.clone().into_os_string();
        lock.push(".lock");
        let mut guard = lock.clone();
        guard.push(".guard");
        Self {
            path,
            lock_path: PathBuf::from(lock),
            guard_path: PathBuf::from(guard),
            stale_after: Duration::from_secs(30 * 60),
            held: Mutex::new(None),
        }
    }

    /// A lock older than this is treated as left behind by a killed process.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    async fn ensure_parent(&self) -> Result<(), DomainError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::State(format!("create state dir: {}", e)))?;
        }
        Ok(())
    }

    fn set_held(&self, token: Option<String>) {
        if let Ok(mut held) = self.held.lock() {
            *held = token;
        }
    }

    fn held_token(&self) -> Option<String> {
        self.held.lock().ok().and_then(|h| h.clone())
    }

    /// Create `path` only if it does not exist and write `info` into it.
    async fn create_exclusive(path: &Path, info: &LockInfo) -> std::io::Result<()> {
        let mut f = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        let json = serde_json::to_vec(info).map_err(std::io::Error::other)?;
        f.write_all(&json).await?;
        f.sync_all().await
    }

    /// Current lock contents. `Ok(None)` when there is no lock file; a lock
    /// that cannot be parsed gets its file mtime as acquisition time.
    async fn read_lock(&self) -> std::io::Result<Option<LockInfo>> {
        let raw = match fs::read_to_string(&self.lock_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        if let Ok(info) = serde_json::from_str::<LockInfo>(&raw) {
            return Ok(Some(info));
        }
        let modified = fs::metadata(&self.lock_path).await?.modified()?;
        Ok(Some(LockInfo {
            pid: 0,
            acquired_at: DateTime::<Utc>::from(modified),
            token: String::new(),
        }))
    }

    /// Take the guard file. `Ok(false)` when another process holds it.
    async fn enter_guard(&self) -> Result<bool, DomainError> {
        match Self::create_exclusive(&self.guard_path, &LockInfo::fresh()).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let age = fs::metadata(&self.guard_path)
                    .await
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .and_then(|m| m.elapsed().ok())
                    .unwrap_or(Duration::ZERO);
                if age >= GUARD_STALE_AFTER {
                    return Err(DomainError::State(format!(
                        "lock guard {} is {} s old; remove it once no run is active",
                        self.guard_path.display(),
                        age.as_secs()
                    )));
                }
                Ok(false)
            }
            Err(e) => Err(DomainError::State(format!("create lock guard: {}", e))),
        }
    }

    async fn leave_guard(&self) {
        if let Err(e) = fs::remove_file(&self.guard_path).await {
            warn!(path = %self.guard_path.display(), error = %e, "failed to remove lock guard");
        }
    }

    /// Under the guard: take a missing lock or replace a stale one.
    async fn reclaim(&self) -> Result<bool, DomainError> {
        let current = self
            .read_lock()
            .await
            .map_err(|e| DomainError::State(format!("read lock file: {}", e)))?;
        let mine = LockInfo::fresh();

        match current {
            None => match Self::create_exclusive(&self.lock_path, &mine).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
                Err(e) => return Err(DomainError::State(format!("create lock file: {}", e))),
            },
            Some(info) if info.age() >= self.stale_after => {
                info!(
                    path = %self.lock_path.display(),
                    age_secs = info.age().as_secs(),
                    stale_pid = info.pid,
                    "reclaiming stale run lock"
                );
                // Replace in one rename so the lock path never goes missing.
                let mut temp = self.lock_path.clone().into_os_string();
                temp.push(format!(".{}.tmp", mine.token));
                let temp = PathBuf::from(temp);
                Self::create_exclusive(&temp, &mine)
                    .await
                    .map_err(|e| DomainError::State(format!("write lock file: {}", e)))?;
                if let Err(e) = fs::rename(&temp, &self.lock_path).await {
                    if let Err(cleanup) = fs::remove_file(&temp).await {
                        warn!(path = %temp.display(), error = %cleanup, "failed to remove temp lock");
                    }
                    return Err(DomainError::State(format!("replace stale lock: {}", e)));
                }
            }
            Some(_) => return Ok(false),
        }

        self.set_held(Some(mine.token));
        Ok(true)
    }
}

#[async_trait::async_trait]
impl StatePort for StateJson {
    async fn load(&self) -> RunState {
        match fs::read_to_string(&self.path).await {
            Ok(s) => match serde_json::from_str(&s) {
                Ok(state) => state,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "state file is corrupt, treating as never run");
                    RunState::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file yet");
                RunState::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "state file unreadable, treating as never run");
                RunState::default()
            }
        }
    }

    /// Atomic save using write-replace pattern.
    /// 1. Write to temp file
    /// 2. sync_all() to ensure flush to disk
    /// 3. Atomic rename to target path
    async fn save(&self, state: &RunState) -> Result<(), DomainError> {
        self.ensure_parent().await?;
        let json =
            serde_json::to_string_pretty(state).map_err(|e| DomainError::State(e.to_string()))?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&temp_path)
            .await
            .map_err(|e| DomainError::State(format!("create temp file: {}", e)))?;
        f.write_all(json.as_bytes())
            .await
            .map_err(|e| DomainError::State(format!("write temp file: {}", e)))?;
        f.sync_all()
            .await
            .map_err(|e| DomainError::State(format!("sync temp file: {}", e)))?;
        drop(f);

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| DomainError::State(format!("atomic rename failed: {}", e)))?;

        debug!(path = %self.path.display(), run_count = state.run_count, "state saved");
        Ok(())
    }

    async fn try_lock(&self) -> Result<bool, DomainError> {
        self.ensure_parent().await?;
        let mine = LockInfo::fresh();
        match Self::create_exclusive(&self.lock_path, &mine).await {
            Ok(()) => {
                self.set_held(Some(mine.token));
                return Ok(true);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(DomainError::State(format!("create lock file: {}", e))),
        }

        if !self.enter_guard().await? {
            debug!(path = %self.guard_path.display(), "lock guard busy, another run is starting");
            return Ok(false);
        }
        let result = self.reclaim().await;
        self.leave_guard().await;
        result
    }

    async fn unlock(&self) {
        let Some(token) = self.held_token() else {
            return;
        };
        self.set_held(None);

        let mut guarded = false;
        for _ in 0..GUARD_ATTEMPTS {
            match self.enter_guard().await {
                Ok(true) => {
                    guarded = true;
                    break;
                }
                Ok(false) => tokio::time::sleep(GUARD_RETRY).await,
                Err(e) => {
                    warn!(error = %e, "cannot take lock guard");
                    break;
                }
            }
        }
        if !guarded {
            warn!(path = %self.lock_path.display(), "run lock left in place, it will go stale");
            return;
        }

        match self.read_lock().await {
            Ok(Some(info)) if info.token == token => {
                if let Err(e) = fs::remove_file(&self.lock_path).await {
                    warn!(path = %self.lock_path.display(), error = %e, "failed to remove run lock");
                }
            }
            Ok(Some(info)) => warn!(
                path = %self.lock_path.display(),
                pid = info.pid,
                "run lock was reclaimed by another run, leaving it"
            ),
            Ok(None) => warn!(path = %self.lock_path.display(), "run lock already removed"),
            Err(e) => warn!(path = %self.lock_path.display(), error = %e, "failed to read run lock"),
        }
        self.leave_guard().await;
    }
}
