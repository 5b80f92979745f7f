//! IP state storage.
//!
//! [`IpStore`] is the seam between the decision core and wherever IP rows
//! live. [`JsonFileStore`] keeps them in a JSON array on disk, one object
//! per IP, in the column layout of the mail server's `ip_addresses` table.

use async_trait::async_trait;
use dnsbl_core::{IpState, StateTransition, TransitionKind, ZoneSet};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::PriorityPolicy;

/// Priority assumed for rows that have none
pub const DEFAULT_PRIORITY: u8 = 100;

/// Errors from the IP store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the backing file failed
    #[error("store I/O error on {}: {source}", path.display())]
    Io {
        /// Backing file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The backing file is not a JSON array of rows
    #[error("store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No row with this id
    #[error("no IP row with id {0}")]
    NotFound(u64),
}

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Where IP state comes from and where transitions are written.
#[async_trait]
pub trait IpStore: Send + Sync {
    /// Every IP with a usable IPv4 address, ordered by id
    async fn fetch_all(&self) -> Result<Vec<IpState>>;

    /// Persist a transition. Returns false when the stored zone list already
    /// matched and nothing was written.
    async fn apply(
        &self,
        state: &IpState,
        transition: &StateTransition,
        policy: &PriorityPolicy,
    ) -> Result<bool>;
}

/// One persisted row. Unknown columns are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpRow {
    /// Row id
    pub id: u64,
    /// Address as stored
    pub ip: String,
    /// Current priority
    #[serde(default)]
    pub priority: Option<u8>,
    /// Priority saved while listed
    #[serde(default)]
    pub old_priority: Option<u8>,
    /// Comma-joined sorted zones
    #[serde(default)]
    pub blocking_lists: Option<String>,
    /// Last applied change
    #[serde(default)]
    pub last_event: Option<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl IpRow {
    /// A clean row
    #[must_use]
    pub fn new(id: u64, ip: impl Into<String>, priority: u8) -> Self {
        Self {
            id,
            ip: ip.into(),
            priority: Some(priority),
            old_priority: None,
            blocking_lists: None,
            last_event: None,
            extra: serde_json::Map::new(),
        }
    }

    fn stored_zones(&self) -> String {
        ZoneSet::from_persisted(self.blocking_lists.as_deref().unwrap_or_default()).to_persisted()
    }

    fn to_state(&self) -> Option<IpState> {
        let address: Ipv4Addr = self.ip.trim().parse().ok()?;
        Some(IpState {
            id: self.id,
            address,
            priority: self.priority.unwrap_or(DEFAULT_PRIORITY),
            backup_priority: self.old_priority,
            listed_zones: ZoneSet::from_persisted(self.blocking_lists.as_deref().unwrap_or_default()),
            last_event: self.last_event.clone(),
        })
    }

    /// Apply one transition to this row. Returns false when the stored zone
    /// list already equals the target.
    fn apply(&mut self, transition: &StateTransition, policy: &PriorityPolicy) -> bool {
        let zones: ZoneSet = transition.listed_zones.iter().map(String::as_str).collect();
        let target = zones.to_persisted();
        if self.stored_zones() == target {
            return false;
        }

        match transition.kind() {
            TransitionKind::FirstListing => {
                let current = self.priority.unwrap_or(DEFAULT_PRIORITY);
                if self.old_priority.is_none() {
                    self.old_priority = Some(current);
                }
                self.priority = Some(policy.listed_priority);
                self.last_event = Some(format!("new block from list(s) {target}"));
                info!(
                    ip = %self.ip,
                    from = current,
                    to = policy.listed_priority,
                    zones = zones.len(),
                    "CLEAN -> LISTED"
                );
            }
            TransitionKind::Recovery => {
                let restored = self.old_priority.unwrap_or(policy.clean_fallback_priority);
                if self.old_priority.is_none() {
                    warn!(ip = %self.ip, fallback = restored, "no saved priority, using fallback");
                }
                self.priority = Some(restored);
                self.old_priority = None;
                self.last_event = Some("block removed".into());
                info!(ip = %self.ip, priority = restored, "LISTED -> CLEAN");
            }
            TransitionKind::ZoneChange => {
                self.last_event = Some(format!("blocking list change: {target}"));
                info!(ip = %self.ip, zones = zones.len(), "LISTED -> LISTED (zone change)");
            }
        }
        self.blocking_lists = Some(target);
        true
    }
}

/// IP rows in a JSON file, loaded into memory and rewritten on change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    rows: Mutex<Vec<IpRow>>,
}

impl JsonFileStore {
    /// Load the rows from `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
        let mut rows: Vec<IpRow> = serde_json::from_str(&content)?;
        rows.sort_by_key(|r| r.id);
        debug!(path = %path.display(), rows = rows.len(), "loaded IP store");
        Ok(Self {
            path,
            rows: Mutex::new(rows),
        })
    }

    /// Backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of every row, including unusable ones
    pub async fn rows(&self) -> Vec<IpRow> {
        self.rows.lock().await.clone()
    }

    /// Write to a sibling temp file, then rename over the original.
    async fn persist(&self, rows: &[IpRow]) -> Result<()> {
        let body = serde_json::to_vec_pretty(rows)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        tokio::fs::write(&tmp, body).await.map_err(io_err)?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                warn!(
                    path = %tmp.display(),
                    error = %cleanup,
                    "could not remove temporary store file"
                );
            }
            return Err(io_err(e));
        }
        Ok(())
    }
}

#[async_trait]
impl IpStore for JsonFileStore {
    async fn fetch_all(&self) -> Result<Vec<IpState>> {
        let rows = self.rows.lock().await;
        let states = rows
            .iter()
            .filter_map(|row| {
                let state = row.to_state();
                if state.is_none() {
                    warn!(id = row.id, ip = %row.ip, "skipping row with invalid IPv4 address");
                }
                state
            })
            .collect();
        Ok(states)
    }

    async fn apply(
        &self,
        state: &IpState,
        transition: &StateTransition,
        policy: &PriorityPolicy,
    ) -> Result<bool> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .iter_mut()
            .find(|r| r.id == state.id)
            .ok_or(StoreError::NotFound(state.id))?;

        let before = row.clone();
        if !row.apply(transition, policy) {
            debug!(ip = %state.address, "stored zones already current, skipping write");
            return Ok(false);
        }

        if let Err(e) = self.persist(&rows).await {
            if let Some(row) = rows.iter_mut().find(|r| r.id == state.id) {
                *row = before;
            }
            return Err(e);
        }
        Ok(true)
    }
}
