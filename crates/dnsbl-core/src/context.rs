//! Per-run correlation context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

static RUN_SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Identity of one monitoring run, handed to every component that logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    /// Correlation id attached to every log event of the run
    pub run_id: String,

    /// When the run started
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    /// Start a new run. The id combines the start time, the process id and
    /// an in-process sequence number, so concurrent runs never collide.
    #[must_use]
    pub fn new() -> Self {
        let started_at = Utc::now();
        let seq = RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let run_id = format!(
            "{}-{:x}-{seq}",
            started_at.format("%Y%m%dT%H%M%S%3fZ"),
            std::process::id()
        );
        Self { run_id, started_at }
    }

    /// Use a caller-supplied id (e.g. a scheduler job name)
    #[must_use]
    pub fn with_id(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Utc::now(),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
