//! # Import Job State Machine
//!
//! The persisted record behind a user's import and its validated transitions.
//!
//! ## State Machine
//!
//! ```text
//! AwaitingSelection → Fetching{cursor} → Transferring → Done → (deleted)
//!                          │    ↺ page        ↺ item
//!                          └─────────────────────→ Done   (zero items)
//! ```
//!
//! `Fetching` carries the page cursor of the next listing page, so a listing
//! interrupted between pages resumes where it stopped. Every page is appended
//! to `pending_items` before the cursor advances.
//!
//! A record is owned by exactly one owner id. Only the job driver mutates or
//! deletes it; the status layer never does.

use crate::error::{ImportError, Result};
use bridge_traits::picker::MediaItem;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for one import attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the job is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobState {
    /// User has not finished picking
    AwaitingSelection,
    /// Listing selected items; `cursor` is the next page token
    Fetching { cursor: Option<String> },
    /// Listing complete, items remain
    Transferring,
    /// Listing complete, nothing remains
    Done,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::AwaitingSelection => "awaiting_selection",
            JobState::Fetching { .. } => "fetching",
            JobState::Transferring => "transferring",
            JobState::Done => "done",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Authoritative record of a user's import
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub owner_id: String,
    pub remote_session_id: String,
    pub access_token: String,
    /// Unix seconds after which `access_token` is no longer accepted
    #[serde(default)]
    pub token_expires_at: Option<i64>,
    pub state: JobState,
    /// Items still to transfer, in listing order
    #[serde(default)]
    pub pending_items: Vec<MediaItem>,
    /// Consecutive failed steps
    #[serde(default)]
    pub failed_attempts: u32,
    /// Unix seconds before which a step must not retry
    #[serde(default)]
    pub retry_not_before: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl fmt::Debug for JobRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRecord")
            .field("job_id", &self.job_id)
            .field("owner_id", &self.owner_id)
            .field("remote_session_id", &self.remote_session_id)
            .field("access_token", &"[REDACTED]")
            .field("state", &self.state)
            .field("pending_items", &self.pending_items.len())
            .field("failed_attempts", &self.failed_attempts)
            .field("retry_not_before", &self.retry_not_before)
            .finish()
    }
}

impl JobRecord {
    /// Fresh job waiting for the user to pick
    pub fn new(
        owner_id: impl Into<String>,
        remote_session_id: impl Into<String>,
        access_token: impl Into<String>,
        now: i64,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            owner_id: owner_id.into(),
            remote_session_id: remote_session_id.into(),
            access_token: access_token.into(),
            token_expires_at: None,
            state: JobState::AwaitingSelection,
            pending_items: Vec::new(),
            failed_attempts: 0,
            retry_not_before: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_token_expiry(mut self, expires_at: i64) -> Self {
        self.token_expires_at = Some(expires_at);
        self
    }

    /// The user finished picking
    pub fn session_complete(&self) -> bool {
        !matches!(self.state, JobState::AwaitingSelection)
    }

    /// The full listing has been persisted
    pub fn items_fetched(&self) -> bool {
        matches!(self.state, JobState::Transferring | JobState::Done)
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, JobState::Done)
    }

    pub fn token_expired(&self, now: i64) -> bool {
        self.token_expires_at.is_some_and(|at| now >= at)
    }

    /// `AwaitingSelection → Fetching{None}`
    pub fn mark_session_complete(&mut self) -> Result<()> {
        self.validate_transition("fetching", matches!(self.state, JobState::AwaitingSelection))?;
        self.state = JobState::Fetching { cursor: None };
        Ok(())
    }

    /// Append one listing page and advance the cursor
    ///
    /// Items already pending are skipped, so re-reading a page after an
    /// interrupted persist does not queue duplicates. A page without a next
    /// token ends the listing.
    pub fn append_page(&mut self, items: Vec<MediaItem>, next_cursor: Option<String>) -> Result<usize> {
        self.validate_transition(
            "fetching",
            matches!(self.state, JobState::Fetching { .. }),
        )?;

        let mut known: HashSet<String> = self.pending_items.iter().map(|i| i.id.clone()).collect();
        let before = self.pending_items.len();
        for item in items {
            if known.insert(item.id.clone()) {
                self.pending_items.push(item);
            }
        }

        self.state = match next_cursor {
            Some(cursor) => JobState::Fetching {
                cursor: Some(cursor),
            },
            None if self.pending_items.is_empty() => JobState::Done,
            None => JobState::Transferring,
        };

        Ok(self.pending_items.len() - before)
    }

    /// Next item to transfer, if any
    pub fn next_item(&self) -> Option<&MediaItem> {
        match self.state {
            JobState::Transferring => self.pending_items.first(),
            _ => None,
        }
    }

    /// Remove an item whose blob write has been confirmed
    pub fn complete_item(&mut self, item_id: &str) -> Result<()> {
        self.validate_transition("transferring", matches!(self.state, JobState::Transferring))?;

        let position = self
            .pending_items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| ImportError::InvalidStateTransition {
                from: self.state.to_string(),
                to: "transferring".to_string(),
                reason: format!("item {} is not pending", item_id),
            })?;
        self.pending_items.remove(position);

        if self.pending_items.is_empty() {
            self.state = JobState::Done;
        }
        Ok(())
    }

    /// Whether a step may run at `now`
    pub fn retry_due(&self, now: i64) -> bool {
        self.retry_not_before.map_or(true, |at| now >= at)
    }

    pub fn is_exhausted(&self, max_attempts: u32) -> bool {
        self.failed_attempts >= max_attempts
    }

    /// Count a failed step and open the backoff window
    ///
    /// Delay is `min(base * 2^(n-1), max)` for the n-th consecutive failure.
    pub fn record_failure(&mut self, now: i64, base: Duration, max: Duration) {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        let exponent = self.failed_attempts.saturating_sub(1).min(31);
        let delay = base.saturating_mul(1u32 << exponent).min(max);
        self.retry_not_before = Some(now + delay.as_secs() as i64);
        self.updated_at = now;
    }

    pub fn reset_failures(&mut self) {
        self.failed_attempts = 0;
        self.retry_not_before = None;
    }

    /// Mark successful progress at `now`
    pub fn touch(&mut self, now: i64) {
        self.reset_failures();
        self.updated_at = now;
    }

    /// Check record invariants
    ///
    /// # Errors
    ///
    /// Returns an error if items are pending before selection completed, a
    /// finished listing is in the wrong state for its queue, or identifying
    /// fields are empty.
    pub fn validate(&self) -> Result<()> {
        if self.owner_id.is_empty() {
            return Err(ImportError::MissingField("owner_id".to_string()));
        }
        if self.remote_session_id.is_empty() {
            return Err(ImportError::MissingField("remote_session_id".to_string()));
        }

        let consistent = match self.state {
            JobState::AwaitingSelection | JobState::Done => self.pending_items.is_empty(),
            JobState::Transferring => !self.pending_items.is_empty(),
            JobState::Fetching { .. } => true,
        };

        if !consistent {
            return Err(ImportError::InvalidStateTransition {
                from: self.state.to_string(),
                to: self.state.to_string(),
                reason: format!(
                    "{} pending items not allowed in this state",
                    self.pending_items.len()
                ),
            });
        }

        Ok(())
    }

    fn validate_transition(&self, to: &str, allowed: bool) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            Err(ImportError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
                reason: "not reachable from the current state".to_string(),
            })
        }
    }
}

pub const WAITING_MESSAGE: &str = "waiting";
pub const FINISHED_MESSAGE: &str = "finished";
pub const RETRYING_MESSAGE: &str = "retrying";

/// UI-facing progress, independent of the job record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub owner_id: String,
    pub message: String,
    pub finished: bool,
    pub retryable: bool,
}

impl StatusRecord {
    pub fn new(owner_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            message: message.into(),
            finished: false,
            retryable: false,
        }
    }

    pub fn waiting(owner_id: impl Into<String>) -> Self {
        Self::new(owner_id, WAITING_MESSAGE)
    }

    pub fn fetching(owner_id: impl Into<String>, filename: &str) -> Self {
        Self::new(owner_id, format!("fetching {}", filename))
    }

    pub fn uploading(owner_id: impl Into<String>, filename: &str) -> Self {
        Self::new(owner_id, format!("uploading {}", filename))
    }

    pub fn finished(owner_id: impl Into<String>) -> Self {
        Self {
            finished: true,
            ..Self::new(owner_id, FINISHED_MESSAGE)
        }
    }
}
