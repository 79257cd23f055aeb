//! # Job Driver
//!
//! Advances one owner's import by one externally triggered step.
//!
//! ## Step
//!
//! 1. Load the job record; nothing to do without one.
//! 2. Skip if the retry window is still open or attempts are exhausted.
//! 3. `AwaitingSelection`: poll the picker session. Not selected yet means
//!    publish "waiting" and return; selected means persist `Fetching`.
//! 4. `Fetching`: list pages from the persisted cursor, persisting after each
//!    page, until the listing ends in `Transferring` (or `Done` for an empty
//!    selection).
//! 5. `Transferring`: for each item, publish "fetching", download, publish
//!    "uploading", write the blob, then persist the record with the item
//!    removed. At most `items_per_step` items per step when configured.
//! 6. `Done`: publish the finished status and delete the record.
//!
//! The driver holds no state between steps. Every fact it relies on is in the
//! job record, and a record is persisted only after the work it describes has
//! been confirmed, so an interrupted step leaves at most one item to be
//! transferred again. Concurrent steps for one owner are tolerated: the worst
//! case is a duplicate blob overwrite at the same key or a briefly stale
//! status message. Before every write to the record a step re-reads it and
//! stops with [`StepOutcome::Superseded`] if a newer import has replaced it
//! or it is gone.
//!
//! ## Failures
//!
//! A failed step leaves the pending queue as last persisted, counts the
//! failure on the record and opens a backoff window. The visible status keeps
//! its message and reports whether another attempt will be made. Credential
//! failures are never retried.

use std::sync::Arc;

use bridge_traits::picker::PickerService;
use bridge_traits::time::Clock;
use core_runtime::config::DriverSettings;
use futures::TryStreamExt;
use tracing::{debug, info, instrument, warn};

use crate::error::{ErrorKind, ImportError, Result};
use crate::job::{JobRecord, JobState, StatusRecord, RETRYING_MESSAGE};
use crate::pagination::item_pages;
use crate::store::{JobStateStore, StatusStore};
use crate::transfer::TransferWorker;

pub const FAILED_MESSAGE: &str = "failed";

/// Result of a single step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Owner has no job record
    NoJob,
    /// Backoff window still open
    Deferred { retry_not_before: i64 },
    /// Retry budget spent; the job no longer advances
    Exhausted,
    /// User has not finished picking
    Waiting,
    /// Items remain after this step
    Progressed { transferred: usize, remaining: usize },
    /// Every item transferred and the record deleted
    Completed { transferred: usize },
    /// Record was replaced or removed while the step ran; nothing written
    Superseded,
}

pub struct JobDriver {
    picker: Arc<dyn PickerService>,
    transfer: Arc<TransferWorker>,
    jobs: JobStateStore,
    statuses: StatusStore,
    clock: Arc<dyn Clock>,
    settings: DriverSettings,
}

impl JobDriver {
    pub fn new(
        picker: Arc<dyn PickerService>,
        transfer: Arc<TransferWorker>,
        jobs: JobStateStore,
        statuses: StatusStore,
        clock: Arc<dyn Clock>,
        settings: DriverSettings,
    ) -> Self {
        Self {
            picker,
            transfer,
            jobs,
            statuses,
            clock,
            settings,
        }
    }

    pub fn jobs(&self) -> &JobStateStore {
        &self.jobs
    }

    pub fn statuses(&self) -> &StatusStore {
        &self.statuses
    }

    /// Run one step for `owner_id`
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the step after it has been recorded on
    /// the job and reflected in the status. Loading a corrupt record returns
    /// a data error without touching anything.
    #[instrument(skip(self))]
    pub async fn step(&self, owner_id: &str) -> Result<StepOutcome> {
        let Some(mut job) = self.jobs.load(owner_id).await? else {
            debug!("No job for owner");
            return Ok(StepOutcome::NoJob);
        };

        if job.is_exhausted(self.settings.max_attempts) {
            debug!(failed_attempts = job.failed_attempts, "Job exhausted");
            return Ok(StepOutcome::Exhausted);
        }

        let now = self.clock.unix_timestamp();
        if !job.retry_due(now) {
            let retry_not_before = job.retry_not_before.unwrap_or(now);
            debug!(retry_not_before, "Retry window still open");
            return Ok(StepOutcome::Deferred { retry_not_before });
        }

        match self.advance(&mut job).await {
            Ok(outcome) => {
                debug!(?outcome, "Step finished");
                Ok(outcome)
            }
            Err(ImportError::Superseded { job_id, .. }) => {
                info!(job_id = %job_id, "Job replaced during step");
                Ok(StepOutcome::Superseded)
            }
            Err(e) => {
                if let Ok(false) = self.jobs.is_current(&job).await {
                    info!(job_id = %job.job_id, error = %e, "Job replaced during failed step");
                    return Ok(StepOutcome::Superseded);
                }
                self.record_failure(job, &e).await;
                Err(e)
            }
        }
    }

    async fn advance(&self, job: &mut JobRecord) -> Result<StepOutcome> {
        if job.token_expired(self.clock.unix_timestamp()) {
            return Err(ImportError::Auth("access token expired".to_string()));
        }

        if matches!(job.state, JobState::AwaitingSelection) {
            let session = self
                .picker
                .get_session(&job.access_token, &job.remote_session_id)
                .await
                .map_err(ImportError::picker)?;

            if !session.media_selected {
                self.statuses
                    .publish(&StatusRecord::waiting(&job.owner_id))
                    .await?;
                if job.failed_attempts > 0 {
                    self.persist(job).await?;
                }
                return Ok(StepOutcome::Waiting);
            }

            job.mark_session_complete()?;
            self.persist(job).await?;
            info!(session_id = %job.remote_session_id, "Selection complete");
        }

        if let JobState::Fetching { cursor } = &job.state {
            let cursor = cursor.clone();
            self.fetch_items(job, cursor).await?;
        }

        let transferred = self.transfer_items(job).await?;

        if job.is_done() {
            self.finish(job).await?;
            return Ok(StepOutcome::Completed { transferred });
        }

        Ok(StepOutcome::Progressed {
            transferred,
            remaining: job.pending_items.len(),
        })
    }

    #[instrument(skip(self, job), fields(owner_id = %job.owner_id))]
    async fn fetch_items(&self, job: &mut JobRecord, cursor: Option<String>) -> Result<()> {
        let access_token = job.access_token.clone();
        let session_id = job.remote_session_id.clone();
        let mut pages = Box::pin(item_pages(
            self.picker.as_ref(),
            &access_token,
            &session_id,
            cursor,
        ));

        while let Some(page) = pages.try_next().await? {
            let added = job.append_page(page.items, page.next_page_token)?;
            self.persist(job).await?;
            debug!(added, pending = job.pending_items.len(), state = %job.state, "Persisted page");
        }

        info!(items = job.pending_items.len(), "Listing complete");
        Ok(())
    }

    async fn transfer_items(&self, job: &mut JobRecord) -> Result<usize> {
        let limit = self.settings.items_per_step.unwrap_or(usize::MAX);
        let mut transferred = 0;

        while transferred < limit {
            let Some(item) = job.next_item().cloned() else {
                break;
            };

            self.statuses
                .publish(&StatusRecord::fetching(&job.owner_id, &item.filename))
                .await?;
            let data = self.transfer.download(&item, &job.access_token).await?;

            self.statuses
                .publish(&StatusRecord::uploading(&job.owner_id, &item.filename))
                .await?;
            let key = self.transfer.store(&item, data).await?;

            job.complete_item(&item.id)?;
            transferred += 1;
            info!(item_id = %item.id, key = %key, remaining = job.pending_items.len(), "Transferred item");

            if !job.is_done() {
                self.persist(job).await?;
            }
        }

        Ok(transferred)
    }

    /// Publish the finished status, then delete the record
    ///
    /// A crash between the two leaves a `Done` record; the next step repeats
    /// both writes.
    async fn finish(&self, job: &JobRecord) -> Result<()> {
        self.ensure_current(job).await?;
        self.statuses
            .publish(&StatusRecord::finished(&job.owner_id))
            .await?;
        self.jobs.delete(&job.owner_id).await?;
        info!(owner_id = %job.owner_id, job_id = %job.job_id, "Import finished");
        Ok(())
    }

    async fn persist(&self, job: &mut JobRecord) -> Result<()> {
        self.ensure_current(job).await?;
        job.touch(self.clock.unix_timestamp());
        self.jobs.save(job).await
    }

    async fn ensure_current(&self, job: &JobRecord) -> Result<()> {
        if self.jobs.is_current(job).await? {
            return Ok(());
        }
        Err(ImportError::Superseded {
            owner_id: job.owner_id.clone(),
            job_id: job.job_id.to_string(),
        })
    }

    async fn record_failure(&self, mut job: JobRecord, error: &ImportError) {
        let now = self.clock.unix_timestamp();
        match error.kind() {
            ErrorKind::Auth => {
                job.failed_attempts = self.settings.max_attempts;
                job.retry_not_before = None;
                job.updated_at = now;
            }
            ErrorKind::Transient | ErrorKind::Data => {
                job.record_failure(now, self.settings.backoff_base, self.settings.backoff_max);
            }
        }
        let retryable = !job.is_exhausted(self.settings.max_attempts);

        warn!(
            owner_id = %job.owner_id,
            error = %error,
            failed_attempts = job.failed_attempts,
            retry_not_before = ?job.retry_not_before,
            retryable,
            "Step failed"
        );

        if let Err(e) = self.jobs.save(&job).await {
            warn!(owner_id = %job.owner_id, error = %e, "Failed to record step failure");
        }

        let status = match self.statuses.get(&job.owner_id).await {
            Ok(Some(mut status)) => {
                status.finished = false;
                status.retryable = retryable;
                status
            }
            Ok(None) | Err(_) => {
                let message = if retryable {
                    RETRYING_MESSAGE
                } else {
                    FAILED_MESSAGE
                };
                StatusRecord {
                    retryable,
                    ..StatusRecord::new(&job.owner_id, message)
                }
            }
        };

        if let Err(e) = self.statuses.publish(&status).await {
            warn!(owner_id = %job.owner_id, error = %e, "Failed to publish failure status");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_desktop::{MemoryBlobStore, MemoryKeyValueStore};
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use bridge_traits::picker::{ItemsPage, RemoteSession};
    use bridge_traits::storage::KeyValueStore;
    use bridge_traits::time::ManualClock;
    use chrono::TimeZone;
    use mockall::mock;

    mock! {
        Picker {}

        #[async_trait]
        impl PickerService for Picker {
            async fn create_session(&self, access_token: &str) -> BridgeResult<RemoteSession>;
            async fn get_session(&self, access_token: &str, session_id: &str) -> BridgeResult<RemoteSession>;
            async fn list_items<'a, 'b, 'c, 'd>(
                &'a self,
                access_token: &'b str,
                session_id: &'c str,
                page_token: Option<&'d str>,
            ) -> BridgeResult<ItemsPage>;
        }
    }

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn session(selected: bool) -> RemoteSession {
        RemoteSession {
            id: "sess".to_string(),
            picker_uri: "https://picker/sess".to_string(),
            poll_interval_seconds: 5,
            media_selected: selected,
        }
    }

    struct Harness {
        kv: Arc<MemoryKeyValueStore>,
        clock: Arc<ManualClock>,
        driver: JobDriver,
    }

    fn harness(picker: MockPicker, http: MockHttpClient, settings: DriverSettings) -> Harness {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let clock = Arc::new(ManualClock::new(
            chrono::Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        ));
        let transfer = Arc::new(TransferWorker::new(
            Arc::new(http),
            Arc::new(MemoryBlobStore::new()),
        ));
        let driver = JobDriver::new(
            Arc::new(picker),
            transfer,
            JobStateStore::new(kv.clone()),
            StatusStore::new(kv.clone()),
            clock.clone(),
            settings,
        );
        Harness { kv, clock, driver }
    }

    #[tokio::test]
    async fn test_no_job_is_noop() {
        let h = harness(MockPicker::new(), MockHttpClient::new(), DriverSettings::default());
        assert_eq!(h.driver.step("nobody").await.unwrap(), StepOutcome::NoJob);
        assert!(h.kv.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_waiting_leaves_record_unchanged() {
        let mut picker = MockPicker::new();
        picker
            .expect_get_session()
            .times(2)
            .returning(|_, _| Ok(session(false)));

        let h = harness(picker, MockHttpClient::new(), DriverSettings::default());
        let job = JobRecord::new("u", "sess", "tok", 0);
        h.driver.jobs().save(&job).await.unwrap();

        assert_eq!(h.driver.step("u").await.unwrap(), StepOutcome::Waiting);
        assert_eq!(h.driver.step("u").await.unwrap(), StepOutcome::Waiting);

        assert_eq!(h.driver.jobs().load("u").await.unwrap(), Some(job));
        let status = h.driver.statuses().get("u").await.unwrap().unwrap();
        assert_eq!(status.message, "waiting");
        assert!(!status.finished);
    }

    #[tokio::test]
    async fn test_session_failure_opens_backoff_window() {
        let mut picker = MockPicker::new();
        picker
            .expect_get_session()
            .times(1)
            .returning(|_, _| Err(BridgeError::OperationFailed("status 503".into())));

        let h = harness(picker, MockHttpClient::new(), DriverSettings::default());
        h.driver
            .jobs()
            .save(&JobRecord::new("u", "sess", "tok", 0))
            .await
            .unwrap();

        assert!(h.driver.step("u").await.is_err());

        let job = h.driver.jobs().load("u").await.unwrap().unwrap();
        assert_eq!(job.failed_attempts, 1);
        let start = h.clock.unix_timestamp();
        assert_eq!(job.retry_not_before, Some(start + 2));

        // Picker mock allows one call only; a deferred step must not poll.
        assert_eq!(
            h.driver.step("u").await.unwrap(),
            StepOutcome::Deferred {
                retry_not_before: start + 2
            }
        );

        let status = h.driver.statuses().get("u").await.unwrap().unwrap();
        assert_eq!(status.message, "retrying");
        assert!(status.retryable);
    }

    #[tokio::test]
    async fn test_rejected_token_is_not_retried() {
        let mut picker = MockPicker::new();
        picker
            .expect_get_session()
            .times(1)
            .returning(|_, _| Err(BridgeError::Unauthorized("status 401".into())));

        let h = harness(picker, MockHttpClient::new(), DriverSettings::default());
        h.driver
            .jobs()
            .save(&JobRecord::new("u", "sess", "tok", 0))
            .await
            .unwrap();
        h.driver
            .statuses()
            .publish(&StatusRecord::waiting("u"))
            .await
            .unwrap();

        let err = h.driver.step("u").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);

        h.clock.advance_secs(3_600);
        assert_eq!(h.driver.step("u").await.unwrap(), StepOutcome::Exhausted);

        let status = h.driver.statuses().get("u").await.unwrap().unwrap();
        assert_eq!(status.message, "waiting");
        assert!(!status.retryable);
    }

    #[tokio::test]
    async fn test_expired_token_short_circuits() {
        let h = harness(MockPicker::new(), MockHttpClient::new(), DriverSettings::default());
        let job = JobRecord::new("u", "sess", "tok", 0).with_token_expiry(0);
        h.driver.jobs().save(&job).await.unwrap();

        let err = h.driver.step("u").await.unwrap_err();
        assert!(matches!(err, ImportError::Auth(_)));

        let status = h.driver.statuses().get("u").await.unwrap().unwrap();
        assert_eq!(status.message, "failed");
        assert!(!status.retryable);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_left_alone() {
        let h = harness(MockPicker::new(), MockHttpClient::new(), DriverSettings::default());
        h.kv.put("job:u", "garbage").await.unwrap();

        let err = h.driver.step("u").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Data);
        assert_eq!(h.kv.get("job:u").await.unwrap().as_deref(), Some("garbage"));
        assert!(h.driver.statuses().get("u").await.unwrap().is_none());
    }
}
