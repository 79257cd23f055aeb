//! # Step Queue
//!
//! Decouples triggers from job progress. Callers enqueue an owner id and
//! return immediately; a fixed pool of workers pulls owners off a bounded
//! channel and runs one [`JobDriver::step`] each.
//!
//! An owner that is already queued or running is not queued again, so a burst
//! of status polls results in one step rather than a pile of redundant ones.
//! When the channel is full the request is dropped: the next trigger
//! re-enqueues, and nothing is lost because progress lives in the job record.
//!
//! ```ignore
//! let queue = StepQueue::start(driver, 4, 256);
//! queue.enqueue("owner-1");
//! // ...
//! queue.shutdown().await;
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::driver::JobDriver;

/// What happened to an enqueue request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// Owner already queued or running
    Coalesced,
    /// Queue full or shut down
    Dropped,
}

/// Owners currently queued or being stepped
#[derive(Default)]
struct InFlight {
    owners: StdMutex<HashSet<String>>,
}

impl InFlight {
    fn claim(&self, owner_id: &str) -> bool {
        match self.owners.lock() {
            Ok(mut owners) => owners.insert(owner_id.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(owner_id.to_string()),
        }
    }

    fn release(&self, owner_id: &str) {
        match self.owners.lock() {
            Ok(mut owners) => owners.remove(owner_id),
            Err(poisoned) => poisoned.into_inner().remove(owner_id),
        };
    }

    fn len(&self) -> usize {
        match self.owners.lock() {
            Ok(owners) => owners.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

pub struct StepQueue {
    sender: mpsc::Sender<String>,
    in_flight: Arc<InFlight>,
    cancel: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl StepQueue {
    /// Spawn `workers` step workers over a channel of `capacity` requests
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(driver: Arc<JobDriver>, workers: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let in_flight = Arc::new(InFlight::default());
        let cancel = CancellationToken::new();

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&driver),
                    Arc::clone(&receiver),
                    Arc::clone(&in_flight),
                    cancel.clone(),
                ))
            })
            .collect();

        info!(workers = workers.max(1), capacity = capacity.max(1), "Step queue started");

        Self {
            sender,
            in_flight,
            cancel,
            workers: Mutex::new(handles),
        }
    }

    /// Request one step for `owner_id` without waiting for it
    pub fn enqueue(&self, owner_id: &str) -> EnqueueOutcome {
        if self.cancel.is_cancelled() {
            return EnqueueOutcome::Dropped;
        }

        if !self.in_flight.claim(owner_id) {
            debug!(owner_id, "Step already pending");
            return EnqueueOutcome::Coalesced;
        }

        match self.sender.try_send(owner_id.to_string()) {
            Ok(()) => {
                debug!(owner_id, "Step queued");
                EnqueueOutcome::Queued
            }
            Err(e) => {
                self.in_flight.release(owner_id);
                warn!(owner_id, error = %e, "Step request dropped");
                EnqueueOutcome::Dropped
            }
        }
    }

    /// Owners queued or running
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    /// Stop accepting work and wait for workers to exit
    ///
    /// A step already running finishes; queued requests are discarded.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handles: Vec<_> = self.workers.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Step worker panicked");
            }
        }
        info!("Step queue stopped");
    }
}

impl Drop for StepQueue {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_worker(
    worker_id: usize,
    driver: Arc<JobDriver>,
    receiver: Arc<Mutex<mpsc::Receiver<String>>>,
    in_flight: Arc<InFlight>,
    cancel: CancellationToken,
) {
    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                owner = receiver.recv() => owner,
            }
        };

        let Some(owner_id) = next else {
            debug!(worker_id, "Step worker exiting");
            return;
        };

        // Own task so a panicking step still releases the claim
        let step = tokio::spawn({
            let driver = Arc::clone(&driver);
            let owner_id = owner_id.clone();
            async move { driver.step(&owner_id).await }
        });

        match step.await {
            Ok(Ok(outcome)) => debug!(worker_id, owner_id = %owner_id, ?outcome, "Step done"),
            Ok(Err(e)) => warn!(worker_id, owner_id = %owner_id, error = %e, "Step failed"),
            Err(e) => error!(worker_id, owner_id = %owner_id, error = %e, "Step panicked"),
        }

        in_flight.release(&owner_id);
    }
}
