//! Run lifecycle controller.
//!
//! Owns the single campaign worker and the progress record that presentation
//! layers poll. Every read and write of that record goes through one mutex that
//! is never held across an await point.

use crate::engine::{CampaignRunner, ProgressSink};
use crate::error::ConfigError;
use crate::model::{DialOutcome, RunState};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long `stop()` waits for the worker before returning anyway.
const STOP_JOIN_GRACE: Duration = Duration::from_millis(100);

/// Status shown between `start()` and the first outcome.
const QUEUED_STATUS: &str = "queued";

#[derive(Default)]
struct Shared {
    state: RunState,
    /// True from a successful `start()` until the worker exits, even after `stop()`.
    active: bool,
    /// Bumped on every start so a finished worker never clobbers a newer run.
    generation: u64,
    stop: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    // The record is updated field by field under the lock and never left half-written.
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Start/stop/snapshot surface over at most one running campaign.
#[derive(Clone)]
pub struct RunController {
    runner: Arc<CampaignRunner>,
    shared: Arc<Mutex<Shared>>,
    runtime: Handle,
}

impl RunController {
    /// Build a controller that spawns workers on the current Tokio runtime.
    pub fn new(runner: Arc<CampaignRunner>) -> Result<Self, ConfigError> {
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        Ok(Self::with_runtime(runner, runtime))
    }

    pub fn with_runtime(runner: Arc<CampaignRunner>, runtime: Handle) -> Self {
        Self {
            runner,
            shared: Arc::new(Mutex::new(Shared::default())),
            runtime,
        }
    }

    /// Launch a campaign over the current queue.
    ///
    /// Returns `false` without side effects when a worker is still active or the
    /// queue is empty. Safe to call from any thread; concurrent callers are
    /// serialized so exactly one of them can win an idle-to-running transition.
    pub fn start(&self) -> bool {
        let mut shared = lock(&self.shared);
        if shared.active {
            debug!("start ignored: campaign already running");
            return false;
        }
        let queue = match self.runner.store().list_numbers() {
            Ok(queue) => queue,
            Err(e) => {
                warn!(error = %e, "start ignored: could not load number queue");
                return false;
            }
        };
        let Some(first) = queue.first().cloned() else {
            debug!("start ignored: number queue is empty");
            return false;
        };

        let stop = CancellationToken::new();
        shared.generation += 1;
        shared.stop = stop.clone();
        shared.active = true;
        shared.state.recent_outcomes.clear();
        shared.state.running = true;
        shared.state.current_number = Some(first);
        shared.state.current_status = Some(QUEUED_STATUS.to_string());

        let generation = shared.generation;
        let sink = StateSink {
            shared: self.shared.clone(),
            generation,
            stop: stop.clone(),
        };
        let finish = FinishGuard {
            shared: self.shared.clone(),
            generation,
        };
        let runner = self.runner.clone();
        info!(generation, numbers = queue.len(), "campaign run starting");

        // Spawn after releasing the lock: if the runtime is shutting down the task
        // is dropped immediately and `finish` takes the lock to reset the record.
        drop(shared);
        let handle = self.runtime.spawn(async move {
            let _finish = finish;
            runner.run(queue, &sink, &stop).await;
        });

        let mut shared = lock(&self.shared);
        if shared.generation == generation && shared.active {
            shared.worker = Some(handle);
        }
        true
    }

    /// Request cancellation and immediately present the idle shape to observers.
    ///
    /// The worker converges on its own after the call it may be placing. Does
    /// not wait; see [`RunController::stop`] for the joining variant.
    pub fn request_stop(&self) {
        let mut shared = lock(&self.shared);
        shared.stop.cancel();
        shared.state.set_idle();
    }

    /// Like [`RunController::request_stop`], then give the worker a short grace
    /// period to exit. Never waits on itself when called from the worker task.
    pub async fn stop(&self) {
        self.request_stop();
        let (generation, mut handle) = {
            let mut shared = lock(&self.shared);
            match shared.worker.take() {
                Some(handle) => (shared.generation, handle),
                None => return,
            }
        };

        let own_task = tokio::task::try_id() == Some(handle.id());
        if !own_task && tokio::time::timeout(STOP_JOIN_GRACE, &mut handle).await.is_ok() {
            debug!(generation, "campaign worker joined after stop");
            return;
        }

        debug!(generation, "campaign worker still draining after stop");
        let mut shared = lock(&self.shared);
        if shared.active && shared.generation == generation && shared.worker.is_none() {
            shared.worker = Some(handle);
        }
    }

    /// Independent copy of the current progress record.
    pub fn snapshot(&self) -> RunState {
        lock(&self.shared).state.clone()
    }

    /// Whether a worker is still executing (it may already be stopping).
    pub fn is_active(&self) -> bool {
        lock(&self.shared).active
    }
}

/// Progress sink that folds outcomes into the shared record.
struct StateSink {
    shared: Arc<Mutex<Shared>>,
    generation: u64,
    stop: CancellationToken,
}

impl ProgressSink for StateSink {
    fn on_outcome(&self, outcome: &DialOutcome) {
        let mut shared = lock(&self.shared);
        if shared.generation != self.generation {
            return;
        }
        // After stop() the record stays idle; only the history keeps the late outcome.
        if !self.stop.is_cancelled() {
            shared.state.current_number = Some(outcome.number.clone());
            shared.state.current_status = Some(outcome.kind.to_string());
        }
        shared.state.push_outcome(outcome.clone());
    }
}

/// Resets the record when the worker ends, including on panic or abort.
struct FinishGuard {
    shared: Arc<Mutex<Shared>>,
    generation: u64,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        let mut shared = lock(&self.shared);
        if shared.generation != self.generation {
            return;
        }
        shared.active = false;
        shared.state.set_idle();
        shared.worker = None;
        info!(generation = self.generation, "campaign run finished");
    }
}
