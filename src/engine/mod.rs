mod telephony;
mod twilio;

pub use telephony::{CallPlacer, Telephony};
pub use twilio::{TwilioClient, TwilioConfig};

use crate::metrics::CampaignTally;
use crate::model::{DialOutcome, OutcomeKind, PhoneNumber, DNC_SKIP_REASON};
use crate::storage::CampaignStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Receives each outcome as soon as a number has been processed.
///
/// Called synchronously from the dialing loop, so implementations must return quickly.
pub trait ProgressSink: Send + Sync {
    fn on_outcome(&self, outcome: &DialOutcome);
}

impl ProgressSink for mpsc::UnboundedSender<DialOutcome> {
    fn on_outcome(&self, outcome: &DialOutcome) {
        let _ = self.send(outcome.clone());
    }
}

/// Sequential dialing loop over one campaign queue.
pub struct CampaignRunner {
    placer: Arc<dyn CallPlacer>,
    store: Arc<dyn CampaignStore>,
    pacing: Duration,
}

impl CampaignRunner {
    pub fn new(
        placer: Arc<dyn CallPlacer>,
        store: Arc<dyn CampaignStore>,
        pacing: Duration,
    ) -> Self {
        Self {
            placer,
            store,
            pacing,
        }
    }

    pub fn store(&self) -> &Arc<dyn CampaignStore> {
        &self.store
    }

    /// Dial `queue` in order until it is exhausted or `stop` is cancelled.
    ///
    /// Stop is observed before each number and after each outcome; an in-flight
    /// call placement is never interrupted. DNC skips are not followed by the
    /// pacing delay, and nothing is paced after the final number.
    pub async fn run(
        &self,
        queue: Vec<PhoneNumber>,
        progress: &dyn ProgressSink,
        stop: &CancellationToken,
    ) -> CampaignTally {
        let mut tally = CampaignTally::default();
        let total = queue.len();
        info!(total, pacing = ?self.pacing, "campaign started");

        for (idx, number) in queue.into_iter().enumerate() {
            if stop.is_cancelled() {
                info!(%number, "campaign stopped before dialing");
                break;
            }

            let outcome = self.process(&number).await;
            tally.record(outcome.kind);
            progress.on_outcome(&outcome);

            if stop.is_cancelled() {
                info!(%number, "campaign stop requested after dialing");
                break;
            }
            if outcome.kind == OutcomeKind::Skipped || idx + 1 == total {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.pacing) => {}
                _ = stop.cancelled() => {
                    debug!("stop observed during pacing delay");
                    break;
                }
            }
        }

        info!(
            initiated = tally.initiated,
            skipped = tally.skipped,
            errors = tally.errors,
            "campaign finished"
        );
        tally
    }

    async fn process(&self, number: &PhoneNumber) -> DialOutcome {
        match self.store.is_dnc(number) {
            Ok(true) => {
                debug!(%number, "skipping DNC-listed number");
                let call_id = format!("dnc-skip-{:016x}", rand::random::<u64>());
                self.record(&call_id, number, "skipped", json!({ "reason": DNC_SKIP_REASON }));
                return DialOutcome::skipped(number.clone(), DNC_SKIP_REASON);
            }
            Ok(false) => {}
            Err(e) => {
                // Never dial a number whose DNC status is unknown.
                warn!(%number, error = %e, "DNC lookup failed");
                let reason = format!("DNC lookup failed: {e}");
                self.record("error", number, "error", json!({ "error": reason }));
                return DialOutcome::error(number.clone(), reason);
            }
        }

        match self.placer.place_call(number).await {
            Ok(call_id) => {
                info!(%number, %call_id, "call initiated");
                self.record(call_id.as_str(), number, "initiated", json!({}));
                DialOutcome::initiated(number.clone(), call_id)
            }
            Err(e) => {
                warn!(%number, error = %e, "failed to place call");
                let reason = e.to_string();
                self.record("error", number, "error", json!({ "error": reason }));
                DialOutcome::error(number.clone(), reason)
            }
        }
    }

    fn record(&self, call_id: &str, number: &PhoneNumber, event: &str, payload: serde_json::Value) {
        if let Err(e) = self.store.log_event(call_id, number, event, payload) {
            warn!(%number, event, error = %e, "failed to log call event");
        }
    }
}
