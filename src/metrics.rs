use crate::model::{DialOutcome, OutcomeKind};
use serde::{Deserialize, Serialize};

/// Per-kind outcome counts for one campaign run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignTally {
    pub initiated: u64,
    pub skipped: u64,
    pub errors: u64,
}

impl CampaignTally {
    pub fn record(&mut self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Initiated => self.initiated += 1,
            OutcomeKind::Skipped => self.skipped += 1,
            OutcomeKind::Error => self.errors += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.initiated + self.skipped + self.errors
    }

    /// Tally a batch of outcomes, e.g. the recent list of a snapshot.
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a DialOutcome>) -> Self {
        let mut tally = Self::default();
        for outcome in outcomes {
            tally.record(outcome.kind);
        }
        tally
    }
}
