use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Maximum number of outcomes kept in [`RunState::recent_outcomes`].
pub const RECENT_OUTCOMES_CAPACITY: usize = 10;

/// Reason attached to every outcome produced by a DNC hit.
pub const DNC_SKIP_REASON: &str = "Number on DNC list";

/// A dialable number. Normalization happens before numbers reach the queue;
/// here it is an opaque token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Accept user input, trimming surrounding whitespace. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PhoneNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider-assigned identifier for a placed call. Empty for skipped/failed dials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Initiated,
    Skipped,
    Error,
}

impl OutcomeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeKind::Initiated => "initiated",
            OutcomeKind::Skipped => "skipped",
            OutcomeKind::Error => "error",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of processing one queued number.
///
/// Constructed only through [`DialOutcome::initiated`], [`DialOutcome::skipped`]
/// and [`DialOutcome::error`], so a reason is present exactly when the kind
/// is not `initiated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialOutcome {
    pub number: PhoneNumber,
    pub call_id: CallId,
    pub kind: OutcomeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DialOutcome {
    pub fn initiated(number: PhoneNumber, call_id: CallId) -> Self {
        Self {
            number,
            call_id,
            kind: OutcomeKind::Initiated,
            reason: None,
        }
    }

    pub fn skipped(number: PhoneNumber, reason: impl Into<String>) -> Self {
        Self {
            number,
            call_id: CallId::default(),
            kind: OutcomeKind::Skipped,
            reason: Some(reason.into()),
        }
    }

    pub fn error(number: PhoneNumber, reason: impl Into<String>) -> Self {
        Self {
            number,
            call_id: CallId::default(),
            kind: OutcomeKind::Error,
            reason: Some(reason.into()),
        }
    }
}

/// Externally visible progress of the campaign, owned by the run controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub running: bool,
    pub current_number: Option<PhoneNumber>,
    pub current_status: Option<String>,
    /// Most recent first, at most [`RECENT_OUTCOMES_CAPACITY`] entries.
    pub recent_outcomes: Vec<DialOutcome>,
}

impl RunState {
    /// Clear the fields that only make sense while a run is active.
    pub fn set_idle(&mut self) {
        self.running = false;
        self.current_number = None;
        self.current_status = None;
    }

    /// Record an outcome at the front of the recent list, dropping the oldest beyond capacity.
    pub fn push_outcome(&mut self, outcome: DialOutcome) {
        self.recent_outcomes.insert(0, outcome);
        self.recent_outcomes.truncate(RECENT_OUTCOMES_CAPACITY);
    }
}

/// Which call-placement backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Twilio,
    Asterisk,
}

/// Runner parameters resolved from settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(with = "humantime_serde")]
    pub pacing: Duration,
    pub backend: BackendKind,
    pub dry_run: bool,
}

/// One row of the persisted call event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEvent {
    pub call_sid: String,
    pub number: String,
    pub event: String,
    pub ts: String,
    pub payload: serde_json::Value,
}

/// Reply shapes of the controller control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlStatus {
    Started,
    Idle,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlReply {
    pub status: ControlStatus,
}

impl From<ControlStatus> for ControlReply {
    fn from(status: ControlStatus) -> Self {
        Self { status }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_outcomes_are_capped_and_newest_first() {
        let mut state = RunState::default();
        for i in 0..15 {
            let number = PhoneNumber::from(format!("+3584000000{i:02}").as_str());
            state.push_outcome(DialOutcome::initiated(number, CallId::new(format!("CA{i}"))));
        }
        assert_eq!(state.recent_outcomes.len(), RECENT_OUTCOMES_CAPACITY);
        assert_eq!(state.recent_outcomes[0].call_id.as_str(), "CA14");
        assert_eq!(state.recent_outcomes[9].call_id.as_str(), "CA5");
    }

    #[test]
    fn set_idle_clears_current_fields_but_keeps_history() {
        let mut state = RunState {
            running: true,
            current_number: Some("+358401234567".into()),
            current_status: Some("initiated".into()),
            recent_outcomes: vec![DialOutcome::skipped("+358401234567".into(), DNC_SKIP_REASON)],
        };
        state.set_idle();
        assert!(!state.running);
        assert!(state.current_number.is_none());
        assert!(state.current_status.is_none());
        assert_eq!(state.recent_outcomes.len(), 1);
    }

    #[test]
    fn phone_number_parse_trims_and_rejects_blank() {
        assert_eq!(
            PhoneNumber::parse("  +358401234567 \n").map(|n| n.to_string()),
            Some("+358401234567".to_string())
        );
        assert!(PhoneNumber::parse("   ").is_none());
    }

    #[test]
    fn outcome_serializes_lowercase_kind_and_omits_missing_reason() {
        let ok = DialOutcome::initiated("+358401234567".into(), CallId::new("CA1"));
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(v["kind"], "initiated");
        assert_eq!(v["call_id"], "CA1");
        assert!(v.get("reason").is_none());

        let skipped = DialOutcome::skipped("+358401234568".into(), DNC_SKIP_REASON);
        let v = serde_json::to_value(&skipped).unwrap();
        assert_eq!(v["kind"], "skipped");
        assert_eq!(v["call_id"], "");
        assert_eq!(v["reason"], DNC_SKIP_REASON);
    }

    #[test]
    fn control_reply_uses_lowercase_status() {
        let reply = ControlReply::from(ControlStatus::Started);
        assert_eq!(
            serde_json::to_string(&reply).unwrap(),
            r#"{"status":"started"}"#
        );
    }
}
