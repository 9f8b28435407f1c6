//! Text output for the console front end.
//!
//! Formats per-number progress lines, the end-of-run summary and settings
//! listings with secrets masked.

use crate::config::Settings;
use crate::metrics::CampaignTally;
use crate::model::{CallEvent, DialOutcome, OutcomeKind, PhoneNumber};

/// One console line per processed number.
pub(crate) fn outcome_line(outcome: &DialOutcome) -> String {
    match (outcome.kind, outcome.reason.as_deref()) {
        (OutcomeKind::Initiated, _) => {
            format!("[{}] initiated ({})", outcome.number, outcome.call_id)
        }
        (kind, Some(reason)) => format!("[{}] {kind} ({reason})", outcome.number),
        (kind, None) => format!("[{}] {kind}", outcome.number),
    }
}

/// Lines printed once a console run ends.
pub(crate) fn build_run_summary(tally: &CampaignTally, queued: usize, stopped: bool) -> Vec<String> {
    let mut lines = Vec::new();
    if stopped {
        lines.push(format!(
            "Campaign stopped after {} of {} number(s).",
            tally.total(),
            queued
        ));
    } else {
        lines.push(format!("Campaign finished: {} number(s) processed.", tally.total()));
    }
    lines.push(format!("  Initiated: {}", tally.initiated));
    lines.push(format!("  Skipped (DNC): {}", tally.skipped));
    lines.push(format!("  Errors: {}", tally.errors));
    lines
}

/// Queue listing with DNC markers.
pub(crate) fn queue_lines(numbers: &[PhoneNumber], dnc: &[PhoneNumber]) -> Vec<String> {
    if numbers.is_empty() {
        return vec!["No numbers queued.".to_string()];
    }
    numbers
        .iter()
        .enumerate()
        .map(|(idx, number)| {
            let marker = if dnc.contains(number) { " (DNC)" } else { "" };
            format!("#{}: {number}{marker}", idx + 1)
        })
        .collect()
}

pub(crate) fn event_line(event: &CallEvent) -> String {
    format!(
        "{}  {:<10} {:<16} {}",
        event.ts, event.event, event.number, event.call_sid
    )
}

pub(crate) fn settings_lines(settings: &Settings) -> Vec<String> {
    let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".into());
    vec![
        "Settings:".to_string(),
        format!(
            "  Twilio Account SID: {}",
            settings
                .twilio_account_sid
                .as_deref()
                .map(|v| mask(v, 4))
                .unwrap_or_else(|| "-".into())
        ),
        format!(
            "  Twilio Auth Token: {}",
            settings
                .twilio_auth_token
                .as_deref()
                .map(|v| mask(v, 4))
                .unwrap_or_else(|| "-".into())
        ),
        format!("  Twilio Number: {}", opt(&settings.twilio_number)),
        format!("  Public Base URL: {}", opt(&settings.public_base_url)),
        format!("  Twilio API: {}", settings.twilio_api_base),
        format!("  Dial interval: {}", settings.dial_interval),
        format!("  Backend: {:?}", settings.telephony_backend),
        format!("  Data dir: {}", settings.data_dir().display()),
        format!("  SQLite path: {}", settings.sqlite_path().display()),
        format!("  Dry-run: {}", settings.dry_run),
    ]
}

/// Hide all but the last `visible` characters.
pub(crate) fn mask(value: &str, visible: usize) -> String {
    let len = value.chars().count();
    if len <= visible {
        return value.to_string();
    }
    let tail: String = value.chars().skip(len - visible).collect();
    format!("{}{}", "*".repeat(len - visible), tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CallId, DNC_SKIP_REASON};

    #[test]
    fn outcome_lines_show_id_or_reason() {
        let ok = DialOutcome::initiated("+3581".into(), CallId::new("CA42"));
        assert_eq!(outcome_line(&ok), "[+3581] initiated (CA42)");
        let skip = DialOutcome::skipped("+3582".into(), DNC_SKIP_REASON);
        assert_eq!(outcome_line(&skip), "[+3582] skipped (Number on DNC list)");
        let err = DialOutcome::error("+3583".into(), "timeout");
        assert_eq!(outcome_line(&err), "[+3583] error (timeout)");
    }

    #[test]
    fn summary_distinguishes_stopped_runs() {
        let tally = CampaignTally {
            initiated: 2,
            skipped: 1,
            errors: 0,
        };
        let done = build_run_summary(&tally, 3, false);
        assert_eq!(done[0], "Campaign finished: 3 number(s) processed.");
        let stopped = build_run_summary(&tally, 5, true);
        assert_eq!(stopped[0], "Campaign stopped after 3 of 5 number(s).");
        assert_eq!(stopped[2], "  Skipped (DNC): 1");
    }

    #[test]
    fn queue_lines_mark_dnc_entries() {
        let numbers = vec![PhoneNumber::from("+3581"), PhoneNumber::from("+3582")];
        let dnc = vec![PhoneNumber::from("+3582")];
        assert_eq!(queue_lines(&numbers, &dnc), vec!["#1: +3581", "#2: +3582 (DNC)"]);
        assert_eq!(queue_lines(&[], &dnc), vec!["No numbers queued."]);
    }

    #[test]
    fn mask_keeps_tail_only() {
        assert_eq!(mask("AC1234567890", 4), "********7890");
        assert_eq!(mask("abc", 4), "abc");
    }
}
