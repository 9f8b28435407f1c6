//! Command loop between interactive front ends and the run controller.

use super::controller::RunController;
use crate::model::ControlStatus;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers to control the campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UiCommand {
    Start,
    Stop,
    Quit,
}

/// Apply UI commands to the controller until `Quit` or the sender goes away,
/// reporting each result back as a status line.
///
/// An active run is stopped before returning so the process never exits with a
/// worker still dialing.
pub(crate) async fn run_commands(
    controller: &RunController,
    info_tx: UnboundedSender<String>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            UiCommand::Start => {
                let msg = match apply_start(controller) {
                    ControlStatus::Started => "Campaign started",
                    _ => "Nothing started: queue empty or a run is still active",
                };
                let _ = info_tx.send(msg.to_string());
            }
            UiCommand::Stop => {
                controller.stop().await;
                let msg = if controller.is_active() {
                    "Stop requested; finishing the current call…"
                } else {
                    "Campaign stopped"
                };
                let _ = info_tx.send(msg.to_string());
            }
            UiCommand::Quit => break,
        }
    }

    if controller.is_active() {
        controller.stop().await;
    }
}

/// Map `start()` onto the control-surface status.
pub(crate) fn apply_start(controller: &RunController) -> ControlStatus {
    if controller.start() {
        ControlStatus::Started
    } else {
        ControlStatus::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedPlacer;
    use crate::engine::CampaignRunner;
    use crate::storage::memory::MemoryStore;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn controller(numbers: &[&str]) -> RunController {
        let runner = CampaignRunner::new(
            Arc::new(ScriptedPlacer::default()),
            Arc::new(MemoryStore::with_numbers(numbers)),
            Duration::from_secs(30),
        );
        RunController::new(Arc::new(runner)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn start_stop_quit_round_trip() {
        let controller = controller(&["+3581", "+3582"]);
        let (info_tx, mut info_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        cmd_tx.send(UiCommand::Start).unwrap();
        cmd_tx.send(UiCommand::Start).unwrap();
        cmd_tx.send(UiCommand::Stop).unwrap();
        cmd_tx.send(UiCommand::Quit).unwrap();
        run_commands(&controller, info_tx, cmd_rx).await;

        assert_eq!(info_rx.recv().await.as_deref(), Some("Campaign started"));
        assert!(info_rx
            .recv()
            .await
            .unwrap()
            .starts_with("Nothing started"));
        assert_eq!(info_rx.recv().await.as_deref(), Some("Campaign stopped"));
        assert!(!controller.snapshot().running);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sender_stops_active_run() {
        let controller = controller(&["+3581", "+3582"]);
        let (info_tx, _info_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        cmd_tx.send(UiCommand::Start).unwrap();
        drop(cmd_tx);
        run_commands(&controller, info_tx, cmd_rx).await;

        assert!(!controller.snapshot().running);
        assert!(!controller.is_active());
    }

    #[tokio::test]
    async fn apply_start_reports_idle_for_empty_queue() {
        assert_eq!(apply_start(&controller(&[])), ControlStatus::Idle);
    }
}
