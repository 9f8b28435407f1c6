use crate::config::Settings;
use crate::engine::{CampaignRunner, CallPlacer, Telephony};
use crate::model::{DialOutcome, PhoneNumber};
use crate::orchestrator::RunController;
use crate::server::{self, AppState};
use crate::storage::{CampaignStore, FileStore};
use crate::text_summary::{build_run_summary, event_line, outcome_line, queue_lines, settings_lines};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "dialer",
    version,
    about = "Outbound calling campaign dialer with DNC screening"
)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Manage the dialing queue
    Numbers {
        #[command(subcommand)]
        action: NumbersAction,
    },
    /// Manage the Do-Not-Call list
    Dnc {
        #[command(subcommand)]
        action: DncAction,
    },
    /// Show the most recent call events, newest first
    Events {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Print the resolved settings with secrets masked
    Settings,
    /// Dial the queue in the foreground; Ctrl-C stops after the current call
    Dial,
    /// Serve the HTTP control surface and provider webhooks
    Serve {
        #[arg(long, default_value = "127.0.0.1:8000")]
        bind: SocketAddr,
    },
    /// Interactive terminal dashboard
    #[cfg(feature = "tui")]
    Tui,
}

#[derive(Debug, Subcommand, Clone)]
pub enum NumbersAction {
    /// Append numbers to the end of the queue
    Add {
        #[arg(required = true)]
        numbers: Vec<String>,
    },
    /// List queued numbers, marking DNC entries
    List,
    /// Remove every queued number
    Clear,
}

#[derive(Debug, Subcommand, Clone)]
pub enum DncAction {
    /// Add a number to the Do-Not-Call list
    Add { number: String },
    /// List Do-Not-Call entries
    List,
}

/// Resolved settings plus the opened store, shared by every subcommand.
struct App {
    settings: Settings,
    store: Arc<FileStore>,
}

impl App {
    fn open(settings: Settings) -> Result<Self> {
        let data_dir = settings.data_dir();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
        let store = FileStore::open(&data_dir, &settings.sqlite_path())
            .context("failed to open campaign store")?;
        Ok(Self {
            settings,
            store: Arc::new(store),
        })
    }

    fn telephony(&self) -> Result<Telephony> {
        self.settings
            .telephony()
            .context("telephony backend is not configured")
    }

    fn runner(&self, telephony: Telephony) -> CampaignRunner {
        let placer: Arc<dyn CallPlacer> = Arc::new(telephony);
        CampaignRunner::new(placer, self.store.clone(), self.settings.pacing())
    }

    fn controller(&self, telephony: Telephony) -> Result<RunController> {
        RunController::new(Arc::new(self.runner(telephony))).context("failed to build run controller")
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let app = App::open(args.settings)?;

    match args.command {
        Command::Numbers { action } => run_numbers(&app, action),
        Command::Dnc { action } => run_dnc(&app, action),
        Command::Events { limit } => {
            let events = app.store.recent_events(limit)?;
            if events.is_empty() {
                println!("No call events logged.");
            }
            for event in &events {
                println!("{}", event_line(event));
            }
            Ok(())
        }
        Command::Settings => {
            for line in settings_lines(&app.settings) {
                println!("{line}");
            }
            Ok(())
        }
        Command::Dial => run_dial(&app).await,
        Command::Serve { bind } => {
            let controller = app.controller(app.telephony()?)?;
            let state = AppState {
                controller,
                store: app.store.clone(),
            };
            server::serve(state, bind).await
        }
        #[cfg(feature = "tui")]
        Command::Tui => {
            let telephony = app.telephony()?;
            let session = crate::tui::SessionInfo {
                backend: telephony.name(),
                pacing: app.settings.pacing(),
            };
            let controller = app.controller(telephony)?;
            crate::tui::run(controller, app.store.clone(), session).await
        }
    }
}

fn parse_number(raw: &str) -> Result<PhoneNumber> {
    PhoneNumber::parse(raw).ok_or_else(|| anyhow::anyhow!("phone number must not be empty"))
}

fn run_numbers(app: &App, action: NumbersAction) -> Result<()> {
    match action {
        NumbersAction::Add { numbers } => {
            let parsed = numbers
                .iter()
                .map(|raw| parse_number(raw))
                .collect::<Result<Vec<_>>>()?;
            let queue = app.store.append_numbers(parsed)?;
            println!("Queue now holds {} number(s).", queue.len());
        }
        NumbersAction::List => {
            let numbers = app.store.list_numbers()?;
            let dnc = app.store.list_dnc()?;
            for line in queue_lines(&numbers, &dnc) {
                println!("{line}");
            }
        }
        NumbersAction::Clear => {
            app.store.clear_numbers()?;
            println!("Queue cleared.");
        }
    }
    Ok(())
}

fn run_dnc(app: &App, action: DncAction) -> Result<()> {
    match action {
        DncAction::Add { number } => {
            let number = parse_number(&number)?;
            app.store.add_to_dnc(&number)?;
            println!("Added {number} to the DNC list.");
        }
        DncAction::List => {
            let dnc = app.store.list_dnc()?;
            if dnc.is_empty() {
                println!("DNC list is empty.");
            }
            for number in dnc {
                println!("{number}");
            }
        }
    }
    Ok(())
}

/// Foreground campaign: print each outcome as it lands, then the tally.
async fn run_dial(app: &App) -> Result<()> {
    let telephony = app.telephony()?;
    let run_config = app.settings.run_config();
    let queue = app.store.list_numbers()?;
    if queue.is_empty() {
        println!("No numbers queued.");
        return Ok(());
    }

    let (out_tx, out_handle) = spawn_output_writer();
    let _ = out_tx.send(OutputLine::Stderr(format!(
        "Dialing {} number(s) via {}, pacing {}",
        queue.len(),
        telephony.name(),
        humantime::format_duration(run_config.pacing)
    )));
    info!(backend = telephony.name(), dry_run = run_config.dry_run, "dial command started");

    let stop = CancellationToken::new();
    let ctrl_c = {
        let stop = stop.clone();
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = out_tx.send(OutputLine::Stderr(
                    "Stop requested; finishing the current call…".into(),
                ));
                stop.cancel();
            }
        })
    };

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<DialOutcome>();
    let printer = {
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            while let Some(outcome) = progress_rx.recv().await {
                let _ = out_tx.send(OutputLine::Stdout(outcome_line(&outcome)));
            }
        })
    };

    let queued = queue.len();
    let runner = app.runner(telephony);
    let tally = runner.run(queue, &progress_tx, &stop).await;

    drop(progress_tx);
    let _ = printer.await;
    ctrl_c.abort();

    let stopped = stop.is_cancelled() && (tally.total() as usize) < queued;
    for line in build_run_summary(&tally, queued, stopped) {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["dialer"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn numbers_add_requires_values() {
        assert!(Cli::try_parse_from(["dialer", "numbers", "add"]).is_err());
        let cli = parse(&["numbers", "add", "+3581", "+3582"]);
        match cli.command {
            Command::Numbers {
                action: NumbersAction::Add { numbers },
            } => assert_eq!(numbers, vec!["+3581", "+3582"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn serve_binds_localhost_by_default() {
        let cli = parse(&["serve"]);
        match cli.command {
            Command::Serve { bind } => assert_eq!(bind, "127.0.0.1:8000".parse().unwrap()),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_settings_precede_subcommand() {
        let cli = parse(&["--dry-run", "--dial-interval", "2s", "dial"]);
        assert!(cli.settings.dry_run);
        assert_eq!(cli.settings.pacing(), std::time::Duration::from_secs(2));
        assert!(matches!(cli.command, Command::Dial));
    }

    #[test]
    fn blank_numbers_are_rejected() {
        assert!(parse_number("   ").is_err());
        assert_eq!(parse_number(" +3581 ").unwrap().as_str(), "+3581");
    }

    #[tokio::test]
    async fn list_commands_use_the_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_str().unwrap();
        let cli = parse(&["--data-dir", data_dir, "--dry-run", "numbers", "add", "+3581", "+3581", "+3582"]);
        let app = App::open(cli.settings.clone()).unwrap();
        if let Command::Numbers { action } = cli.command {
            run_numbers(&app, action).unwrap();
        }
        run_dnc(&app, DncAction::Add { number: "+3582".into() }).unwrap();

        assert_eq!(
            app.store.list_numbers().unwrap(),
            vec![PhoneNumber::from("+3581"), PhoneNumber::from("+3582")]
        );
        assert_eq!(app.store.list_dnc().unwrap(), vec![PhoneNumber::from("+3582")]);
        assert!(dir.path().join("logs.sqlite").exists());
    }

    #[tokio::test]
    async fn dry_run_dial_logs_each_number() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_str().unwrap();
        let cli = parse(&["--data-dir", data_dir, "--dry-run", "--dial-interval", "0s", "dial"]);
        let app = App::open(cli.settings).unwrap();
        app.store
            .save_numbers(["+3581".into(), "+3582".into()])
            .unwrap();
        app.store.add_to_dnc(&"+3582".into()).unwrap();

        run_dial(&app).await.unwrap();

        let events = app.store.recent_events(10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "skipped");
        assert!(events[0].call_sid.starts_with("dnc-skip-"));
        assert_eq!(events[1].event, "initiated");
        assert!(events[1].call_sid.starts_with("dryrun-"));
    }
}
