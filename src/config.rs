//! Settings resolved from flags, environment variables and `.env`.

use crate::engine::{Telephony, TwilioClient, TwilioConfig};
use crate::error::ConfigError;
use crate::model::{BackendKind, RunConfig};
use clap::Args;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Twilio account SID
    #[arg(long, env = "TWILIO_ACCOUNT_SID", hide_env_values = true)]
    pub twilio_account_sid: Option<String>,

    /// Twilio auth token
    #[arg(long, env = "TWILIO_AUTH_TOKEN", hide_env_values = true)]
    pub twilio_auth_token: Option<String>,

    /// Caller id used for outbound calls
    #[arg(long, env = "TWILIO_NUMBER")]
    pub twilio_number: Option<String>,

    /// Public URL Twilio uses to reach the voice and status webhooks
    #[arg(long, env = "PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// Base URL of the Twilio REST API
    #[arg(long, env = "TWILIO_API_BASE", default_value = "https://api.twilio.com")]
    pub twilio_api_base: String,

    /// Delay between successive call attempts
    #[arg(long, env = "DIAL_INTERVAL", default_value = "10s")]
    pub dial_interval: humantime::Duration,

    /// Call placement backend
    #[arg(long, env = "TELEPHONY_BACKEND", value_enum, default_value_t = BackendKind::Twilio)]
    pub telephony_backend: BackendKind,

    /// Directory holding the number queue and DNC list
    #[arg(long, env = "DIALER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// SQLite call event log (defaults to <data-dir>/logs.sqlite)
    #[arg(long, env = "SQLITE_PATH")]
    pub sqlite_path: Option<PathBuf>,

    /// Simulate call placement without contacting any backend
    #[arg(long, env = "DIALER_DRY_RUN")]
    pub dry_run: bool,
}

impl Settings {
    /// Absolute data directory, falling back to the platform data dir.
    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => absolute(dir),
            None => dirs::data_local_dir()
                .map(|d| d.join("outbound-dialer"))
                .unwrap_or_else(|| absolute(Path::new("dialer"))),
        }
    }

    pub fn sqlite_path(&self) -> PathBuf {
        match &self.sqlite_path {
            Some(path) => absolute(path),
            None => self.data_dir().join("logs.sqlite"),
        }
    }

    pub fn pacing(&self) -> Duration {
        Duration::from(self.dial_interval)
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            pacing: self.pacing(),
            backend: self.telephony_backend,
            dry_run: self.dry_run,
        }
    }

    /// Build the configured call-placement backend.
    ///
    /// Dry-run needs no credentials; Twilio requires all of its settings.
    pub fn telephony(&self) -> Result<Telephony, ConfigError> {
        if self.dry_run {
            return Ok(Telephony::DryRun);
        }
        match self.telephony_backend {
            BackendKind::Asterisk => Ok(Telephony::Asterisk),
            BackendKind::Twilio => {
                let public_base_url = required(&self.public_base_url, "PUBLIC_BASE_URL")?;
                if !public_base_url.starts_with("http://") && !public_base_url.starts_with("https://") {
                    return Err(ConfigError::Invalid {
                        name: "PUBLIC_BASE_URL",
                        reason: format!("{public_base_url} is not an http(s) URL"),
                    });
                }
                let cfg = TwilioConfig {
                    account_sid: required(&self.twilio_account_sid, "TWILIO_ACCOUNT_SID")?,
                    auth_token: required(&self.twilio_auth_token, "TWILIO_AUTH_TOKEN")?,
                    from_number: required(&self.twilio_number, "TWILIO_NUMBER")?,
                    public_base_url,
                    api_base: self.twilio_api_base.clone(),
                };
                Ok(Telephony::Twilio(TwilioClient::new(cfg)?))
            }
        }
    }
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::Missing(name))
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
