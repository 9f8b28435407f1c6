use super::twilio::TwilioClient;
use crate::error::TransportError;
use crate::model::{CallId, PhoneNumber};
use async_trait::async_trait;

/// Turns a phone number into a provider call identifier.
#[async_trait]
pub trait CallPlacer: Send + Sync {
    async fn place_call(&self, number: &PhoneNumber) -> Result<CallId, TransportError>;
}

/// The call-placement backends the dialer can be configured with.
pub enum Telephony {
    Twilio(TwilioClient),
    /// Reserved for an Asterisk ARI integration; every attempt fails.
    Asterisk,
    /// Fabricates call ids without any network access.
    DryRun,
}

impl Telephony {
    pub fn name(&self) -> &'static str {
        match self {
            Telephony::Twilio(_) => "twilio",
            Telephony::Asterisk => "asterisk",
            Telephony::DryRun => "dry-run",
        }
    }
}

#[async_trait]
impl CallPlacer for Telephony {
    async fn place_call(&self, number: &PhoneNumber) -> Result<CallId, TransportError> {
        match self {
            Telephony::Twilio(client) => client.place_call(number).await,
            Telephony::Asterisk => Err(TransportError::Unsupported(
                "Asterisk backend not implemented yet",
            )),
            Telephony::DryRun => {
                tracing::info!(%number, "dry-run: pretending to call");
                Ok(dry_run_call_id())
            }
        }
    }
}

fn dry_run_call_id() -> CallId {
    CallId::new(format!("dryrun-{:016x}", rand::random::<u64>()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dry_run_ids_are_distinct() {
        let backend = Telephony::DryRun;
        let number = PhoneNumber::from("+358401234567");
        let first = backend.place_call(&number).await.unwrap();
        let second = backend.place_call(&number).await.unwrap();
        assert!(first.as_str().starts_with("dryrun-"));
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn asterisk_placeholder_always_fails() {
        let err = Telephony::Asterisk
            .place_call(&PhoneNumber::from("+358401234567"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Unsupported(_)));
        assert!(err.to_string().contains("Asterisk"));
    }
}
