//! services/api/src/adapters/delivery.rs
//!
//! Adapters for the `CodeDeliveryService` port. `QueuedDelivery` is what the
//! authenticator talks to: it only enqueues, and a background worker hands
//! each passcode to the real transport (SMTP, or the log in development).

use async_trait::async_trait;
use chapterhouse_core::ports::{CodeDeliveryService, PortError, PortResult};
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::SmtpSettings;

//=========================================================================================
// Queue In Front of the Transport
//=========================================================================================

struct OutgoingCode {
    email: String,
    code: String,
}

/// Fire-and-forget front for a slower delivery transport.
#[derive(Clone)]
pub struct QueuedDelivery {
    sender: mpsc::UnboundedSender<OutgoingCode>,
}

impl QueuedDelivery {
    /// Starts the worker that drains the queue into `transport` until
    /// `shutdown` is cancelled or every sender is dropped.
    pub fn spawn(
        transport: Arc<dyn CodeDeliveryService>,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<OutgoingCode>();

        let worker = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Passcode delivery worker stopping.");
                        break;
                    }
                    next = receiver.recv() => match next {
                        Some(outgoing) => {
                            if let Err(e) = transport.deliver(&outgoing.email, &outgoing.code).await {
                                warn!("Failed to deliver passcode to {}: {}", outgoing.email, e);
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        (Self { sender }, worker)
    }
}

#[async_trait]
impl CodeDeliveryService for QueuedDelivery {
    async fn deliver(&self, email: &str, code: &str) -> PortResult<()> {
        self.sender
            .send(OutgoingCode {
                email: email.to_string(),
                code: code.to_string(),
            })
            .map_err(|_| PortError::Unexpected("Passcode delivery worker has stopped".to_string()))
    }
}

//=========================================================================================
// SMTP Transport
//=========================================================================================

/// Sends passcodes as plain-text email.
#[derive(Clone)]
pub struct SmtpDelivery {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    ttl_minutes: i64,
}

impl SmtpDelivery {
    pub fn new(settings: &SmtpSettings, ttl_minutes: i64) -> PortResult<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| PortError::Unexpected(format!("Failed to create SMTP transport: {}", e)))?
            .port(settings.port);
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = settings
            .from
            .parse::<Mailbox>()
            .map_err(|e| PortError::Unexpected(format!("Invalid from address: {}", e)))?;

        Ok(Self {
            transport: builder.build(),
            from,
            ttl_minutes,
        })
    }
}

#[async_trait]
impl CodeDeliveryService for SmtpDelivery {
    async fn deliver(&self, email: &str, code: &str) -> PortResult<()> {
        let to = email
            .parse::<Mailbox>()
            .map_err(|e| PortError::Unexpected(format!("Invalid to address: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(format!("Your verification code is {}", code))
            .header(ContentType::TEXT_PLAIN)
            .body(format!(
                "Your verification code is {}.\n\nIt expires in {} minutes. If you did not try to sign in, you can ignore this email.\n",
                code, self.ttl_minutes
            ))
            .map_err(|e| PortError::Unexpected(format!("Failed to build message: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to send email: {}", e)))?;
        Ok(())
    }
}

//=========================================================================================
// Development Transport
//=========================================================================================

/// Writes passcodes to the log. Used when no SMTP host is configured.
#[derive(Clone, Default)]
pub struct LogDelivery;

#[async_trait]
impl CodeDeliveryService for LogDelivery {
    async fn deliver(&self, email: &str, code: &str) -> PortResult<()> {
        info!("Verification code for {}: {}", email, code);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingDelivery;
    use std::time::Duration;

    #[tokio::test]
    async fn queued_codes_reach_the_transport() {
        let transport = Arc::new(RecordingDelivery::default());
        let shutdown = CancellationToken::new();
        let (queue, worker) = QueuedDelivery::spawn(transport.clone(), shutdown.clone());

        queue.deliver("a@example.com", "123456").await.unwrap();
        drop(queue);
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(transport.last_code_for("a@example.com").as_deref(), Some("123456"));
    }

    #[tokio::test]
    async fn enqueue_fails_once_the_worker_is_gone() {
        let shutdown = CancellationToken::new();
        let (queue, worker) =
            QueuedDelivery::spawn(Arc::new(RecordingDelivery::default()), shutdown.clone());

        shutdown.cancel();
        worker.await.unwrap();

        assert!(queue.deliver("a@example.com", "123456").await.is_err());
    }
}
