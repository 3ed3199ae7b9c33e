//! Notification delivery with bounded, constant-delay retry.
//!
//! A `Notifier` wraps a single `MessageSender` call. Failed sends are retried
//! up to the configured attempt ceiling with a fixed pause between attempts.
//! Exhaustion is reported through the returned `DeliveryOutcome` and the log,
//! never as an error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use relay_common::config::NotificationSettings;
use relay_common::error::AppError;
use relay_common::types::{ChatId, DeliveryOutcome, NotificationMessage};

/// Transport primitive that delivers one text message to one destination.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, destination: ChatId, text: &str) -> Result<(), AppError>;
}

/// Attempt ceiling and constant inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }
}

impl From<&NotificationSettings> for RetryPolicy {
    fn from(settings: &NotificationSettings) -> Self {
        Self::new(settings.retry_attempts, settings.retry_delay())
    }
}

/// Delivers notifications through a `MessageSender`, retrying on failure.
#[derive(Clone)]
pub struct Notifier {
    sender: Arc<dyn MessageSender>,
    policy: RetryPolicy,
}

impl Notifier {
    pub fn new(sender: Arc<dyn MessageSender>, policy: RetryPolicy) -> Self {
        Self { sender, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Send `message`, retrying up to the policy's attempt ceiling.
    ///
    /// No sleep follows the final failed attempt. If `cancel` fires while
    /// waiting between attempts, the remaining attempts are abandoned.
    pub async fn deliver(
        &self,
        message: &NotificationMessage,
        cancel: &CancellationToken,
    ) -> DeliveryOutcome {
        let ceiling = self.policy.attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match self
                .sender
                .send_message(message.destination, &message.text)
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        destination = message.destination,
                        attempt,
                        text = %message.text,
                        "Message sent successfully"
                    );
                    return DeliveryOutcome {
                        succeeded: true,
                        attempts_made: attempt,
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        destination = message.destination,
                        error = %e,
                        "Failed to send message. Retry {}/{}",
                        attempt,
                        ceiling
                    );
                }
            }

            if attempt >= ceiling {
                tracing::error!(
                    destination = message.destination,
                    attempts = attempt,
                    text = %message.text,
                    "Failed to send message after {} attempts",
                    ceiling
                );
                return DeliveryOutcome {
                    succeeded: false,
                    attempts_made: attempt,
                };
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!(
                        destination = message.destination,
                        attempts = attempt,
                        "Delivery abandoned: pipeline is stopping"
                    );
                    return DeliveryOutcome {
                        succeeded: false,
                        attempts_made: attempt,
                    };
                }
                _ = tokio::time::sleep(self.policy.delay) => {}
            }
        }
    }
}
