//! Reaction processing pipeline.
//!
//! Receives reaction-count updates from the transport and:
//! 1. Truncates the tallies to `max_reactions_per_message`
//! 2. Enumerates eligible participants per retained tally (via `ParticipantFilter`)
//! 3. Translates each (tally, participant) pair into a notification for the owner
//! 4. Delivers each notification sequentially through the `Notifier`

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use relay_common::config::PipelineConfig;
use relay_common::types::{ChatId, NotificationMessage, Participant, ReactionEvent, ReactionTally};
use relay_notifier::Notifier;

use crate::filter::ParticipantFilter;
use crate::transport::ParticipantSource;

/// Participants requested per reaction. The filter caps this further.
pub const PARTICIPANT_PAGE_LIMIT: usize = 100;

/// What one `process` call did. Informational only; never an error.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessSummary {
    pub reactions_examined: usize,
    pub notifications_sent: u32,
    pub notifications_failed: u32,
    pub reactions_aborted: u32,
}

/// Turns reaction events into owner notifications.
pub struct ReactionProcessor {
    owner: ChatId,
    max_reactions: usize,
    filter: ParticipantFilter,
    notifier: Notifier,
}

impl ReactionProcessor {
    pub fn new(
        config: &PipelineConfig,
        participants: Arc<dyn ParticipantSource>,
        notifier: Notifier,
    ) -> Self {
        Self {
            owner: config.telegram.owner_id,
            max_reactions: config.advanced_settings.max_reactions_per_message,
            filter: ParticipantFilter::new(participants, &config.advanced_settings),
            notifier,
        }
    }

    /// Process one reaction event.
    ///
    /// Tallies are handled in received order, participants in fetch order,
    /// one delivery at a time. An enumeration failure abandons only the
    /// current tally. Delivery failures are logged and counted, never raised.
    pub async fn process(&self, event: &ReactionEvent, cancel: &CancellationToken) -> ProcessSummary {
        let mut summary = ProcessSummary::default();

        let retained = &event.reactions[..event.reactions.len().min(self.max_reactions)];
        if retained.len() < event.reactions.len() {
            tracing::debug!(
                message_id = event.message_id,
                received = event.reactions.len(),
                retained = retained.len(),
                "Truncated reactions to configured maximum"
            );
        }

        for tally in retained {
            if cancel.is_cancelled() {
                break;
            }
            summary.reactions_examined += 1;

            let mut eligible =
                std::pin::pin!(self.filter.eligible(event.channel_id, PARTICIPANT_PAGE_LIMIT));

            while let Some(item) = eligible.next().await {
                let participant = match item {
                    Ok(participant) => participant,
                    Err(e) => {
                        tracing::error!(
                            message_id = event.message_id,
                            channel_id = event.channel_id,
                            reaction = %tally.symbol,
                            error = %e,
                            "Participant enumeration failed, skipping reaction"
                        );
                        summary.reactions_aborted += 1;
                        break;
                    }
                };

                let message = Self::translate(self.owner, event, tally, &participant);
                tracing::info!("Processing reaction: {}", message.text);

                let outcome = self.notifier.deliver(&message, cancel).await;
                if outcome.succeeded {
                    summary.notifications_sent += 1;
                } else {
                    summary.notifications_failed += 1;
                    tracing::error!(
                        message_id = event.message_id,
                        user_id = participant.id,
                        attempts = outcome.attempts_made,
                        "Notification dropped"
                    );
                }

                if cancel.is_cancelled() {
                    break;
                }
            }
        }

        tracing::debug!(
            message_id = event.message_id,
            channel_id = event.channel_id,
            reactions = summary.reactions_examined,
            sent = summary.notifications_sent,
            failed = summary.notifications_failed,
            aborted = summary.reactions_aborted,
            "Reaction event processed"
        );

        summary
    }

    /// Translate a (tally, participant) pair into the owner's notification.
    pub fn translate(
        owner: ChatId,
        event: &ReactionEvent,
        tally: &ReactionTally,
        participant: &Participant,
    ) -> NotificationMessage {
        let username = participant.username.as_deref().unwrap_or("Unknown");
        let first_name = participant.first_name.as_deref().unwrap_or("");
        let last_name = participant.last_name.as_deref().unwrap_or("");

        NotificationMessage {
            destination: owner,
            text: format!(
                "User {} (ID: {}, Name: {} {}) reacted with {} to message ID {} in channel {} (total: {})",
                username,
                participant.id,
                first_name,
                last_name,
                tally.symbol,
                event.message_id,
                event.channel_id,
                tally.count
            ),
        }
    }
}
