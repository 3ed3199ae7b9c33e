use serde::{Deserialize, Serialize};

/// Telegram chat / user identifier.
pub type ChatId = i64;

/// A single reaction aggregate on a message: the symbol and how many users applied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionTally {
    /// Emoji (or custom emoji id) of the reaction
    pub symbol: String,
    /// Number of users who applied this reaction
    pub count: u32,
}

/// Reaction counts changed on a channel message.
///
/// Tallies keep the order the transport delivered them in; that order drives
/// both processing order and truncation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub message_id: i64,
    pub channel_id: ChatId,
    pub reactions: Vec<ReactionTally>,
}

/// A member of a channel as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ChatId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Public handle, without the leading `@`
    pub username: Option<String>,
    /// Automated (bot) account
    pub is_bot: bool,
}

/// Text addressed to a single destination, ready for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub destination: ChatId,
    pub text: String,
}

/// Result of one notifier invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub succeeded: bool,
    pub attempts_made: u32,
}

/// Kinds of inbound events a transport can deliver.
///
/// Only `ReactionUpdate` carries work for the pipeline; the rest are recognised
/// so they can be ignored explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    ReactionUpdate(ReactionEvent),
    Message { chat_id: ChatId, message_id: i64 },
    EditedMessage { chat_id: ChatId, message_id: i64 },
    MembershipChange { chat_id: ChatId },
    /// Any update kind the transport does not model.
    Unsupported(String),
}

impl InboundEvent {
    /// Short kind label used in logs.
    pub fn kind(&self) -> &str {
        match self {
            InboundEvent::ReactionUpdate(_) => "reaction_update",
            InboundEvent::Message { .. } => "message",
            InboundEvent::EditedMessage { .. } => "edited_message",
            InboundEvent::MembershipChange { .. } => "membership_change",
            InboundEvent::Unsupported(kind) => kind,
        }
    }
}

impl std::fmt::Display for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.username {
            Some(username) => write!(f, "@{} ({})", username, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_labels() {
        let event = InboundEvent::ReactionUpdate(ReactionEvent {
            message_id: 1,
            channel_id: 2,
            reactions: vec![],
        });
        assert_eq!(event.kind(), "reaction_update");
        assert_eq!(
            InboundEvent::Unsupported("poll".to_string()).kind(),
            "poll"
        );
    }

    #[test]
    fn test_participant_display() {
        let mut participant = Participant {
            id: 7,
            first_name: None,
            last_name: None,
            username: Some("alice".to_string()),
            is_bot: false,
        };
        assert_eq!(participant.to_string(), "@alice (7)");
        participant.username = None;
        assert_eq!(participant.to_string(), "7");
    }
}
