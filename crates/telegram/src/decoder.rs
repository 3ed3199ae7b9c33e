//! Decodes raw Bot API updates into `InboundEvent`s.
//!
//! An update carries exactly one payload field next to `update_id`; the field
//! name is the update kind. Kinds without a model, and payloads that fail to
//! parse, come back as `InboundEvent::Unsupported`.

use serde::Deserialize;
use serde_json::Value;

use relay_common::types::{InboundEvent, ReactionEvent, ReactionTally};

use crate::client::Update;

/// Update kinds requested from `getUpdates`. Reaction counts are only
/// delivered when listed explicitly.
pub const ALLOWED_UPDATES: &[&str] = &[
    "message",
    "edited_message",
    "channel_post",
    "edited_channel_post",
    "message_reaction_count",
    "chat_member",
    "my_chat_member",
];

/// Symbol used for paid (star) reactions.
const PAID_REACTION_SYMBOL: &str = "⭐";

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    message_id: i64,
    chat: Chat,
}

#[derive(Debug, Deserialize)]
struct ChatMemberUpdated {
    chat: Chat,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReactionType {
    Emoji { emoji: String },
    CustomEmoji { custom_emoji_id: String },
    Paid,
    #[serde(other)]
    Unknown,
}

impl ReactionType {
    fn symbol(self) -> String {
        match self {
            ReactionType::Emoji { emoji } => emoji,
            ReactionType::CustomEmoji { custom_emoji_id } => format!("custom:{}", custom_emoji_id),
            ReactionType::Paid => PAID_REACTION_SYMBOL.to_string(),
            ReactionType::Unknown => "unknown".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReactionCount {
    #[serde(rename = "type")]
    kind: ReactionType,
    total_count: u32,
}

#[derive(Debug, Deserialize)]
struct MessageReactionCountUpdated {
    chat: Chat,
    message_id: i64,
    #[serde(default)]
    reactions: Vec<ReactionCount>,
}

impl From<MessageReactionCountUpdated> for ReactionEvent {
    fn from(update: MessageReactionCountUpdated) -> Self {
        ReactionEvent {
            message_id: update.message_id,
            channel_id: update.chat.id,
            reactions: update
                .reactions
                .into_iter()
                .map(|reaction| ReactionTally {
                    symbol: reaction.kind.symbol(),
                    count: reaction.total_count,
                })
                .collect(),
        }
    }
}

/// Decode one update. Never fails; unknown or malformed payloads are
/// reported as `Unsupported`.
pub fn decode_update(update: &Update) -> InboundEvent {
    let Some((kind, payload)) = update.payload.iter().next() else {
        return InboundEvent::Unsupported("empty".to_string());
    };

    let decoded = match kind.as_str() {
        "message_reaction_count" => parse::<MessageReactionCountUpdated>(payload)
            .map(|update| InboundEvent::ReactionUpdate(update.into())),
        "message" | "channel_post" => {
            parse::<MessageRef>(payload).map(|message| InboundEvent::Message {
                chat_id: message.chat.id,
                message_id: message.message_id,
            })
        }
        "edited_message" | "edited_channel_post" => {
            parse::<MessageRef>(payload).map(|message| InboundEvent::EditedMessage {
                chat_id: message.chat.id,
                message_id: message.message_id,
            })
        }
        "chat_member" | "my_chat_member" => parse::<ChatMemberUpdated>(payload)
            .map(|member| InboundEvent::MembershipChange {
                chat_id: member.chat.id,
            }),
        _ => None,
    };

    match decoded {
        Some(event) => {
            tracing::debug!(update_id = update.update_id, kind = %kind, "Decoded update");
            event
        }
        None => InboundEvent::Unsupported(kind.clone()),
    }
}

fn parse<T: for<'de> Deserialize<'de>>(payload: &Value) -> Option<T> {
    match T::deserialize(payload) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, "Malformed update payload");
            None
        }
    }
}
