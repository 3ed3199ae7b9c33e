//! Bot API implementations of the engine's transport seams.

use std::sync::Arc;

use async_trait::async_trait;

use relay_common::config::PipelineConfig;
use relay_common::error::AppError;
use relay_common::types::{ChatId, Participant};
use relay_engine::transport::{Connector, ParticipantSource, Session};
use relay_notifier::MessageSender;

use crate::client::BotApi;
use crate::poller::UpdatePoller;

/// Participant listing backed by `getChatAdministrators`.
///
/// The Bot API exposes no full member listing, so the administrators are the
/// participants. The endpoint is not paged; `offset`/`limit` are applied here.
pub struct ChatParticipants {
    api: BotApi,
}

impl ChatParticipants {
    pub fn new(api: BotApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ParticipantSource for ChatParticipants {
    async fn fetch_participants(
        &self,
        channel_id: ChatId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Participant>, AppError> {
        let members = self
            .api
            .get_chat_administrators(channel_id)
            .await
            .map_err(|e| AppError::Enumeration(format!("channel {}: {}", channel_id, e)))?;

        Ok(members
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|member| Participant::from(member.user))
            .collect())
    }
}

/// Sends notifications with `sendMessage`.
pub struct BotSender {
    api: BotApi,
}

impl BotSender {
    pub fn new(api: BotApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl MessageSender for BotSender {
    async fn send_message(&self, destination: ChatId, text: &str) -> Result<(), AppError> {
        self.api
            .send_message(destination, text)
            .await
            .map_err(|e| AppError::Delivery(e.to_string()))
    }
}

/// Connects to the Bot API, verifying the token with `getMe`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelegramConnector;

#[async_trait]
impl Connector for TelegramConnector {
    async fn connect(&self, config: &PipelineConfig) -> Result<Session, AppError> {
        let telegram = &config.telegram;
        let api = BotApi::new(telegram).map_err(|e| AppError::TransportConnect(e.to_string()))?;

        let me = api
            .get_me()
            .await
            .map_err(|e| AppError::TransportConnect(e.to_string()))?;

        tracing::info!(
            session = %telegram.session_name,
            bot_id = me.id,
            username = me.username.as_deref().unwrap_or("unknown"),
            "Connected to Telegram"
        );

        Ok(Session {
            events: Box::new(UpdatePoller::new(api.clone(), telegram.poll_timeout_secs)),
            participants: Arc::new(ChatParticipants::new(api.clone())),
            sender: Arc::new(BotSender::new(api)),
        })
    }
}
