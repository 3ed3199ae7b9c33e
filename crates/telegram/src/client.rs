//! Minimal Telegram Bot API client.
//!
//! Every method is a POST of a JSON body to `{api_url}/bot{token}/{method}`.
//! Responses use the `{ ok, result, description, error_code }` envelope;
//! `ok = false` becomes `TelegramError::Api`.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use relay_common::config::TelegramConfig;
use relay_common::types::{ChatId, Participant};

use crate::error::TelegramError;

/// Headroom added to the long-poll timeout for the HTTP request itself.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

/// Bot API `User` object.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl From<User> for Participant {
    fn from(user: User) -> Self {
        Participant {
            id: user.id,
            first_name: Some(user.first_name).filter(|name| !name.is_empty()),
            last_name: user.last_name,
            username: user.username,
            is_bot: user.is_bot,
        }
    }
}

/// Bot API `ChatMember` object (only the fields we use).
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMember {
    pub status: String,
    pub user: User,
}

/// Bot API `Update`. The payload is kept raw and decoded by `decoder`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct GetUpdates<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

/// Thin typed wrapper over the Bot API HTTP endpoints. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BotApi {
    http: reqwest::Client,
    base_url: String,
}

impl BotApi {
    /// Build a client for the configured endpoint and bot token.
    pub fn new(config: &TelegramConfig) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs) + REQUEST_TIMEOUT_MARGIN)
            .build()?;

        Ok(Self {
            http,
            base_url: format!("{}/bot{}", config.api_url, config.bot_token),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &impl Serialize,
    ) -> Result<T, TelegramError> {
        let response: ApiResponse<T> = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(body)
            .send()
            .await?
            .json()
            .await?;

        match response {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse {
                error_code,
                description,
                ..
            } => Err(TelegramError::Api {
                code: error_code.unwrap_or_default(),
                description: description.unwrap_or_else(|| format!("{} failed", method)),
            }),
        }
    }

    /// Identify the bot; doubles as the credential check.
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &json!({})).await
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
        allowed_updates: &[&str],
    ) -> Result<Vec<Update>, TelegramError> {
        self.call(
            "getUpdates",
            &GetUpdates {
                offset,
                timeout: timeout_secs,
                allowed_updates,
            },
        )
        .await
    }

    pub async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), TelegramError> {
        let _: serde_json::Value = self
            .call("sendMessage", &json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }

    pub async fn get_chat_administrators(
        &self,
        chat_id: ChatId,
    ) -> Result<Vec<ChatMember>, TelegramError> {
        self.call("getChatAdministrators", &json!({ "chat_id": chat_id }))
            .await
    }
}
