use thiserror::Error;

/// Errors raised by the Bot API client.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },
}

impl TelegramError {
    /// Errors that retrying cannot fix: a revoked or wrong token (401/404),
    /// or another poller already consuming updates for this bot (409).
    pub fn is_fatal(&self) -> bool {
        matches!(self, TelegramError::Api { code: 401 | 404 | 409, .. })
    }
}
