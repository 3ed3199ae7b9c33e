use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;

use relay_common::error::AppError;
use relay_common::types::InboundEvent;
use relay_engine::transport::EventListener;

use crate::client::BotApi;
use crate::decoder::{ALLOWED_UPDATES, decode_update};

/// Wait after a transient polling failure before trying again.
const DEFAULT_BACKOFF: Duration = Duration::from_secs(3);

/// Long-polling update source that yields decoded events one at a time.
pub struct UpdatePoller {
    api: BotApi,
    /// Next `update_id` to request; everything below it is acknowledged.
    offset: Option<i64>,
    timeout_secs: u64,
    backoff: Duration,
    buffer: VecDeque<InboundEvent>,
}

impl UpdatePoller {
    pub fn new(api: BotApi, timeout_secs: u64) -> Self {
        Self {
            api,
            offset: None,
            timeout_secs,
            backoff: DEFAULT_BACKOFF,
            buffer: VecDeque::new(),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Fetch one batch into the buffer. Transient failures are logged and
    /// leave the buffer empty.
    async fn poll_once(&mut self) -> Result<(), AppError> {
        match self
            .api
            .get_updates(self.offset, self.timeout_secs, ALLOWED_UPDATES)
            .await
        {
            Ok(updates) => {
                if !updates.is_empty() {
                    tracing::debug!(count = updates.len(), "Received updates");
                }
                for update in &updates {
                    self.offset = Some(update.update_id + 1);
                    self.buffer.push_back(decode_update(update));
                }
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(AppError::Transport(e.to_string())),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    backoff_secs = self.backoff.as_secs(),
                    "Polling for updates failed, retrying"
                );
                tokio::time::sleep(self.backoff).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl EventListener for UpdatePoller {
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, AppError> {
        loop {
            if let Some(event) = self.buffer.pop_front() {
                return Ok(Some(event));
            }
            self.poll_once().await?;
        }
    }
}
