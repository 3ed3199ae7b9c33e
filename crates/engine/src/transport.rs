//! Seams between the pipeline and the messaging transport.
//!
//! The pipeline never talks to a network client directly. A `Connector`
//! establishes a `Session`, whose parts are lent to the processor and filter
//! for the duration of one run.

use std::sync::Arc;

use async_trait::async_trait;

use relay_common::config::PipelineConfig;
use relay_common::error::AppError;
use relay_common::types::{ChatId, InboundEvent, Participant};
use relay_notifier::MessageSender;

/// Ordered stream of inbound transport events.
#[async_trait]
pub trait EventListener: Send {
    /// Wait for the next event.
    ///
    /// `Ok(None)` means the session has ended (disconnected). An `Err` is a
    /// failure the transport could not recover from.
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, AppError>;
}

/// Paged access to a channel's participants.
#[async_trait]
pub trait ParticipantSource: Send + Sync {
    /// Fetch at most `limit` participants starting at `offset`.
    /// A page shorter than `limit` means the listing is exhausted.
    async fn fetch_participants(
        &self,
        channel_id: ChatId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Participant>, AppError>;
}

/// A connected, authenticated transport session.
pub struct Session {
    pub events: Box<dyn EventListener>,
    pub participants: Arc<dyn ParticipantSource>,
    pub sender: Arc<dyn MessageSender>,
}

/// Establishes transport sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and authenticate. Failures should be `AppError::TransportConnect`.
    async fn connect(&self, config: &PipelineConfig) -> Result<Session, AppError>;
}
