//! Participant filter: lazy, capped enumeration of eligible reacting users.
//!
//! Participants are fetched from the transport page by page, only as the
//! consumer pulls them. Automated accounts are never emitted, and neither is
//! anyone at all when `fetch_user_data` is disabled; pages are still fetched
//! in that case, the candidates are simply all skipped.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::future;
use futures::stream::{self, Stream, TryStreamExt};

use relay_common::config::AdvancedSettings;
use relay_common::error::AppError;
use relay_common::types::{ChatId, Participant};

use crate::transport::ParticipantSource;

/// Hard ceiling on participants examined per call, whatever the caller asks for.
pub const MAX_PARTICIPANTS: usize = 100;

/// Participants requested from the transport per page.
const PAGE_CHUNK: usize = 50;

/// Paging state threaded through the stream.
struct Cursor {
    source: Arc<dyn ParticipantSource>,
    channel_id: ChatId,
    offset: usize,
    remaining: usize,
    buffered: VecDeque<Participant>,
    exhausted: bool,
}

/// Applies the eligibility policy to a channel's participant listing.
#[derive(Clone)]
pub struct ParticipantFilter {
    source: Arc<dyn ParticipantSource>,
    fetch_user_data: bool,
}

impl ParticipantFilter {
    pub fn new(source: Arc<dyn ParticipantSource>, settings: &AdvancedSettings) -> Self {
        Self {
            source,
            fetch_user_data: settings.fetch_user_data,
        }
    }

    /// Whether a single participant may be notified about.
    pub fn admits(&self, participant: &Participant) -> bool {
        self.fetch_user_data && !participant.is_bot
    }

    /// Eligible participants of `channel_id`, examining at most
    /// `min(limit, MAX_PARTICIPANTS)` candidates.
    ///
    /// A failed page fetch yields a single `Err` and ends the stream.
    pub fn eligible(
        &self,
        channel_id: ChatId,
        limit: usize,
    ) -> impl Stream<Item = Result<Participant, AppError>> + Send + 'static {
        let fetch_user_data = self.fetch_user_data;

        participants(self.source.clone(), channel_id, limit.min(MAX_PARTICIPANTS)).try_filter(
            move |participant| {
                let admitted = fetch_user_data && !participant.is_bot;
                if !admitted {
                    tracing::trace!(
                        user_id = participant.id,
                        is_bot = participant.is_bot,
                        "Skipping participant"
                    );
                }
                future::ready(admitted)
            },
        )
    }
}

/// Unfiltered, lazily paged participant listing bounded at `limit`.
fn participants(
    source: Arc<dyn ParticipantSource>,
    channel_id: ChatId,
    limit: usize,
) -> impl Stream<Item = Result<Participant, AppError>> + Send + 'static {
    let cursor = Cursor {
        source,
        channel_id,
        offset: 0,
        remaining: limit,
        buffered: VecDeque::new(),
        exhausted: false,
    };

    stream::try_unfold(cursor, |mut cursor| async move {
        loop {
            if let Some(participant) = cursor.buffered.pop_front() {
                return Ok::<_, AppError>(Some((participant, cursor)));
            }
            if cursor.exhausted || cursor.remaining == 0 {
                return Ok(None);
            }

            let requested = cursor.remaining.min(PAGE_CHUNK);
            let page = cursor
                .source
                .fetch_participants(cursor.channel_id, cursor.offset, requested)
                .await?;

            if page.len() < requested {
                cursor.exhausted = true;
            }
            let taken = page.len().min(requested);
            cursor.offset += taken;
            cursor.remaining -= taken;
            cursor.buffered.extend(page.into_iter().take(taken));
        }
    })
}
