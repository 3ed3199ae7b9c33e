//! Pipeline supervisor: lifecycle state machine and run loop.
//!
//! A run resolves configuration, connects the transport, then drives the
//! event loop and the health monitor together inside one task until the
//! transport disconnects or the run is cancelled.
//!
//! Lifecycle transitions:
//! - `Stopped → Starting` on `start()`
//! - `Starting → Running` once the transport is connected
//! - `Starting → Stopped` on a configuration or connect error
//! - `Running | Starting → Stopped` on `stop()` or transport disconnect

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use relay_common::config::{ConfigSource, PipelineConfig};
use relay_common::error::AppError;
use relay_common::types::InboundEvent;
use relay_notifier::{Notifier, RetryPolicy};

use crate::health::HealthMonitor;
use crate::processor::ReactionProcessor;
use crate::transport::{Connector, EventListener, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Stopped,
    Starting,
    Running,
}

/// Snapshot of the supervisor's state.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub state: Lifecycle,
    pub run_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
}

impl PipelineStatus {
    /// True while a run is starting or running.
    pub fn is_running(&self) -> bool {
        self.state != Lifecycle::Stopped
    }
}

#[derive(Debug, Clone)]
pub enum StartOutcome {
    Started { run_id: Uuid },
    /// A run was already starting or running; nothing was changed.
    AlreadyRunning(PipelineStatus),
    /// `stop()` was called while this start was still connecting.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

struct ActiveRun {
    id: Uuid,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    started_at: Option<DateTime<Utc>>,
}

struct Record {
    state: Lifecycle,
    run: Option<ActiveRun>,
}

impl Record {
    fn is_current(&self, run_id: Uuid) -> bool {
        self.run.as_ref().is_some_and(|run| run.id == run_id)
    }

    fn reset(&mut self) -> Option<ActiveRun> {
        self.state = Lifecycle::Stopped;
        self.run.take()
    }

    fn status(&self) -> PipelineStatus {
        PipelineStatus {
            state: self.state,
            run_id: self.run.as_ref().map(|run| run.id),
            started_at: self.run.as_ref().and_then(|run| run.started_at),
        }
    }
}

/// Owns the pipeline lifecycle. Cheap to share behind an `Arc`.
pub struct PipelineSupervisor {
    config: Arc<dyn ConfigSource>,
    connector: Arc<dyn Connector>,
    record: Arc<Mutex<Record>>,
}

impl PipelineSupervisor {
    pub fn new(config: Arc<dyn ConfigSource>, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            record: Arc::new(Mutex::new(Record {
                state: Lifecycle::Stopped,
                run: None,
            })),
        }
    }

    pub fn status(&self) -> PipelineStatus {
        lock(&self.record).status()
    }

    /// Start a pipeline run unless one is already active.
    ///
    /// Configuration and connect errors are returned to the caller and leave
    /// the supervisor stopped. On success the run continues in the background.
    pub async fn start(&self) -> Result<StartOutcome, AppError> {
        let (run_id, cancel) = {
            let mut record = lock(&self.record);
            if record.state != Lifecycle::Stopped {
                tracing::info!(state = ?record.state, "Bot is already running.");
                return Ok(StartOutcome::AlreadyRunning(record.status()));
            }

            let run = ActiveRun {
                id: Uuid::new_v4(),
                cancel: CancellationToken::new(),
                handle: None,
                started_at: None,
            };
            let ids = (run.id, run.cancel.clone());
            record.state = Lifecycle::Starting;
            record.run = Some(run);
            ids
        };

        tracing::info!(run_id = %run_id, "Starting pipeline");

        let mut guard = StartGuard {
            record: self.record.clone(),
            run_id,
            armed: true,
        };

        let connected = match self.load_config().await {
            Ok(config) => self
                .connector
                .connect(&config)
                .await
                .map(|session| (config, session)),
            Err(e) => Err(e),
        };

        let (config, session) = match connected {
            Ok(parts) => parts,
            Err(e) => {
                // The guard returns the record to Stopped
                tracing::error!(run_id = %run_id, error = %e, "Failed to start bot");
                return Err(e);
            }
        };

        let mut record = lock(&self.record);
        guard.disarm();

        if !record.is_current(run_id) || cancel.is_cancelled() {
            tracing::info!(run_id = %run_id, "Start cancelled by stop request");
            return Ok(StartOutcome::Cancelled);
        }

        let record_handle = self.record.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = run_pipeline(config, session, cancel).await {
                tracing::error!(run_id = %run_id, error = %e, "Pipeline run failed");
            }

            let mut record = lock(&record_handle);
            if record.is_current(run_id) {
                record.reset();
                tracing::info!(run_id = %run_id, "Pipeline ended, supervisor stopped");
            }
        });

        record.state = Lifecycle::Running;
        if let Some(run) = record.run.as_mut() {
            run.handle = Some(handle);
            run.started_at = Some(Utc::now());
        }

        tracing::info!(run_id = %run_id, "Bot started successfully.");
        Ok(StartOutcome::Started { run_id })
    }

    /// Resolve configuration off the async workers; file sources do blocking I/O.
    async fn load_config(&self) -> Result<PipelineConfig, AppError> {
        let source = self.config.clone();
        tokio::task::spawn_blocking(move || source.load())
            .await
            .map_err(|e| AppError::Internal(format!("Configuration task failed: {}", e)))?
    }

    /// Stop the active run, if any, and wait for it to wind down.
    pub async fn stop(&self) -> StopOutcome {
        let run = {
            let mut record = lock(&self.record);
            if record.state == Lifecycle::Stopped {
                tracing::info!("Bot is not running.");
                return StopOutcome::NotRunning;
            }
            record.reset()
        };

        if let Some(run) = run {
            run.cancel.cancel();
            if let Some(handle) = run.handle
                && let Err(e) = handle.await
            {
                tracing::warn!(run_id = %run.id, error = %e, "Pipeline task ended abnormally");
            }
            tracing::info!(run_id = %run.id, "Bot stopped successfully.");
        }

        StopOutcome::Stopped
    }
}

/// Resets the record if a start is abandoned while still `Starting`, for
/// instance when the caller's future is dropped mid-connect.
struct StartGuard {
    record: Arc<Mutex<Record>>,
    run_id: Uuid,
    armed: bool,
}

impl StartGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StartGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut record = lock(&self.record);
        if record.is_current(self.run_id) && record.state == Lifecycle::Starting {
            record.reset();
            tracing::warn!(run_id = %self.run_id, "Start abandoned before completion");
        }
    }
}

fn lock(record: &Mutex<Record>) -> MutexGuard<'_, Record> {
    record.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Drive one connected session until disconnect, fatal error, or cancellation.
///
/// The event loop and the health monitor share this task: they interleave at
/// await points but never run at the same instant.
pub async fn run_pipeline(
    config: PipelineConfig,
    session: Session,
    cancel: CancellationToken,
) -> Result<(), AppError> {
    let Session {
        mut events,
        participants,
        sender,
    } = session;

    let notifier = Notifier::new(sender, RetryPolicy::from(&config.notifications));
    let processor = ReactionProcessor::new(&config, participants, notifier);
    let monitor = HealthMonitor::new(config.health_check.interval());
    let health_cancel = cancel.child_token();

    tracing::info!(
        owner_id = config.telegram.owner_id,
        max_reactions = config.advanced_settings.max_reactions_per_message,
        health_interval_secs = config.health_check.interval,
        "Client is running..."
    );

    let event_loop = async {
        let result = listen(events.as_mut(), &processor, &cancel).await;
        health_cancel.cancel();
        result
    };

    let (result, beats) = tokio::join!(event_loop, monitor.run(health_cancel.clone()));
    tracing::info!(heartbeats = beats, "Pipeline run finished");
    result
}

/// Pull events one at a time and dispatch them serially.
async fn listen(
    events: &mut dyn EventListener,
    processor: &ReactionProcessor,
    cancel: &CancellationToken,
) -> Result<(), AppError> {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Stop requested, leaving event loop");
                return Ok(());
            }
            next = events.next_event() => next,
        };

        match next? {
            Some(event) => dispatch(event, processor, cancel).await,
            None => {
                tracing::info!("Transport disconnected");
                return Ok(());
            }
        }
    }
}

/// Route an inbound event: reaction updates go to the processor, every
/// other kind is ignored.
async fn dispatch(event: InboundEvent, processor: &ReactionProcessor, cancel: &CancellationToken) {
    match event {
        InboundEvent::ReactionUpdate(reaction) => {
            processor.process(&reaction, cancel).await;
        }
        ignored @ (InboundEvent::Message { .. }
        | InboundEvent::EditedMessage { .. }
        | InboundEvent::MembershipChange { .. }
        | InboundEvent::Unsupported(_)) => {
            tracing::trace!(kind = ignored.kind(), "Ignoring non-reaction event");
        }
    }
}
