//! Upload session state machine.
//!
//! ```text
//! Idle -> Initiating -> Transferring -> Completing -> Succeeded
//!            |               |              |
//!            +---------------+--------------+--> Failed | Canceled
//! ```
//!
//! A session is single-use: once it reaches a terminal state, a new
//! upload needs a new session.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use fivecut_coordinator::CoordinatorError;
use fivecut_protocol::{CompleteRequest, CompletedPartWire, InitiateRequest, UploadProgress, UploadState};
use fivecut_transfer::{CompletedPart, PartDescriptor, SpeedCalculator, TransferExecutor, plan};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::coordinator::{Coordinator, PartStore};
use crate::error::UploadError;
use crate::transport::SessionTransport;
use crate::types::{UploadEvent, UploadFile, UploadOptions, UploadOutcome};

const EVENT_CAPACITY: usize = 256;
/// Slots kept free for the single terminal event.
const TERMINAL_RESERVE: usize = 1;

#[derive(Debug, Default)]
struct SessionInner {
    state: UploadState,
    session_id: String,
    object_key: String,
    total_bytes: u64,
    uploaded_bytes: u64,
    completed: BTreeMap<u32, String>,
    error: String,
}

impl SessionInner {
    fn snapshot(&self) -> UploadProgress {
        UploadProgress {
            session_id: self.session_id.clone(),
            object_key: self.object_key.clone(),
            state: self.state,
            total_bytes: self.total_bytes,
            uploaded_bytes: self.uploaded_bytes,
            error: self.error.clone(),
        }
    }

    /// Drops per-part bookkeeping once the session can no longer complete.
    fn discard_parts(&mut self) {
        self.completed.clear();
        self.uploaded_bytes = 0;
    }
}

/// Drives one file through initiate, transfer and complete.
///
/// Share it behind an `Arc` to call [`cancel`](Self::cancel) from another
/// task while [`start`](Self::start) is running.
pub struct UploadSession {
    coordinator: Arc<dyn Coordinator>,
    store: Arc<dyn PartStore>,
    options: UploadOptions,
    inner: RwLock<SessionInner>,
    speed: SpeedCalculator,
    cancel: CancellationToken,
    event_tx: mpsc::Sender<UploadEvent>,
    event_rx: Option<mpsc::Receiver<UploadEvent>>,
}

impl UploadSession {
    pub fn new(
        coordinator: Arc<dyn Coordinator>,
        store: Arc<dyn PartStore>,
        options: UploadOptions,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        Self {
            coordinator,
            store,
            options,
            inner: RwLock::new(SessionInner::default()),
            speed: SpeedCalculator::default(),
            cancel: CancellationToken::new(),
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Takes the event receiver. Returns `None` after the first call.
    ///
    /// If the receiver falls a few hundred events behind, progress events
    /// are dropped; the terminal event is always delivered.
    /// [`progress`](Self::progress) is always current.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.event_rx.take()
    }

    pub fn state(&self) -> UploadState {
        self.read().state
    }

    /// Current progress snapshot.
    pub fn progress(&self) -> UploadProgress {
        self.read().snapshot()
    }

    /// Recent throughput in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        self.speed.bytes_per_second()
    }

    /// Estimated time to finish the transfer phase.
    pub fn eta(&self) -> Option<Duration> {
        let inner = self.read();
        self.speed
            .eta(inner.total_bytes.saturating_sub(inner.uploaded_bytes))
    }

    /// Requests cancellation.
    ///
    /// Idempotent and a no-op once the session is terminal. An idle
    /// session becomes `Canceled` immediately; a running one becomes
    /// `Canceled` once [`start`](Self::start) has observed the request.
    pub fn cancel(&self) {
        {
            let mut inner = self.write();
            if inner.state == UploadState::Idle {
                inner.state = UploadState::Canceled;
                self.emit(UploadEvent::Canceled);
            } else if !inner.state.is_active() {
                return;
            }
        }
        if !self.cancel.is_cancelled() {
            info!("upload cancel requested");
        }
        self.cancel.cancel();
    }

    /// Uploads `file` and returns the stored object's key and URL.
    pub async fn start(&self, file: UploadFile) -> Result<UploadOutcome, UploadError> {
        let parts = self.begin(&file)?;

        match self.drive(&file, parts).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(self.settle(e)),
        }
    }

    /// Leaves `Idle` and plans the parts in one step.
    fn begin(&self, file: &UploadFile) -> Result<Vec<PartDescriptor>, UploadError> {
        let mut inner = self.write();
        match inner.state {
            UploadState::Idle => {}
            UploadState::Canceled => return Err(UploadError::Canceled),
            _ => return Err(UploadError::AlreadyStarted),
        }

        inner.state = UploadState::Initiating;
        inner.total_bytes = file.len();
        self.speed.reset();
        self.emit(UploadEvent::StateChanged {
            state: UploadState::Initiating,
        });

        match plan(file.len(), self.options.chunk_size) {
            Ok(parts) => Ok(parts),
            Err(e) => {
                let e = UploadError::from(e);
                inner.state = UploadState::Failed;
                inner.error = e.to_string();
                error!(filename = %file.filename, error = %e, "upload rejected");
                self.emit(UploadEvent::Failed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        file: &UploadFile,
        parts: Vec<PartDescriptor>,
    ) -> Result<UploadOutcome, UploadError> {
        info!(
            filename = %file.filename,
            bytes = file.len(),
            parts = parts.len(),
            concurrency = self.options.concurrency,
            "starting upload"
        );

        let created = self
            .guard(self.coordinator.initiate(InitiateRequest {
                filename: file.filename.clone(),
                content_type: file.content_type.clone(),
            }))
            .await?;
        {
            let mut inner = self.write();
            inner.session_id = created.upload_id.clone();
            inner.object_key = created.key.clone();
        }
        debug!(object_key = %created.key, "multipart session opened");

        self.transition(UploadState::Transferring)?;

        let expected: Vec<u32> = parts.iter().map(|p| p.part_number).collect();
        let transport = SessionTransport::new(
            Arc::clone(&self.coordinator),
            Arc::clone(&self.store),
            created.key.clone(),
            created.upload_id.clone(),
        );
        let executor = TransferExecutor::new(
            Arc::clone(&file.source),
            Arc::new(transport),
            self.cancel.clone(),
        )
        .with_concurrency(self.options.concurrency);

        executor
            .run(parts, |part, bytes| self.record_part(part, bytes))
            .await?;

        self.transition(UploadState::Completing)?;
        let manifest = self.manifest(&expected)?;
        let part_count = manifest.len();

        self.guard(self.coordinator.complete(CompleteRequest {
            key: created.key.clone(),
            upload_id: created.upload_id.clone(),
            parts: manifest,
        }))
        .await?;

        let outcome = UploadOutcome {
            session_id: created.upload_id,
            url: self.coordinator.stream_url(&created.key),
            object_key: created.key,
            total_bytes: file.len(),
            part_count,
        };
        {
            let mut inner = self.write();
            inner.state = UploadState::Succeeded;
            inner.uploaded_bytes = inner.total_bytes;
            self.emit(UploadEvent::Succeeded {
                object_key: outcome.object_key.clone(),
                url: outcome.url.clone(),
            });
        }
        info!(object_key = %outcome.object_key, parts = part_count, "upload complete");
        Ok(outcome)
    }

    /// Moves to a non-terminal `state` unless cancellation was requested.
    fn transition(&self, state: UploadState) -> Result<(), UploadError> {
        let mut inner = self.write();
        if self.cancel.is_cancelled() {
            return Err(UploadError::Canceled);
        }
        inner.state = state;
        self.emit(UploadEvent::StateChanged { state });
        Ok(())
    }

    fn record_part(&self, part: &CompletedPart, bytes: u64) {
        let mut inner = self.write();
        if inner
            .completed
            .insert(part.part_number, part.integrity_token.clone())
            .is_some()
        {
            warn!(part = part.part_number, "part reported twice");
            return;
        }
        inner.uploaded_bytes += bytes;
        self.speed.add_sample(bytes);

        let fraction = inner.snapshot().fraction();
        self.emit(UploadEvent::PartCompleted {
            part_number: part.part_number,
            bytes,
        });
        self.emit(UploadEvent::Progress {
            uploaded_bytes: inner.uploaded_bytes,
            total_bytes: inner.total_bytes,
            fraction,
        });
    }

    /// Completed parts in ascending part order, checked against the plan.
    fn manifest(&self, expected: &[u32]) -> Result<Vec<CompletedPartWire>, UploadError> {
        let inner = self.read();
        if !inner.completed.keys().copied().eq(expected.iter().copied()) {
            return Err(UploadError::IncompleteManifest {
                expected: expected.len(),
                actual: inner.completed.len(),
            });
        }
        Ok(inner
            .completed
            .iter()
            .map(|(&part_number, etag)| CompletedPartWire {
                etag: etag.clone(),
                part_number,
            })
            .collect())
    }

    /// Records the terminal state for a failed run and returns the error
    /// the caller sees.
    fn settle(&self, e: UploadError) -> UploadError {
        let canceled = self.cancel.is_cancelled() || matches!(e, UploadError::Canceled);
        let mut inner = self.write();
        inner.discard_parts();

        if canceled {
            inner.state = UploadState::Canceled;
            info!(object_key = %inner.object_key, "upload canceled");
            self.emit(UploadEvent::Canceled);
            return UploadError::Canceled;
        }

        inner.state = UploadState::Failed;
        inner.error = e.to_string();
        error!(
            object_key = %inner.object_key,
            part = ?e.part_number(),
            error = %e,
            "upload failed"
        );
        self.emit(UploadEvent::Failed {
            error: e.to_string(),
        });
        e
    }

    async fn guard<T>(
        &self,
        fut: impl Future<Output = Result<T, CoordinatorError>>,
    ) -> Result<T, UploadError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(UploadError::Canceled),
            result = fut => result.map_err(UploadError::from),
        }
    }

    /// Queues `event` without blocking. The last free slot is kept for
    /// the terminal event, so a lagging receiver only loses progress.
    /// Callers hold the state lock, which serializes sends.
    fn emit(&self, event: UploadEvent) {
        if !event.is_terminal() && self.event_tx.capacity() <= TERMINAL_RESERVE {
            debug!("upload event dropped, receiver lagging");
            return;
        }
        if let Err(e) = self.event_tx.try_send(event) {
            debug!(error = %e, "upload event dropped");
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}
