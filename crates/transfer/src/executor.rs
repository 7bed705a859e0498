//! Bounded-concurrency part transfers.
//!
//! A fixed number of workers pull part indices from a shared atomic
//! cursor, so each part is claimed exactly once without a work queue.
//! Completions flow back over a channel to a single aggregation loop,
//! which is the only place progress and the completed-part list change.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::plan::PartDescriptor;
use crate::source::ByteSource;
use crate::{DEFAULT_CONCURRENCY, TransferError};

/// A part that reached storage, with the token needed to assemble it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: u32,
    pub integrity_token: String,
}

/// Raw outcome of a part PUT, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResponse {
    pub status: u16,
    /// ETag-equivalent returned by storage, if any.
    pub integrity_token: Option<String>,
}

/// Network side of a part transfer.
///
/// The uploader implements this on top of the coordinator client and an
/// HTTP client. Using a trait keeps the executor testable with mocks.
pub trait PartTransport: Send + Sync {
    /// Obtains a one-time destination URL for `part_number`.
    fn sign(
        &self,
        part_number: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + '_>>;

    /// Sends `body` to `url`.
    fn put(
        &self,
        url: String,
        part_number: u32,
        body: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<PutResponse, TransferError>> + Send + '_>>;
}

type PartOutcome = Result<(CompletedPart, u64), TransferError>;

/// Runs part transfers through a fixed-size worker pool.
pub struct TransferExecutor {
    source: Arc<dyn ByteSource>,
    transport: Arc<dyn PartTransport>,
    concurrency: usize,
    cancel: CancellationToken,
}

impl TransferExecutor {
    /// Creates an executor with [`DEFAULT_CONCURRENCY`] workers.
    pub fn new(
        source: Arc<dyn ByteSource>,
        transport: Arc<dyn PartTransport>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            transport,
            concurrency: DEFAULT_CONCURRENCY,
            cancel,
        }
    }

    /// Sets the worker count (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Transfers every part in `parts`.
    ///
    /// `on_part` runs once per successful part, in completion order,
    /// with the part's byte length. The returned list is also in
    /// completion order; sorting is the caller's job.
    ///
    /// On the first failure no new parts are claimed; parts already in
    /// flight are allowed to settle and the first error is returned.
    /// Cancelling the token aborts in-flight transfers and yields
    /// [`TransferError::Cancelled`] once every worker has stopped.
    pub async fn run<F>(
        &self,
        parts: Vec<PartDescriptor>,
        mut on_part: F,
    ) -> Result<Vec<CompletedPart>, TransferError>
    where
        F: FnMut(&CompletedPart, u64),
    {
        if parts.is_empty() {
            return Ok(Vec::new());
        }

        let total = parts.len();
        let workers = self.concurrency.min(total);
        let shared = Arc::new(Shared {
            parts,
            cursor: AtomicUsize::new(0),
            abort: AtomicBool::new(false),
            source: Arc::clone(&self.source),
            transport: Arc::clone(&self.transport),
            cancel: self.cancel.clone(),
        });

        let (tx, mut rx) = mpsc::channel::<PartOutcome>(workers);
        let mut tasks = JoinSet::new();
        for worker in 0..workers {
            tasks.spawn(Arc::clone(&shared).work(worker, tx.clone()));
        }
        drop(tx);

        let mut completed = Vec::with_capacity(total);
        let mut first_error: Option<TransferError> = None;

        while let Some(outcome) = rx.recv().await {
            match outcome {
                Ok((part, bytes)) => {
                    on_part(&part, bytes);
                    completed.push(part);
                }
                Err(e) => {
                    shared.abort.store(true, Ordering::Release);
                    if first_error.is_none() {
                        first_error = Some(e);
                    } else {
                        debug!(error = %e, "disregarding error after abort");
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "transfer worker did not finish");
                if first_error.is_none() {
                    first_error = Some(TransferError::Worker(e.to_string()));
                }
            }
        }

        if self.cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        if completed.len() != total {
            return Err(TransferError::Worker(format!(
                "{} of {total} parts completed",
                completed.len()
            )));
        }

        Ok(completed)
    }
}

/// State visible to every worker. Only the cursor and the abort flag
/// are written concurrently, and both are atomics.
struct Shared {
    parts: Vec<PartDescriptor>,
    cursor: AtomicUsize,
    abort: AtomicBool,
    source: Arc<dyn ByteSource>,
    transport: Arc<dyn PartTransport>,
    cancel: CancellationToken,
}

impl Shared {
    async fn work(self: Arc<Self>, worker: usize, tx: mpsc::Sender<PartOutcome>) {
        loop {
            if self.abort.load(Ordering::Acquire) || self.cancel.is_cancelled() {
                break;
            }

            let index = self.cursor.fetch_add(1, Ordering::AcqRel);
            let Some(part) = self.parts.get(index) else {
                break;
            };

            let outcome = self.transfer(part).await;
            let failed = outcome.is_err();
            if failed {
                self.abort.store(true, Ordering::Release);
            }
            if tx.send(outcome).await.is_err() || failed {
                break;
            }
        }
        debug!(worker, "transfer worker exiting");
    }

    async fn transfer(&self, part: &PartDescriptor) -> PartOutcome {
        let part_number = part.part_number;
        // Per-transfer handle; cancelling the session token reaches it.
        let handle = self.cancel.child_token();

        let url = guard(&handle, self.transport.sign(part_number)).await?;
        let body = guard(&handle, self.source.read_range(part.range.clone())).await?;
        let resp = guard(&handle, self.transport.put(url, part_number, body)).await?;

        if !(200..300).contains(&resp.status) {
            return Err(TransferError::Http {
                part_number,
                status: resp.status,
            });
        }

        let integrity_token = resp
            .integrity_token
            .filter(|t| !t.is_empty())
            .ok_or(TransferError::MissingIntegrityToken { part_number })?;

        debug!(part = part_number, bytes = part.len(), "part uploaded");

        Ok((
            CompletedPart {
                part_number,
                integrity_token,
            },
            part.len(),
        ))
    }
}

async fn guard<T>(
    handle: &CancellationToken,
    fut: impl Future<Output = Result<T, TransferError>>,
) -> Result<T, TransferError> {
    tokio::select! {
        biased;
        _ = handle.cancelled() => Err(TransferError::Cancelled),
        result = fut => result,
    }
}
