//! In-memory coordinator and store for session tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fivecut_coordinator::{CoordinatorError, PartReceipt};
use fivecut_protocol::{
    CompleteRequest, CompleteResponse, CompletedPartWire, InitiateRequest, InitiateResponse,
    SignPartRequest, SignPartResponse,
};
use fivecut_transfer::BoxError;

use crate::coordinator::{BoxFuture, Coordinator, PartStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Initiate,
    Sign(u32),
    Complete,
}

#[derive(Default)]
pub struct MockCoordinator {
    pub initiate_fail: bool,
    pub initiate_delay: Option<Duration>,
    pub sign_fail: Option<u32>,
    pub reject_complete: bool,
    pub complete_delay: Option<Duration>,
    pub(crate) calls: Mutex<Vec<Call>>,
    pub(crate) initiate_request: Mutex<Option<InitiateRequest>>,
    pub(crate) manifest: Mutex<Option<Vec<CompletedPartWire>>>,
}

impl MockCoordinator {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sign_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Sign(_)))
            .count()
    }

    pub fn initiate_request(&self) -> Option<InitiateRequest> {
        self.initiate_request.lock().unwrap().clone()
    }

    pub fn manifest(&self) -> Option<Vec<CompletedPartWire>> {
        self.manifest.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Coordinator for MockCoordinator {
    fn initiate(
        &self,
        req: InitiateRequest,
    ) -> BoxFuture<'_, Result<InitiateResponse, CoordinatorError>> {
        Box::pin(async move {
            self.record(Call::Initiate);
            if let Some(delay) = self.initiate_delay {
                tokio::time::sleep(delay).await;
            }
            if self.initiate_fail {
                return Err(CoordinatorError::Api {
                    status: 500,
                    body: "boom".into(),
                });
            }
            let key = format!("videos/{}", req.filename);
            *self.initiate_request.lock().unwrap() = Some(req);
            Ok(InitiateResponse {
                upload_id: "upload-1".into(),
                key,
            })
        })
    }

    fn sign_part(
        &self,
        req: SignPartRequest,
    ) -> BoxFuture<'_, Result<SignPartResponse, CoordinatorError>> {
        Box::pin(async move {
            self.record(Call::Sign(req.part_number));
            if self.sign_fail == Some(req.part_number) {
                return Err(CoordinatorError::Api {
                    status: 403,
                    body: "expired".into(),
                });
            }
            Ok(SignPartResponse {
                url: format!(
                    "mock://bucket/{}?uploadId={}&partNumber={}",
                    req.key, req.upload_id, req.part_number
                ),
            })
        })
    }

    fn complete(
        &self,
        req: CompleteRequest,
    ) -> BoxFuture<'_, Result<CompleteResponse, CoordinatorError>> {
        Box::pin(async move {
            self.record(Call::Complete);
            if let Some(delay) = self.complete_delay {
                tokio::time::sleep(delay).await;
            }
            if self.reject_complete {
                return Err(CoordinatorError::Rejected { key: req.key });
            }
            *self.manifest.lock().unwrap() = Some(req.parts);
            Ok(CompleteResponse {
                ok: true,
                key: req.key,
            })
        })
    }

    fn stream_url(&self, key: &str) -> String {
        format!("mock://stream/{key}")
    }
}

#[derive(Default)]
pub struct MockStore {
    pub missing_etag: Option<u32>,
    pub fail_status: Option<(u32, u16)>,
    pub delays: HashMap<u32, Duration>,
    pub default_delay: Duration,
    pub(crate) puts: Mutex<Vec<(u32, usize)>>,
    pub(crate) finished: Mutex<Vec<u32>>,
    pub(crate) started: AtomicUsize,
    pub(crate) in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
}

impl MockStore {
    /// `(part_number, body_len)` for every PUT received.
    pub fn put_sizes(&self) -> Vec<(u32, usize)> {
        self.puts.lock().unwrap().clone()
    }

    pub fn finish_order(&self) -> Vec<u32> {
        self.finished.lock().unwrap().clone()
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

fn part_number(url: &str) -> u32 {
    url.rsplit("partNumber=")
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

impl PartStore for MockStore {
    fn put_part(&self, url: String, body: Vec<u8>) -> BoxFuture<'_, Result<PartReceipt, BoxError>> {
        Box::pin(async move {
            let n = part_number(&url);
            self.puts.lock().unwrap().push((n, body.len()));
            self.started.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = self.delays.get(&n).copied().unwrap_or(self.default_delay);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.finished.lock().unwrap().push(n);

            let status = match self.fail_status {
                Some((part, status)) if part == n => status,
                _ => 200,
            };
            let etag = (self.missing_etag != Some(n)).then(|| format!("\"etag-{n}\""));
            Ok(PartReceipt { status, etag })
        })
    }
}
