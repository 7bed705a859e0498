//! Part transport bound to one multipart session.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use fivecut_protocol::SignPartRequest;
use fivecut_transfer::{PartTransport, PutResponse, TransferError};

use crate::coordinator::{Coordinator, PartStore};

/// Signs parts through the coordinator and PUTs them to the store, for
/// the session identified by `object_key`/`upload_id`.
pub struct SessionTransport {
    coordinator: Arc<dyn Coordinator>,
    store: Arc<dyn PartStore>,
    object_key: String,
    upload_id: String,
}

impl SessionTransport {
    pub fn new(
        coordinator: Arc<dyn Coordinator>,
        store: Arc<dyn PartStore>,
        object_key: impl Into<String>,
        upload_id: impl Into<String>,
    ) -> Self {
        Self {
            coordinator,
            store,
            object_key: object_key.into(),
            upload_id: upload_id.into(),
        }
    }
}

impl PartTransport for SessionTransport {
    fn sign(
        &self,
        part_number: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + '_>> {
        Box::pin(async move {
            let req = SignPartRequest {
                key: self.object_key.clone(),
                upload_id: self.upload_id.clone(),
                part_number,
            };
            self.coordinator
                .sign_part(req)
                .await
                .map(|resp| resp.url)
                .map_err(|e| TransferError::Sign {
                    part_number,
                    source: Box::new(e),
                })
        })
    }

    fn put(
        &self,
        url: String,
        part_number: u32,
        body: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<PutResponse, TransferError>> + Send + '_>> {
        Box::pin(async move {
            let receipt = self
                .store
                .put_part(url, body)
                .await
                .map_err(|source| TransferError::Request {
                    part_number,
                    source,
                })?;
            Ok(PutResponse {
                status: receipt.status,
                integrity_token: receipt.etag,
            })
        })
    }
}
