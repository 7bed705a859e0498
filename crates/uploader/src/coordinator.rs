//! Seams between the session and the network.
//!
//! [`Coordinator`] and [`PartStore`] abstract the coordination service and
//! the object store so sessions can be driven by mocks in tests.

use std::future::Future;
use std::pin::Pin;

use fivecut_coordinator::{CoordinatorClient, CoordinatorError, PartReceipt, StorageClient};
use fivecut_protocol::{
    CompleteRequest, CompleteResponse, InitiateRequest, InitiateResponse, SignPartRequest,
    SignPartResponse,
};
use fivecut_transfer::BoxError;

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The coordination service's multipart operations.
pub trait Coordinator: Send + Sync {
    fn initiate(
        &self,
        req: InitiateRequest,
    ) -> BoxFuture<'_, Result<InitiateResponse, CoordinatorError>>;

    fn sign_part(
        &self,
        req: SignPartRequest,
    ) -> BoxFuture<'_, Result<SignPartResponse, CoordinatorError>>;

    /// Finalizes the object. `req.parts` is sorted by part number.
    fn complete(
        &self,
        req: CompleteRequest,
    ) -> BoxFuture<'_, Result<CompleteResponse, CoordinatorError>>;

    /// Playback URL for a stored object.
    fn stream_url(&self, key: &str) -> String;
}

/// Receives part bodies at signed URLs.
pub trait PartStore: Send + Sync {
    fn put_part(&self, url: String, body: Vec<u8>) -> BoxFuture<'_, Result<PartReceipt, BoxError>>;
}

impl Coordinator for CoordinatorClient {
    fn initiate(
        &self,
        req: InitiateRequest,
    ) -> BoxFuture<'_, Result<InitiateResponse, CoordinatorError>> {
        Box::pin(async move {
            CoordinatorClient::initiate(self, &req.filename, &req.content_type).await
        })
    }

    fn sign_part(
        &self,
        req: SignPartRequest,
    ) -> BoxFuture<'_, Result<SignPartResponse, CoordinatorError>> {
        Box::pin(async move {
            CoordinatorClient::sign_part(self, &req.key, &req.upload_id, req.part_number).await
        })
    }

    fn complete(
        &self,
        req: CompleteRequest,
    ) -> BoxFuture<'_, Result<CompleteResponse, CoordinatorError>> {
        Box::pin(async move {
            CoordinatorClient::complete(self, &req.key, &req.upload_id, req.parts).await
        })
    }

    fn stream_url(&self, key: &str) -> String {
        CoordinatorClient::stream_url(self, key)
    }
}

impl PartStore for StorageClient {
    fn put_part(&self, url: String, body: Vec<u8>) -> BoxFuture<'_, Result<PartReceipt, BoxError>> {
        Box::pin(async move {
            StorageClient::put_part(self, &url, body)
                .await
                .map_err(BoxError::from)
        })
    }
}
