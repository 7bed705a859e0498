//! Part PUTs against signed storage URLs.

use reqwest::header::ETAG;
use tracing::debug;

/// What storage answered for one part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartReceipt {
    pub status: u16,
    /// The `ETag` header, verbatim (quotes included), if present.
    pub etag: Option<String>,
}

/// Sends part bodies to pre-signed URLs.
///
/// Signed URLs carry their own authorization, so no credential is attached.
#[derive(Debug, Clone)]
pub struct StorageClient {
    http: reqwest::Client,
}

impl StorageClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
        })
    }

    /// PUTs `body` to `url`.
    ///
    /// Non-success statuses are returned in the receipt rather than as an
    /// error; only transport failures are errors.
    pub async fn put_part(&self, url: &str, body: Vec<u8>) -> Result<PartReceipt, reqwest::Error> {
        let len = body.len();
        let resp = self.http.put(url).body(body).send().await?;
        let status = resp.status().as_u16();
        let etag = resp
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        debug!(status, bytes = len, has_etag = etag.is_some(), "part PUT finished");
        Ok(PartReceipt { status, etag })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::serve_once_with_headers;

    #[tokio::test]
    async fn put_returns_etag_verbatim() {
        let (url, handle) =
            serve_once_with_headers(200, &[("ETag", "\"abc123\"")], "").await;

        let storage = StorageClient::new().unwrap();
        let receipt = storage
            .put_part(&format!("{url}/bucket/key?partNumber=1"), b"hello".to_vec())
            .await
            .unwrap();

        assert_eq!(receipt.status, 200);
        assert_eq!(receipt.etag.as_deref(), Some("\"abc123\""));

        let req = handle.await.unwrap();
        assert!(req.starts_with("PUT /bucket/key?partNumber=1 "));
        assert!(req.to_lowercase().contains("content-length: 5"));
        assert!(req.ends_with("hello"));
        assert!(!req.to_lowercase().contains("authorization:"));
    }

    #[tokio::test]
    async fn lowercase_etag_header_found() {
        let (url, handle) = serve_once_with_headers(200, &[("etag", "e-lower")], "").await;

        let receipt = StorageClient::new()
            .unwrap()
            .put_part(&url, vec![1, 2, 3])
            .await
            .unwrap();
        assert_eq!(receipt.etag.as_deref(), Some("e-lower"));
        handle.abort();
    }

    #[tokio::test]
    async fn missing_etag_is_none() {
        let (url, handle) = serve_once_with_headers(200, &[], "").await;

        let receipt = StorageClient::new()
            .unwrap()
            .put_part(&url, vec![0; 16])
            .await
            .unwrap();
        assert_eq!(receipt.status, 200);
        assert!(receipt.etag.is_none());
        handle.abort();
    }

    #[tokio::test]
    async fn error_status_is_reported_not_raised() {
        let (url, handle) = serve_once_with_headers(403, &[], "SignatureDoesNotMatch").await;

        let receipt = StorageClient::new()
            .unwrap()
            .put_part(&url, vec![0; 4])
            .await
            .unwrap();
        assert_eq!(receipt.status, 403);
        handle.abort();
    }

    #[tokio::test]
    async fn connection_refused_is_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = StorageClient::new()
            .unwrap()
            .put_part(&format!("http://127.0.0.1:{port}/p"), vec![1])
            .await;
        assert!(result.is_err());
    }
}
