//! Upload-coordination service client.
//!
//! Async HTTP client using `reqwest`. Every request carries the caller's
//! credential, when there is one, as both `Authorization: Bearer` and
//! `X-Id-Token`.

use std::sync::Arc;

use fivecut_protocol::{
    CompleteRequest, CompleteResponse, CompletedPartWire, HealthResponse, InitiateRequest,
    InitiateResponse, RecentItem, RecentUploadsResponse, SignPartRequest, SignPartResponse,
};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::credential::CredentialSource;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

const ID_TOKEN_HEADER: &str = "x-id-token";

/// Characters escaped in object keys placed in a URL path. `/` is kept so
/// nested keys stay readable.
const KEY_PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Errors from the coordination service client.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} - {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid credential")]
    InvalidCredential,

    #[error("not signed in")]
    NotSignedIn,

    #[error("completion rejected for {key}")]
    Rejected { key: String },
}

impl CoordinatorError {
    /// HTTP status of a non-success response, if that is what failed.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Coordination service client.
pub struct CoordinatorClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialSource>,
}

impl CoordinatorClient {
    /// Creates a client for the API rooted at `base_url`
    /// (e.g. `https://example.com/api`).
    pub fn new(
        base_url: &str,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, CoordinatorError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_http(http, base_url, credentials))
    }

    fn with_http(
        http: reqwest::Client,
        base_url: &str,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        let base_url = if base_url.trim().is_empty() {
            DEFAULT_BASE_URL
        } else {
            base_url.trim().trim_end_matches('/')
        };
        Self {
            http,
            base_url: base_url.to_string(),
            credentials,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Starts a multipart session for `filename`.
    pub async fn initiate(
        &self,
        filename: &str,
        content_type: &str,
    ) -> Result<InitiateResponse, CoordinatorError> {
        let req = InitiateRequest {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
        };
        let resp: InitiateResponse = self.post_json("/uploads/multipart/create", &req).await?;
        debug!(object_key = %resp.key, "multipart session created");
        Ok(resp)
    }

    /// Returns a one-time PUT URL for a single part.
    pub async fn sign_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
    ) -> Result<SignPartResponse, CoordinatorError> {
        let req = SignPartRequest {
            key: key.to_string(),
            upload_id: upload_id.to_string(),
            part_number,
        };
        self.post_json("/uploads/multipart/sign", &req).await
    }

    /// Submits the manifest and finalizes the object.
    ///
    /// Parts are sent in ascending part-number order. The server decides
    /// whether the manifest is complete; an `ok: false` answer is
    /// reported as [`CoordinatorError::Rejected`].
    pub async fn complete(
        &self,
        key: &str,
        upload_id: &str,
        mut parts: Vec<CompletedPartWire>,
    ) -> Result<CompleteResponse, CoordinatorError> {
        parts.sort_by_key(|p| p.part_number);
        let req = CompleteRequest {
            key: key.to_string(),
            upload_id: upload_id.to_string(),
            parts,
        };
        let resp: CompleteResponse = self.post_json("/uploads/multipart/complete", &req).await?;
        if !resp.ok {
            return Err(CoordinatorError::Rejected {
                key: key.to_string(),
            });
        }
        Ok(resp)
    }

    /// Checks that the service is up.
    pub async fn health(&self) -> Result<bool, CoordinatorError> {
        let url = format!("{}/health", self.base_url);
        let resp = self.http.get(&url).send().await?;
        let health: HealthResponse = parse_json(resp).await?;
        Ok(health.ok)
    }

    /// Lists the caller's most recent uploads. Requires a credential.
    pub async fn recent_uploads(&self, limit: u32) -> Result<Vec<RecentItem>, CoordinatorError> {
        let token = self
            .credentials
            .current()
            .ok_or(CoordinatorError::NotSignedIn)?;
        let url = format!("{}/uploads/recent", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("limit", limit.to_string()), ("token", token)])
            .send()
            .await?;
        let recent: RecentUploadsResponse = parse_json(resp).await?;
        Ok(recent.items)
    }

    /// Deletes a stored object.
    pub async fn delete_upload(&self, key: &str) -> Result<(), CoordinatorError> {
        let url = format!("{}/uploads/{}", self.base_url, escape_key(key));
        let resp = self
            .http
            .delete(&url)
            .headers(self.auth_headers()?)
            .send()
            .await?;
        check_status(resp).await?;
        debug!(object_key = %key, "upload deleted");
        Ok(())
    }

    /// Playback URL for a stored object.
    pub fn stream_url(&self, key: &str) -> String {
        format!("{}/videos/stream/{}", self.base_url, escape_key(key))
    }

    fn auth_headers(&self) -> Result<HeaderMap, CoordinatorError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = self.credentials.current() {
            let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| CoordinatorError::InvalidCredential)?;
            let raw =
                HeaderValue::from_str(&token).map_err(|_| CoordinatorError::InvalidCredential)?;
            headers.insert(AUTHORIZATION, bearer);
            headers.insert(HeaderName::from_static(ID_TOKEN_HEADER), raw);
        }
        Ok(headers)
    }

    async fn post_json<Req, Resp>(&self, endpoint: &str, body: &Req) -> Result<Resp, CoordinatorError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        let resp = self
            .http
            .post(&url)
            .headers(self.auth_headers()?)
            .json(body)
            .send()
            .await?;
        debug!(endpoint, status = resp.status().as_u16(), "coordinator response");
        parse_json(resp).await
    }
}

fn escape_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_PATH).to_string()
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, CoordinatorError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(CoordinatorError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, CoordinatorError> {
    let resp = check_status(resp).await?;
    let body = resp.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{NoCredential, StaticCredential};
    use crate::test_server::{serve_once, serve_once_with_headers};

    fn client(url: &str) -> CoordinatorClient {
        CoordinatorClient::new(url, Arc::new(StaticCredential::new("id-tok"))).unwrap()
    }

    #[test]
    fn base_url_trailing_slashes_trimmed() {
        let c = CoordinatorClient::new("https://x.test/api///", Arc::new(NoCredential)).unwrap();
        assert_eq!(c.base_url(), "https://x.test/api");
    }

    #[test]
    fn empty_base_url_uses_default() {
        let c = CoordinatorClient::new("  ", Arc::new(NoCredential)).unwrap();
        assert_eq!(c.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn stream_url_keeps_slashes() {
        let c = CoordinatorClient::new("https://x.test/api", Arc::new(NoCredential)).unwrap();
        assert_eq!(
            c.stream_url("users/42/my match.mp4"),
            "https://x.test/api/videos/stream/users/42/my%20match.mp4"
        );
        assert_eq!(
            c.stream_url("a?b#c"),
            "https://x.test/api/videos/stream/a%3Fb%23c"
        );
    }

    #[tokio::test]
    async fn initiate_posts_filename_and_auth() {
        let (url, handle) = serve_once(200, r#"{"uploadId":"mpu-1","key":"match.mp4"}"#).await;

        let resp = client(&url).initiate("match.mp4", "video/mp4").await.unwrap();
        assert_eq!(resp.upload_id, "mpu-1");
        assert_eq!(resp.key, "match.mp4");

        let req = handle.await.unwrap();
        assert!(req.starts_with("POST /uploads/multipart/create "));
        let lower = req.to_lowercase();
        assert!(lower.contains("authorization: bearer id-tok"));
        assert!(lower.contains("x-id-token: id-tok"));
        assert!(req.contains(r#""contentType":"video/mp4""#));
        assert!(req.contains(r#""filename":"match.mp4""#));
    }

    #[tokio::test]
    async fn anonymous_requests_have_no_auth_headers() {
        let (url, handle) = serve_once(200, r#"{"url":"https://s3.test/p1"}"#).await;

        let c = CoordinatorClient::new(&url, Arc::new(NoCredential)).unwrap();
        let resp = c.sign_part("k", "u", 1).await.unwrap();
        assert_eq!(resp.url, "https://s3.test/p1");

        let req = handle.await.unwrap().to_lowercase();
        assert!(!req.contains("authorization:"));
        assert!(!req.contains("x-id-token:"));
    }

    #[tokio::test]
    async fn sign_part_sends_part_number() {
        let (url, handle) = serve_once(200, r#"{"url":"https://s3.test/p7"}"#).await;

        client(&url).sign_part("match.mp4", "mpu-1", 7).await.unwrap();

        let req = handle.await.unwrap();
        assert!(req.starts_with("POST /uploads/multipart/sign "));
        assert!(req.contains(r#""partNumber":7"#));
        assert!(req.contains(r#""uploadId":"mpu-1""#));
    }

    #[tokio::test]
    async fn complete_sends_sorted_manifest() {
        let (url, handle) = serve_once(200, r#"{"ok":true,"key":"match.mp4"}"#).await;

        let parts = vec![
            CompletedPartWire {
                etag: "e3".into(),
                part_number: 3,
            },
            CompletedPartWire {
                etag: "e1".into(),
                part_number: 1,
            },
            CompletedPartWire {
                etag: "e2".into(),
                part_number: 2,
            },
        ];
        let resp = client(&url).complete("match.mp4", "mpu-1", parts).await.unwrap();
        assert!(resp.ok);

        let req = handle.await.unwrap();
        let body_start = req.find("\r\n\r\n").unwrap() + 4;
        let body: CompleteRequest = serde_json::from_str(&req[body_start..]).unwrap();
        let numbers: Vec<u32> = body.parts.iter().map(|p| p.part_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(body.parts[0].etag, "e1");
    }

    #[tokio::test]
    async fn complete_not_ok_is_rejected() {
        let (url, handle) = serve_once(200, r#"{"ok":false,"key":"match.mp4"}"#).await;

        let err = client(&url).complete("match.mp4", "u", vec![]).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Rejected { .. }));
        handle.abort();
    }

    #[tokio::test]
    async fn error_status_surfaces_body() {
        let (url, handle) = serve_once(400, r#"{"detail":"InvalidPart"}"#).await;

        let err = client(&url).complete("k", "u", vec![]).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        let msg = err.to_string();
        assert!(msg.starts_with("HTTP 400 - "), "{msg}");
        assert!(msg.contains("InvalidPart"), "{msg}");
        handle.abort();
    }

    #[tokio::test]
    async fn malformed_json_is_json_error() {
        let (url, handle) = serve_once(200, "not json").await;

        let err = client(&url).initiate("a.mp4", "video/mp4").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Json(_)));
        handle.abort();
    }

    #[tokio::test]
    async fn health_reads_ok() {
        let (url, handle) = serve_once(200, r#"{"ok":true}"#).await;
        assert!(client(&url).health().await.unwrap());
        let req = handle.await.unwrap();
        assert!(req.starts_with("GET /health "));
    }

    #[tokio::test]
    async fn recent_uploads_passes_token_query() {
        let (url, handle) =
            serve_once(200, r#"{"items":[{"key":"a.mp4","size":42}]}"#).await;

        let items = client(&url).recent_uploads(50).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].size, 42);

        let req = handle.await.unwrap();
        let request_line = req.lines().next().unwrap();
        assert!(request_line.starts_with("GET /uploads/recent?"));
        assert!(request_line.contains("limit=50"));
        assert!(request_line.contains("token=id-tok"));
    }

    #[tokio::test]
    async fn recent_uploads_requires_credential() {
        let c = CoordinatorClient::new("http://127.0.0.1:9", Arc::new(NoCredential)).unwrap();
        let err = c.recent_uploads(10).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::NotSignedIn));
    }

    #[tokio::test]
    async fn delete_accepts_no_content() {
        let (url, handle) = serve_once_with_headers(204, &[], "").await;

        client(&url).delete_upload("users/1/a b.mp4").await.unwrap();

        let req = handle.await.unwrap();
        assert!(req.starts_with("DELETE /uploads/users/1/a%20b.mp4 "));
    }

    #[tokio::test]
    async fn delete_failure_reports_status() {
        let (url, handle) = serve_once(404, "missing").await;
        let err = client(&url).delete_upload("a.mp4").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        handle.abort();
    }

    #[test]
    fn invalid_credential_header_rejected() {
        let c = CoordinatorClient::new(
            "http://127.0.0.1:9",
            Arc::new(StaticCredential::new("bad\ntoken")),
        )
        .unwrap();
        assert!(matches!(
            c.auth_headers(),
            Err(CoordinatorError::InvalidCredential)
        ));
    }
}
