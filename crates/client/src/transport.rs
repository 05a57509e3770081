//! Wire transport for the upload protocol.
//!
//! The driver talks to the server through [`UploadTransport`], so tests can
//! substitute a scripted in-memory implementation and the HTTP plumbing
//! stays in one place.

use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use depot_core::protocol::{
    FinalArtifact, InitUploadRequest, InitUploadResponse, UploadStatusResponse,
};
use reqwest::Url;
use serde::de::DeserializeOwned;

/// The four request/response operations of the upload protocol.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Create (or resume) an upload session.
    async fn init(&self, req: &InitUploadRequest) -> Result<InitUploadResponse, TransportError>;

    /// Query which chunks the server already holds.
    async fn status(&self, upload_id: &str) -> Result<UploadStatusResponse, TransportError>;

    /// Upload the chunk at `index`.
    async fn send_chunk(
        &self,
        upload_id: &str,
        index: u32,
        data: Bytes,
    ) -> Result<(), TransportError>;

    /// Request assembly of the final artifact.
    async fn complete(&self, upload_id: &str) -> Result<FinalArtifact, TransportError>;
}

/// HTTP transport over reqwest.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Create a transport for the server at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let base_url = Url::parse(base_url).map_err(|e| TransportError {
            kind: crate::error::ErrorKind::Validation,
            message: format!("invalid server URL: {e}"),
        })?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    fn url(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path)
            .map_err(|e| TransportError::network(format!("failed to build URL: {e}")))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::from_response(status.as_u16(), &body))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, TransportError> {
        let response = req
            .send()
            .await
            .map_err(|e| TransportError::network(format!("request failed: {e}")))?;
        let response = Self::check(response).await?;
        response
            .json()
            .await
            .map_err(|e| TransportError::network(format!("invalid response body: {e}")))
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn init(&self, req: &InitUploadRequest) -> Result<InitUploadResponse, TransportError> {
        let url = self.url("/v1/uploads")?;
        self.send_json(self.http.post(url).json(req)).await
    }

    async fn status(&self, upload_id: &str) -> Result<UploadStatusResponse, TransportError> {
        let url = self.url(&format!("/v1/uploads/{upload_id}"))?;
        self.send_json(self.http.get(url)).await
    }

    async fn send_chunk(
        &self,
        upload_id: &str,
        index: u32,
        data: Bytes,
    ) -> Result<(), TransportError> {
        let url = self.url(&format!("/v1/uploads/{upload_id}/chunks/{index}"))?;
        let response = self
            .http
            .put(url)
            .header("Content-Type", "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(|e| TransportError::network(format!("request failed: {e}")))?;
        Self::check(response).await?;
        Ok(())
    }

    async fn complete(&self, upload_id: &str) -> Result<FinalArtifact, TransportError> {
        let url = self.url(&format!("/v1/uploads/{upload_id}/complete"))?;
        self.send_json(self.http.post(url)).await
    }
}
