//! Exchange of a finished recording with the re-encoding service.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use crate::{playback::PlayableMedia, record::RecordingSession, MaskCamError, UploadError};

/// Where and how recordings are sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub endpoint: String,
    pub video_field: String,
    pub mask_field: String,
    pub file_name: String,
    /// Type of the uploaded container.
    pub container_media_type: String,
    /// Type stamped onto whatever the service sends back.
    pub response_media_type: String,
    pub timeout_secs: Option<u64>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000/process-inline".to_string(),
            video_field: "video".to_string(),
            mask_field: "mask".to_string(),
            file_name: "recording.webm".to_string(),
            container_media_type: "video/webm".to_string(),
            response_media_type: "video/mp4".to_string(),
            timeout_secs: Some(300),
        }
    }
}

impl UploadConfig {
    /// Checks that both media types can be put on the wire.
    pub fn validate(&self) -> crate::Result<()> {
        Part::bytes(Vec::new())
            .mime_str(&self.container_media_type)
            .map_err(|_| {
                MaskCamError::InvalidInput("upload.container_media_type is not a valid media type")
            })?;
        if self.response_media_type.trim().is_empty() {
            return Err(MaskCamError::InvalidInput(
                "upload.response_media_type must not be empty",
            ));
        }
        Ok(())
    }
}

/// One upload's worth of data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub payload: Bytes,
    pub overlay_key: Option<String>,
}

/// Remote service that turns a recording into playable media.
#[async_trait]
pub trait ReencodeService: Send + Sync {
    /// Performs exactly one request/response exchange.
    async fn exchange(&self, request: UploadRequest) -> Result<Bytes, UploadError>;
}

/// Multipart-over-HTTP client for the re-encoding backend.
#[derive(Debug, Clone)]
pub struct HttpReencodeService {
    client: reqwest::Client,
    config: UploadConfig,
}

impl HttpReencodeService {
    pub fn new(config: UploadConfig) -> crate::Result<Self> {
        config.validate()?;
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| MaskCamError::msg(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ReencodeService for HttpReencodeService {
    async fn exchange(&self, request: UploadRequest) -> Result<Bytes, UploadError> {
        let length = request.payload.len() as u64;
        let video = Part::stream_with_length(request.payload, length)
            .file_name(self.config.file_name.clone())
            .mime_str(&self.config.container_media_type)
            .map_err(|e| UploadError::Request(format!("invalid container media type: {e}")))?;

        let mut form = Form::new().part(self.config.video_field.clone(), video);
        if let Some(key) = request.overlay_key {
            form = form.text(self.config.mask_field.clone(), key);
        }

        tracing::info!(endpoint = %self.config.endpoint, bytes = length, "uploading recording");
        let response = self
            .client
            .post(&self.config.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Rejected {
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?)
    }
}

/// Packages recordings, sends them once, and tags the result for playback.
#[derive(Clone)]
pub struct UploadPipeline {
    service: Arc<dyn ReencodeService>,
    response_media_type: String,
}

impl UploadPipeline {
    pub fn new(service: Arc<dyn ReencodeService>, response_media_type: impl Into<String>) -> Self {
        Self {
            service,
            response_media_type: response_media_type.into(),
        }
    }

    pub fn http(config: UploadConfig) -> crate::Result<Self> {
        let media_type = config.response_media_type.clone();
        let service = HttpReencodeService::new(config)?;
        Ok(Self::new(Arc::new(service), media_type))
    }

    /// Single attempt; retrying is left to the caller.
    pub async fn upload(
        &self,
        session: Arc<RecordingSession>,
    ) -> Result<PlayableMedia, UploadError> {
        if session.is_empty() {
            return Err(UploadError::EmptyRecording);
        }

        let request = UploadRequest {
            payload: session.payload(),
            overlay_key: session.overlay_key().map(str::to_string),
        };
        let bytes = self.service.exchange(request).await.inspect_err(|err| {
            tracing::warn!(error = %err, "re-encoding exchange failed");
        })?;

        tracing::info!(bytes = bytes.len(), "received re-encoded media");
        // The service's own content type is not trusted.
        Ok(PlayableMedia::new(bytes, self.response_media_type.clone()))
    }
}

impl std::fmt::Debug for UploadPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadPipeline")
            .field("response_media_type", &self.response_media_type)
            .finish()
    }
}
