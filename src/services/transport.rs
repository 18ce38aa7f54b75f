use crate::error::TransportError;
use crate::schema::{ArtStyle, DetailLevel, FrameRate, Gender, JobKind, VideoLength};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePromptRequest {
    pub name: String,
    pub appearance: String,
    pub detail_level: DetailLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_improve_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ArtStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_explicit_content: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVideoRequest {
    pub media_id: String,
    pub text: String,
    pub video_length: VideoLength,
    pub video_frame_rate: FrameRate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

/// Provider acknowledgement of a created job.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptReceipt {
    pub prompt_id: String,
    #[serde(default)]
    pub seed: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    Image,
    Video,
}

impl From<JobKind> for MediaType {
    fn from(kind: JobKind) -> Self {
        match kind {
            JobKind::Image => MediaType::Image,
            JobKind::Video => MediaType::Video,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: String,
    pub media_url: String,
    pub media_type: MediaType,
}

/// Status payload for one job. `medias` stays empty until the provider has
/// produced an artifact; `is_error` is the only documented failure flag.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptStatus {
    pub prompt_id: String,
    #[serde(default)]
    pub medias: Vec<Media>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub prompt_id: String,
    pub queue_position: u32,
    #[serde(default)]
    pub video: bool,
    #[serde(default)]
    pub progress: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    #[serde(default)]
    pub queue: Vec<QueueEntry>,
}

/// HTTP seam to the generation provider. Tests inject fakes; production code
/// uses [`HttpTransport`].
#[async_trait::async_trait]
pub trait GenerationTransport: Send + Sync {
    async fn create_prompt(
        &self,
        body: &CreatePromptRequest,
    ) -> Result<PromptReceipt, TransportError>;

    async fn create_video_prompt(
        &self,
        body: &CreateVideoRequest,
    ) -> Result<PromptReceipt, TransportError>;

    async fn fetch_status(&self, prompt_id: &str) -> Result<PromptStatus, TransportError>;

    async fn fetch_queue(&self) -> Result<QueueSnapshot, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    server_id: String,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        server_id: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            server_id: server_id.into(),
        }
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, TransportError> {
        let url = format!("{}{}?serverId={}", self.base_url, path, self.server_id);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(send_error)?;
        decode_response(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(send_error)?;
        decode_response(response).await
    }
}

#[async_trait::async_trait]
impl GenerationTransport for HttpTransport {
    async fn create_prompt(
        &self,
        body: &CreatePromptRequest,
    ) -> Result<PromptReceipt, TransportError> {
        self.post_json("/prompts", body).await
    }

    async fn create_video_prompt(
        &self,
        body: &CreateVideoRequest,
    ) -> Result<PromptReceipt, TransportError> {
        self.post_json("/prompts/image-to-video", body).await
    }

    async fn fetch_status(&self, prompt_id: &str) -> Result<PromptStatus, TransportError> {
        self.get_json(&format!("/prompts/{prompt_id}")).await
    }

    async fn fetch_queue(&self) -> Result<QueueSnapshot, TransportError> {
        self.get_json("/prompts/pending").await
    }
}

// No response arrived, so the failure is connection-level as far as this
// layer can tell.
fn send_error(err: reqwest::Error) -> TransportError {
    TransportError::Connect(err.to_string())
}

async fn decode_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, TransportError> {
    let status = response.status();
    if !status.is_success() {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let raw = response.text().await.unwrap_or_default();
        return Err(TransportError::Status {
            code: status.as_u16(),
            body: extract_error_message(&raw),
            retry_after,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| TransportError::Decode(e.to_string()))
}

/// Pulls a human-readable message out of a JSON error body when there is
/// one, otherwise returns the raw body.
fn extract_error_message(raw: &str) -> String {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|v| {
            let msg = v
                .get("message")
                .or_else(|| v.get("error"))
                .and_then(serde_json::Value::as_str)?;
            Some(msg.to_string())
        })
        .unwrap_or_else(|| raw.to_string())
}
