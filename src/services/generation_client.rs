use crate::error::{GenerationError, TransportError};
use crate::schema::{CompletedMedia, GenerationParams, ImageParams, JobKind, PollOutcome, VideoParams};
use crate::services::transport::{
    CreatePromptRequest, CreateVideoRequest, GenerationTransport, HttpTransport, MediaType,
    PromptStatus, QueueEntry,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(4);
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(300);

// Transport retries apply to connection failures only; status checks are
// idempotent so repeating them is safe.
const TRANSPORT_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub base_url: String,
    pub api_key: String,
    pub server_id: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl GenerationConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        server_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            server_id: server_id.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }

    /// Credentials are read once here; nothing refreshes them later.
    pub fn from_env() -> anyhow::Result<Self> {
        let base_url = std::env::var("GENERATION_API_URL")
            .map_err(|_| anyhow::anyhow!("GENERATION_API_URL not set"))?;
        let api_key = std::env::var("GENERATION_API_KEY")
            .map_err(|_| anyhow::anyhow!("GENERATION_API_KEY not set"))?;
        let server_id = std::env::var("GENERATION_SERVER_ID")
            .map_err(|_| anyhow::anyhow!("GENERATION_SERVER_ID not set"))?;

        let mut config = Self::new(base_url, api_key, server_id);
        if let Some(secs) = env_secs("GENERATION_POLL_INTERVAL_SECS") {
            config.poll_interval = secs;
        }
        if let Some(secs) = env_secs("GENERATION_MAX_WAIT_SECS") {
            config.max_wait = secs;
        }
        Ok(config)
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Provider acknowledgement of a submitted job: the opaque id to poll plus
/// the seed to reproduce the generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub prompt_id: String,
    pub seed: Option<i64>,
}

/// Per-wait overrides. Unset fields fall back to the client config.
#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
    pub max_wait: Option<Duration>,
    pub poll_interval: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

/// Client for the provider's create -> poll -> resolve job lifecycle.
///
/// One instance is shared across jobs; each job is polled by its own
/// sequential loop with no cross-job coordination.
pub struct GenerationClient {
    transport: Arc<dyn GenerationTransport>,
    config: GenerationConfig,
}

impl GenerationClient {
    pub fn new(config: GenerationConfig) -> Self {
        let transport = HttpTransport::new(
            config.base_url.clone(),
            config.api_key.clone(),
            config.server_id.clone(),
            config.request_timeout,
        );
        Self {
            transport: Arc::new(transport),
            config,
        }
    }

    pub fn with_transport(
        config: GenerationConfig,
        transport: Arc<dyn GenerationTransport>,
    ) -> Self {
        Self { transport, config }
    }

    /// Submits one generation job. Creation is billable and not idempotent,
    /// so failures here are never retried by this layer.
    pub async fn submit(
        &self,
        params: &GenerationParams,
    ) -> Result<SubmitReceipt, GenerationError> {
        params.validate()?;

        let receipt = match params {
            GenerationParams::Image(image) => {
                self.transport.create_prompt(&image_request(image)).await
            }
            GenerationParams::Video(video) => {
                self.transport
                    .create_video_prompt(&video_request(video))
                    .await
            }
        }
        .map_err(creation_error)?;

        tracing::info!(
            prompt_id = %receipt.prompt_id,
            kind = ?params.kind(),
            seed = receipt.seed,
            "generation job created"
        );
        Ok(SubmitReceipt {
            prompt_id: receipt.prompt_id,
            seed: receipt.seed,
        })
    }

    /// One logical status check. Connection failures are retried up to
    /// [`TRANSPORT_ATTEMPTS`] times with exponential backoff (2s, 4s, 8s);
    /// application-level errors are not, since they came from the provider.
    pub async fn poll(
        &self,
        prompt_id: &str,
        kind: JobKind,
    ) -> Result<PollOutcome, GenerationError> {
        self.poll_cancellable(prompt_id, kind, &CancellationToken::new())
            .await
    }

    // The backoff sleeps here are the longest uninterruptible stretches in a
    // wait, so the caller's token has to reach them too.
    async fn poll_cancellable(
        &self,
        prompt_id: &str,
        kind: JobKind,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, GenerationError> {
        let mut last_failure = String::new();

        for attempt in 1..=TRANSPORT_ATTEMPTS {
            match self.transport.fetch_status(prompt_id).await {
                Ok(status) => return Ok(classify_status(&status, kind)),
                Err(TransportError::Status { code: 404, .. }) => {
                    return Ok(PollOutcome::Failed {
                        reason: "not found".to_string(),
                    });
                }
                Err(TransportError::Connect(reason)) => {
                    let backoff = BACKOFF_BASE * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        prompt_id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %reason,
                        "status check connection failed, backing off"
                    );
                    tokio::select! {
                        () = cancel.cancelled() => return Err(GenerationError::Cancelled),
                        () = tokio::time::sleep(backoff) => {}
                    }
                    last_failure = reason;
                }
                Err(other) => {
                    tracing::warn!(
                        prompt_id,
                        error = %other,
                        "ambiguous status response, treating as retryable"
                    );
                    return Ok(PollOutcome::RetryableError {
                        reason: other.to_string(),
                    });
                }
            }
        }

        Ok(PollOutcome::RetryableError {
            reason: format!(
                "connection failed after {TRANSPORT_ATTEMPTS} attempts: {last_failure}"
            ),
        })
    }

    /// Polls until the job reaches a terminal state or the budget runs out.
    ///
    /// Returns the media immediately on the first `Completed`, raises
    /// `ProviderFailure` on the first `Failed`, and `PollTimeout` once
    /// `max_wait` elapses with neither. Pending and retryable outcomes keep
    /// the loop going. The cancellation token is honored before each poll
    /// and during each sleep, poll-interval and retry backoff alike; an
    /// in-flight request is simply left to finish.
    pub async fn wait_for_completion(
        &self,
        prompt_id: &str,
        kind: JobKind,
        opts: WaitOptions,
    ) -> Result<CompletedMedia, GenerationError> {
        let max_wait = opts.max_wait.unwrap_or(self.config.max_wait);
        let poll_interval = opts.poll_interval.unwrap_or(self.config.poll_interval);
        let cancel = opts.cancel.unwrap_or_default();
        let started = tokio::time::Instant::now();

        loop {
            if cancel.is_cancelled() {
                return Err(GenerationError::Cancelled);
            }
            if started.elapsed() >= max_wait {
                tracing::warn!(
                    prompt_id,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "wait budget exhausted, job may still complete later"
                );
                return Err(GenerationError::PollTimeout {
                    prompt_id: prompt_id.to_string(),
                    waited: started.elapsed(),
                });
            }

            match self.poll_cancellable(prompt_id, kind, &cancel).await? {
                PollOutcome::Completed {
                    media_url,
                    media_id,
                } => {
                    tracing::info!(
                        prompt_id,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "generation job completed"
                    );
                    return Ok(CompletedMedia {
                        media_url,
                        media_id,
                    });
                }
                PollOutcome::Failed { reason } => {
                    tracing::warn!(prompt_id, reason = %reason, "generation job failed");
                    return Err(GenerationError::ProviderFailure(reason));
                }
                PollOutcome::Pending => {}
                PollOutcome::RetryableError { reason } => {
                    tracing::debug!(
                        prompt_id,
                        reason = %reason,
                        "poll inconclusive, still treating job as pending"
                    );
                }
            }

            tokio::select! {
                () = cancel.cancelled() => return Err(GenerationError::Cancelled),
                () = tokio::time::sleep(poll_interval) => {}
            }
        }
    }

    /// Position of a job in the provider's pending queue, if it is queued.
    pub async fn queue_position(
        &self,
        prompt_id: &str,
    ) -> Result<Option<QueueEntry>, GenerationError> {
        let snapshot = self
            .transport
            .fetch_queue()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        Ok(snapshot
            .queue
            .into_iter()
            .find(|entry| entry.prompt_id == prompt_id))
    }
}

fn creation_error(err: TransportError) -> GenerationError {
    match err {
        TransportError::Status {
            code: 429,
            retry_after,
            ..
        } => GenerationError::RateLimited { retry_after },
        other => GenerationError::Creation(other.to_string()),
    }
}

/// Terminal detection uses the explicit error flag and the artifact list,
/// never error-message contents. Anything the provider has not clearly
/// finished stays pending.
fn classify_status(status: &PromptStatus, kind: JobKind) -> PollOutcome {
    if status.is_error {
        let reason = status
            .error_message
            .clone()
            .unwrap_or_else(|| "provider reported an error".to_string());
        return PollOutcome::Failed { reason };
    }

    let wanted = MediaType::from(kind);
    if let Some(media) = status.medias.iter().find(|m| m.media_type == wanted) {
        return PollOutcome::Completed {
            media_url: media.media_url.clone(),
            media_id: media.id.clone(),
        };
    }

    PollOutcome::Pending
}

fn image_request(image: &ImageParams) -> CreatePromptRequest {
    CreatePromptRequest {
        name: image.name.clone(),
        appearance: image.appearance.describe(),
        detail_level: image.detail_level,
        gender: image.appearance.gender,
        from_location: image.from_location.clone(),
        face_improve_enabled: Some(image.face_improve),
        face_model: image.face_model.clone(),
        model: Some(image.style),
        aspect_ratio: image.aspect_ratio.clone(),
        block_explicit_content: Some(image.block_explicit),
        seed: image.seed,
    }
}

fn video_request(video: &VideoParams) -> CreateVideoRequest {
    CreateVideoRequest {
        media_id: video.media_id.clone(),
        text: video.motion_text.clone(),
        video_length: video.video_length,
        video_frame_rate: video.frame_rate,
        seed: video.seed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CharacterAppearance, Gender};
    use crate::services::transport::{Media, PromptReceipt, QueueSnapshot};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum StatusScript {
        Ready(PromptStatus),
        ConnectFailure,
        HttpStatus(u16),
    }

    enum CreateScript {
        Accept { prompt_id: &'static str, seed: i64 },
        RateLimited { retry_after_secs: u64 },
        Unreachable,
    }

    struct FakeTransport {
        statuses: Mutex<VecDeque<StatusScript>>,
        creation: Mutex<CreateScript>,
        queue: Mutex<Vec<QueueEntry>>,
        queue_failure: Mutex<Option<u16>>,
        status_calls: AtomicUsize,
        create_calls: AtomicUsize,
    }

    impl FakeTransport {
        fn scripted(statuses: Vec<StatusScript>) -> Arc<Self> {
            Arc::new(Self {
                statuses: Mutex::new(statuses.into()),
                creation: Mutex::new(CreateScript::Accept {
                    prompt_id: "p-1",
                    seed: 42,
                }),
                queue: Mutex::new(vec![]),
                queue_failure: Mutex::new(None),
                status_calls: AtomicUsize::new(0),
                create_calls: AtomicUsize::new(0),
            })
        }

        fn with_creation(creation: CreateScript) -> Arc<Self> {
            let fake = Self::scripted(vec![]);
            *fake.creation.lock().unwrap() = creation;
            fake
        }

        fn status_calls(&self) -> usize {
            self.status_calls.load(Ordering::SeqCst)
        }

        fn create_calls(&self) -> usize {
            self.create_calls.load(Ordering::SeqCst)
        }

        fn run_create(&self) -> Result<PromptReceipt, TransportError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            match &*self.creation.lock().unwrap() {
                CreateScript::Accept { prompt_id, seed } => Ok(PromptReceipt {
                    prompt_id: (*prompt_id).to_string(),
                    seed: Some(*seed),
                }),
                CreateScript::RateLimited { retry_after_secs } => Err(TransportError::Status {
                    code: 429,
                    body: "backlog full".to_string(),
                    retry_after: Some(Duration::from_secs(*retry_after_secs)),
                }),
                CreateScript::Unreachable => {
                    Err(TransportError::Connect("connect timeout".to_string()))
                }
            }
        }
    }

    #[async_trait::async_trait]
    impl GenerationTransport for FakeTransport {
        async fn create_prompt(
            &self,
            _body: &CreatePromptRequest,
        ) -> Result<PromptReceipt, TransportError> {
            self.run_create()
        }

        async fn create_video_prompt(
            &self,
            _body: &CreateVideoRequest,
        ) -> Result<PromptReceipt, TransportError> {
            self.run_create()
        }

        async fn fetch_status(&self, _prompt_id: &str) -> Result<PromptStatus, TransportError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let entry = self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .expect("status check past end of script");
            match entry {
                StatusScript::Ready(status) => Ok(status),
                StatusScript::ConnectFailure => {
                    Err(TransportError::Connect("connect timeout".to_string()))
                }
                StatusScript::HttpStatus(code) => Err(TransportError::Status {
                    code,
                    body: String::new(),
                    retry_after: None,
                }),
            }
        }

        async fn fetch_queue(&self) -> Result<QueueSnapshot, TransportError> {
            if let Some(code) = *self.queue_failure.lock().unwrap() {
                return Err(TransportError::Status {
                    code,
                    body: "queue unavailable".to_string(),
                    retry_after: None,
                });
            }
            Ok(QueueSnapshot {
                queue: self.queue.lock().unwrap().clone(),
            })
        }
    }

    fn test_config() -> GenerationConfig {
        GenerationConfig::new("http://provider.test", "secret", "server-1")
    }

    fn client_with(transport: Arc<FakeTransport>) -> GenerationClient {
        GenerationClient::with_transport(test_config(), transport)
    }

    fn pending() -> StatusScript {
        StatusScript::Ready(PromptStatus {
            prompt_id: "p-1".to_string(),
            medias: vec![],
            is_error: false,
            error_message: None,
        })
    }

    fn completed(url: &str) -> StatusScript {
        StatusScript::Ready(PromptStatus {
            prompt_id: "p-1".to_string(),
            medias: vec![Media {
                id: "m-1".to_string(),
                media_url: url.to_string(),
                media_type: MediaType::Image,
            }],
            is_error: false,
            error_message: None,
        })
    }

    fn provider_error(message: &str) -> StatusScript {
        StatusScript::Ready(PromptStatus {
            prompt_id: "p-1".to_string(),
            medias: vec![],
            is_error: true,
            error_message: Some(message.to_string()),
        })
    }

    fn image_params() -> GenerationParams {
        let appearance = CharacterAppearance {
            gender: Some(Gender::Female),
            eye_color: Some("green".to_string()),
            ..Default::default()
        };
        GenerationParams::Image(ImageParams::new("Aiko", appearance))
    }

    fn wait_opts(max_wait_secs: u64, interval_secs: u64) -> WaitOptions {
        WaitOptions {
            max_wait: Some(Duration::from_secs(max_wait_secs)),
            poll_interval: Some(Duration::from_secs(interval_secs)),
            cancel: None,
        }
    }

    #[tokio::test]
    async fn submit_returns_prompt_id_and_seed() {
        let fake = FakeTransport::scripted(vec![]);
        let client = client_with(fake.clone());

        let receipt = client.submit(&image_params()).await.unwrap();
        assert_eq!(receipt.prompt_id, "p-1");
        assert_eq!(receipt.seed, Some(42));
        assert_eq!(fake.create_calls(), 1);
    }

    #[tokio::test]
    async fn oversized_motion_text_fails_without_network_calls() {
        let fake = FakeTransport::scripted(vec![]);
        let client = client_with(fake.clone());

        let params = GenerationParams::Video(VideoParams::new("media-1", "x".repeat(301)));
        let err = client.submit(&params).await.unwrap_err();

        assert!(matches!(err, GenerationError::Validation(_)));
        assert_eq!(fake.create_calls(), 0);
    }

    #[tokio::test]
    async fn creation_failure_is_not_retried() {
        let fake = FakeTransport::with_creation(CreateScript::Unreachable);
        let client = client_with(fake.clone());

        let err = client.submit(&image_params()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Creation(_)));
        assert_eq!(fake.create_calls(), 1);
    }

    #[tokio::test]
    async fn rate_limited_creation_carries_retry_after_hint() {
        let fake = FakeTransport::with_creation(CreateScript::RateLimited {
            retry_after_secs: 30,
        });
        let client = client_with(fake.clone());

        let err = client.submit(&image_params()).await.unwrap_err();
        match err {
            GenerationError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(30)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
        assert_eq!(fake.create_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_failures_back_off_then_surface_as_retryable() {
        let fake = FakeTransport::scripted(vec![
            StatusScript::ConnectFailure,
            StatusScript::ConnectFailure,
            StatusScript::ConnectFailure,
        ]);
        let client = client_with(fake.clone());

        let started = tokio::time::Instant::now();
        let outcome = client.poll("p-1", JobKind::Image).await.unwrap();

        assert!(matches!(outcome, PollOutcome::RetryableError { .. }));
        assert_eq!(fake.status_calls(), 3);
        // 2s + 4s + 8s of backoff before giving up.
        assert!(started.elapsed() >= Duration::from_secs(14));
    }

    #[tokio::test(start_paused = true)]
    async fn connect_failure_then_success_recovers_within_one_poll() {
        let fake = FakeTransport::scripted(vec![
            StatusScript::ConnectFailure,
            completed("https://x/img.png"),
        ]);
        let client = client_with(fake.clone());

        let started = tokio::time::Instant::now();
        let outcome = client.poll("p-1", JobKind::Image).await.unwrap();

        assert!(matches!(outcome, PollOutcome::Completed { .. }));
        assert_eq!(fake.status_calls(), 2);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn not_found_is_terminal_failure_not_retryable() {
        let fake = FakeTransport::scripted(vec![StatusScript::HttpStatus(404)]);
        let client = client_with(fake.clone());

        let outcome = client.poll("p-1", JobKind::Image).await.unwrap();
        assert_eq!(
            outcome,
            PollOutcome::Failed {
                reason: "not found".to_string()
            }
        );
        assert_eq!(fake.status_calls(), 1);
    }

    #[tokio::test]
    async fn unexpected_status_code_is_retryable() {
        let fake = FakeTransport::scripted(vec![StatusScript::HttpStatus(500)]);
        let client = client_with(fake.clone());

        let outcome = client.poll("p-1", JobKind::Image).await.unwrap();
        assert!(matches!(outcome, PollOutcome::RetryableError { .. }));
        assert_eq!(fake.status_calls(), 1);
    }

    #[tokio::test]
    async fn artifact_of_wrong_kind_does_not_complete_job() {
        let fake = FakeTransport::scripted(vec![completed("https://x/img.png")]);
        let client = client_with(fake.clone());

        let outcome = client.poll("p-1", JobKind::Video).await.unwrap();
        assert_eq!(outcome, PollOutcome::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_resolves_after_scripted_pending_polls() {
        let fake = FakeTransport::scripted(vec![
            pending(),
            pending(),
            completed("https://x/img.png"),
        ]);
        let client = client_with(fake.clone());

        let started = tokio::time::Instant::now();
        let media = client
            .wait_for_completion("p-1", JobKind::Image, wait_opts(60, 3))
            .await
            .unwrap();

        assert_eq!(media.media_url, "https://x/img.png");
        assert_eq!(media.media_id, "m-1");
        assert_eq!(fake.status_calls(), 3);
        // two sleeps of the poll interval between the three polls
        assert!(started.elapsed() >= Duration::from_secs(6));
        assert!(started.elapsed() < Duration::from_secs(9));
    }

    #[tokio::test]
    async fn provider_error_flag_stops_wait_immediately() {
        let fake = FakeTransport::scripted(vec![provider_error("NSFW blocked")]);
        let client = client_with(fake.clone());

        let err = client
            .wait_for_completion("p-1", JobKind::Image, wait_opts(60, 3))
            .await
            .unwrap_err();

        match err {
            GenerationError::ProviderFailure(reason) => assert_eq!(reason, "NSFW blocked"),
            other => panic!("expected ProviderFailure, got {other:?}"),
        }
        assert_eq!(fake.status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_raises_timeout_not_failure() {
        let fake = FakeTransport::scripted((0..8).map(|_| pending()).collect());
        let client = client_with(fake.clone());

        let err = client
            .wait_for_completion("p-1", JobKind::Image, wait_opts(10, 3))
            .await
            .unwrap_err();

        match err {
            GenerationError::PollTimeout { prompt_id, waited } => {
                assert_eq!(prompt_id, "p-1");
                assert!(waited >= Duration::from_secs(10));
            }
            other => panic!("expected PollTimeout, got {other:?}"),
        }
        // polls at 0s, 3s, 6s, 9s; the budget check fires at 12s
        assert_eq!(fake.status_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_outcomes_keep_the_wait_going() {
        let fake = FakeTransport::scripted(vec![
            StatusScript::HttpStatus(502),
            completed("https://x/img.png"),
        ]);
        let client = client_with(fake.clone());

        let media = client
            .wait_for_completion("p-1", JobKind::Image, wait_opts(60, 3))
            .await
            .unwrap();
        assert_eq!(media.media_url, "https://x/img.png");
        assert_eq!(fake.status_calls(), 2);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_before_first_poll() {
        let fake = FakeTransport::scripted(vec![pending()]);
        let client = client_with(fake.clone());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let opts = WaitOptions {
            cancel: Some(cancel),
            ..wait_opts(60, 3)
        };

        let err = client
            .wait_for_completion("p-1", JobKind::Image, opts)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Cancelled));
        assert_eq!(fake.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_sleep_stops_scheduling_polls() {
        let fake = FakeTransport::scripted(vec![pending(), pending(), pending()]);
        let client = client_with(fake.clone());

        let cancel = CancellationToken::new();
        let opts = WaitOptions {
            cancel: Some(cancel.clone()),
            ..wait_opts(60, 3)
        };

        let wait = client.wait_for_completion("p-1", JobKind::Image, opts);
        let trigger = async {
            tokio::time::sleep(Duration::from_secs(4)).await;
            cancel.cancel();
        };
        let (result, ()) = tokio::join!(wait, trigger);

        assert!(matches!(result, Err(GenerationError::Cancelled)));
        // polls at 0s and 3s; the 4s cancellation lands inside the next sleep
        assert_eq!(fake.status_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_stops_transport_retries() {
        let fake = FakeTransport::scripted(vec![
            StatusScript::ConnectFailure,
            StatusScript::ConnectFailure,
            StatusScript::ConnectFailure,
        ]);
        let client = client_with(fake.clone());

        let cancel = CancellationToken::new();
        let opts = WaitOptions {
            cancel: Some(cancel.clone()),
            ..wait_opts(60, 3)
        };

        let started = tokio::time::Instant::now();
        let wait = client.wait_for_completion("p-1", JobKind::Image, opts);
        let trigger = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        };
        let (result, ()) = tokio::join!(wait, trigger);

        assert!(matches!(result, Err(GenerationError::Cancelled)));
        // one attempt at 0s; the 1s cancellation lands inside the 2s backoff
        assert_eq!(fake.status_calls(), 1);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn queue_lookup_error_reports_provider_status() {
        let fake = FakeTransport::scripted(vec![]);
        *fake.queue_failure.lock().unwrap() = Some(500);
        let client = client_with(fake.clone());

        let err = client.queue_position("p-1").await.unwrap_err();
        match err {
            GenerationError::Transport(reason) => {
                assert!(reason.contains("500"), "missing status code: {reason}");
                assert!(reason.contains("queue unavailable"), "missing body: {reason}");
            }
            other => panic!("expected Transport, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn queue_position_finds_matching_entry() {
        let fake = FakeTransport::scripted(vec![]);
        fake.queue.lock().unwrap().push(QueueEntry {
            prompt_id: "p-1".to_string(),
            queue_position: 3,
            video: false,
            progress: Some(0.2),
        });
        let client = client_with(fake.clone());

        let entry = client.queue_position("p-1").await.unwrap();
        assert_eq!(entry.map(|e| e.queue_position), Some(3));

        let missing = client.queue_position("p-2").await.unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn image_request_carries_rendered_appearance() {
        let GenerationParams::Image(image) = image_params() else {
            unreachable!()
        };
        let body = image_request(&image);
        assert_eq!(body.name, "Aiko");
        assert_eq!(body.appearance, "female, green eyes");
        assert_eq!(body.gender, Some(Gender::Female));
        assert_eq!(body.face_improve_enabled, Some(true));
    }
}
