use std::time::Duration;

/// Failure classes surfaced by [`crate::services::GenerationClient`].
///
/// `ProviderFailure` and `PollTimeout` are deliberately distinct: a failed
/// job is dead, a timed-out wait may still resolve on the provider side and
/// can be resumed with a fresh budget.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Bad input to `submit`. Rejected before any network call.
    #[error("invalid generation request: {0}")]
    Validation(String),

    /// The provider rejected or was unreachable during `submit`. Creation is
    /// not idempotent, so this layer never retries it.
    #[error("generation request failed: {0}")]
    Creation(String),

    /// An HTTP call with no outer retry loop failed: connection failure,
    /// unexpected status, or undecodable body. The message carries which.
    #[error("provider request failed: {0}")]
    Transport(String),

    /// The provider reported an explicit error for the job, or the job id is
    /// unknown/expired. Terminal; do not poll the same job again.
    #[error("generation failed: {0}")]
    ProviderFailure(String),

    /// The wall-clock wait budget ran out with no terminal state.
    #[error("job {prompt_id} still pending after {waited:?}")]
    PollTimeout { prompt_id: String, waited: Duration },

    /// The provider signalled too many requests during `submit`.
    #[error("provider rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// The caller's cancellation token fired mid-wait.
    #[error("wait cancelled by caller")]
    Cancelled,
}

/// Errors at the HTTP seam, before the client maps them to outcomes.
///
/// Only `Connect` is safe to retry blindly: the request never reached the
/// provider.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("provider returned {code}: {body}")]
    Status {
        code: u16,
        body: String,
        retry_after: Option<Duration>,
    },

    #[error("malformed provider response: {0}")]
    Decode(String),
}
