use thiserror::Error;

/// Errors from LLM provider calls.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No API key configured for the provider.
    #[error("api key not configured")]
    CredentialMissing,

    /// A transport-level failure (connect, timeout, TLS).
    #[error("network: {0}")]
    Network(String),

    /// The provider returned a non-success status.
    #[error("provider api {status}: {message}")]
    Api { status: u16, message: String },

    /// The provider response could not be parsed.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}
