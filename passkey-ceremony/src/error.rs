use thiserror::Error;

/// Faults that abort a ceremony.
///
/// A Relying Party rejecting the ceremony is not one of these, that outcome is reported through
/// [`CeremonyOutcome::Failure`](crate::CeremonyOutcome::Failure) and the matching failure event.
/// Everything here means the ceremony could not be carried to the point of a verdict, and it is
/// handed straight back to the caller without any retry.
#[derive(Debug, Error)]
pub enum CeremonyError {
    /// A configured endpoint could not be resolved against the page origin.
    #[error("invalid endpoint `{endpoint}`: {source}")]
    InvalidEndpoint {
        /// The configured endpoint reference.
        endpoint: String,
        /// Why it did not resolve.
        source: url::ParseError,
    },

    /// The request to the Relying Party did not complete.
    #[error("request to {url} failed: {message}")]
    Transport {
        /// The endpoint that was being called.
        url: String,
        /// Description of the underlying failure.
        message: String,
    },

    /// The Relying Party answered with a body that is not JSON.
    #[error("response from {url} is not valid JSON: {source}")]
    MalformedResponse {
        /// The endpoint that produced the body.
        url: String,
        /// The parse error.
        source: serde_json::Error,
    },

    /// The authenticator rejected or could not perform the ceremony, for example because the
    /// user cancelled or no authenticator is available.
    #[error("authenticator rejected the ceremony: {0}")]
    Authenticator(String),

    /// A value could not be serialized into a request body.
    #[error("could not serialize request body: {0}")]
    Serialization(#[from] serde_json::Error),
}
