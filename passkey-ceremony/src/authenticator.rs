//! The platform authenticator a controller hands ceremony options to.

use serde_json::Value;

use crate::CeremonyError;

#[cfg(feature = "passkey-client")]
mod software;

#[cfg(feature = "passkey-client")]
pub use software::PasskeyClientAuthenticator;

/// The platform's credential API, the equivalent of `navigator.credentials` in a browser.
///
/// Options are handed over exactly as the Relying Party sent them and the credential produced is
/// handed back as JSON, ready to be posted for verification. A cancelled prompt or a missing
/// authenticator is reported as [`CeremonyError::Authenticator`].
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
#[async_trait::async_trait]
pub trait NativeAuthenticator {
    /// Produce an assertion for the given `PublicKeyCredentialRequestOptions` JSON.
    async fn start_authentication(&self, options: Value) -> Result<Value, CeremonyError>;

    /// Create a credential for the given `PublicKeyCredentialCreationOptions` JSON.
    async fn start_registration(&self, options: Value) -> Result<Value, CeremonyError>;
}
