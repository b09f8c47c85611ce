use passkey_authenticator::{CredentialStore, UserValidationMethod};
use passkey_client::Client;
use passkey_types::{webauthn, Passkey};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use url::Url;

use crate::CeremonyError;

use super::NativeAuthenticator;

/// A [`NativeAuthenticator`] backed by a [`passkey_client::Client`] and its software
/// authenticator.
///
/// The options JSON is parsed into the `passkey_types` Webauthn definitions, so options the
/// client cannot understand are reported as an authenticator rejection, much like a browser
/// would throw from `navigator.credentials`.
pub struct PasskeyClientAuthenticator<S, U, P>
where
    S: CredentialStore + Sync,
    U: UserValidationMethod + Sync,
    P: public_suffix::EffectiveTLDProvider + Sync + 'static,
    Passkey: TryFrom<<S as CredentialStore>::PasskeyItem>,
{
    client: Mutex<Client<S, U, P>>,
    origin: Url,
}

impl<S, U, P> PasskeyClientAuthenticator<S, U, P>
where
    S: CredentialStore + Sync,
    U: UserValidationMethod + Sync,
    P: public_suffix::EffectiveTLDProvider + Sync + 'static,
    Passkey: TryFrom<<S as CredentialStore>::PasskeyItem>,
{
    /// Run ceremonies through `client` on behalf of a page served from `origin`.
    pub fn new(client: Client<S, U, P>, origin: Url) -> Self {
        Self {
            client: Mutex::new(client),
            origin,
        }
    }

    /// Take the client back.
    pub fn into_inner(self) -> Client<S, U, P> {
        self.client.into_inner()
    }
}

fn parse_options<T: serde::de::DeserializeOwned>(options: Value) -> Result<T, CeremonyError> {
    serde_json::from_value(json!({ "publicKey": options }))
        .map_err(|e| CeremonyError::Authenticator(format!("unusable options: {e}")))
}

#[async_trait::async_trait]
impl<S, U, P> NativeAuthenticator for PasskeyClientAuthenticator<S, U, P>
where
    S: CredentialStore + Sync + Send,
    U: UserValidationMethod + Sync + Send,
    P: public_suffix::EffectiveTLDProvider + Sync + Send + 'static,
    Passkey: TryFrom<<S as CredentialStore>::PasskeyItem>,
{
    async fn start_authentication(&self, options: Value) -> Result<Value, CeremonyError> {
        let request: webauthn::CredentialRequestOptions = parse_options(options)?;

        let client = self.client.lock().await;
        let credential = client
            .authenticate(&self.origin, request, None)
            .await
            .map_err(|e| CeremonyError::Authenticator(format!("{e:?}")))?;

        Ok(serde_json::to_value(credential)?)
    }

    async fn start_registration(&self, options: Value) -> Result<Value, CeremonyError> {
        let request: webauthn::CredentialCreationOptions = parse_options(options)?;

        let mut client = self.client.lock().await;
        let credential = client
            .register(&self.origin, request, None)
            .await
            .map_err(|e| CeremonyError::Authenticator(format!("{e:?}")))?;

        Ok(serde_json::to_value(credential)?)
    }
}
