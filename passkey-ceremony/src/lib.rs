//! # Passkey Ceremony
//!
//! This crate defines a [`CeremonyController`] which runs the two [Webauthn] ceremonies,
//! authentication ("signin") and registration ("signup"), on behalf of a page. It relays data
//! between the page's form, the Relying Party's options and verification endpoints, and the
//! platform's authenticator, and it announces every step as a [`LifecycleEvent`].
//!
//! The controller does not perform any cryptography and does not verify anything itself. Each of
//! its collaborators is a trait so that the host decides how they are reached:
//!
//! - [`Transport`] posts JSON to the Relying Party. It is implemented for [`reqwest::Client`].
//! - [`NativeAuthenticator`] stands in for `navigator.credentials`. With the `passkey-client`
//!   feature, `authenticator::PasskeyClientAuthenticator` runs ceremonies against a
//!   `passkey_client::Client`.
//! - [`Navigator`] replaces the page location after a successful ceremony.
//! - [`EventListener`] receives lifecycle events.
//!
//! A ceremony runs strictly in sequence:
//!
//! RelyingParty options <-> [`NativeAuthenticator`] <-> RelyingParty verification
//!
//! The Relying Party decides the verdict. A verification result whose `errorMessage` is the empty
//! string is a success, anything else is a failure carrying that message. Faults that prevent a
//! verdict, such as network errors or a cancelled prompt, are returned as [`CeremonyError`].
//!
//! [Webauthn]: https://w3c.github.io/webauthn/

use std::sync::Arc;

use serde_json::Value;
use url::Url;

pub mod authenticator;
mod config;
mod error;
mod events;
mod form;
mod navigation;
mod transport;

#[cfg(test)]
mod tests;

pub use self::{
    authenticator::NativeAuthenticator,
    config::{
        ConnectOptions, ControllerConfig, ControllerValues, FieldNames,
        DEFAULT_CREATION_OPTIONS_URL, DEFAULT_CREATION_RESULT_URL, DEFAULT_REQUEST_OPTIONS_URL,
        DEFAULT_REQUEST_RESULT_URL,
    },
    error::CeremonyError,
    events::{Ceremony, EventDispatcher, EventListener, EventLog, LifecycleEvent},
    form::{extract_payload, remove_nulls, FormData, SubmitEvent, UiEvent},
    navigation::{LocationHistory, Navigator, NoNavigation},
    transport::{RequestHeaders, Transport},
};

#[cfg(any(test, feature = "testable"))]
pub use self::{
    authenticator::MockNativeAuthenticator, events::MockEventListener,
    navigation::MockNavigator, transport::MockTransport,
};

/// How the Relying Party judged a ceremony response.
#[derive(Debug, Clone, PartialEq)]
pub enum CeremonyOutcome {
    /// The response was accepted. Holds the complete verification result.
    Success(Value),
    /// The response was rejected. Holds the Relying Party's `errorMessage` as it was sent, or
    /// `null` when the result had none.
    Failure(Value),
}

impl CeremonyOutcome {
    /// Classify a verification result.
    ///
    /// Only an `errorMessage` that is exactly the empty string counts as success. A missing,
    /// `null`, non-string or non-empty message is a failure, and the message is kept untouched.
    pub fn from_verification(result: Value) -> Self {
        match result.get("errorMessage") {
            Some(Value::String(message)) if message.is_empty() => Self::Success(result),
            Some(message) => Self::Failure(message.clone()),
            None => Self::Failure(Value::Null),
        }
    }

    /// The rejection message, when the Relying Party sent it as a string.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failure(message) => message.as_str(),
            Self::Success(_) => None,
        }
    }

    /// Was the ceremony accepted?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Endpoints used by one ceremony.
struct CeremonyEndpoints<'a> {
    options_url: &'a str,
    result_url: &'a str,
    redirect_uri: Option<&'a str>,
}

/// A `CeremonyController` runs Webauthn ceremonies for a page served from `origin`. Users of this
/// struct supply a [`Transport`], a [`NativeAuthenticator`] and a [`Navigator`].
///
/// Configured endpoints are references relative to `origin`, so the defaults such as
/// `/request/options` resolve against the page's own host.
///
/// Every call to [`signin`](Self::signin) or [`signup`](Self::signup) works on its own payload
/// and responses. Overlapping calls are not coordinated; a host that needs to guard against
/// double submission should disable the triggering control.
pub struct CeremonyController<T, A, N>
where
    T: Transport,
    A: NativeAuthenticator,
    N: Navigator,
{
    config: ControllerConfig,
    origin: Url,
    transport: T,
    authenticator: A,
    navigator: N,
    dispatcher: EventDispatcher,
}

impl<T, A, N> CeremonyController<T, A, N>
where
    T: Transport,
    A: NativeAuthenticator,
    N: Navigator,
{
    /// Create a controller for a page at `origin`. Defaults are applied to `values` here, once.
    pub fn new(
        origin: Url,
        values: ControllerValues,
        transport: T,
        authenticator: A,
        navigator: N,
    ) -> Self {
        Self {
            config: ControllerConfig::resolve(values),
            origin,
            transport,
            authenticator,
            navigator,
            dispatcher: EventDispatcher::default(),
        }
    }

    /// Subscribe a listener and return the controller, for building it in one expression.
    pub fn with_listener(mut self, listener: Arc<dyn EventListener + Send + Sync>) -> Self {
        self.subscribe(listener);
        self
    }

    /// Subscribe a listener to every event raised from now on.
    pub fn subscribe(&mut self, listener: Arc<dyn EventListener + Send + Sync>) {
        self.dispatcher.subscribe(listener);
    }

    /// The effective configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// The origin endpoints are resolved against.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Read access to the controller's `Transport`.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Read access to the controller's `NativeAuthenticator`.
    pub fn authenticator(&self) -> &A {
        &self.authenticator
    }

    /// Read access to the controller's `Navigator`.
    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Announce the effective endpoints with a `webauthn:connect` event. Meant to be called once,
    /// when the controller is attached to its element.
    pub fn connect(&self) -> ConnectOptions {
        let options = self.config.endpoints.clone();
        log::debug!("connected at {}", self.origin);
        self.dispatcher.dispatch(LifecycleEvent::Connect {
            options: options.clone(),
        });
        options
    }

    /// Authenticate with an existing credential.
    ///
    /// Returns the Relying Party's verdict, or a [`CeremonyError`] when no verdict could be
    /// obtained.
    pub async fn signin<E>(&self, event: &mut E) -> Result<CeremonyOutcome, CeremonyError>
    where
        E: UiEvent + ?Sized,
    {
        self.run(Ceremony::Request, event).await
    }

    /// Register a new credential.
    ///
    /// Returns the Relying Party's verdict, or a [`CeremonyError`] when no verdict could be
    /// obtained.
    pub async fn signup<E>(&self, event: &mut E) -> Result<CeremonyOutcome, CeremonyError>
    where
        E: UiEvent + ?Sized,
    {
        self.run(Ceremony::Creation, event).await
    }

    fn endpoints(&self, ceremony: Ceremony) -> CeremonyEndpoints<'_> {
        let endpoints = &self.config.endpoints;
        match ceremony {
            Ceremony::Request => CeremonyEndpoints {
                options_url: &endpoints.request_options_url,
                result_url: &endpoints.request_result_url,
                redirect_uri: endpoints.request_success_redirect_uri.as_deref(),
            },
            Ceremony::Creation => CeremonyEndpoints {
                options_url: &endpoints.creation_options_url,
                result_url: &endpoints.creation_result_url,
                redirect_uri: endpoints.creation_success_redirect_uri.as_deref(),
            },
        }
    }

    fn resolve(&self, endpoint: &str) -> Result<Url, CeremonyError> {
        self.origin
            .join(endpoint)
            .map_err(|source| CeremonyError::InvalidEndpoint {
                endpoint: endpoint.to_owned(),
                source,
            })
    }

    async fn run<E>(
        &self,
        ceremony: Ceremony,
        event: &mut E,
    ) -> Result<CeremonyOutcome, CeremonyError>
    where
        E: UiEvent + ?Sized,
    {
        let name = ceremony.as_str();
        log::debug!("{name} ceremony started");

        event.prevent_default();
        let data = extract_payload(event.form(), &self.config.fields);
        let endpoints = self.endpoints(ceremony);

        let options_headers = RequestHeaders::json();
        self.dispatcher.dispatch(LifecycleEvent::OptionsRequested {
            ceremony,
            data: data.clone(),
            headers: options_headers.clone(),
        });

        let options_url = self.resolve(endpoints.options_url)?;
        log::trace!("{name}: requesting options from {options_url}");
        let options = self
            .transport
            .post_json(&options_url, &options_headers, &data)
            .await?;

        log::trace!("{name}: waiting for the authenticator");
        let response = match ceremony {
            Ceremony::Request => self.authenticator.start_authentication(options).await?,
            Ceremony::Creation => self.authenticator.start_registration(options).await?,
        };

        let response_headers = RequestHeaders::json();
        self.dispatcher.dispatch(LifecycleEvent::ResponseReady {
            ceremony,
            response: response.clone(),
            headers: response_headers.clone(),
        });

        let result_url = self.resolve(endpoints.result_url)?;
        log::trace!("{name}: posting response to {result_url}");
        let verification = self
            .transport
            .post_json(&result_url, &response_headers, &response)
            .await?;

        let outcome = CeremonyOutcome::from_verification(verification);
        match &outcome {
            CeremonyOutcome::Success(result) => {
                log::debug!("{name} ceremony succeeded");
                self.dispatcher.dispatch(LifecycleEvent::Success {
                    ceremony,
                    result: result.clone(),
                });
                if let Some(uri) = endpoints.redirect_uri {
                    log::trace!("{name}: redirecting to {uri}");
                    self.navigator.replace(uri);
                }
            }
            CeremonyOutcome::Failure(message) => {
                log::warn!("{name} ceremony rejected: {message}");
                self.dispatcher.dispatch(LifecycleEvent::Failure {
                    ceremony,
                    message: message.clone(),
                });
            }
        }

        Ok(outcome)
    }
}
