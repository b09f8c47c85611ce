//! Lifecycle notifications emitted by the [`CeremonyController`](crate::CeremonyController).
//!
//! Listeners subscribe to a controller and receive every [`LifecycleEvent`] in the order they
//! subscribed. Each event knows its DOM name (`webauthn:request:options` and friends) and its
//! detail. Serializing an event yields `{"type": name(), "detail": detail()}`, exactly what a
//! host needs to re-dispatch it as a bubbling `CustomEvent`.

use std::sync::{Arc, Mutex};

use serde::{ser::SerializeStruct, Deserialize, Serialize, Serializer};
use serde_json::Value;
use typeshare::typeshare;

use crate::{config::ConnectOptions, transport::RequestHeaders};

/// The two Webauthn ceremonies a controller drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub enum Ceremony {
    /// Authentication with an existing credential, producing an assertion.
    Request,
    /// Registration of a new credential, producing an attestation.
    Creation,
}

impl Ceremony {
    /// The segment used in event names.
    pub fn as_str(self) -> &'static str {
        match self {
            Ceremony::Request => "request",
            Ceremony::Creation => "creation",
        }
    }
}

/// A notification raised at one of the points of a ceremony.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// The controller was attached; carries the effective endpoints.
    Connect {
        /// Endpoints and redirects in effect.
        options: ConnectOptions,
    },
    /// The options payload is about to be posted.
    OptionsRequested {
        /// Which ceremony is running.
        ceremony: Ceremony,
        /// The payload, exactly as it is sent.
        data: Value,
        /// Headers of the options request.
        headers: RequestHeaders,
    },
    /// The authenticator produced a response that is about to be posted for verification.
    ResponseReady {
        /// Which ceremony is running.
        ceremony: Ceremony,
        /// The authenticator response, exactly as it is sent.
        response: Value,
        /// Headers of the verification request.
        headers: RequestHeaders,
    },
    /// The Relying Party accepted the response.
    Success {
        /// Which ceremony is running.
        ceremony: Ceremony,
        /// The complete verification result.
        result: Value,
    },
    /// The Relying Party rejected the response.
    Failure {
        /// Which ceremony is running.
        ceremony: Ceremony,
        /// The `errorMessage` given by the Relying Party, as sent. `null` when there was none.
        message: Value,
    },
}

impl LifecycleEvent {
    /// The name a browser host dispatches this event under.
    pub fn name(&self) -> &'static str {
        use Ceremony::{Creation, Request};
        match self {
            LifecycleEvent::Connect { .. } => "webauthn:connect",
            LifecycleEvent::OptionsRequested { ceremony, .. } => match ceremony {
                Request => "webauthn:request:options",
                Creation => "webauthn:creation:options",
            },
            LifecycleEvent::ResponseReady { ceremony, .. } => match ceremony {
                Request => "webauthn:request:response",
                Creation => "webauthn:creation:response",
            },
            LifecycleEvent::Success { ceremony, .. } => match ceremony {
                Request => "webauthn:request:success",
                Creation => "webauthn:creation:success",
            },
            LifecycleEvent::Failure { ceremony, .. } => match ceremony {
                Request => "webauthn:request:failure",
                Creation => "webauthn:creation:failure",
            },
        }
    }

    /// The ceremony this event belongs to, `None` for [`LifecycleEvent::Connect`].
    pub fn ceremony(&self) -> Option<Ceremony> {
        match self {
            LifecycleEvent::Connect { .. } => None,
            LifecycleEvent::OptionsRequested { ceremony, .. }
            | LifecycleEvent::ResponseReady { ceremony, .. }
            | LifecycleEvent::Success { ceremony, .. }
            | LifecycleEvent::Failure { ceremony, .. } => Some(*ceremony),
        }
    }

    /// The detail a browser host attaches to the dispatched event.
    ///
    /// Success carries the verification result itself and failure carries only the message, the
    /// other events carry an object.
    pub fn detail(&self) -> Value {
        match self {
            LifecycleEvent::Connect { options } => serde_json::json!({ "options": options }),
            LifecycleEvent::OptionsRequested { data, headers, .. } => {
                serde_json::json!({ "data": data, "headers": headers })
            }
            LifecycleEvent::ResponseReady {
                response, headers, ..
            } => serde_json::json!({ "response": response, "headers": headers }),
            LifecycleEvent::Success { result, .. } => result.clone(),
            LifecycleEvent::Failure { message, .. } => message.clone(),
        }
    }
}

impl Serialize for LifecycleEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut event = serializer.serialize_struct("LifecycleEvent", 2)?;
        event.serialize_field("type", self.name())?;
        event.serialize_field("detail", &self.detail())?;
        event.end()
    }
}

/// Receives lifecycle notifications from a controller.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
pub trait EventListener {
    /// Called synchronously at the point the event is raised.
    fn on_event(&self, event: &LifecycleEvent);
}

/// Fans events out to every subscribed listener.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    listeners: Vec<Arc<dyn EventListener + Send + Sync>>,
}

impl EventDispatcher {
    /// Add a listener. It will see every event raised after this call.
    pub fn subscribe(&mut self, listener: Arc<dyn EventListener + Send + Sync>) {
        self.listeners.push(listener);
    }

    /// Number of subscribed listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub(crate) fn dispatch(&self, event: LifecycleEvent) {
        log::trace!("dispatching {}", event.name());
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// A listener that keeps every event it receives, for instrumentation and inspection.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl EventLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far, oldest first.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// The names of everything received so far, oldest first.
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(LifecycleEvent::name).collect()
    }
}

impl EventListener for EventLog {
    fn on_event(&self, event: &LifecycleEvent) {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(event.clone());
    }
}
