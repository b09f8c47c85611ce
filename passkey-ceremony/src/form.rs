//! The form a controller is attached to, the UI event that starts a ceremony and the payload sent
//! to the Relying Party's options endpoint.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::config::FieldNames;


/// Name/value entries of a submitted form.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormData {
    entries: IndexMap<String, String>,
}

impl FormData {
    /// An empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Like a browser form, a later entry with the same name does not replace the
    /// first one for the purposes of [`FormData::get`].
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(name.into()).or_insert_with(|| value.into());
    }

    /// The first value submitted under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }
}

impl<K, V> FromIterator<(K, V)> for FormData
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut form = FormData::new();
        for (name, value) in iter {
            form.append(name, value);
        }
        form
    }
}

/// The UI event that triggered a ceremony, typically a click or a form submission.
pub trait UiEvent {
    /// Stop the host from running the event's default action, such as submitting the form.
    fn prevent_default(&mut self);

    /// The form the controller is attached to. `None` when the host element is not a form, in
    /// which case the ceremony carries on with an empty payload.
    fn form(&self) -> Option<&FormData>;
}

/// A plain [`UiEvent`] carrying the submitted form.
#[derive(Debug, Default, Clone)]
pub struct SubmitEvent {
    form: Option<FormData>,
    default_prevented: bool,
}

impl SubmitEvent {
    /// An event raised from a form with the given entries.
    pub fn new(form: FormData) -> Self {
        Self {
            form: Some(form),
            default_prevented: false,
        }
    }

    /// An event raised from an element that is not a form.
    pub fn without_form() -> Self {
        Self::default()
    }

    /// Whether [`UiEvent::prevent_default`] was called.
    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

impl UiEvent for SubmitEvent {
    fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    fn form(&self) -> Option<&FormData> {
        self.form.as_ref()
    }
}

/// Build the options request payload from `form`, keeping only the fields that are present.
pub fn extract_payload(form: Option<&FormData>, fields: &FieldNames) -> Value {
    let lookup = |name: &str| -> Value {
        form.and_then(|form| form.get(name))
            .map_or(Value::Null, |value| Value::String(value.to_owned()))
    };

    let mut payload = Map::new();
    payload.insert("username".into(), lookup(&fields.username));
    payload.insert("displayName".into(), lookup(&fields.display_name));
    payload.insert("attestation".into(), lookup(&fields.attestation));
    payload.insert("userVerification".into(), lookup(&fields.user_verification));
    payload.insert("residentKey".into(), lookup(&fields.resident_key));
    payload.insert(
        "authenticatorAttachment".into(),
        lookup(&fields.authenticator_attachment),
    );

    remove_nulls(Value::Object(payload))
}

/// Drop every object entry whose value is `null`, at any depth.
///
/// Arrays are walked so that objects nested inside them are pruned too, but array elements keep
/// their position, including `null` ones.
pub fn remove_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, remove_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(remove_nulls).collect()),
        leaf => leaf,
    }
}
