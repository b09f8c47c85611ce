//! Controller values as supplied by the host page, and their resolution into an effective
//! configuration.

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Default endpoint for posting an authentication response.
pub const DEFAULT_REQUEST_RESULT_URL: &str = "/request";
/// Default endpoint for fetching authentication options.
pub const DEFAULT_REQUEST_OPTIONS_URL: &str = "/request/options";
/// Default endpoint for posting a registration response.
pub const DEFAULT_CREATION_RESULT_URL: &str = "/creation";
/// Default endpoint for fetching registration options.
pub const DEFAULT_CREATION_OPTIONS_URL: &str = "/creation/options";

/// Raw controller values, exactly as the host markup provides them. Every value is optional and
/// an empty string is treated the same as an absent one.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
#[typeshare]
pub struct ControllerValues {
    /// Endpoint receiving the authentication response.
    pub request_result_url: Option<String>,
    /// Endpoint providing the authentication options.
    pub request_options_url: Option<String>,
    /// Where to go after a successful authentication.
    pub request_success_redirect_uri: Option<String>,
    /// Endpoint receiving the registration response.
    pub creation_result_url: Option<String>,
    /// Endpoint providing the registration options.
    pub creation_options_url: Option<String>,
    /// Where to go after a successful registration.
    pub creation_success_redirect_uri: Option<String>,
    /// Form field holding the username.
    pub username_field: Option<String>,
    /// Form field holding the display name.
    pub display_name_field: Option<String>,
    /// Form field holding the attestation conveyance preference.
    pub attestation_field: Option<String>,
    /// Form field holding the user verification requirement.
    pub user_verification_field: Option<String>,
    /// Form field holding the resident key requirement.
    pub resident_key_field: Option<String>,
    /// Form field holding the authenticator attachment preference.
    pub authenticator_attachment_field: Option<String>,
}

impl ControllerValues {
    /// Parse controller values from a JSON document with camelCase keys.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// The endpoints and redirect targets in effect for a controller. This is also the detail of the
/// `webauthn:connect` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct ConnectOptions {
    /// Endpoint receiving the authentication response.
    pub request_result_url: String,
    /// Endpoint providing the authentication options.
    pub request_options_url: String,
    /// Replacement location after a successful authentication, if any.
    pub request_success_redirect_uri: Option<String>,
    /// Endpoint receiving the registration response.
    pub creation_result_url: String,
    /// Endpoint providing the registration options.
    pub creation_options_url: String,
    /// Replacement location after a successful registration, if any.
    pub creation_success_redirect_uri: Option<String>,
}

/// Names of the form fields the payload is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct FieldNames {
    pub username: String,
    pub display_name: String,
    pub attestation: String,
    pub user_verification: String,
    pub resident_key: String,
    pub authenticator_attachment: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            username: "username".into(),
            display_name: "displayName".into(),
            attestation: "attestation".into(),
            user_verification: "userVerification".into(),
            resident_key: "residentKey".into(),
            authenticator_attachment: "authenticatorAttachment".into(),
        }
    }
}

/// Effective configuration of a controller, with every default already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Endpoints and redirects, as announced on connect.
    pub endpoints: ConnectOptions,
    /// Form fields the payload is read from.
    pub fields: FieldNames,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::resolve(ControllerValues::default())
    }
}

impl ControllerConfig {
    /// Apply the documented defaults to whatever the host left unset.
    pub fn resolve(values: ControllerValues) -> Self {
        let defaults = FieldNames::default();
        Self {
            endpoints: ConnectOptions {
                request_result_url: or_default(
                    values.request_result_url,
                    DEFAULT_REQUEST_RESULT_URL,
                ),
                request_options_url: or_default(
                    values.request_options_url,
                    DEFAULT_REQUEST_OPTIONS_URL,
                ),
                request_success_redirect_uri: non_empty(values.request_success_redirect_uri),
                creation_result_url: or_default(
                    values.creation_result_url,
                    DEFAULT_CREATION_RESULT_URL,
                ),
                creation_options_url: or_default(
                    values.creation_options_url,
                    DEFAULT_CREATION_OPTIONS_URL,
                ),
                creation_success_redirect_uri: non_empty(values.creation_success_redirect_uri),
            },
            fields: FieldNames {
                username: or_default(values.username_field, &defaults.username),
                display_name: or_default(values.display_name_field, &defaults.display_name),
                attestation: or_default(values.attestation_field, &defaults.attestation),
                user_verification: or_default(
                    values.user_verification_field,
                    &defaults.user_verification,
                ),
                resident_key: or_default(values.resident_key_field, &defaults.resident_key),
                authenticator_attachment: or_default(
                    values.authenticator_attachment_field,
                    &defaults.authenticator_attachment,
                ),
            },
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn or_default(value: Option<String>, default: &str) -> String {
    non_empty(value).unwrap_or_else(|| default.to_owned())
}
