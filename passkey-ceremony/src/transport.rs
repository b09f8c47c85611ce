use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use typeshare::typeshare;
use url::Url;

use crate::CeremonyError;

mod reqwest_client;

/// Headers sent with a request to the Relying Party, in the order they are set.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
#[typeshare(serialized_as = "HashMap<String, String>")]
pub struct RequestHeaders(IndexMap<String, String>);

impl RequestHeaders {
    /// The headers of every ceremony request: a JSON body.
    pub fn json() -> Self {
        let mut headers = IndexMap::new();
        headers.insert("Content-Type".to_owned(), "application/json".to_owned());
        Self(headers)
    }

    /// Value of a header, matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Iterate over name/value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Posts ceremony data to a Relying Party.
///
/// The implementer should take the following into consideration:
/// * Send every header given, the body is already JSON
/// * Return whatever JSON the endpoint answers with, regardless of the status code. The
///   Relying Party reports rejections inside the body.
/// * Report a body that does not parse as JSON as [`CeremonyError::MalformedResponse`]
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
#[async_trait::async_trait]
pub trait Transport {
    /// POST `body` as JSON to `url` and parse the response body as JSON.
    async fn post_json(
        &self,
        url: &Url,
        headers: &RequestHeaders,
        body: &Value,
    ) -> Result<Value, CeremonyError>;
}
