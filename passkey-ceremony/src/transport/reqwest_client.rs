use reqwest::{Client, Request};
use serde_json::Value;
use url::Url;

use crate::CeremonyError;

use super::{RequestHeaders, Transport};

fn build_request(
    client: &Client,
    url: &Url,
    headers: &RequestHeaders,
    body: &Value,
) -> Result<Request, CeremonyError> {
    let mut builder = client.post(url.clone());
    for (name, value) in headers.iter() {
        builder = builder.header(name, value);
    }

    builder
        .body(serde_json::to_vec(body)?)
        .build()
        .map_err(|e| transport_error(url, e))
}

fn transport_error(url: &Url, error: reqwest::Error) -> CeremonyError {
    CeremonyError::Transport {
        url: url.to_string(),
        message: error.to_string(),
    }
}

#[async_trait::async_trait]
impl Transport for Client {
    async fn post_json(
        &self,
        url: &Url,
        headers: &RequestHeaders,
        body: &Value,
    ) -> Result<Value, CeremonyError> {
        let request = build_request(self, url, headers, body)?;

        let response = self
            .execute(request)
            .await
            .map_err(|e| transport_error(url, e))?;

        log::debug!("{url} answered with {}", response.status());

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(url, e))?;

        serde_json::from_slice(&body).map_err(|source| CeremonyError::MalformedResponse {
            url: url.to_string(),
            source,
        })
    }
}
