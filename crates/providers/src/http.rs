//! Shared plumbing for the HTTP provider adapters.

use crate::error::{classify_response, ProviderError};

/// Base settings for one HTTP provider.
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    pub base_url: String,
    pub api_key: String,
}

impl HttpProviderConfig {
    /// Read `<PREFIX>_BASE_URL` and `<PREFIX>_API_KEY`.
    pub fn from_env(prefix: &str) -> Result<Self, ProviderError> {
        let base_url = require(&format!("{prefix}_BASE_URL"))?;
        let api_key = require(&format!("{prefix}_API_KEY"))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

fn require(var: &str) -> Result<String, ProviderError> {
    std::env::var(var).map_err(|_| ProviderError::permanent(format!("{var} not set")))
}

/// POST a JSON body and decode a JSON response, classifying HTTP errors.
pub(crate) async fn post_json<Req, Resp>(
    client: &reqwest::Client,
    config: &HttpProviderConfig,
    path: &str,
    body: &Req,
) -> Result<Resp, ProviderError>
where
    Req: serde::Serialize,
    Resp: serde::de::DeserializeOwned,
{
    let url = format!("{}{}", config.base_url, path);
    let response = client
        .post(&url)
        .bearer_auth(&config.api_key)
        .json(body)
        .send()
        .await?;

    decode(response).await
}

/// GET a JSON response, classifying HTTP errors.
pub(crate) async fn get_json<Resp>(
    client: &reqwest::Client,
    config: &HttpProviderConfig,
    path: &str,
) -> Result<Resp, ProviderError>
where
    Resp: serde::de::DeserializeOwned,
{
    let url = format!("{}{}", config.base_url, path);
    let response = client.get(&url).bearer_auth(&config.api_key).send().await?;
    decode(response).await
}

/// GET raw bytes (artifact downloads).
pub(crate) async fn get_bytes(
    client: &reqwest::Client,
    config: &HttpProviderConfig,
    path: &str,
) -> Result<Vec<u8>, ProviderError> {
    let url = format!("{}{}", config.base_url, path);
    let response = client.get(&url).bearer_auth(&config.api_key).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_response(status, &body));
    }
    Ok(response.bytes().await?.to_vec())
}

async fn decode<Resp: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Resp, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_response(status, &body));
    }
    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| ProviderError::permanent(format!("malformed provider response: {e}")))
}
