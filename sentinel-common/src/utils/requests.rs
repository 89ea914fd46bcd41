use std::time::Duration;

use cached::proc_macro::cached;
use lazy_static::lazy_static;
use serde::de::DeserializeOwned;

/// Upstream calls that take longer than this are treated as failed
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

lazy_static! {
    static ref CLIENT: reqwest::Client = reqwest::Client::builder()
        .user_agent("DeFi Sentinel")
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("Failed to create reqwest client");
}

pub fn get_reqwest_client() -> &'static reqwest::Client {
    &CLIENT
}

async fn _get_internal(
    uri: &str,
    api_key: Option<&str>,
) -> Result<serde_json::Value, anyhow::Error> {
    let mut request = get_reqwest_client().get(uri);
    if let Some(api_key) = api_key {
        request = request.header("X-API-KEY", api_key);
    }
    Ok(request.send().await?.error_for_status()?.json().await?)
}

#[cached(time = 3600, result = true, size = 200)]
async fn _get_with_key_cached_1h(
    uri: String,
    api_key: String,
) -> Result<serde_json::Value, anyhow::Error> {
    _get_internal(&uri, Some(&api_key)).await
}

pub async fn get_not_cached<O: DeserializeOwned>(uri: &str) -> Result<O, anyhow::Error> {
    let res = _get_internal(uri, None).await?;
    Ok(serde_json::from_value(res)?)
}

/// For APIs that authenticate with an `X-API-KEY` header
pub async fn get_with_key_cached_1h<O: DeserializeOwned>(
    uri: &str,
    api_key: &str,
) -> Result<O, anyhow::Error> {
    let res = _get_with_key_cached_1h(uri.to_string(), api_key.to_string()).await?;
    Ok(serde_json::from_value(res)?)
}
