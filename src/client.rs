//! reqwest-backed search client routed through pool proxies.

use crate::config::RotationConfig;
use crate::error::TaskError;
use crate::middleware::UserAgentRotation;
use crate::proxy::ProxyHandle;
use crate::task::{Credentials, SearchBackend, Task};

use async_trait::async_trait;
use http::header::{ACCEPT, CONTENT_TYPE, ORIGIN, REFERER};
use log::{error, warn};
use regex::Regex;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde_json::{json, Value};
use std::sync::LazyLock;
use std::time::Duration;

static CLIENT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"CF_ACCESS_CLIENT_ID:\s*"([^"]+)""#).unwrap());
static CLIENT_SECRET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"CF_ACCESS_CLIENT_SECRET:\s*"([^"]+)""#).unwrap());

const PLAYGROUND_ORIGIN: &str = "https://playground.netnut.io";
const PLAYGROUND_REFERER: &str = "https://playground.netnut.io/playground/";

/// Pull the access keys out of the playground's JavaScript bundle.
pub fn extract_credentials(script: &str) -> Option<Credentials> {
    let client_id = CLIENT_ID_RE.captures(script)?.get(1)?.as_str();
    let client_secret = CLIENT_SECRET_RE.captures(script)?.get(1)?.as_str();
    Some(Credentials {
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
    })
}

/// Search request body for `query`.
pub fn search_payload(query: &str) -> Value {
    json!({
        "googleDomain": "www.google.com",
        "gl": "us",
        "hl": "en",
        "uule": "w+CAIQICIeTmFudGVzLFBheXMgZGUgbGEgTG9pcmUsRnJhbmNl",
        "q": query,
        "start": 0,
        "sum": 10,
        "safe": true,
        "filter": false,
        "nfpr": false,
        "captchaToken": "",
        "device": "desktop"
    })
}

/// Talks to the search playground, one short-lived client per proxy.
#[derive(Debug, Clone)]
pub struct PlaygroundClient {
    credentials_url: String,
    search_url: String,
    timeout: Duration,
}

impl PlaygroundClient {
    pub fn new(config: &RotationConfig) -> Self {
        Self {
            credentials_url: config.credentials_url.clone(),
            search_url: config.search_url.clone(),
            timeout: config.request_timeout,
        }
    }

    /// Build a client whose every request goes through `proxy`.
    fn client_for(&self, proxy: &ProxyHandle) -> Result<ClientWithMiddleware, TaskError> {
        let reqwest_proxy = proxy
            .to_reqwest_proxy()
            .map_err(|e| TaskError::transport(proxy.id(), e))?;

        let client = reqwest::Client::builder()
            .proxy(reqwest_proxy)
            .timeout(self.timeout)
            .build()
            .map_err(|e| TaskError::transport(proxy.id(), e))?;

        Ok(ClientBuilder::new(client).with(UserAgentRotation).build())
    }
}

#[async_trait]
impl SearchBackend for PlaygroundClient {
    async fn derive_credentials(&self, proxy: &ProxyHandle) -> Result<Credentials, TaskError> {
        let client = self.client_for(proxy)?;
        let body = async {
            let response = client
                .get(&self.credentials_url)
                .header(REFERER, PLAYGROUND_REFERER)
                .send()
                .await?;
            Ok::<_, reqwest_middleware::Error>(response.text().await?)
        }
        .await
        .map_err(|e| {
            error!("Access key request failed for proxy {}: {}", proxy, e);
            TaskError::transport(proxy.id(), e)
        })?;

        extract_credentials(&body).ok_or_else(|| {
            warn!("Keys not found for proxy: {}. Retrying...", proxy);
            TaskError::CredentialExtractionFailed {
                proxy: proxy.id().to_string(),
            }
        })
    }

    async fn execute(
        &self,
        task: &Task,
        credentials: &Credentials,
        proxy: &ProxyHandle,
    ) -> Result<Value, TaskError> {
        let client = self.client_for(proxy)?;
        let payload = search_payload(task.id()).to_string();

        let response = client
            .post(&self.search_url)
            .header(ACCEPT, "application/json, text/plain, */*")
            .header(CONTENT_TYPE, "application/json")
            .header(ORIGIN, PLAYGROUND_ORIGIN)
            .header(REFERER, format!("{}/", PLAYGROUND_ORIGIN))
            .header("cf-access-client-id", credentials.client_id.as_str())
            .header("cf-access-client-secret", credentials.client_secret.as_str())
            .body(payload)
            .send()
            .await
            .map_err(|e| TaskError::transport(proxy.id(), e))?;

        response
            .json::<Value>()
            .await
            .map_err(|e| TaskError::transport(proxy.id(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_both_keys() {
        let script = r#"...,e.env={CF_ACCESS_CLIENT_ID: "abc.access",CF_ACCESS_CLIENT_SECRET:"s3cr3t"},..."#;
        let creds = extract_credentials(script).unwrap();
        assert_eq!(creds.client_id, "abc.access");
        assert_eq!(creds.client_secret, "s3cr3t");
    }

    #[test]
    fn missing_secret_yields_none() {
        assert!(extract_credentials(r#"CF_ACCESS_CLIENT_ID: "abc""#).is_none());
        assert!(extract_credentials("<html>captcha</html>").is_none());
    }

    #[test]
    fn payload_carries_query() {
        let payload = search_payload("nana7");
        assert_eq!(payload["q"], "nana7");
        assert_eq!(payload["device"], "desktop");
        assert_eq!(payload["sum"], 10);
    }

    #[test]
    fn debug_output_hides_secret() {
        let creds = Credentials {
            client_id: "id".into(),
            client_secret: "hunter2".into(),
        };
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
