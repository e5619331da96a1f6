//! Middleware implementation for reqwest.

use anyhow::anyhow;
use async_trait::async_trait;
use http::header::{HeaderValue, USER_AGENT};
use rand::Rng;
use reqwest_middleware::{Error, Middleware, Next, Result};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

/// Pick one of the bundled desktop browser user agents.
pub fn random_user_agent() -> &'static str {
    let idx = rand::rng().random_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

/// Middleware that sends every request with a randomly chosen browser
/// `User-Agent`, unless the request already carries one.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserAgentRotation;

#[async_trait]
impl Middleware for UserAgentRotation {
    async fn handle(
        &self,
        mut req: reqwest::Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<reqwest::Response> {
        if !req.headers().contains_key(USER_AGENT) {
            let agent = random_user_agent();
            let value = HeaderValue::from_str(agent)
                .map_err(|e| Error::Middleware(anyhow!("invalid user agent {:?}: {}", agent, e)))?;
            req.headers_mut().insert(USER_AGENT, value);
        }
        next.run(req, extensions).await
    }
}
