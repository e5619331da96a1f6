//! Proxy representation and usage state.

use std::fmt;
use tokio::time::Instant;
use url::Url;

/// Usage and ban state of one proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    /// The endpoint as listed in the source (e.g. "10.0.0.1:8080").
    pub endpoint: String,
    /// When the proxy was last handed out or completed a task; `None` if never.
    pub last_used: Option<Instant>,
    /// The proxy is excluded from selection until this instant.
    pub banned_until: Option<Instant>,
}

impl Proxy {
    /// Create a never-used, unbanned proxy.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            last_used: None,
            banned_until: None,
        }
    }

    /// Whether the proxy may be selected at `now`.
    ///
    /// A ban ends exactly at its deadline.
    pub fn is_available(&self, now: Instant) -> bool {
        self.banned_until.is_none_or(|until| until <= now)
    }

    /// Whether a ban is still running at `now`.
    pub fn is_banned(&self, now: Instant) -> bool {
        !self.is_available(now)
    }

    pub(crate) fn handle(&self) -> ProxyHandle {
        ProxyHandle {
            endpoint: self.endpoint.clone(),
        }
    }
}

/// What a caller receives from `ProxyPool::acquire`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyHandle {
    endpoint: String,
}

impl ProxyHandle {
    /// The pool key of this proxy.
    pub fn id(&self) -> &str {
        &self.endpoint
    }

    /// The proxy URL; bare `host:port` endpoints are routed over plain HTTP.
    pub fn url(&self) -> Result<Url, url::ParseError> {
        if self.endpoint.contains("://") {
            Url::parse(&self.endpoint)
        } else {
            Url::parse(&format!("http://{}", self.endpoint))
        }
    }

    /// Convert to a reqwest proxy covering both HTTP and HTTPS traffic.
    pub fn to_reqwest_proxy(&self) -> Result<reqwest::Proxy, reqwest::Error> {
        match self.url() {
            Ok(url) => reqwest::Proxy::all(url),
            Err(_) => reqwest::Proxy::all(self.endpoint.as_str()),
        }
    }
}

impl fmt::Display for ProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn bare_endpoint_gets_http_scheme() {
        let handle = Proxy::new("127.0.0.1:8080").handle();
        assert_eq!(handle.url().unwrap().as_str(), "http://127.0.0.1:8080/");
        assert_eq!(handle.id(), "127.0.0.1:8080");
    }

    #[test]
    fn explicit_scheme_is_kept() {
        let handle = Proxy::new("socks5://127.0.0.1:1080").handle();
        assert_eq!(handle.url().unwrap().scheme(), "socks5");
    }

    #[test]
    fn ban_ends_at_deadline() {
        let now = Instant::now();
        let mut proxy = Proxy::new("a:1");
        assert!(proxy.is_available(now));

        proxy.banned_until = Some(now + Duration::from_secs(180));
        assert!(proxy.is_banned(now + Duration::from_secs(179)));
        assert!(proxy.is_available(now + Duration::from_secs(180)));
    }
}
