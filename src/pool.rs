//! Core proxy pool implementation.

use crate::config::DEFAULT_BAN_DURATION;
use crate::error::{NoAvailableProxies, NoProxiesLoaded};
use crate::proxy::{Proxy, ProxyHandle};
use crate::utils;

use log::{debug, info, warn};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// A fixed set of proxies rotated in least-recently-used order.
///
/// Every read and write goes through one lock, so selecting a proxy and
/// marking it used happen atomically with respect to other workers. The lock
/// is never held across an await point.
pub struct ProxyPool {
    /// All proxies in the pool, in source order.
    proxies: Mutex<Vec<Proxy>>,
    /// Cooldown applied by `ban`.
    ban_duration: Duration,
}

impl ProxyPool {
    /// Load the pool from a newline-delimited file or URL.
    pub async fn load(source: &str) -> Result<Self, NoProxiesLoaded> {
        Self::load_with_timeout(source, DEFAULT_LOAD_TIMEOUT).await
    }

    /// Load the pool, giving up on a URL source after `timeout`.
    pub async fn load_with_timeout(source: &str, timeout: Duration) -> Result<Self, NoProxiesLoaded> {
        let content = utils::read_proxy_source(source, timeout)
            .await
            .map_err(|reason| {
                warn!("Proxies source '{}' could not be read: {}", source, reason);
                NoProxiesLoaded {
                    origin: source.to_string(),
                    reason,
                }
            })?;

        let pool = Self::from_endpoints(utils::parse_proxy_list(&content)).map_err(|mut e| {
            e.origin = source.to_string();
            e
        })?;
        info!("Loaded {} proxies from {}", pool.len(), source);
        Ok(pool)
    }

    /// Build a pool from endpoints already in memory.
    pub fn from_endpoints<I, S>(endpoints: I) -> Result<Self, NoProxiesLoaded>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut proxies: Vec<Proxy> = Vec::new();
        for endpoint in endpoints {
            let endpoint = endpoint.into();
            if !proxies.iter().any(|p| p.endpoint == endpoint) {
                proxies.push(Proxy::new(endpoint));
            }
        }

        if proxies.is_empty() {
            warn!("No proxies loaded");
            return Err(NoProxiesLoaded {
                origin: "memory".to_string(),
                reason: "no endpoints listed".to_string(),
            });
        }

        Ok(Self {
            proxies: Mutex::new(proxies),
            ban_duration: DEFAULT_BAN_DURATION,
        })
    }

    /// Override the cooldown used by `ban`.
    pub fn with_ban_duration(mut self, duration: Duration) -> Self {
        self.ban_duration = duration;
        self
    }

    /// Number of proxies in the pool.
    pub fn len(&self) -> usize {
        self.proxies.lock().len()
    }

    /// Always false; an empty pool cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.proxies.lock().is_empty()
    }

    /// Hand out the unbanned proxy that was used longest ago.
    ///
    /// Ties go to the proxy listed first. The winner's `last_used` is set to
    /// now before the lock is released, so concurrent callers never receive
    /// the same proxy from one selection round.
    pub fn acquire(&self) -> Result<ProxyHandle, NoAvailableProxies> {
        let mut proxies = self.proxies.lock();
        let now = Instant::now();

        let selected = proxies
            .iter_mut()
            .filter(|p| p.is_available(now))
            .min_by_key(|p| p.last_used)
            .ok_or(NoAvailableProxies)?;

        selected.last_used = Some(now);
        Ok(selected.handle())
    }

    /// Mark a proxy as just used.
    pub fn touch(&self, id: &str) {
        let mut proxies = self.proxies.lock();
        if let Some(proxy) = proxies.iter_mut().find(|p| p.endpoint == id) {
            proxy.last_used = Some(Instant::now());
            debug!("Updated proxy usage: {}", id);
        }
    }

    /// Ban a proxy for the pool's configured cooldown.
    pub fn ban(&self, id: &str) {
        self.ban_for(id, self.ban_duration);
    }

    /// Ban a proxy for `duration` from now.
    pub fn ban_for(&self, id: &str, duration: Duration) {
        let until = {
            let mut proxies = self.proxies.lock();
            let Some(proxy) = proxies.iter_mut().find(|p| p.endpoint == id) else {
                warn!("Ignoring ban of unknown proxy {}", id);
                return;
            };
            let until = Instant::now() + duration;
            proxy.banned_until = Some(until);
            until
        };

        let wall_clock = chrono::Duration::from_std(until.saturating_duration_since(Instant::now()))
            .map(|d| chrono::Local::now() + d)
            .unwrap_or_else(|_| chrono::Local::now());
        warn!(
            "Proxy {} banned until {} due to failure.",
            id,
            wall_clock.format("%Y-%m-%d %H:%M:%S")
        );
    }

    /// Time until the soonest running ban ends; zero if nothing is banned.
    pub fn min_wait_until_unban(&self) -> Duration {
        let proxies = self.proxies.lock();
        let now = Instant::now();
        proxies
            .iter()
            .filter_map(|p| p.banned_until)
            .filter(|until| *until > now)
            .min()
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Get statistics about the pool: `(total, available)`.
    pub fn stats(&self) -> (usize, usize) {
        let proxies = self.proxies.lock();
        let now = Instant::now();
        let available = proxies.iter().filter(|p| p.is_available(now)).count();
        (proxies.len(), available)
    }

    /// Copy of the current state of every proxy, in source order.
    pub fn snapshot(&self) -> Vec<Proxy> {
        self.proxies.lock().clone()
    }
}
