//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::cache::EvictionPolicy;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the listener binds to
    pub bind_addr: IpAddr,
    /// HTTP server port
    pub server_port: u16,
    /// Freshness window of cached values, in seconds
    pub cache_ttl: u64,
    /// Maximum number of cache entries, 0 = unbounded
    pub max_entries: usize,
    /// Behavior when a new key arrives at capacity
    pub eviction_policy: EvictionPolicy,
    /// Bound on an origin fetch, in milliseconds
    pub fetch_timeout_ms: u64,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Key used when a request carries none
    pub default_key: String,
    /// Upstream origin; the clock origin is used when unset
    pub origin_url: Option<String>,
    /// Simulated clock origin latency, in milliseconds
    pub origin_latency_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `BIND_ADDR` - Listener address (default: 0.0.0.0)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CACHE_TTL` - Freshness in seconds (default: 60)
    /// - `MAX_ENTRIES` - Maximum cache entries, 0 = unbounded (default: 1000)
    /// - `EVICTION_POLICY` - `lru` or `reject` (default: lru)
    /// - `FETCH_TIMEOUT_MS` - Origin fetch bound, must be non-zero (default: 5000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    /// - `DEFAULT_KEY` - Key for requests without one (default: "default")
    /// - `ORIGIN_URL` - Upstream origin URL (default: unset)
    /// - `ORIGIN_LATENCY_MS` - Clock origin latency (default: 0)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: parse_var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cache_ttl: parse_var("CACHE_TTL").unwrap_or(defaults.cache_ttl),
            max_entries: parse_var("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            eviction_policy: env::var("EVICTION_POLICY")
                .ok()
                .and_then(|v| {
                    let policy = EvictionPolicy::parse(&v);
                    if policy.is_none() {
                        warn!(value = %v, "ignoring unknown EVICTION_POLICY");
                    }
                    policy
                })
                .unwrap_or(defaults.eviction_policy),
            fetch_timeout_ms: parse_var::<u64>("FETCH_TIMEOUT_MS")
                .filter(|ms| {
                    if *ms == 0 {
                        warn!("ignoring FETCH_TIMEOUT_MS=0, every fetch would time out");
                    }
                    *ms > 0
                })
                .unwrap_or(defaults.fetch_timeout_ms),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            default_key: env::var("DEFAULT_KEY")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.default_key),
            origin_url: env::var("ORIGIN_URL").ok().filter(|v| !v.is_empty()),
            origin_latency_ms: parse_var("ORIGIN_LATENCY_MS").unwrap_or(defaults.origin_latency_ms),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.server_port)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(name, value = %raw, "ignoring unparseable environment variable");
            None
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            server_port: 3000,
            cache_ttl: 60,
            max_entries: 1000,
            eviction_policy: EvictionPolicy::Lru,
            fetch_timeout_ms: 5000,
            cleanup_interval: 1,
            default_key: "default".to_string(),
            origin_url: None,
            origin_latency_ms: 0,
        }
    }
}
