//! Runtime configuration for the stub and admin portals.

use crate::cache::CacheConfig;
use crate::watcher::DEFAULT_WATCH_INTERVAL;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_STUBS_PORT: u16 = 8882;
pub const DEFAULT_ADMIN_PORT: u16 = 8889;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// YAML data file; the server starts empty without one
    pub data_file: Option<PathBuf>,
    pub host: String,
    pub stubs_port: u16,
    pub admin_port: u16,
    pub admin_enabled: bool,
    pub cache: CacheConfig,
    /// Poll interval for the data file watcher, if enabled
    pub watch: Option<Duration>,
    /// Log every incoming request in full
    pub debug_requests: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_file: None,
            host: DEFAULT_HOST.to_string(),
            stubs_port: DEFAULT_STUBS_PORT,
            admin_port: DEFAULT_ADMIN_PORT,
            admin_enabled: true,
            cache: CacheConfig::default(),
            watch: None,
            debug_requests: false,
        }
    }
}

impl ServerConfig {
    pub fn stubs_addr(&self) -> Result<SocketAddr> {
        socket_addr(&self.host, self.stubs_port)
    }

    pub fn admin_addr(&self) -> Result<SocketAddr> {
        socket_addr(&self.host, self.admin_port)
    }

    /// Enable watching with `interval`, or the default interval when `None`.
    pub fn with_watch(mut self, interval: Option<Duration>) -> Self {
        self.watch = Some(interval.unwrap_or(DEFAULT_WATCH_INTERVAL));
        self
    }
}

fn socket_addr(host: &str, port: u16) -> Result<SocketAddr> {
    let host = if host == "localhost" { "127.0.0.1" } else { host };
    format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid listen address {host}:{port}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.stubs_addr().unwrap().port(), 8882);
        assert_eq!(config.admin_addr().unwrap().port(), 8889);
        assert!(config.admin_enabled);
        assert!(config.cache.enabled);
        assert!(config.watch.is_none());
    }

    #[test]
    fn test_localhost_and_invalid_hosts() {
        let config = ServerConfig {
            host: "localhost".to_string(),
            ..Default::default()
        };
        assert_eq!(config.stubs_addr().unwrap().to_string(), "127.0.0.1:8882");

        let config = ServerConfig {
            host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(config.admin_addr().is_err());
    }

    #[test]
    fn test_with_watch_default_interval() {
        let config = ServerConfig::default().with_watch(None);
        assert_eq!(config.watch, Some(Duration::from_millis(100)));
        let config = ServerConfig::default().with_watch(Some(Duration::from_secs(2)));
        assert_eq!(config.watch, Some(Duration::from_secs(2)));
    }
}
