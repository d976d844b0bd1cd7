//! Server configuration from environment variables

use std::time::Duration;

/// Environment variables recognized by the server
pub const ENV_BIND: &str = "ARCHIHUB_BIND";
pub const ENV_PORT: &str = "ARCHIHUB_PORT";
pub const ENV_RATE_LIMIT: &str = "ARCHIHUB_RATE_LIMIT";
pub const ENV_OP_TTL_SECS: &str = "ARCHIHUB_OP_TTL_SECS";
pub const ENV_FAST: &str = "ARCHIHUB_FAST";

/// Recognized by clients rather than the server; listed here so `--help`
/// style output can document the full contract
pub const ENV_CLIENT_BASE_URL: &str = "ARCHIHUB_BASE_URL";
pub const ENV_CLIENT_TIMEOUT_MS: &str = "ARCHIHUB_TIMEOUT_MS";

/// Maximum request body accepted before enqueue
pub const MAX_BODY_BYTES: usize = 1024 * 1024; // 1MB

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Local-only by default
    pub bind: String,
    pub port: u16,
    /// Apply submissions per minute; 0 disables the throttle
    pub rate_limit_per_min: u32,
    /// Retention of terminal operation records
    pub op_ttl: Duration,
    /// Throughput profile: wide chunks, no ghost verification, no throttle
    pub fast: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8765,
            rate_limit_per_min: 200,
            op_ttl: Duration::from_secs(15 * 60),
            fast: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let fast = std::env::var(ENV_FAST)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let mut config = Self {
            bind: std::env::var(ENV_BIND).unwrap_or(defaults.bind),
            port: parse_env(ENV_PORT).unwrap_or(defaults.port),
            rate_limit_per_min: parse_env(ENV_RATE_LIMIT).unwrap_or(defaults.rate_limit_per_min),
            op_ttl: parse_env(ENV_OP_TTL_SECS)
                .map(Duration::from_secs)
                .unwrap_or(defaults.op_ttl),
            fast,
        };
        if config.fast {
            // Throughput mode also drops the submission throttle
            config.rate_limit_per_min = 0;
        }
        config
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_loopback() {
        let config = ServerConfig::default();
        assert_eq!(config.bind, "127.0.0.1");
        assert_eq!(config.port, 8765);
        assert_eq!(config.rate_limit_per_min, 200);
        assert!(!config.fast);
    }
}
