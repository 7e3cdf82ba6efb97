use std::time::Duration;

// ============================================================================
// Configuration - environment variables with sensible local defaults
// ============================================================================

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_host: String,
    pub http_port: u16,
    pub metrics_port: u16,
    pub scylla_node: String,
    pub keyspace: String,
    pub kafka_brokers: String,
    pub publish_timeout: Duration,
    pub sweep_poll_interval: Duration,
    pub sweep_max_attempts: i32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            http_host: env_or("HTTP_HOST", "0.0.0.0"),
            http_port: env_parse("HTTP_PORT", 8080),
            metrics_port: env_parse("METRICS_PORT", 9090),
            scylla_node: env_or("SCYLLA_NODE", "127.0.0.1:9042"),
            keyspace: env_or("SCYLLA_KEYSPACE", "orders_ks"),
            kafka_brokers: env_or("KAFKA_BROKER", "127.0.0.1:9092"),
            publish_timeout: Duration::from_secs(env_parse("PUBLISH_TIMEOUT_SECS", 5)),
            sweep_poll_interval: Duration::from_secs(env_parse("SWEEP_INTERVAL_SECS", 2)),
            sweep_max_attempts: env_parse("SWEEP_MAX_ATTEMPTS", 10),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_env() {
        let config = AppConfig::from_env();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.keyspace, "orders_ks");
        assert_eq!(config.publish_timeout, Duration::from_secs(5));
        assert_eq!(config.sweep_max_attempts, 10);
    }
}
