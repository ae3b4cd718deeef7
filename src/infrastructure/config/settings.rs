use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub rooms: RoomConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Heartbeat interval in seconds (server sends heartbeat frame)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
    /// Connection timeout in seconds (disconnect if no activity)
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    /// Cleanup task interval in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
    /// Upper bound for a single outbound delivery to one connection
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    /// Outbound frames buffered per connection
    #[serde(default = "default_channel_buffer_size")]
    pub channel_buffer_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// "postgres", "memory" or "none"
    #[serde(default = "default_persistence_backend")]
    pub backend: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
    /// Upper bound for a single append before the message is broadcast without it
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomConfig {
    /// Drop a room entry as soon as its last member leaves
    #[serde(default)]
    pub evict_empty: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_heartbeat_interval() -> u64 {
    30 // 30 seconds
}

fn default_connection_timeout() -> u64 {
    120 // 2 minutes
}

fn default_cleanup_interval() -> u64 {
    60 // 1 minute
}

fn default_send_timeout_ms() -> u64 {
    1000
}

fn default_channel_buffer_size() -> usize {
    32
}

fn default_persistence_backend() -> String {
    "none".to_string()
}

fn default_pool_size() -> u32 {
    5
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    300
}

fn default_write_timeout_ms() -> u64 {
    2000
}

/// Prefix for environment overrides, e.g. `RELAY_PERSISTENCE__WRITE_TIMEOUT_MS=500`
const ENV_PREFIX: &str = "RELAY";

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        Self::load(&run_mode, Self::environment())
    }

    /// Environment source: `RELAY_<SECTION>__<FIELD>`. Only `cors_origins` is split on commas.
    pub fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("server.cors_origins")
    }

    /// Defaults, then `config/default`, then `config/{run_mode}`, then the environment
    pub fn load(run_mode: &str, environment: Environment) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8081)?
            .set_default("persistence.backend", "none")?
            .set_default("rooms.evict_empty", false)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(environment);

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: default_heartbeat_interval(),
            connection_timeout: default_connection_timeout(),
            cleanup_interval: default_cleanup_interval(),
            send_timeout_ms: default_send_timeout_ms(),
            channel_buffer_size: default_channel_buffer_size(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: default_persistence_backend(),
            url: String::new(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8081);

        let persistence = PersistenceConfig::default();
        assert_eq!(persistence.backend, "none");
        assert_eq!(persistence.write_timeout_ms, 2000);

        assert!(!RoomConfig::default().evict_empty);
    }

    #[test]
    fn test_server_addr() {
        let settings = Settings::default();
        assert_eq!(settings.server_addr(), "0.0.0.0:8081");
    }

    fn load_with_env(vars: &[(&str, &str)]) -> Settings {
        let source = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Settings::load("test", Settings::environment().source(Some(source))).unwrap()
    }

    #[test]
    fn test_environment_overrides_nested_fields() {
        let settings = load_with_env(&[
            ("RELAY_PERSISTENCE__BACKEND", "memory"),
            ("RELAY_PERSISTENCE__URL", "postgres://relay:secret@db:5432/chat"),
            ("RELAY_PERSISTENCE__WRITE_TIMEOUT_MS", "77"),
            ("RELAY_WEBSOCKET__SEND_TIMEOUT_MS", "250"),
            ("RELAY_ROOMS__EVICT_EMPTY", "true"),
            ("RELAY_SERVER__PORT", "9000"),
        ]);

        assert_eq!(settings.persistence.backend, "memory");
        assert_eq!(settings.persistence.url, "postgres://relay:secret@db:5432/chat");
        assert_eq!(settings.persistence.write_timeout_ms, 77);
        assert_eq!(settings.websocket.send_timeout_ms, 250);
        assert!(settings.rooms.evict_empty);
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    #[test]
    fn test_environment_cors_origins_list() {
        let settings = load_with_env(&[(
            "RELAY_SERVER__CORS_ORIGINS",
            "http://localhost:3000,https://chat.example.com",
        )]);

        assert_eq!(
            settings.server.cors_origins,
            vec!["http://localhost:3000", "https://chat.example.com"]
        );
    }

    #[test]
    fn test_unrelated_environment_is_ignored() {
        let settings = load_with_env(&[("PATH", "/usr/bin:/bin"), ("HOME", "/root")]);

        assert_eq!(settings.persistence.backend, "none");
        assert_eq!(settings.server.port, 8081);
    }

    #[test]
    fn test_partial_section_uses_field_defaults() {
        let websocket: WebSocketConfig =
            serde_json::from_str(r#"{"send_timeout_ms": 250}"#).unwrap();
        assert_eq!(websocket.send_timeout_ms, 250);
        assert_eq!(websocket.heartbeat_interval, 30);
        assert_eq!(websocket.channel_buffer_size, 32);
    }
}
