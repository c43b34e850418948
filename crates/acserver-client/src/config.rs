//! Client configuration.
//!
//! A flat key-value document, stored as YAML or JSON depending on the file
//! extension. Missing keys take their defaults.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use openracing_acserver_session::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// A secondary UDP endpoint that receives a copy of every inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPluginConfig {
    /// Local port the relay listens on for the plugin's replies.
    pub listening_port: u16,
    pub remote_host: String,
    pub remote_port: u16,
}

impl ExternalPluginConfig {
    #[must_use]
    pub fn new(listening_port: u16, remote_host: impl Into<String>, remote_port: u16) -> Self {
        Self {
            listening_port,
            remote_host: remote_host.into(),
            remote_port,
        }
    }

    pub fn remote_addr(&self) -> ClientResult<SocketAddr> {
        resolve(&self.remote_host, self.remote_port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Local UDP port the server sends plugin traffic to.
    pub listening_port: u16,
    pub remote_host: String,
    /// The server's plugin command port.
    pub remote_port: u16,
    /// Password for `/admin`; empty disables admin commands.
    pub admin_password: String,
    /// Number of car slots on the server.
    pub capacity: u8,
    pub realtime_update_interval_ms: u32,
    /// Delay before a new-session message rotates the session, in ms.
    pub new_session_start_delay_ms: u64,
    pub log_server_requests: bool,
    pub log_server_errors: bool,
    /// Seconds of silence before the server is probed; 0 disables.
    pub keep_alive_interval_s: u64,
    pub external_plugins: Vec<ExternalPluginConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            listening_port: 11000,
            remote_host: "127.0.0.1".to_string(),
            remote_port: 12000,
            admin_password: String::new(),
            capacity: 24,
            realtime_update_interval_ms: 1000,
            new_session_start_delay_ms: 0,
            log_server_requests: false,
            log_server_errors: true,
            keep_alive_interval_s: 0,
            external_plugins: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for zero ports, zero capacity, or a realtime interval
    /// that does not fit the wire format.
    pub fn validate(&self) -> ClientResult<()> {
        if self.listening_port == 0 {
            return Err(ClientError::invalid_configuration(
                "listening_port must be greater than 0",
            ));
        }
        if self.remote_port == 0 {
            return Err(ClientError::invalid_configuration(
                "remote_port must be greater than 0",
            ));
        }
        if self.remote_host.trim().is_empty() {
            return Err(ClientError::invalid_configuration(
                "remote_host must not be empty",
            ));
        }
        if self.capacity == 0 {
            return Err(ClientError::invalid_configuration(
                "capacity must be between 1 and 255",
            ));
        }
        if u16::try_from(self.realtime_update_interval_ms).is_err() {
            return Err(ClientError::invalid_configuration(format!(
                "realtime_update_interval_ms must be at most {}",
                u16::MAX
            )));
        }
        for plugin in &self.external_plugins {
            if plugin.listening_port == 0 || plugin.remote_port == 0 {
                return Err(ClientError::invalid_configuration(format!(
                    "external plugin {}:{} needs non-zero ports",
                    plugin.remote_host, plugin.remote_port
                )));
            }
            if plugin.listening_port == self.listening_port {
                return Err(ClientError::invalid_configuration(format!(
                    "external plugin listening_port {} collides with the client's",
                    plugin.listening_port
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    #[must_use]
    pub fn realtime_interval_ms(&self) -> u16 {
        u16::try_from(self.realtime_update_interval_ms).unwrap_or(u16::MAX)
    }

    #[must_use]
    pub fn new_session_start_delay(&self) -> Duration {
        Duration::from_millis(self.new_session_start_delay_ms)
    }

    /// `None` when keep-alive supervision is disabled.
    #[must_use]
    pub fn keep_alive_interval(&self) -> Option<Duration> {
        (self.keep_alive_interval_s > 0).then(|| Duration::from_secs(self.keep_alive_interval_s))
    }

    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            capacity: self.capacity,
            realtime_update_interval_ms: self.realtime_interval_ms(),
        }
    }

    pub fn remote_addr(&self) -> ClientResult<SocketAddr> {
        resolve(&self.remote_host, self.remote_port)
    }

    /// Parse and validate a YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed or validated.
    pub fn from_yaml_str(yaml: &str) -> ClientResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> ClientResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Load and validate a configuration file. `.json` files are read as
    /// JSON, anything else as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = if is_json(path) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration, picking the format from the extension.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> ClientResult<()> {
        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            serde_yaml::to_string(self)?
        };
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn resolve(host: &str, port: u16) -> ClientResult<SocketAddr> {
    use std::net::ToSocketAddrs;
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| ClientError::invalid_configuration(format!("cannot resolve {host}:{port}")))
}

/// Builder for `ClientConfig`.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    #[must_use]
    pub fn listening_port(mut self, port: u16) -> Self {
        self.config.listening_port = port;
        self
    }

    #[must_use]
    pub fn remote(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.remote_host = host.into();
        self.config.remote_port = port;
        self
    }

    #[must_use]
    pub fn admin_password(mut self, password: impl Into<String>) -> Self {
        self.config.admin_password = password.into();
        self
    }

    #[must_use]
    pub fn capacity(mut self, capacity: u8) -> Self {
        self.config.capacity = capacity;
        self
    }

    #[must_use]
    pub fn realtime_update_interval_ms(mut self, ms: u32) -> Self {
        self.config.realtime_update_interval_ms = ms;
        self
    }

    #[must_use]
    pub fn new_session_start_delay_ms(mut self, ms: u64) -> Self {
        self.config.new_session_start_delay_ms = ms;
        self
    }

    #[must_use]
    pub fn log_server_requests(mut self, enabled: bool) -> Self {
        self.config.log_server_requests = enabled;
        self
    }

    #[must_use]
    pub fn log_server_errors(mut self, enabled: bool) -> Self {
        self.config.log_server_errors = enabled;
        self
    }

    #[must_use]
    pub fn keep_alive_interval_s(mut self, seconds: u64) -> Self {
        self.config.keep_alive_interval_s = seconds;
        self
    }

    #[must_use]
    pub fn external_plugin(mut self, plugin: ExternalPluginConfig) -> Self {
        self.config.external_plugins.push(plugin);
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> ClientResult<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_defaults_are_valid() -> TestResult {
        let config = ClientConfig::default();
        config.validate()?;
        assert_eq!(config.listening_port, 11000);
        assert_eq!(config.remote_port, 12000);
        assert_eq!(config.capacity, 24);
        assert!(config.keep_alive_interval().is_none());
        Ok(())
    }

    #[test]
    fn test_builder_rejects_bad_values() {
        let rejected = |result: ClientResult<ClientConfig>| {
            matches!(result, Err(ClientError::InvalidConfiguration(_)))
        };
        assert!(rejected(ClientConfig::builder().capacity(0).build()));
        assert!(rejected(ClientConfig::builder().listening_port(0).build()));
        assert!(rejected(
            ClientConfig::builder()
                .realtime_update_interval_ms(70_000)
                .build()
        ));
        assert!(rejected(
            ClientConfig::builder()
                .external_plugin(ExternalPluginConfig::new(11000, "127.0.0.1", 12001))
                .build()
        ));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() -> TestResult {
        let config = ClientConfig::from_yaml_str(
            "listening_port: 13000\nadmin_password: secret\nkeep_alive_interval_s: 30\n",
        )?;
        assert_eq!(config.listening_port, 13000);
        assert_eq!(config.admin_password, "secret");
        assert_eq!(config.remote_host, "127.0.0.1");
        assert_eq!(config.keep_alive_interval(), Some(Duration::from_secs(30)));
        Ok(())
    }

    #[test]
    fn test_store_config_mirrors_client_config() -> TestResult {
        let config = ClientConfig::builder()
            .capacity(12)
            .realtime_update_interval_ms(250)
            .build()?;
        let store = config.store_config();
        assert_eq!(store.capacity, 12);
        assert_eq!(store.realtime_update_interval_ms, 250);
        Ok(())
    }
}
