// MIT License - Copyright (c) 2026 Peter Wright
// Client configuration

use std::time::Duration;

use crate::constants::DEFAULT_PORT;
use crate::error::{Result, TpiError};

/// Configuration for connecting to an EnvisaLink module.
#[derive(Debug, Clone)]
pub struct TpiConfig {
    /// Module host name or IP address
    pub host: String,
    /// TPI port (default: 4025)
    pub port: u16,
    /// TPI password (default: user)
    pub password: String,
    /// Highest zone number tracked
    pub zones: u32,
    /// Highest partition number tracked
    pub partitions: u32,
    /// Capacity of the broadcast event channel
    pub event_capacity: usize,
    /// How long `disconnect` waits for the panel to close its side
    pub disconnect_timeout_ms: u64,
}

impl Default for TpiConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            password: "user".to_string(),
            zones: 64,
            partitions: 8,
            event_capacity: 256,
            disconnect_timeout_ms: 10000,
        }
    }
}

impl TpiConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> TpiConfigBuilder {
        TpiConfigBuilder::default()
    }

    /// `host:port` for the TCP connect.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }

    /// Reject settings the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |details: &str| -> Result<()> {
            Err(TpiError::InvalidConfig {
                details: details.to_string(),
            })
        };
        if self.host.trim().is_empty() {
            return invalid("host is required");
        }
        if self.password.is_empty() {
            return invalid("password is required");
        }
        if self.zones == 0 {
            return invalid("zone count must be at least 1");
        }
        if self.partitions == 0 {
            return invalid("partition count must be at least 1");
        }
        if self.event_capacity == 0 {
            return invalid("event capacity must be at least 1");
        }
        Ok(())
    }
}

/// Builder for TpiConfig.
#[derive(Debug, Clone, Default)]
pub struct TpiConfigBuilder {
    config: TpiConfig,
}

impl TpiConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = password.into();
        self
    }

    pub fn zones(mut self, zones: u32) -> Self {
        self.config.zones = zones;
        self
    }

    pub fn partitions(mut self, partitions: u32) -> Self {
        self.config.partitions = partitions;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn disconnect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.disconnect_timeout_ms = ms;
        self
    }

    pub fn build(self) -> TpiConfig {
        self.config
    }
}
