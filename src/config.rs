//! Configuration for kvwire
//!
//! Centralized client configuration with sensible defaults.

use std::time::Duration;

/// Main configuration for a kvwire client
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Session Configuration
    // -------------------------------------------------------------------------
    /// Explicit session identity. A random UUID is generated when unset.
    /// The identity survives reconnection.
    pub session_id: Option<String>,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Dial timeout (milliseconds)
    pub connect_timeout_ms: u64,

    /// Read/write idle timeout on an established connection (milliseconds).
    /// Zero disables the timeout.
    pub idle_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Framing Configuration
    // -------------------------------------------------------------------------
    /// Largest accepted message payload (in bytes)
    pub max_message_size: usize,

    /// Socket read/write buffer capacity (in bytes)
    pub io_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_id: None,
            connect_timeout_ms: 5_000,
            idle_timeout_ms: 30 * 60 * 1_000, // 30 minutes
            max_message_size: 32 * 1024 * 1024, // 32 MB
            io_buffer_size: 16 * 1024,         // 16 KB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Idle timeout, `None` when disabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set an explicit session identity
    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.config.session_id = Some(id.into());
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the idle timeout (in milliseconds, 0 disables it)
    pub fn idle_timeout_ms(mut self, ms: u64) -> Self {
        self.config.idle_timeout_ms = ms;
        self
    }

    /// Set the maximum message size (in bytes)
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Set the socket buffer size (in bytes)
    pub fn io_buffer_size(mut self, size: usize) -> Self {
        self.config.io_buffer_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
