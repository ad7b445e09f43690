//! Connection configuration.
//!
//! Values a connection announces in its `open` performative, plus local
//! limits the engine enforces. Can be built fluently or loaded from JSON.
//!
//! # Example
//!
//! ```
//! use amqp_engine::ConnectionConfig;
//!
//! let config = ConnectionConfig::from_json(r#"{"container_id": "broker-a", "channel_max": 7}"#)
//!     .unwrap();
//! assert_eq!(config.channel_max, 7);
//! assert_eq!(config.max_delivery_tag_len, 32);
//! ```

use serde::Deserialize;

use crate::error::{EngineError, Result};

/// Default highest channel number (no limit below the protocol maximum).
pub const DEFAULT_CHANNEL_MAX: u16 = u16::MAX;

/// Default maximum frame size (no limit below the protocol maximum).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = u32::MAX;

/// Smallest maximum frame size a peer may announce.
pub const MIN_MAX_FRAME_SIZE: u32 = 512;

/// A delivery tag may be up to 32 octets of binary data.
pub const DEFAULT_MAX_DELIVERY_TAG_LEN: usize = 32;

/// Configuration for a [`Connection`](crate::Connection).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Local container identifier announced in `open`.
    pub container_id: Option<String>,
    /// Virtual host requested from the peer.
    pub hostname: Option<String>,
    /// Highest channel number this side will use.
    pub channel_max: u16,
    /// Largest frame this side will accept.
    pub max_frame_size: u32,
    /// Idle timeout announced to the peer, in milliseconds.
    pub idle_timeout_ms: Option<u32>,
    /// Longest delivery tag accepted or sent.
    pub max_delivery_tag_len: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            container_id: None,
            hostname: None,
            channel_max: DEFAULT_CHANNEL_MAX,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            idle_timeout_ms: None,
            max_delivery_tag_len: DEFAULT_MAX_DELIVERY_TAG_LEN,
        }
    }
}

impl ConnectionConfig {
    /// Start a fluent builder from the defaults.
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }

    /// Parse a JSON document and validate it.
    ///
    /// # Errors
    ///
    /// `Config` for malformed JSON or unknown keys, `InvalidConfig` for values
    /// outside protocol limits.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ConnectionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values against protocol limits.
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_size < MIN_MAX_FRAME_SIZE {
            return Err(EngineError::InvalidConfig(format!(
                "max_frame_size {} is below the minimum {}",
                self.max_frame_size, MIN_MAX_FRAME_SIZE
            )));
        }
        if self.max_delivery_tag_len == 0 {
            return Err(EngineError::InvalidConfig(
                "max_delivery_tag_len must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fluent builder for [`ConnectionConfig`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    pub fn container_id(mut self, container_id: impl Into<String>) -> Self {
        self.config.container_id = Some(container_id.into());
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.config.hostname = Some(hostname.into());
        self
    }

    /// Set the highest channel number.
    ///
    /// Default: 65535
    pub fn channel_max(mut self, channel_max: u16) -> Self {
        self.config.channel_max = channel_max;
        self
    }

    /// Set the largest accepted frame size.
    ///
    /// Default: 4294967295
    pub fn max_frame_size(mut self, max_frame_size: u32) -> Self {
        self.config.max_frame_size = max_frame_size;
        self
    }

    pub fn idle_timeout_ms(mut self, idle_timeout_ms: u32) -> Self {
        self.config.idle_timeout_ms = Some(idle_timeout_ms);
        self
    }

    /// Set the longest delivery tag.
    ///
    /// Default: 32
    pub fn max_delivery_tag_len(mut self, len: usize) -> Self {
        self.config.max_delivery_tag_len = len;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<ConnectionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
