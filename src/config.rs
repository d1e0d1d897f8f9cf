//! Client configuration
//!
//! Every option is explicit: there is no implicit server path or working
//! directory lookup. Configurations can be built in code or loaded from YAML:
//!
//! ```rust
//! use scrcpy_stream::{ClientConfig, VideoCodec};
//!
//! let config = ClientConfig::from_yaml_str(
//!     r#"
//! port: 27199
//! codec_hint: h265
//! device_serial: emulator-5554
//! "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.port, 27199);
//! assert_eq!(config.codec_hint, Some(VideoCodec::H265));
//! assert_eq!(config.host, "127.0.0.1");
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::demux::DEFAULT_MAX_PAYLOAD_LEN;
use crate::protocol::ProtocolVersion;
use crate::{Result, ScrcpyError, VideoCodec};

/// Configuration for one scrcpy video session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Local path of the server artifact, for whoever provisions the device
    pub server_path: PathBuf,

    /// Server version; selects the wire layout
    pub server_version: String,

    /// adb serial of the target device
    pub device_serial: Option<String>,

    /// Codec the caller asked the server for. The handshake stays authoritative.
    pub codec_hint: Option<VideoCodec>,

    /// Host of the forwarded video socket
    pub host: String,

    /// Local port of the forwarded video socket
    pub port: u16,

    /// Expect the one-byte readiness probe sent over forward tunnels
    pub tunnel_forward: bool,

    /// Connection attempts before giving up on a server that is not ready
    pub connect_attempts: u32,

    /// Delay between connection attempts in milliseconds
    pub connect_retry_delay_ms: u64,

    /// Largest accepted packet payload in bytes
    pub max_payload_len: usize,

    /// Capacity of the frame channel in background mode
    pub frame_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_path: PathBuf::from("scrcpy-server-v3.3.1"),
            server_version: ProtocolVersion::CURRENT.server_version.to_string(),
            device_serial: None,
            codec_hint: None,
            host: "127.0.0.1".to_string(),
            port: 27183,
            tunnel_forward: true,
            connect_attempts: 100,
            connect_retry_delay_ms: 100,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            frame_buffer: 8,
        }
    }
}

impl ClientConfig {
    /// Parse and validate a YAML configuration
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: ClientConfig = serde_yaml_ng::from_str(yaml)
            .map_err(|e| ScrcpyError::config_error("YAML parsing", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            ScrcpyError::config_error(path.display().to_string(), format!("cannot read file: {}", e))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Check option ranges and resolve the server version
    pub fn validate(&self) -> Result<()> {
        self.protocol_version()?;

        if self.port == 0 {
            return Err(ScrcpyError::config_error("port", "must be non-zero"));
        }
        if self.host.trim().is_empty() {
            return Err(ScrcpyError::config_error("host", "cannot be empty"));
        }
        if self.connect_attempts == 0 {
            return Err(ScrcpyError::config_error("connect_attempts", "must be at least 1"));
        }
        if self.max_payload_len == 0 {
            return Err(ScrcpyError::config_error("max_payload_len", "must be non-zero"));
        }
        if self.frame_buffer == 0 {
            return Err(ScrcpyError::config_error("frame_buffer", "must be at least 1"));
        }

        Ok(())
    }

    /// Wire layout for the configured server version
    pub fn protocol_version(&self) -> Result<ProtocolVersion> {
        ProtocolVersion::lookup(&self.server_version).copied().ok_or_else(|| {
            ScrcpyError::config_error(
                "server_version",
                format!("unsupported server version '{}'", self.server_version),
            )
        })
    }

    /// `host:port` of the video socket
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Delay between connection attempts
    pub fn connect_retry_delay(&self) -> Duration {
        Duration::from_millis(self.connect_retry_delay_ms)
    }
}
