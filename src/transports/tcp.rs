//! TCP transport for adb-forwarded video sockets

use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::transport::Transport;
use crate::{ClientConfig, Result, ScrcpyError};

/// Connects to the video socket through a local TCP port.
///
/// With `adb forward`, the local port accepts connections even while the device
/// server is still starting; such connections are closed right away. In forward
/// mode the server writes a single dummy byte once it is ready, so the transport
/// reads that byte as a readiness probe and retries until it arrives.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    address: String,
    tunnel_forward: bool,
    attempts: u32,
    retry_delay: Duration,
}

impl TcpTransport {
    /// Create a transport for `address` (`host:port`) with forward-tunnel probing
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            tunnel_forward: true,
            attempts: 100,
            retry_delay: Duration::from_millis(100),
        }
    }

    /// Create a transport from the connection options of a config
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            address: config.address(),
            tunnel_forward: config.tunnel_forward,
            attempts: config.connect_attempts.max(1),
            retry_delay: config.connect_retry_delay(),
        }
    }

    /// Set how often and how fast to retry a server that is not ready
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    /// Enable or disable the dummy-byte readiness probe
    pub fn with_tunnel_forward(mut self, enabled: bool) -> Self {
        self.tunnel_forward = enabled;
        self
    }

    /// Target address
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn try_connect(&self) -> Result<TcpStream> {
        let mut stream = TcpStream::connect(&self.address).await?;
        stream.set_nodelay(true)?;

        if self.tunnel_forward {
            let mut probe = [0u8; 1];
            if stream.read(&mut probe).await? == 0 {
                return Err(ScrcpyError::transport_failed("server closed the tunnel before it was ready"));
            }
        }

        Ok(stream)
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    type Connection = TcpStream;

    async fn connect(&self) -> Result<TcpStream> {
        let mut last_error = None;

        for attempt in 1..=self.attempts {
            match self.try_connect().await {
                Ok(stream) => {
                    info!(address = %self.address, attempt, "Connected to video socket");
                    return Ok(stream);
                }
                Err(e) => {
                    if attempt == 1 {
                        info!(address = %self.address, "Waiting for scrcpy server...");
                    }
                    debug!(attempt, attempts = self.attempts, "Server not ready: {}", e);
                    last_error = Some(e);
                }
            }

            if attempt < self.attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        warn!(address = %self.address, attempts = self.attempts, "Giving up on scrcpy server");
        let reason = format!(
            "could not reach scrcpy server at {} after {} attempts",
            self.address, self.attempts
        );
        Err(match last_error {
            Some(e) => ScrcpyError::transport_failed_with_source(reason, Box::new(e)),
            None => ScrcpyError::transport_failed(reason),
        })
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.address)
    }
}
