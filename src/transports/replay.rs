//! Replay transport for recorded video socket captures

use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::BufReader;
use tracing::info;

use crate::transport::Transport;
use crate::{Result, ScrcpyError};

/// Replays a capture of the video socket from a file.
///
/// The capture holds exactly what follows the readiness probe: the handshake,
/// then packets. Replays run as fast as the decoder consumes them.
#[derive(Debug, Clone)]
pub struct ReplayTransport {
    path: PathBuf,
}

impl ReplayTransport {
    /// Create a replay transport for a capture file
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Capture file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl Transport for ReplayTransport {
    type Connection = BufReader<File>;

    async fn connect(&self) -> Result<Self::Connection> {
        let file = File::open(&self.path).await.map_err(|e| {
            ScrcpyError::transport_failed_with_source(
                format!("cannot open capture {}", self.path.display()),
                Box::new(e),
            )
        })?;

        info!("Replaying capture: {}", self.path.display());
        Ok(BufReader::new(file))
    }

    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }
}
