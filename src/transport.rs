//! Transport trait for video socket sources

use tokio::io::AsyncRead;

use crate::Result;

/// Source of a connected video socket.
///
/// Transports abstract over how the byte stream was obtained (adb forward,
/// reverse tunnel, recorded capture). The returned connection must be positioned
/// at the first handshake byte and signal EOF when the server goes away.
///
/// Deploying the server and setting up the forward happen before a transport
/// is used; they are not part of this crate.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Connection type handed to the session
    type Connection: AsyncRead + Unpin + Send + 'static;

    /// Establish the connection.
    ///
    /// Any waiting for a slow server happens here. Once this returns, the
    /// session performs no further retries.
    async fn connect(&self) -> Result<Self::Connection>;

    /// Short description for logs
    fn describe(&self) -> String;
}
