use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Socket failures. On the client side these only drive reconnects and are
/// never handed to callers.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("Failed to connect to {url}: {source}")]
    ConnectFailed {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    /// The peer closed the channel or the stream ended.
    #[error("Channel closed by peer")]
    ChannelClosed,

    #[error("Transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
