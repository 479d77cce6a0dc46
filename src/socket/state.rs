use std::fmt;

/// Lifecycle of the client's single channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No channel. Either not started yet or waiting for the reconnect timer.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The channel is up and inbound messages are being answered.
    Open,
    /// Shutdown was requested and the channel is being closed.
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
        };
        f.write_str(name)
    }
}
