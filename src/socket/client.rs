use super::error::SocketError;
use super::state::ConnectionState;
use crate::config::SocketClientConfig;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Counters shared between the connection task and its handle.
#[derive(Debug, Default)]
struct ClientStats {
    connect_attempts: AtomicU64,
    connections: AtomicU64,
    messages_received: AtomicU64,
}

/// How a served channel ended.
enum Ended {
    Shutdown,
    Lost(SocketError),
}

/// Keeps one channel to the peer alive.
///
/// The client owns at most one channel at a time. When the channel fails or
/// a connection attempt is refused, the channel is dropped, the state goes
/// back to `Disconnected`, and after `reconnect_delay` the same URL is dialed
/// again. There is no backoff; the delay is fixed.
///
/// `max_reconnects` limits reconnects in a row that never get a channel to
/// `Open`. Every channel that opened resets the count.
pub struct ReconnectingClient {
    config: SocketClientConfig,
    url: String,
    state: watch::Sender<ConnectionState>,
    stats: Arc<ClientStats>,
}

impl ReconnectingClient {
    pub fn new(config: SocketClientConfig) -> Self {
        let url = config.url();
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            url,
            state,
            stats: Arc::new(ClientStats::default()),
        }
    }

    /// Starts the connection loop on its own task.
    pub fn spawn(self) -> ClientHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let state = self.state.subscribe();
        let stats = self.stats.clone();
        let task = tokio::spawn(self.run(shutdown_rx));
        ClientHandle {
            state,
            stats,
            shutdown,
            task,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let delay = self.config.reconnect_delay();
        let mut reconnects: u32 = 0;
        info!(url = %self.url, "Socket client started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.set_state(ConnectionState::Connecting);
            self.stats.connect_attempts.fetch_add(1, Ordering::Relaxed);

            let connected = tokio::select! {
                result = connect_async(self.url.as_str()) => result,
                _ = shutdown.changed() => break,
            };

            match connected {
                Ok((stream, response)) => {
                    self.stats.connections.fetch_add(1, Ordering::Relaxed);
                    self.set_state(ConnectionState::Open);
                    info!(url = %self.url, status = %response.status(), "Connected");

                    match self.serve(stream, &mut shutdown).await {
                        Ended::Shutdown => break,
                        Ended::Lost(e) => warn!(error = %e, "Channel lost"),
                    }
                    // The cap counts consecutive reconnects without an `Open` channel.
                    reconnects = 0;
                }
                Err(source) => {
                    let e = SocketError::ConnectFailed {
                        url: self.url.clone(),
                        source,
                    };
                    warn!(error = %e, "Connection attempt failed");
                }
            }

            // The channel has been dropped by now.
            self.set_state(ConnectionState::Disconnected);

            if let Some(max) = self.config.max_reconnects {
                if reconnects >= max {
                    warn!(reconnects, "Giving up on reconnecting");
                    break;
                }
            }
            reconnects += 1;

            info!(
                delay_ms = delay.as_millis() as u64,
                attempt = reconnects,
                "Restarting socket client"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.set_state(ConnectionState::Disconnected);
        info!(url = %self.url, "Socket client stopped");
    }

    /// Answers inbound text until the channel ends or shutdown is requested.
    async fn serve(&self, stream: WsStream, shutdown: &mut watch::Receiver<bool>) -> Ended {
        let (mut sender, mut receiver) = stream.split();

        loop {
            let inbound = tokio::select! {
                inbound = receiver.next() => inbound,
                _ = shutdown.changed() => {
                    self.set_state(ConnectionState::Closing);
                    if let Err(e) = sender.close().await {
                        debug!(error = %e, "Close handshake failed");
                    }
                    return Ended::Shutdown;
                }
            };

            match inbound {
                Some(Ok(Message::Text(text))) => {
                    self.stats.messages_received.fetch_add(1, Ordering::Relaxed);
                    debug!(%text, "Received");
                    if let Err(e) = sender.send(Message::Text(self.config.reply.clone())).await {
                        return Ended::Lost(e.into());
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Peer closed the channel");
                    return Ended::Lost(SocketError::ChannelClosed);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Ended::Lost(e.into()),
                None => return Ended::Lost(SocketError::ChannelClosed),
            }
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "State change");
        }
    }
}

/// Handle to a running [`ReconnectingClient`].
///
/// Dropping the handle also stops the client.
pub struct ClientHandle {
    state: watch::Receiver<ConnectionState>,
    stats: Arc<ClientStats>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ClientHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver observing every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn connect_attempts(&self) -> u64 {
        self.stats.connect_attempts.load(Ordering::Relaxed)
    }

    /// Attempts that reached `Open`.
    pub fn connections(&self) -> u64 {
        self.stats.connections.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.stats.messages_received.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the client to stop on its own (reconnect limit reached).
    pub async fn join(self) {
        let ClientHandle { task, shutdown, .. } = self;
        if let Err(e) = task.await {
            warn!(error = %e, "Socket client task failed");
        }
        drop(shutdown);
    }

    /// Closes the channel if open and stops reconnecting.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        self.join().await;
    }
}
