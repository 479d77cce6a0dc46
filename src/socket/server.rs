use super::error::SocketError;
use crate::config::SocketServerConfig;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct ServerStats {
    accepted: AtomicU64,
    rejected: AtomicU64,
    messages_received: AtomicU64,
    live: AtomicU64,
    peak_live: AtomicU64,
}

/// Server side of the peer channel.
///
/// Only handshakes whose request path starts with `path_prefix` are
/// upgraded; every other path is answered with `404 Not Found` and never
/// reaches the message handler.
pub struct PeerServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: SocketServerConfig,
}

impl PeerServer {
    pub async fn bind(config: SocketServerConfig) -> Result<Self, SocketError> {
        let addr = config.bind_addr();
        let bind_error = |source| SocketError::Bind {
            addr: addr.clone(),
            source,
        };
        let listener = TcpListener::bind(addr.as_str()).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;
        info!(%local_addr, prefix = %config.path_prefix, "Socket server listening");
        Ok(Self {
            listener,
            local_addr,
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn spawn(self) -> ServerHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(ServerStats::default());
        let local_addr = self.local_addr;
        let task = tokio::spawn(self.run(stats.clone(), shutdown_rx));
        ServerHandle {
            local_addr,
            stats,
            shutdown,
            task,
        }
    }

    async fn run(self, stats: Arc<ServerStats>, mut shutdown: watch::Receiver<bool>) {
        let config = Arc::new(self.config);
        loop {
            let accepted = tokio::select! {
                accepted = self.listener.accept() => accepted,
                _ = shutdown.changed() => break,
            };

            match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "Incoming connection");
                    let session = Session {
                        config: config.clone(),
                        stats: stats.clone(),
                        peer,
                    };
                    tokio::spawn(session.run(stream, shutdown.clone()));
                }
                Err(e) => warn!(error = %e, "Accept failed"),
            }
        }
        info!(local_addr = %self.local_addr, "Socket server stopped");
    }
}

struct Session {
    config: Arc<SocketServerConfig>,
    stats: Arc<ServerStats>,
    peer: SocketAddr,
}

impl Session {
    async fn run(self, stream: TcpStream, mut shutdown: watch::Receiver<bool>) {
        let prefix = self.config.path_prefix.clone();
        let stats = self.stats.clone();
        let check_path = move |request: &Request, response: Response| {
            let path = request.uri().path();
            if path.starts_with(&prefix) {
                Ok(response)
            } else {
                stats.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(%path, "Rejected handshake");
                let mut refusal = ErrorResponse::new(Some(format!("No route for {path}")));
                *refusal.status_mut() = StatusCode::NOT_FOUND;
                Err(refusal)
            }
        };

        let stream = match accept_hdr_async(stream, check_path).await {
            Ok(stream) => stream,
            Err(e) => {
                debug!(peer = %self.peer, error = %e, "Handshake not completed");
                return;
            }
        };

        self.stats.accepted.fetch_add(1, Ordering::Relaxed);
        let live = self.stats.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak_live.fetch_max(live, Ordering::SeqCst);
        info!(peer = %self.peer, "Peer connected");

        let (mut sender, mut receiver) = stream.split();
        let reply = Message::Text(self.config.reply.clone());

        if let Err(e) = sender.send(reply.clone()).await {
            warn!(peer = %self.peer, error = %e, "Greeting failed");
        } else {
            loop {
                let inbound = tokio::select! {
                    inbound = receiver.next() => inbound,
                    _ = shutdown.changed() => {
                        let _ = sender.close().await;
                        break;
                    }
                };

                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        self.stats.messages_received.fetch_add(1, Ordering::Relaxed);
                        debug!(peer = %self.peer, %text, "Received");
                        if let Err(e) = sender.send(reply.clone()).await {
                            warn!(peer = %self.peer, error = %e, "Reply failed");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(peer = %self.peer, error = %e, "Channel error");
                        break;
                    }
                }
            }
        }

        self.stats.live.fetch_sub(1, Ordering::SeqCst);
        info!(peer = %self.peer, "Peer disconnected");
    }
}

/// Handle to a running [`PeerServer`].
pub struct ServerHandle {
    local_addr: SocketAddr,
    stats: Arc<ServerStats>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handshakes that were upgraded and handed to the message handler.
    pub fn accepted(&self) -> u64 {
        self.stats.accepted.load(Ordering::Relaxed)
    }

    /// Handshakes refused because of their path.
    pub fn rejected(&self) -> u64 {
        self.stats.rejected.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.stats.messages_received.load(Ordering::Relaxed)
    }

    pub fn live_channels(&self) -> u64 {
        self.stats.live.load(Ordering::SeqCst)
    }

    /// Most channels ever open at the same time.
    pub fn peak_live_channels(&self) -> u64 {
        self.stats.peak_live.load(Ordering::SeqCst)
    }

    /// Stops accepting and closes every open channel.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Socket server task failed");
        }
    }
}
