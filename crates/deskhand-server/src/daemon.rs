//! Server runtime: listeners, connection lifecycle and shared state.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use deskhand_input::InputInjector;
use deskhand_protocol::{Connection, Message};
use deskhand_screen::ScreenSource;
use deskhand_types::Event;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::control::{self, ControlHandle};
use crate::error::ServerError;
use crate::handlers;
use crate::handlers::files::ChunkAssembly;
use crate::registry::{EventContext, EventRegistry};

/// State shared by the accept loop, connection tasks and session channels.
pub struct ServerShared {
    pub(crate) config: Config,
    pub(crate) screen: Arc<dyn ScreenSource>,
    pub(crate) input: Arc<dyn InputInjector>,
    pub(crate) frame_listener: TcpListener,
    pub(crate) pointer_socket: Arc<UdpSocket>,
    pub(crate) keyboard_listener: TcpListener,
    pub(crate) shutdown: CancellationToken,
    pub(crate) tracker: TaskTracker,
    pub(crate) control: Mutex<Option<ControlHandle>>,
    /// Peers with a live connection task, for the cap and deregistration.
    pub(crate) connections: Mutex<HashSet<SocketAddr>>,
    control_generation: AtomicU64,
}

impl ServerShared {
    pub(crate) fn next_control_generation(&self) -> u64 {
        self.control_generation.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Per-connection dispatch state.
pub struct ConnState {
    /// In-progress chunked uploads keyed by target name.
    pub uploads: ChunkAssembly,
    /// Cancelled to end this connection's dispatch loop.
    pub cancel: CancellationToken,
}

/// Bound addresses of all four listeners.
#[derive(Debug, Clone, Copy)]
pub struct ServerAddrs {
    pub control: SocketAddr,
    pub frame: SocketAddr,
    pub pointer: SocketAddr,
    pub keyboard: SocketAddr,
}

/// The deskhand server.
pub struct Server {
    shared: Arc<ServerShared>,
    listener: TcpListener,
    registry: Arc<EventRegistry>,
}

impl Server {
    /// Bind the control listener and the three session channels.
    pub async fn bind(
        config: Config,
        screen: Arc<dyn ScreenSource>,
        input: Arc<dyn InputInjector>,
    ) -> Result<Self, ServerError> {
        config.validate()?;
        let bind = config.server.bind.as_str();
        let listener = TcpListener::bind((bind, config.server.port)).await?;
        let frame_listener = TcpListener::bind((bind, config.control.frame_port)).await?;
        let pointer_socket = UdpSocket::bind((bind, config.control.pointer_port)).await?;
        let keyboard_listener = TcpListener::bind((bind, config.control.keyboard_port)).await?;

        let shared = Arc::new(ServerShared {
            config,
            screen,
            input,
            frame_listener,
            pointer_socket: Arc::new(pointer_socket),
            keyboard_listener,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            control: Mutex::new(None),
            connections: Mutex::new(HashSet::new()),
            control_generation: AtomicU64::new(0),
        });
        Ok(Self {
            shared,
            listener,
            registry: Arc::new(handlers::build_registry()),
        })
    }

    /// Bound listener addresses, for when configured ports were ephemeral.
    pub fn addrs(&self) -> Result<ServerAddrs, ServerError> {
        Ok(ServerAddrs {
            control: self.listener.local_addr()?,
            frame: self.shared.frame_listener.local_addr()?,
            pointer: self.shared.pointer_socket.local_addr()?,
            keyboard: self.shared.keyboard_listener.local_addr()?,
        })
    }

    /// A handle that stops the server when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shared.shutdown.clone()
    }

    /// Request shutdown; `run` returns once in-flight tasks finish.
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
    }

    /// Serve until the shutdown token is cancelled.
    pub async fn run(&self) -> Result<(), ServerError> {
        info!(addr = %self.listener.local_addr()?, "server listening");
        loop {
            tokio::select! {
                () = self.shared.shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.accept_connection(stream, peer).await,
                    Err(error) => debug!(error = %error, "accept failed"),
                },
            }
        }
        self.finish().await;
        Ok(())
    }

    async fn accept_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let mut connections = self.shared.connections.lock().await;
        if connections.len() >= self.shared.config.server.max_clients {
            warn!(%peer, "refusing connection, server full");
            return;
        }
        connections.insert(peer);
        let active = connections.len();
        drop(connections);
        info!(%peer, active, "client connected");

        let shared = Arc::clone(&self.shared);
        let registry = Arc::clone(&self.registry);
        let cancel = self.shared.shutdown.child_token();
        self.shared.tracker.spawn(async move {
            if let Err(error) = connection_task(&shared, &registry, stream, cancel).await {
                warn!(%peer, error = %error, "connection ended with error");
            }
            // Idempotent: the close handler usually deregistered already.
            shared.connections.lock().await.remove(&peer);
        });
    }

    async fn finish(&self) {
        info!("server shutting down");
        control::stop_session(&self.shared).await;
        self.shared.tracker.close();
        self.shared.tracker.wait().await;
        info!("server stopped");
    }
}

/// One connection: handshake, then dispatch until the close flag is set.
async fn connection_task(
    server: &Arc<ServerShared>,
    registry: &EventRegistry,
    stream: TcpStream,
    cancel: CancellationToken,
) -> Result<(), ServerError> {
    let conn = Arc::new(Connection::new(stream)?);
    let peer = conn.peer();
    conn.accept_handshake().await?;
    debug!(%peer, "handshake established");

    let mut state = ConnState {
        uploads: ChunkAssembly::default(),
        cancel,
    };
    let cancel = state.cancel.clone();
    loop {
        let message = tokio::select! {
            () = cancel.cancelled() => break,
            received = conn.recv_message() => match received {
                Ok(Some(message)) => message,
                // A vanished or unreadable peer dispatches as a close.
                Ok(None) => Message::decode(Event::ConnectionClosed.code()),
                Err(error) => {
                    warn!(%peer, error = %error, "receive failed");
                    Message::decode(Event::ConnectionClosed.code())
                }
            },
        };
        let mut ctx = EventContext {
            conn: &conn,
            server,
            state: &mut state,
        };
        registry.dispatch(&mut ctx, &message).await;
    }
    conn.disconnect().await;
    info!(%peer, "client disconnected");
    Ok(())
}
