//! TCP server for the partyq daemon.
//!
//! Accepts framed JSON-RPC connections from party clients and runs the status
//! HTTP service next to it. All session state lives in one [`DaemonState`]
//! behind a `RwLock`; every inbound action and every timer tick takes the
//! write lock for the duration of one core operation.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use partyq_rpc::protocol::{Message, Notification};
use partyq_rpc::transport::FrameCodec;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, mpsc};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, SessionSettings};
use crate::error::Result;
use crate::handlers::{HandlerContext, handle_notification, handle_request};
use crate::hub::{ConnectionHub, ConnectionId};
use crate::registry::SessionRegistry;
use crate::status;
use crate::timers::TimerSource;

pub struct DaemonState {
    pub registry: SessionRegistry,
    pub hub: ConnectionHub,
    pub clock: Arc<dyn Clock>,
}

impl DaemonState {
    /// Build the shared state. Session timers hold a weak handle back to it.
    #[must_use]
    pub fn shared(settings: SessionSettings, clock: Arc<dyn Clock>) -> Arc<RwLock<Self>> {
        Arc::new_cyclic(|weak| {
            let timers = TimerSource::new(weak.clone(), &settings);
            RwLock::new(Self {
                registry: SessionRegistry::new(settings, timers),
                hub: ConnectionHub::new(),
                clock,
            })
        })
    }

    pub fn create_handler_context<'a>(&'a mut self, conn: &'a ConnectionId) -> HandlerContext<'a> {
        HandlerContext {
            registry: &mut self.registry,
            hub: &mut self.hub,
            clock: self.clock.as_ref(),
            conn,
        }
    }
}

/// Run the daemon until Ctrl-C.
///
/// # Errors
///
/// Returns an error if either listener cannot be bound.
pub async fn run(config: Config) -> Result<()> {
    let listener = TcpListener::bind(config.server.listen_addr).await?;
    let status_listener = TcpListener::bind(config.server.status_addr).await?;

    let state = DaemonState::shared(config.session, Arc::new(SystemClock));

    let status_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = status::serve(status_listener, status_state).await {
            error!("Status server stopped: {e}");
        }
    });

    tokio::select! {
        result = serve(listener, state) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested, stopping server");
            Ok(())
        }
    }
}

/// Accept connections on `listener` forever.
///
/// # Errors
///
/// Returns an error if the listener's local address cannot be read. Accept
/// errors are logged and the loop keeps going.
pub async fn serve(listener: TcpListener, state: Arc<RwLock<DaemonState>>) -> Result<()> {
    info!("Daemon listening on {}", listener.local_addr()?);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("Accepted connection from {addr}");
                let state = state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state).await {
                        error!("Connection error: {e}");
                    }
                });
            }
            Err(e) => {
                error!("Accept error: {e}");
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, state: Arc<RwLock<DaemonState>>) -> Result<()> {
    let framed = Framed::new(stream, FrameCodec::new());
    let (mut sink, mut stream) = framed.split();

    let conn = ConnectionId::new();
    debug!("New connection: {conn}");

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    state.write().await.hub.register(conn.clone(), tx);

    let conn_clone = conn.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match &msg {
                Message::Request(r) => trace!("[{conn_clone}] -> request {}", r.method),
                Message::Response(r) => trace!("[{conn_clone}] -> response {:?}", r.id),
                Message::Notification(n) => trace!("[{conn_clone}] -> {}", n.method),
            }
            if let Err(e) = sink.send(msg).await {
                warn!("Failed to send to {conn_clone}: {e}");
                break;
            }
        }
        trace!("[{conn_clone}] send_task ended");
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(msg) => {
                if let Some(response) = process_message(&conn, msg, &state).await {
                    let guard = state.read().await;
                    if !guard.hub.send_message(&conn, response) {
                        break;
                    }
                }
            }
            Err(e) => {
                warn!("Read error from {conn}: {e}");
                break;
            }
        }
    }

    debug!("Connection closed: {conn}");
    state.write().await.hub.unregister(&conn);
    send_task.abort();

    Ok(())
}

async fn process_message(
    conn: &ConnectionId,
    msg: Message,
    state: &Arc<RwLock<DaemonState>>,
) -> Option<Message> {
    match msg {
        Message::Request(request) if request.id.is_none() => {
            let notification = Notification::new(request.method, request.params);
            dispatch_notification(conn, &notification, state).await;
            None
        }

        Message::Request(request) => {
            trace!("[{conn}] request {} id={:?}", request.method, request.id);
            let mut guard = state.write().await;
            let mut ctx = guard.create_handler_context(conn);
            Some(Message::Response(handle_request(&mut ctx, &request)))
        }

        Message::Notification(notification) => {
            dispatch_notification(conn, &notification, state).await;
            None
        }

        Message::Response(resp) => {
            warn!("[{conn}] unexpected response id={:?}", resp.id);
            None
        }
    }
}

async fn dispatch_notification(
    conn: &ConnectionId,
    notification: &Notification,
    state: &Arc<RwLock<DaemonState>>,
) {
    trace!("[{conn}] {}", notification.method);
    let mut guard = state.write().await;
    let mut ctx = guard.create_handler_context(conn);

    if let Err(e) = handle_notification(&mut ctx, notification) {
        warn!("[{conn}] {} rejected: {e}", notification.method);
    }
}
