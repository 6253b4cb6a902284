//! TCP client for the partyq daemon.
//!
//! A background task reads frames: responses resolve pending requests, and
//! notifications are decoded into [`ServerEvent`]s for [`PartyClient::next_event`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use partyq_types::{ClientAction, ServerEvent};
use serde_json::Value;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::codec::Framed;

use crate::error::Error;
use crate::helpers::{action_to_notification, params_to_event};
use crate::protocol::{Message, Request, RequestId, Response, RpcError};
use crate::transport::{CodecError, FrameCodec};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC error: {code} - {message}")]
    Rpc { code: i32, message: String },

    #[error("Invalid payload: {0}")]
    Payload(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Request timeout")]
    Timeout,
}

impl From<RpcError> for ClientError {
    fn from(e: RpcError) -> Self {
        ClientError::Rpc {
            code: e.code,
            message: e.message,
        }
    }
}

impl From<Error> for ClientError {
    fn from(e: Error) -> Self {
        match e {
            Error::Json(e) => ClientError::Json(e),
            Error::Io(e) => ClientError::Io(e),
            Error::Codec(e) => ClientError::Codec(e),
            Error::Rpc { code, message } => ClientError::Rpc { code, message },
            Error::Disconnected => ClientError::ConnectionClosed,
            Error::Timeout => ClientError::Timeout,
            Error::Tagging(msg) => ClientError::Payload(msg),
        }
    }
}

type PendingRequest = oneshot::Sender<Response>;
type FrameSink = SplitSink<Framed<TcpStream, FrameCodec>, Message>;

pub struct PartyClient {
    sender: Mutex<FrameSink>,
    events_rx: mpsc::UnboundedReceiver<ServerEvent>,
    pending: Arc<Mutex<HashMap<RequestId, PendingRequest>>>,
    next_id: AtomicU64,
}

impl PartyClient {
    /// Connect to a daemon listening at `addr`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Io` if the TCP connection fails.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (sink, mut stream) = Framed::new(stream, FrameCodec::new()).split();

        let pending: Arc<Mutex<HashMap<RequestId, PendingRequest>>> = Arc::default();
        let reader_pending = pending.clone();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let msg = match frame {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::warn!("Dropping connection after codec error: {e}");
                        break;
                    }
                };

                match msg {
                    Message::Response(resp) => {
                        if let Some(tx) = reader_pending.lock().await.remove(&resp.id) {
                            let _ = tx.send(resp);
                        }
                    }
                    Message::Request(Request { method, params, .. })
                    | Message::Notification(crate::protocol::Notification {
                        method, params, ..
                    }) => match params_to_event(&method, params) {
                        Ok(event) => {
                            if events_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!("Ignoring unknown event '{method}': {e}"),
                    },
                }
            }
            // Dropping the senders wakes every waiting request with ConnectionClosed
            reader_pending.lock().await.clear();
        });

        Ok(Self {
            sender: Mutex::new(sink),
            events_rx,
            pending,
            next_id: AtomicU64::new(1),
        })
    }

    /// Send an action as a fire-and-forget notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the action cannot be encoded or the write fails.
    pub async fn send_action(&self, action: &ClientAction) -> Result<(), ClientError> {
        let notification = action_to_notification(action)?;
        tracing::debug!(method = %notification.method, "Sending action");
        self.sender
            .lock()
            .await
            .send(Message::Notification(notification))
            .await?;
        Ok(())
    }

    /// Send an action as a request and wait for the daemon's acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Rpc` when the daemon rejects the action,
    /// `ClientError::Timeout` after 30 seconds without an answer, and
    /// `ClientError::ConnectionClosed` if the connection drops first.
    pub async fn request_action(&self, action: &ClientAction) -> Result<Value, ClientError> {
        let notification = action_to_notification(action)?;
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let request = Request::new(notification.method, notification.params, id.clone());

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);
        let sent = self
            .sender
            .lock()
            .await
            .send(Message::Request(request))
            .await;
        if let Err(e) = sent {
            self.pending.lock().await.remove(&id);
            return Err(e.into());
        }

        let response = match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(reply) => reply.map_err(|_| ClientError::ConnectionClosed)?,
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(ClientError::Timeout);
            }
        };

        if let Some(error) = response.error {
            return Err(error.into());
        }
        response.result.ok_or_else(|| {
            ClientError::Payload("response carried neither result nor error".into())
        })
    }

    /// Next event from the daemon, or `None` once the connection is gone.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.events_rx.recv().await
    }
}
