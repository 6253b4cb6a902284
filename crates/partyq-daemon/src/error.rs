//! Error types for the partyq daemon.

use partyq_rpc::protocol::{self, RpcError};

/// Errors that can occur in the daemon
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// No session is registered under the code
    #[error("No such session: {0}")]
    NoSuchSession(String),

    /// The user is not a participant (or not the host) of the session
    #[error("No such participant: {0}")]
    NoSuchParticipant(String),

    /// Guest capacity reached
    #[error("Session is full")]
    SessionFull,

    /// Could not draw a free session code
    #[error("Session registry exhausted")]
    RegistryExhausted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] partyq_rpc::transport::CodecError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),
}

impl From<DaemonError> for RpcError {
    fn from(err: DaemonError) -> Self {
        match err {
            DaemonError::NoSuchSession(code) => RpcError::no_such_session(code),
            DaemonError::NoSuchParticipant(user) => RpcError::no_such_participant(user),
            DaemonError::SessionFull => RpcError::session_full(),
            DaemonError::RegistryExhausted => RpcError::registry_exhausted(),
            DaemonError::InvalidParams(msg) => RpcError::invalid_params(msg),
            DaemonError::MethodNotFound(name) => RpcError::new(
                protocol::METHOD_NOT_FOUND,
                format!("Method not found: {name}"),
            ),
            e @ (DaemonError::Io(_)
            | DaemonError::Json(_)
            | DaemonError::Codec(_)
            | DaemonError::Config(_)) => RpcError::internal_error(e.to_string()),
        }
    }
}

impl From<RpcError> for DaemonError {
    fn from(err: RpcError) -> Self {
        match err.code {
            protocol::NO_SUCH_SESSION => DaemonError::NoSuchSession(err.message),
            protocol::NO_SUCH_PARTICIPANT => DaemonError::NoSuchParticipant(err.message),
            protocol::SESSION_FULL => DaemonError::SessionFull,
            protocol::REGISTRY_EXHAUSTED => DaemonError::RegistryExhausted,
            protocol::INVALID_PARAMS => DaemonError::InvalidParams(err.message),
            protocol::METHOD_NOT_FOUND => DaemonError::MethodNotFound(err.message),
            _ => DaemonError::Io(std::io::Error::other(err.message)),
        }
    }
}

impl From<partyq_rpc::Error> for DaemonError {
    fn from(err: partyq_rpc::Error) -> Self {
        match err {
            partyq_rpc::Error::Io(e) => DaemonError::Io(e),
            partyq_rpc::Error::Json(e) => DaemonError::Json(e),
            partyq_rpc::Error::Codec(e) => DaemonError::Codec(e),
            partyq_rpc::Error::Tagging(msg) => DaemonError::InvalidParams(msg),
            partyq_rpc::Error::Rpc { code, message } => RpcError::new(code, message).into(),
            e @ (partyq_rpc::Error::Disconnected | partyq_rpc::Error::Timeout) => {
                DaemonError::Io(std::io::Error::other(e.to_string()))
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, DaemonError>;
