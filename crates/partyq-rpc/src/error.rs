//! Error type for the partyq-rpc crate.

use crate::client::ClientError;
use crate::protocol::RpcError;
use crate::transport::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Tagged payload error: {0}")]
    Tagging(String),

    #[error("Connection closed")]
    Disconnected,

    #[error("Request timeout")]
    Timeout,
}

impl From<RpcError> for Error {
    fn from(e: RpcError) -> Self {
        Self::Rpc {
            code: e.code,
            message: e.message,
        }
    }
}

impl From<ClientError> for Error {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Io(e) => Self::Io(e),
            ClientError::Codec(e) => Self::Codec(e),
            ClientError::Json(e) => Self::Json(e),
            ClientError::Rpc { code, message } => Self::Rpc { code, message },
            ClientError::Payload(msg) => Self::Tagging(msg),
            ClientError::ConnectionClosed => Self::Disconnected,
            ClientError::Timeout => Self::Timeout,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rpc_error_keeps_code() {
        let err: Error = RpcError::session_full().into();
        match err {
            Error::Rpc { code, message } => {
                assert_eq!(code, crate::protocol::SESSION_FULL);
                assert_eq!(message, "Session is full");
            }
            other => panic!("Expected Rpc error, got {other:?}"),
        }
    }

    #[test]
    fn test_from_client_error() {
        assert!(matches!(
            Error::from(ClientError::ConnectionClosed),
            Error::Disconnected
        ));
        assert!(matches!(Error::from(ClientError::Timeout), Error::Timeout));

        assert!(matches!(
            Error::from(ClientError::Payload("bad".into())),
            Error::Tagging(_)
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(Error::Disconnected.to_string(), "Connection closed");
        let err = Error::Rpc {
            code: -32010,
            message: "No session with code 1".into(),
        };
        assert_eq!(err.to_string(), "RPC error -32010: No session with code 1");
    }
}
