//! JSON-RPC 2.0 plumbing for partyq.
//!
//! Client actions travel to the daemon as notifications (or requests when the
//! caller wants an acknowledgement), and server events come back as
//! notifications. The `type` tag of the shared enums in `partyq-types` is the
//! JSON-RPC method; the remaining fields are the params object.
//!
//! - [`protocol`]: message types and error codes
//! - [`transport`]: length-prefixed TCP framing
//! - [`helpers`]: event/action <-> notification conversion
//! - [`client`]: TCP client used by the CLI and integration tests
//! - [`error`]: crate error type
//!
//! # Example
//!
//! ```no_run
//! use partyq_rpc::{PartyClient, ClientAction};
//!
//! # async fn example() -> Result<(), partyq_rpc::ClientError> {
//! let mut client = PartyClient::connect("127.0.0.1:3000").await?;
//! client
//!     .send_action(&ClientAction::CreateServer {
//!         username: "Ada".to_string(),
//!         user_id: "u1".to_string(),
//!     })
//!     .await?;
//!
//! while let Some(event) = client.next_event().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod helpers;
pub mod protocol;
pub mod transport;

pub use client::{ClientError, PartyClient};

pub use helpers::{action_to_notification, event_to_notification, params_to_action, params_to_event};

pub use error::{Error, Result};

pub use protocol::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, METHOD_NOT_FOUND, Message,
    NO_SUCH_PARTICIPANT, NO_SUCH_SESSION, Notification, PARSE_ERROR, REGISTRY_EXHAUSTED, Request,
    RequestId, Response, RpcError, SESSION_FULL,
};

pub use transport::{CodecError, DEFAULT_MAX_FRAME, FrameCodec};

pub use partyq_types::{ClientAction, Participant, RankedSong, ServerEvent, SessionTime, SongInfo};
