//! Length-prefixed framing for JSON-RPC messages over TCP.
//!
//! ```text
//! +----------------+------------------+
//! |  4 bytes       |  N bytes         |
//! |  (length BE)   |  (UTF-8 JSON)    |
//! +----------------+------------------+
//! ```

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::Message;

/// Default frame limit (1 MiB)
pub const DEFAULT_MAX_FRAME: usize = 1024 * 1024;

const LENGTH_PREFIX_SIZE: usize = 4;

#[derive(Debug)]
pub struct FrameCodec {
    pending_len: Option<usize>,
    max_frame: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME)
    }

    #[must_use]
    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            pending_len: None,
            max_frame,
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let len = match self.pending_len {
            Some(len) => len,
            None => {
                if src.len() < LENGTH_PREFIX_SIZE {
                    return Ok(None);
                }
                let len = src.get_u32() as usize;
                if len > self.max_frame {
                    return Err(CodecError::FrameTooLarge {
                        len,
                        max: self.max_frame,
                    });
                }
                self.pending_len = Some(len);
                len
            }
        };

        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        let payload = src.split_to(len);
        self.pending_len = None;

        let text = std::str::from_utf8(&payload)?;
        tracing::trace!(len, "Decoded frame");
        Ok(Some(serde_json::from_str(text)?))
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = CodecError;

    // Bounded by max_frame, which callers keep well below u32::MAX
    #[allow(clippy::cast_possible_truncation)]
    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item)?;

        if json.len() > self.max_frame {
            return Err(CodecError::FrameTooLarge {
                len: json.len(),
                max: self.max_frame,
            });
        }

        dst.reserve(LENGTH_PREFIX_SIZE + json.len());
        dst.put_u32(json.len() as u32);
        dst.put_slice(&json);
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Frame too large: {len} bytes (max: {max})")]
    FrameTooLarge { len: usize, max: usize },
}

#[cfg(test)]
mod tests {
    #![allow(clippy::cast_possible_truncation)]

    use super::*;
    use crate::protocol::{Notification, Request};
    use serde_json::json;

    fn encoded(msg: Message) -> BytesMut {
        let mut buf = BytesMut::new();
        FrameCodec::new().encode(msg, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_prefix_matches_payload_length() {
        let buf = encoded(Message::notification("serverFull", None));
        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(len, buf.len() - LENGTH_PREFIX_SIZE);
    }

    #[test]
    fn test_decode_action_request() {
        let req = Request::new("getUsers", Some(json!({"serverCode": "123456"})), 1.into());
        let mut buf = encoded(Message::Request(req));

        let decoded = FrameCodec::new().decode(&mut buf).unwrap().unwrap();
        let Message::Request(req) = decoded else {
            panic!("Expected Request");
        };
        assert_eq!(req.method, "getUsers");
        assert_eq!(req.params.unwrap()["serverCode"], "123456");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_waits_for_full_frame() {
        let full = encoded(Message::Notification(Notification::new(
            "userJoined",
            Some(json!({"userId": "u2"})),
        )));
        let mut codec = FrameCodec::new();
        let mut partial = BytesMut::new();

        partial.extend_from_slice(&full[..3]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&full[3..10]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&full[10..]);
        let msg = codec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(msg.method(), Some("userJoined"));
    }

    #[test]
    fn test_back_to_back_frames_keep_order() {
        let mut buf = encoded(Message::notification("hostRejoined", None));
        buf.extend_from_slice(&encoded(Message::notification("serverFull", None)));

        let mut codec = FrameCodec::new();
        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.method(), Some("hostRejoined"));
        assert_eq!(second.method(), Some("serverFull"));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_oversized_prefix_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32((DEFAULT_MAX_FRAME + 1) as u32);
        let result = FrameCodec::new().decode(&mut buf);
        assert!(matches!(
            result,
            Err(CodecError::FrameTooLarge { max: DEFAULT_MAX_FRAME, .. })
        ));
    }

    #[test]
    fn test_oversized_encode_rejected() {
        let mut codec = FrameCodec::with_max_frame(16);
        let mut buf = BytesMut::new();
        let msg = Message::notification("requestedSongs", Some(json!({"songs": []})));
        assert!(matches!(
            codec.encode(msg, &mut buf),
            Err(CodecError::FrameTooLarge { max: 16, .. })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_garbage_payloads() {
        let mut buf = BytesMut::new();
        buf.put_u32(5);
        buf.extend_from_slice(b"hello");
        assert!(matches!(
            FrameCodec::new().decode(&mut buf),
            Err(CodecError::Json(_))
        ));

        let mut buf = BytesMut::new();
        buf.put_u32(2);
        buf.extend_from_slice(&[0xc3, 0x28]);
        assert!(matches!(
            FrameCodec::new().decode(&mut buf),
            Err(CodecError::Utf8(_))
        ));
    }

    #[test]
    fn test_frame_too_large_display() {
        let err = CodecError::FrameTooLarge { len: 2_000_000, max: 1_048_576 };
        assert_eq!(
            err.to_string(),
            "Frame too large: 2000000 bytes (max: 1048576)"
        );
    }
}
