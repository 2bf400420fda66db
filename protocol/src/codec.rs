//! Length-prefixed framing for chat messages.
//!
//! ```text
//! +----------------+------------------------------+
//! | length (u32 BE)| utf8 space-token message     |
//! +----------------+------------------------------+
//! ```
//!
//! The length prefix lets a reader reassemble a message that arrives over
//! several socket reads, or split several messages out of one read.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::message::{Frame, Request, Response};

/// Largest accepted payload (16 MiB), large enough for inlined text files
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const LEN_FIELD: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct ChatCodec {
    max_len: usize,
}

impl ChatCodec {
    pub fn new() -> Self {
        ChatCodec { max_len: MAX_FRAME_LEN }
    }

    pub fn with_max_len(max_len: usize) -> Self {
        ChatCodec { max_len }
    }
}

impl Default for ChatCodec {
    fn default() -> Self {
        Self::new()
    }
}

// convert length prefixed bytes into a Frame
impl Decoder for ChatCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LEN_FIELD {
            return Ok(None)
        }

        // peek at the length without consuming it, the payload may not be here yet
        let mut len_bytes = [0u8; LEN_FIELD];
        len_bytes.copy_from_slice(&src[..LEN_FIELD]);
        let len = u32::from_be_bytes(len_bytes) as usize;

        if len > self.max_len {
            return Err(ProtocolError::FrameTooLarge { len, max: self.max_len })
        }

        if src.len() < LEN_FIELD + len {
            src.reserve(LEN_FIELD + len - src.len());
            return Ok(None)
        }

        src.advance(LEN_FIELD);
        let payload = src.split_to(len);
        let text = std::str::from_utf8(&payload).map_err(|_| ProtocolError::InvalidUtf8)?;

        Ok(Some(Frame::parse(text)))
    }
}

impl Encoder<Frame> for ChatCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_text(item.encode().as_bytes(), self.max_len, dst)
    }
}

impl Encoder<Request> for ChatCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encode(Frame::from(item), dst)
    }
}

impl Encoder<Response> for ChatCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encode(Frame::from(item), dst)
    }
}

// write text into BytesMut behind its u32 length
fn encode_text(text: &[u8], max_len: usize, dst: &mut BytesMut) -> Result<(), ProtocolError> {
    if text.len() > max_len {
        return Err(ProtocolError::FrameTooLarge { len: text.len(), max: max_len })
    }

    dst.reserve(LEN_FIELD + text.len());
    dst.put_u32(text.len() as u32);
    dst.extend_from_slice(text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(request: Request) -> BytesMut {
        let mut buf = BytesMut::new();
        ChatCodec::new().encode(request, &mut buf).unwrap();
        buf
    }

    #[test]
    fn encode_prefixes_length() {
        let buf = encoded(Request::Join("ann".into()));
        assert_eq!(&buf[..4], &8u32.to_be_bytes());
        assert_eq!(&buf[4..], b"join ann");
    }

    #[test]
    fn decode_reassembles_fragmented_reads() {
        let whole = encoded(Request::SendMessage {
            recipients: vec!["bo".into()],
            text: "split across reads".into(),
        });

        let mut codec = ChatCodec::new();
        let mut src = BytesMut::new();

        for (i, byte) in whole.iter().enumerate() {
            src.put_u8(*byte);
            let decoded = codec.decode(&mut src).unwrap();
            if i + 1 < whole.len() {
                assert!(decoded.is_none(), "frame completed early at byte {}", i);
            } else {
                let frame = decoded.expect("complete frame");
                assert_eq!(frame.encode(), "send_message 1 bo split across reads");
            }
        }
        assert!(src.is_empty());
    }

    #[test]
    fn decode_splits_coalesced_frames() {
        let mut src = encoded(Request::Join("a".into()));
        src.extend_from_slice(&encoded(Request::UsersList));
        src.extend_from_slice(&encoded(Request::Disconnect("a".into()))[..3]);

        let mut codec = ChatCodec::new();
        assert_eq!(codec.decode(&mut src).unwrap().unwrap().tag, "join");
        assert_eq!(codec.decode(&mut src).unwrap().unwrap().tag, "request_users_list");
        assert!(codec.decode(&mut src).unwrap().is_none());
        assert_eq!(src.len(), 3);
    }

    #[test]
    fn oversized_frames_are_rejected() {
        let mut codec = ChatCodec::with_max_len(8);

        let mut src = BytesMut::new();
        src.put_u32(9);
        assert!(matches!(codec.decode(&mut src), Err(ProtocolError::FrameTooLarge { len: 9, max: 8 })));

        let mut dst = BytesMut::new();
        let result = codec.encode(Request::Join("longer-name".into()), &mut dst);
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut src = BytesMut::new();
        src.put_u32(2);
        src.extend_from_slice(&[0xff, 0xfe]);
        assert!(matches!(ChatCodec::new().decode(&mut src), Err(ProtocolError::InvalidUtf8)));
    }
}
