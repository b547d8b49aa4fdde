//! `tokio-util` codec for framed messages.

use super::{decode_header, encode_header, Message, HEADER_LEN};
use crate::utils::ChannelError;
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Default, Clone, Copy)]
pub struct MessageCodec;

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = ChannelError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, ChannelError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }
        let (cmd, len) = decode_header(&src[..HEADER_LEN]).map_err(ChannelError::BadFrame)?;
        if src.len() < HEADER_LEN + len {
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }
        src.advance(HEADER_LEN);
        let payload = src.split_to(len).to_vec();
        Ok(Some(Message { cmd, payload }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>, ChannelError> {
        match self.decode(src)? {
            Some(msg) => Ok(Some(msg)),
            None if src.is_empty() => Ok(None),
            None => Err(ChannelError::BadFrame(format!(
                "connection closed mid-frame with {} bytes buffered",
                src.len()
            ))),
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = ChannelError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), ChannelError> {
        let header = encode_header(msg.cmd, msg.payload.len())
            .ok_or(ChannelError::PayloadTooLarge(msg.payload.len()))?;
        dst.reserve(HEADER_LEN + msg.payload.len());
        dst.put_slice(&header);
        dst.put_slice(&msg.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{Command, MAX_PAYLOAD};

    #[test]
    fn test_decode_waits_for_full_frame() {
        let mut codec = MessageCodec;
        let mut buf = BytesMut::from(&b"c00"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"05hel");
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"lo");
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg, Message::gen("hello"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_back_to_back_frames() {
        let mut codec = MessageCodec;
        let mut buf = BytesMut::from(&b"c0002okc0000"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), Message::gen("ok"));
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), Message::gen(""));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_rejects_bad_header() {
        let mut codec = MessageCodec;
        let mut buf = BytesMut::from(&b"Zzzzzzz"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ChannelError::BadFrame(_))
        ));
    }

    #[test]
    fn test_eof_mid_frame_is_an_error() {
        let mut codec = MessageCodec;
        let mut buf = BytesMut::from(&b"c0005he"[..]);
        assert!(codec.decode_eof(&mut buf).is_err());

        let mut empty = BytesMut::new();
        assert!(codec.decode_eof(&mut empty).unwrap().is_none());
    }

    #[test]
    fn test_encode_writes_header_and_payload() {
        let mut codec = MessageCodec;
        let mut buf = BytesMut::new();
        codec
            .encode(Message::new(Command::Directory, "/home"), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"d0005/home");
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let mut codec = MessageCodec;
        let mut buf = BytesMut::new();
        let big = Message::new(Command::Gen, vec![b'a'; MAX_PAYLOAD + 1]);
        assert!(matches!(
            codec.encode(big, &mut buf),
            Err(ChannelError::PayloadTooLarge(_))
        ));
        assert!(buf.is_empty());
    }
}
