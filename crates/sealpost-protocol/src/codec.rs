use bytes::{Buf, BytesMut};

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::Message;

/// Maximum frame payload: 1 MiB.
pub const MAX_MSG_SIZE: usize = 1024 * 1024;

/// Encode a `Message` as a length-prefixed JSON frame.
pub fn encode_frame(msg: &Message) -> ProtocolResult<Vec<u8>> {
    let payload = msg.to_json()?;
    if payload.len() > MAX_MSG_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: payload.len(),
            max: MAX_MSG_SIZE,
        });
    }
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decode a `Message` from a frame payload (without length prefix).
pub fn decode_message(payload: &[u8]) -> ProtocolResult<Message> {
    Message::from_json(payload)
}

/// Attempt to extract one complete length-prefixed frame from a byte buffer.
///
/// Returns `Ok(Some(payload))` if a complete message is available,
/// `Ok(None)` if more data is needed, or `Err` if the message is too large.
///
/// Advances the buffer past the consumed frame.
pub fn try_decode_frame(buf: &mut BytesMut) -> ProtocolResult<Option<Vec<u8>>> {
    if buf.len() < 4 {
        return Ok(None);
    }

    let length = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

    if length > MAX_MSG_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: length,
            max: MAX_MSG_SIZE,
        });
    }

    if buf.len() < 4 + length {
        return Ok(None);
    }

    buf.advance(4);
    let payload = buf.split_to(length).to_vec();
    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::fields;

    #[test]
    fn frame_roundtrip() {
        let msg = Message::new()
            .with(fields::CMD, "xchg")
            .with(fields::CLIENT_PUBLIC_KEY, vec![0x30, 0x82]);
        let encoded = encode_frame(&msg).unwrap();
        let declared = u32::from_be_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]);
        assert_eq!(declared as usize, encoded.len() - 4);
        assert_eq!(decode_message(&encoded[4..]).unwrap(), msg);
    }

    #[test]
    fn frame_decoding() {
        let msg = Message::new().with(fields::CMD, "data");
        let encoded = encode_frame(&msg).unwrap();

        let mut buf = BytesMut::new();

        // Partial data, no frame yet
        buf.extend_from_slice(&encoded[..3]);
        assert!(try_decode_frame(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&encoded[3..6]);
        assert!(try_decode_frame(&mut buf).unwrap().is_none());

        // Complete data
        buf.extend_from_slice(&encoded[6..]);
        let payload = try_decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(decode_message(&payload).unwrap(), msg);

        // Buffer should be empty now
        assert!(buf.is_empty());
    }

    #[test]
    fn frame_multiple_messages() {
        let first = Message::new().with(fields::CMD, "xchg");
        let second = Message::new().with(fields::CMD, "data");

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode_frame(&first).unwrap());
        buf.extend_from_slice(&encode_frame(&second).unwrap());

        let payload1 = try_decode_frame(&mut buf).unwrap().unwrap();
        let payload2 = try_decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(decode_message(&payload1).unwrap(), first);
        assert_eq!(decode_message(&payload2).unwrap(), second);
        assert!(buf.is_empty());
    }

    #[test]
    fn frame_message_too_large() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&((MAX_MSG_SIZE + 1) as u32).to_be_bytes());
        buf.extend_from_slice(&[0u8; 100]);
        let result = try_decode_frame(&mut buf);
        assert!(matches!(result, Err(ProtocolError::MessageTooLarge { .. })));
    }

    #[test]
    fn encode_rejects_oversized_message() {
        let msg = Message::new().with(fields::DATA, vec![0u8; MAX_MSG_SIZE]);
        let result = encode_frame(&msg);
        assert!(matches!(result, Err(ProtocolError::MessageTooLarge { .. })));
    }

    #[test]
    fn decode_rejects_invalid_json() {
        assert!(matches!(decode_message(b"{not json"), Err(ProtocolError::Json(_))));
    }
}
