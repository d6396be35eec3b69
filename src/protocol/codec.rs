//! Codec errors and stream framing
//!
//! NetStream messages are self-describing but not self-delimiting: a stream
//! transport has to say where one message ends. Raw sockets use a 4-byte
//! big-endian length prefix in front of every message.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use thiserror::Error;

/// Maximum frame size accepted by default (10 MB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Header size: length(4)
const HEADER_SIZE: usize = 4;

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Truncated input: needed {needed} more bytes, {remaining} remaining")]
    TruncatedInput { needed: usize, remaining: usize },

    #[error("Unknown value type: {0:#04x}")]
    UnknownValueType(u8),

    #[error("Unknown command: {0:#04x}")]
    UnknownCommand(u8),

    #[error("Values nested deeper than {0} levels")]
    NestingTooDeep(usize),

    #[error("Varint exceeds 64 bits")]
    VarintOverflow,

    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("Message too large: {0} bytes (max: {1})")]
    MessageTooLarge(usize, usize),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Fail with `TruncatedInput` unless `buf` holds at least `needed` bytes.
pub(crate) fn ensure_remaining<B: Buf>(buf: &B, needed: usize) -> CodecResult<()> {
    if buf.remaining() < needed {
        return Err(CodecError::TruncatedInput {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

/// Writes length-prefixed frames
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    max_size: usize,
}

impl FrameEncoder {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    /// Append one framed message to `buf`
    pub fn encode(&self, message: &[u8], buf: &mut BytesMut) -> CodecResult<()> {
        if message.len() > self.max_size {
            return Err(CodecError::MessageTooLarge(message.len(), self.max_size));
        }

        buf.reserve(HEADER_SIZE + message.len());
        buf.put_u32(message.len() as u32);
        buf.put_slice(message);
        Ok(())
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

/// Splits a byte stream back into frames
#[derive(Debug)]
pub struct FrameDecoder {
    max_size: usize,
    state: DecodeState,
}

#[derive(Debug, Default)]
enum DecodeState {
    #[default]
    Header,
    Payload {
        length: usize,
    },
}

impl FrameDecoder {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            state: DecodeState::Header,
        }
    }

    /// Attempt to decode a frame from the buffer
    /// Returns Ok(None) if more data is needed
    pub fn decode(&mut self, buf: &mut BytesMut) -> CodecResult<Option<Bytes>> {
        loop {
            match self.state {
                DecodeState::Header => {
                    if buf.len() < HEADER_SIZE {
                        return Ok(None);
                    }

                    let length = buf.get_u32() as usize;
                    if length > self.max_size {
                        return Err(CodecError::MessageTooLarge(length, self.max_size));
                    }

                    self.state = DecodeState::Payload { length };
                }
                DecodeState::Payload { length } => {
                    if buf.len() < length {
                        buf.reserve(length - buf.len());
                        return Ok(None);
                    }

                    self.state = DecodeState::Header;
                    return Ok(Some(buf.split_to(length).freeze()));
                }
            }
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let encoder = FrameEncoder::default();
        let mut decoder = FrameDecoder::default();
        let mut buf = BytesMut::new();

        encoder.encode(&[0x10, 0x01, b'g'], &mut buf).unwrap();
        assert_eq!(&buf[..4], &[0, 0, 0, 3]);

        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], &[0x10, 0x01, b'g']);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_multiple_frames_split_reads() {
        let encoder = FrameEncoder::default();
        let mut decoder = FrameDecoder::default();
        let mut wire = BytesMut::new();

        let messages: Vec<Vec<u8>> = vec![vec![0x02], vec![0x10; 300], vec![]];
        for msg in &messages {
            encoder.encode(msg, &mut wire).unwrap();
        }

        // Feed the stream one byte at a time
        let mut buf = BytesMut::new();
        let mut frames = Vec::new();
        for byte in wire.iter() {
            buf.put_u8(*byte);
            while let Some(frame) = decoder.decode(&mut buf).unwrap() {
                frames.push(frame.to_vec());
            }
        }

        assert_eq!(frames, messages);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut decoder = FrameDecoder::new(16);
        let mut buf = BytesMut::new();
        buf.put_u32(17);

        assert!(matches!(
            decoder.decode(&mut buf),
            Err(CodecError::MessageTooLarge(17, 16))
        ));
        assert!(matches!(
            FrameEncoder::new(2).encode(&[1, 2, 3], &mut BytesMut::new()),
            Err(CodecError::MessageTooLarge(3, 2))
        ));
    }
}
