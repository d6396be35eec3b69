//! Length-prefixed UTF-8 strings

use bytes::{Buf, BufMut};

use super::codec::{ensure_remaining, CodecResult};
use super::varint::{get_varint, put_varint, varint_size};

/// Encoded size of `s`, prefix included
pub fn string_size(s: &str) -> usize {
    varint_size(s.len() as u64) + s.len()
}

/// Append `s` as a varint byte length followed by its UTF-8 bytes
pub fn put_string<B: BufMut>(buf: &mut B, s: &str) {
    put_varint(buf, s.len() as u64);
    buf.put_slice(s.as_bytes());
}

/// Read one length-prefixed string.
///
/// No length cap is applied here; transports bound message size before the
/// bytes ever reach the codec.
pub fn get_string<B: Buf>(buf: &mut B) -> CodecResult<String> {
    let len = get_varint(buf)?;
    let len = usize::try_from(len).unwrap_or(usize::MAX);
    ensure_remaining(buf, len)?;

    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CodecError;
    use bytes::BytesMut;

    fn roundtrip(s: &str) -> String {
        let mut buf = BytesMut::new();
        put_string(&mut buf, s);
        assert_eq!(buf.len(), string_size(s));

        let mut bytes = buf.freeze();
        let decoded = get_string(&mut bytes).unwrap();
        assert!(bytes.is_empty());
        decoded
    }

    #[test]
    fn test_roundtrip() {
        let long = "abcdefghijklmnopqrstuvwxzy-*+_".repeat(10);
        for s in ["", "n1", "héllo wörld", "图形流", "🦀 edges", long.as_str()] {
            assert_eq!(roundtrip(s), s);
        }
    }

    #[test]
    fn test_length_is_in_bytes() {
        let mut buf = BytesMut::new();
        put_string(&mut buf, "é");
        assert_eq!(&buf[..], &[0x02, 0xC3, 0xA9]);
    }

    #[test]
    fn test_truncated() {
        let mut buf: &[u8] = &[0x05, b'a', b'b'];
        assert!(matches!(
            get_string(&mut buf),
            Err(CodecError::TruncatedInput {
                needed: 5,
                remaining: 2
            })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut buf: &[u8] = &[0x02, 0xC3, 0x28];
        assert!(matches!(get_string(&mut buf), Err(CodecError::InvalidUtf8(_))));
    }
}
