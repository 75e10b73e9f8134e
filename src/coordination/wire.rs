//! ZooKeeper Wire Encoding
//!
//! Minimal jute serialization for the request/response shapes the
//! client uses. All integers are big-endian; strings and byte buffers
//! are length-prefixed with an i32 (-1 meaning empty).

use byteorder::{BigEndian, ByteOrder};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Upper bound on a single frame; anything larger is a corrupt stream.
const MAX_FRAME_LEN: i32 = 1 << 20;

pub(crate) fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_i32(s.len() as i32);
    buf.put_slice(s.as_bytes());
}

pub(crate) fn put_buffer(buf: &mut BytesMut, b: &[u8]) {
    buf.put_i32(b.len() as i32);
    buf.put_slice(b);
}

pub(crate) fn get_i32(buf: &mut Bytes) -> Result<i32> {
    if buf.remaining() < 4 {
        return Err(Error::Protocol("frame truncated reading i32".into()));
    }
    Ok(buf.get_i32())
}

pub(crate) fn get_i64(buf: &mut Bytes) -> Result<i64> {
    if buf.remaining() < 8 {
        return Err(Error::Protocol("frame truncated reading i64".into()));
    }
    Ok(buf.get_i64())
}

pub(crate) fn get_buffer(buf: &mut Bytes) -> Result<Bytes> {
    let len = get_i32(buf)?;
    if len <= 0 {
        return Ok(Bytes::new());
    }
    let len = len as usize;
    if buf.remaining() < len {
        return Err(Error::Protocol("frame truncated reading buffer".into()));
    }
    Ok(buf.split_to(len))
}

pub(crate) fn get_string(buf: &mut Bytes) -> Result<String> {
    let raw = get_buffer(buf)?;
    String::from_utf8(raw.to_vec()).map_err(|_| Error::Protocol("non-utf8 string".into()))
}

pub(crate) fn get_string_vec(buf: &mut Bytes) -> Result<Vec<String>> {
    let count = get_i32(buf)?;
    if count <= 0 {
        return Ok(Vec::new());
    }
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(get_string(buf)?);
    }
    Ok(out)
}

/// Write one length-prefixed frame.
pub(crate) async fn write_frame<W: AsyncWrite + Unpin>(w: &mut W, payload: &[u8]) -> Result<()> {
    let mut frame = BytesMut::with_capacity(payload.len() + 4);
    frame.put_i32(payload.len() as i32);
    frame.put_slice(payload);
    w.write_all(&frame).await?;
    Ok(())
}

/// Read one length-prefixed frame.
pub(crate) async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> Result<Bytes> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf).await?;
    let len = BigEndian::read_i32(&len_buf);
    if !(0..=MAX_FRAME_LEN).contains(&len) {
        return Err(Error::Protocol(format!("invalid frame length {len}")));
    }
    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload).await?;
    Ok(Bytes::from(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_roundtrip() {
        let mut buf = BytesMut::new();
        put_string(&mut buf, "/election");
        let mut bytes = buf.freeze();
        assert_eq!(get_string(&mut bytes).unwrap(), "/election");
        assert_eq!(bytes.remaining(), 0);
    }

    #[test]
    fn test_empty_buffer_encoded_as_zero_length() {
        let mut buf = BytesMut::new();
        put_buffer(&mut buf, &[]);
        let mut bytes = buf.freeze();
        assert!(get_buffer(&mut bytes).unwrap().is_empty());
    }

    #[test]
    fn test_string_vec() {
        let mut buf = BytesMut::new();
        buf.put_i32(3);
        for name in ["0", "1", "2"] {
            put_string(&mut buf, name);
        }
        let mut bytes = buf.freeze();
        assert_eq!(get_string_vec(&mut bytes).unwrap(), vec!["0", "1", "2"]);
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let mut bytes = Bytes::from_static(&[0, 0]);
        assert!(get_i32(&mut bytes).is_err());
    }

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"payload").await.unwrap();
        let mut cursor = std::io::Cursor::new(wire);
        let frame = read_frame(&mut cursor).await.unwrap();
        assert_eq!(&frame[..], b"payload");
    }
}
