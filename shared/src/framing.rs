//! Length-prefixed text frames over a byte stream.
//!
//! A frame is a 2-byte big-endian length followed by that many bytes of
//! UTF-8. This is the framing produced by `DataOutputStream::writeUTF`, so
//! the server also talks to JVM clients for any text without NUL or
//! characters outside the Basic Multilingual Plane.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload a 2-byte length prefix can describe.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Write one frame and flush it.
pub async fn write_frame<W>(writer: &mut W, text: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u16::try_from(text.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "frame too large: {} bytes (max {MAX_FRAME_LEN})",
                text.len()
            ),
        )
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await
}

/// Read one frame.
///
/// Returns `UnexpectedEof` if the stream ends before or inside a frame and
/// `InvalidData` if the payload is not UTF-8.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u16().await?;
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
