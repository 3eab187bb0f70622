//! Bounded tail of stdin with live pass-through.

use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

pub const CHUNK_SIZE: usize = 8192;

/// The kept tail and how much input went past it
#[derive(Debug, Default, PartialEq)]
pub struct TailWindow {
    pub bytes: Vec<u8>,
    /// Total bytes read, including those that fell out of the window
    pub received: usize,
}

/// Copy `reader` to `writer` chunk by chunk and keep the last `limit` bytes.
///
/// Every chunk is written and flushed before the next read, so pass-through
/// latency does not depend on `limit`. Memory stays below `limit + CHUNK_SIZE`.
pub async fn tail_window<R, W>(
    reader: &mut R,
    writer: &mut W,
    limit: usize,
) -> io::Result<TailWindow>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tail_window_chunked(reader, writer, limit, CHUNK_SIZE).await
}

async fn tail_window_chunked<R, W>(
    reader: &mut R,
    writer: &mut W,
    limit: usize,
    chunk_size: usize,
) -> io::Result<TailWindow>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut chunk = vec![0u8; chunk_size];
    let mut window: Vec<u8> = Vec::new();
    let mut received = 0usize;

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&chunk[..n]).await?;
        writer.flush().await?;
        received += n;

        // Trim before appending so the window never holds more than `limit`
        let keep = &chunk[n.saturating_sub(limit)..n];
        let excess = (window.len() + keep.len()).saturating_sub(limit);
        window.drain(..excess);
        let needed = window.len() + keep.len();
        if window.capacity() < needed {
            let target = (window.capacity() * 2).max(needed).min(limit);
            window.reserve_exact(target - window.len());
        }
        window.extend_from_slice(keep);
    }

    trace!("Read {} bytes from input, kept {}", received, window.len());
    Ok(TailWindow {
        bytes: window,
        received,
    })
}
