//! Common streaming infrastructure for LLM providers
//!
//! Response bodies are pulled chunk by chunk, split into text lines, and then
//! decoded by a protocol-specific function into text deltas. Every stage is a
//! lazy `futures` stream, so the first delta is available as soon as the
//! first complete frame has arrived.

use crate::{ApiError, DeltaStream};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Response;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

/// Source of raw body chunks (a live HTTP response, or a scripted source in tests)
#[async_trait]
pub trait ChunkStream: Send {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ApiError>;
}

/// Real HTTP response chunk stream
pub struct HttpChunkStream {
    response: Response,
    idle_timeout: Option<Duration>,
}

impl HttpChunkStream {
    pub fn new(response: Response, idle_timeout: Option<Duration>) -> Self {
        Self {
            response,
            idle_timeout,
        }
    }
}

#[async_trait]
impl ChunkStream for HttpChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ApiError> {
        let chunk = match self.idle_timeout {
            Some(idle_timeout) => tokio::time::timeout(idle_timeout, self.response.chunk())
                .await
                .map_err(|_| {
                    ApiError::Timeout(format!(
                        "stream stalled for more than {:.1}s",
                        idle_timeout.as_secs_f64()
                    ))
                })?,
            None => self.response.chunk().await,
        };

        match chunk {
            Ok(Some(chunk)) => Ok(Some(chunk.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Splits a byte stream into lines.
///
/// Bytes are buffered until a `\n` arrives, so chunk boundaries inside a line or
/// inside a multi-byte character do not matter. A trailing `\r` is dropped and
/// invalid UTF-8 is replaced.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                lines.push(Self::decode(&self.buffer));
                self.buffer.clear();
            } else {
                self.buffer.push(byte);
            }
        }
        lines
    }

    /// Flush a final line that was not newline-terminated
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = Self::decode(&self.buffer);
        self.buffer.clear();
        Some(line)
    }

    fn decode(bytes: &[u8]) -> String {
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        String::from_utf8_lossy(bytes).into_owned()
    }
}

struct LineState {
    source: Box<dyn ChunkStream>,
    framer: LineFramer,
    pending: VecDeque<String>,
    exhausted: bool,
}

/// Turn a chunk source into a lazy stream of lines.
///
/// A transport error is yielded once and ends the stream.
pub fn lines(source: Box<dyn ChunkStream>) -> BoxStream<'static, Result<String, ApiError>> {
    let state = LineState {
        source,
        framer: LineFramer::new(),
        pending: VecDeque::new(),
        exhausted: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.pending.pop_front() {
                return Some((Ok(line), state));
            }
            if state.exhausted {
                return None;
            }
            match state.source.next_chunk().await {
                Ok(Some(chunk)) => {
                    let lines = state.framer.push(&chunk);
                    state.pending.extend(lines);
                }
                Ok(None) => {
                    state.exhausted = true;
                    if let Some(line) = state.framer.finish() {
                        state.pending.push_back(line);
                    }
                }
                Err(e) => {
                    state.exhausted = true;
                    state.pending.clear();
                    return Some((Err(e), state));
                }
            }
        }
    })
    .boxed()
}

/// What a protocol decoder extracted from one frame
#[derive(Debug, Default, PartialEq)]
pub struct Frame {
    pub deltas: Vec<String>,
    /// The backend signalled completion; nothing after this frame is yielded
    pub stop: bool,
}

impl Frame {
    pub fn skip() -> Self {
        Self::default()
    }

    pub fn stop() -> Self {
        Self {
            deltas: Vec::new(),
            stop: true,
        }
    }

    pub fn deltas(deltas: Vec<String>) -> Self {
        Self {
            deltas,
            stop: false,
        }
    }
}

struct DeltaState<T, F> {
    frames: BoxStream<'static, Result<T, ApiError>>,
    decode: F,
    pending: VecDeque<String>,
    finished: bool,
}

/// Run `decode` over each frame and flatten the result into a [`DeltaStream`].
///
/// Empty deltas are dropped. The stream ends after a stop frame, when the frame
/// source ends, or after yielding the first error.
pub fn deltas<T, F>(frames: BoxStream<'static, Result<T, ApiError>>, decode: F) -> DeltaStream
where
    T: Send + 'static,
    F: FnMut(T) -> Frame + Send + 'static,
{
    let state = DeltaState {
        frames,
        decode,
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(delta) = state.pending.pop_front() {
                return Some((Ok(delta), state));
            }
            if state.finished {
                return None;
            }
            match state.frames.next().await {
                Some(Ok(frame)) => {
                    let frame = (state.decode)(frame);
                    state
                        .pending
                        .extend(frame.deltas.into_iter().filter(|delta| !delta.is_empty()));
                    if frame.stop {
                        debug!("Backend signalled end of stream");
                        state.finished = true;
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e), state));
                }
                None => return None,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Chunk source that replays a fixed script
    pub(crate) struct ScriptedChunkStream {
        chunks: VecDeque<Result<Vec<u8>, ApiError>>,
    }

    impl ScriptedChunkStream {
        pub(crate) fn new(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| Ok(c.to_vec())).collect(),
            }
        }

        pub(crate) fn failing_after(chunks: &[&[u8]], error: ApiError) -> Self {
            let mut stream = Self::new(chunks);
            stream.chunks.push_back(Err(error));
            stream
        }
    }

    #[async_trait]
    impl ChunkStream for ScriptedChunkStream {
        async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ApiError> {
            match self.chunks.pop_front() {
                Some(Ok(chunk)) => Ok(Some(chunk)),
                Some(Err(e)) => Err(e),
                None => Ok(None),
            }
        }
    }

    async fn collect_lines(chunks: &[&[u8]]) -> Vec<String> {
        lines(Box::new(ScriptedChunkStream::new(chunks)))
            .map(|line| line.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_lines_independent_of_chunk_boundaries() {
        let whole = collect_lines(&[b"alpha\nbeta\r\ngamma"]).await;
        let split = collect_lines(&[b"al", b"pha\nbeta\r", b"\ngam", b"ma"]).await;
        assert_eq!(whole, vec!["alpha", "beta", "gamma"]);
        assert_eq!(split, whole);
    }

    #[tokio::test]
    async fn test_lines_multibyte_split_across_chunks() {
        let text = "grüße\n".as_bytes();
        let (head, tail) = text.split_at(3);
        let lines = collect_lines(&[head, tail]).await;
        assert_eq!(lines, vec!["grüße"]);
    }

    #[tokio::test]
    async fn test_lines_keeps_blank_lines() {
        let lines = collect_lines(&[b"a\n\nb\n"]).await;
        assert_eq!(lines, vec!["a", "", "b"]);
    }

    #[tokio::test]
    async fn test_lines_error_ends_stream() {
        let source = ScriptedChunkStream::failing_after(
            &[b"one\ntw"],
            ApiError::NetworkError("reset".to_string()),
        );
        let items: Vec<_> = lines(Box::new(source)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "one");
        assert!(matches!(items[1], Err(ApiError::NetworkError(_))));
    }

    #[tokio::test]
    async fn test_deltas_stop_and_skip_empty() {
        let frames = stream::iter(vec![
            Ok("a".to_string()),
            Ok("".to_string()),
            Ok("stop".to_string()),
            Ok("never".to_string()),
        ])
        .boxed();
        let out: Vec<String> = deltas(frames, |frame: String| {
            if frame == "stop" {
                Frame::stop()
            } else {
                Frame::deltas(vec![frame])
            }
        })
        .map(|delta| delta.unwrap())
        .collect()
        .await;
        assert_eq!(out, vec!["a"]);
    }
}
