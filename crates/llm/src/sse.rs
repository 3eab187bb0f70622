//! Server-Sent-Events framing on top of a line stream.

use crate::ApiError;
use futures::stream::{self, BoxStream, StreamExt};

/// One blank-line-delimited SSE block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    /// All `data:` lines of the block joined with `\n`
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    fn from_block(lines: &[String]) -> Self {
        let mut event = SseEvent::default();
        let mut data_lines: Vec<&str> = Vec::new();

        for line in lines {
            if let Some(value) = field_value(line, "data:") {
                data_lines.push(value);
            } else if let Some(value) = field_value(line, "event:") {
                event.event = Some(value.to_string());
            } else if let Some(value) = field_value(line, "id:") {
                event.id = Some(value.to_string());
            }
        }

        event.data = data_lines.join("\n");
        event
    }
}

fn field_value<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.strip_prefix(prefix)
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
}

/// Incremental SSE block assembler. Feed it lines; it hands back an event
/// whenever a blank line closes a non-empty block.
#[derive(Debug, Default)]
pub struct SseParser {
    pending: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: String) -> Option<SseEvent> {
        if line.is_empty() {
            self.flush()
        } else {
            self.pending.push(line);
            None
        }
    }

    /// Emit the last block when the input ended without a closing blank line
    pub fn finish(&mut self) -> Option<SseEvent> {
        self.flush()
    }

    fn flush(&mut self) -> Option<SseEvent> {
        if self.pending.is_empty() {
            return None;
        }
        let event = SseEvent::from_block(&self.pending);
        self.pending.clear();
        Some(event)
    }
}

struct EventState {
    lines: BoxStream<'static, Result<String, ApiError>>,
    parser: SseParser,
    done: bool,
}

/// Turn a line stream into a lazy stream of SSE events
pub fn events(
    lines: BoxStream<'static, Result<String, ApiError>>,
) -> BoxStream<'static, Result<SseEvent, ApiError>> {
    let state = EventState {
        lines,
        parser: SseParser::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        loop {
            match state.lines.next().await {
                Some(Ok(line)) => {
                    if let Some(event) = state.parser.push_line(line) {
                        return Some((Ok(event), state));
                    }
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.done = true;
                    return state.parser.finish().map(|event| (Ok(event), state));
                }
            }
        }
    })
    .boxed()
}
