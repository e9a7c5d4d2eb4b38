//! Incremental rendering of line-delimited agent event streams.
//!
//! The assistant CLI emits one JSON event per line. Process output arrives
//! in arbitrary chunks, so a line may be split across reads; the
//! unterminated fragment after the last newline is carried in an explicit
//! [`StreamState`] value returned to the caller and re-supplied with the
//! next chunk. Rendering is pure: the caller writes the result to a sink.
//!
//! Invariant: `state.pending_tail` concatenated with the next chunk
//! reproduces the original stream, so rendering is chunking-invariant.

use console::style;
use serde_json::Value;

/// Output profiles the engine knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamProfile {
    /// Line-delimited JSON events from the assistant CLI.
    AgentEvents,

    /// Everything else: chunks pass through verbatim, no state.
    #[default]
    PassThrough,
}

/// Carried render state: the fragment after the last newline of the most
/// recently processed chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    pub pending_tail: String,
}

/// Render one chunk, returning the displayable text and the new state.
pub fn render(profile: StreamProfile, chunk: &str, state: StreamState) -> (String, StreamState) {
    match profile {
        StreamProfile::PassThrough => (chunk.to_string(), StreamState::default()),
        StreamProfile::AgentEvents => {
            let mut buffer = state.pending_tail;
            buffer.push_str(chunk);

            let mut rendered = String::new();
            let mut tail = String::new();
            let mut parts = buffer.split('\n').peekable();
            while let Some(part) = parts.next() {
                if parts.peek().is_some() {
                    rendered.push_str(&render_line(part));
                } else {
                    // The element after the final newline is the new tail,
                    // whether empty, partial, or a complete unterminated line.
                    tail = part.to_string();
                }
            }

            (rendered, StreamState { pending_tail: tail })
        }
    }
}

/// Final flush at stream end: renders any trailing buffered line by
/// appending a synthetic newline. Resets the state to empty.
pub fn finish(profile: StreamProfile, state: StreamState) -> String {
    match profile {
        StreamProfile::PassThrough => String::new(),
        StreamProfile::AgentEvents => {
            if state.pending_tail.is_empty() {
                String::new()
            } else {
                render(profile, "\n", state).0
            }
        }
    }
}

/// Render one complete event line. Decode failures and unrecognized event
/// types render as the empty string; this function never fails.
fn render_line(line: &str) -> String {
    let trimmed = line.trim_end_matches('\r').trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let Ok(event) = serde_json::from_str::<Value>(trimmed) else {
        return String::new();
    };

    match event.get("type").and_then(Value::as_str) {
        Some("text") => event
            .pointer("/part/text")
            .and_then(Value::as_str)
            .map(|text| format!("{text}\n"))
            .unwrap_or_default(),
        Some("tool") => render_tool(&event),
        Some("step-start") => format!("{}\n", style("-- step started").dim()),
        Some("step-finish") => {
            let reason = event
                .pointer("/part/reason")
                .and_then(Value::as_str)
                .unwrap_or("done");
            format!("{}\n", style(format!("-- step finished ({reason})")).dim())
        }
        Some("error") => {
            let message = event
                .pointer("/part/message")
                .or_else(|| event.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            format!("{}\n", style(format!("error: {message}")).red())
        }
        _ => String::new(),
    }
}

fn render_tool(event: &Value) -> String {
    let Some(name) = event.pointer("/part/tool").and_then(Value::as_str) else {
        return String::new();
    };
    let status = event
        .pointer("/part/state/status")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let title = event.pointer("/part/state/title").and_then(Value::as_str);

    let mut out = match title {
        Some(title) => format!("[tool] {name} ({status}): {title}\n"),
        None => format!("[tool] {name} ({status})\n"),
    };
    if let Some(output) = event
        .pointer("/part/state/output")
        .and_then(Value::as_str)
        .filter(|o| !o.is_empty())
    {
        out.push_str(output);
        if !output.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}
