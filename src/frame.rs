//! Decoding of the backend's streamed response into frames.
//!
//! The backend writes JSON objects as they are produced. Depending on the
//! deployment these arrive as newline-delimited JSON, as SSE `data:` lines, or
//! as one bare object per network chunk. Malformed data is dropped and never
//! ends the stream.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One decoded unit of a streamed response. Fields beyond the identifiers are
/// kept as-is so the presentation side can render them verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Frame {
    /// A frame that repeats its own parent is a backend replay, not new content.
    pub fn is_echo(&self) -> bool {
        self.parent_message_id.as_deref() == Some(self.id.as_str())
    }

    pub fn text(&self) -> Option<&str> {
        self.fields.get("text").and_then(Value::as_str)
    }
}

/// How raw response bytes are split into frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameParsing {
    /// Accumulate across chunks and parse one frame per line.
    #[default]
    Lines,
    /// Parse every chunk on its own as a single JSON object.
    PerChunk,
}

#[derive(Debug)]
pub struct FrameDecoder {
    mode: FrameParsing,
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new(mode: FrameParsing) -> Self {
        Self {
            mode,
            buffer: Vec::new(),
        }
    }

    /// Feed one chunk of raw bytes and return every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        match self.mode {
            FrameParsing::PerChunk => parse_payload(&String::from_utf8_lossy(chunk))
                .into_iter()
                .collect(),
            FrameParsing::Lines => {
                self.buffer.extend_from_slice(chunk);
                let mut frames = Vec::new();
                while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = self.buffer.drain(..=pos).collect();
                    frames.extend(parse_line(&String::from_utf8_lossy(&line)));
                }

                // Backends that write bare objects without a delimiter leave
                // whole frames sitting in the unterminated tail.
                if self.buffer.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{') {
                    let (decoded, consumed) = take_objects(&self.buffer);
                    self.buffer.drain(..consumed);
                    frames.extend(decoded);
                }
                frames
            }
        }
    }

    /// Flush an unterminated trailing line once the stream has closed.
    pub fn finish(&mut self) -> Vec<Frame> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&String::from_utf8_lossy(&rest))
    }
}

fn parse_line(line: &str) -> Vec<Frame> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return Vec::new();
    }
    let payload = match line.strip_prefix("data:") {
        Some(data) => data.trim_start(),
        None if line.starts_with("event:") || line.starts_with("id:") => return Vec::new(),
        None => line,
    };
    if payload == "[DONE]" {
        return Vec::new();
    }

    let (frames, consumed) = take_objects(payload.as_bytes());
    let rest = payload[consumed..].trim();
    if !rest.is_empty() {
        tracing::debug!("Dropping undecodable input: {:.80}", rest);
    }
    frames
}

/// Decode back-to-back JSON objects from the front of `bytes`.
///
/// Returns the frames and how many bytes were consumed. Decoding stops at an
/// incomplete trailing object or at the first syntax error; everything from
/// there on is left to the caller. Well-formed objects that are not frames are
/// consumed and dropped.
fn take_objects(bytes: &[u8]) -> (Vec<Frame>, usize) {
    let mut values = serde_json::Deserializer::from_slice(bytes).into_iter::<Value>();
    let mut frames = Vec::new();
    let mut consumed = 0;
    loop {
        match values.next() {
            Some(Ok(value)) => {
                consumed = values.byte_offset();
                match serde_json::from_value::<Frame>(value) {
                    Ok(frame) => frames.push(frame),
                    Err(e) => tracing::debug!("Dropping object that is not a frame: {}", e),
                }
            }
            Some(Err(e)) if e.is_eof() => break,
            Some(Err(e)) => {
                tracing::debug!("Stopping frame decode at byte {}: {}", consumed, e);
                break;
            }
            None => {
                consumed = values.byte_offset();
                break;
            }
        }
    }
    (frames, consumed)
}

fn parse_payload(payload: &str) -> Option<Frame> {
    match serde_json::from_str::<Frame>(payload.trim()) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::debug!("Dropping undecodable frame ({}): {:.80}", e, payload);
            None
        }
    }
}
