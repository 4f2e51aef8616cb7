//! Line-framed stream protocol spoken between the relay and its clients.
//!
//! Every part is a single line of the form `<code>:<json>\n`. Text parts carry the fragments
//! produced by the provider, the finish-message part marks a successful end, and an error part
//! marks a failed one.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

/// Header announcing the protocol version to clients.
pub const HEADER_NAME: &str = "x-vercel-ai-data-stream";
pub const HEADER_VALUE: &str = "v1";
pub const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

const TEXT: &str = "0";
const ERROR: &str = "3";
const START_STEP: &str = "f";
const FINISH_STEP: &str = "e";
const FINISH_MESSAGE: &str = "d";

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    #[default]
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Error,
    Other,
    Unknown,
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StartStep {
    pub message_id: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FinishStep {
    pub finish_reason: FinishReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub is_continued: bool,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FinishMessage {
    pub finish_reason: FinishReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPart {
    StartStep(StartStep),
    Text(String),
    Error(String),
    FinishStep(FinishStep),
    FinishMessage(FinishMessage),
}

impl StreamPart {
    fn code(&self) -> &'static str {
        match self {
            StreamPart::StartStep(_) => START_STEP,
            StreamPart::Text(_) => TEXT,
            StreamPart::Error(_) => ERROR,
            StreamPart::FinishStep(_) => FINISH_STEP,
            StreamPart::FinishMessage(_) => FINISH_MESSAGE,
        }
    }

    fn payload(&self) -> serde_json::Result<String> {
        match self {
            StreamPart::StartStep(part) => serde_json::to_string(part),
            StreamPart::Text(text) | StreamPart::Error(text) => serde_json::to_string(text),
            StreamPart::FinishStep(part) => serde_json::to_string(part),
            StreamPart::FinishMessage(part) => serde_json::to_string(part),
        }
    }

    /// Decodes a single line, without its trailing newline.
    ///
    /// Unknown part codes decode to `None` so newer relays can add parts without breaking older
    /// clients.
    pub fn decode(line: &str) -> Result<Option<Self>, Error> {
        let (code, payload) = line
            .split_once(':')
            .ok_or_else(|| Error::InvalidLine(line.to_string()))?;

        let part = match code {
            TEXT => StreamPart::Text(serde_json::from_str(payload)?),
            ERROR => StreamPart::Error(serde_json::from_str(payload)?),
            START_STEP => StreamPart::StartStep(serde_json::from_str(payload)?),
            FINISH_STEP => StreamPart::FinishStep(serde_json::from_str(payload)?),
            FINISH_MESSAGE => StreamPart::FinishMessage(serde_json::from_str(payload)?),
            _ => {
                log::debug!("skipping unknown stream part: {}", code);
                return Ok(None);
            }
        };

        Ok(Some(part))
    }
}

impl fmt::Display for StreamPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload = self.payload().map_err(|_| fmt::Error)?;
        writeln!(f, "{}:{}", self.code(), payload)
    }
}

/// Incremental decoder for the relay's byte stream.
///
/// Bytes are buffered until a full line is available, so a chunk may end anywhere, including
/// in the middle of a multi-byte UTF-8 sequence.
#[derive(Debug, Default)]
pub struct Decoder {
    buffer: Vec<u8>,
    // Bytes of `buffer` already known to hold no newline.
    scanned: usize,
}

impl Decoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every part completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<StreamPart>, Error> {
        let mut parts = Vec::new();
        self.push_into(chunk, &mut parts)?;
        Ok(parts)
    }

    /// Feeds a chunk and appends every part completed by it to `parts`.
    ///
    /// Decoding stops at the first bad line. The parts of the lines before it are already in
    /// `parts` when the error is returned.
    pub fn push_into(&mut self, chunk: &[u8], parts: &mut Vec<StreamPart>) -> Result<(), Error> {
        self.buffer.extend_from_slice(chunk);

        while let Some(offset) = self.buffer[self.scanned..]
            .iter()
            .position(|byte| *byte == b'\n')
        {
            let position = self.scanned + offset;
            let line: Vec<u8> = self.buffer.drain(..=position).collect();
            self.scanned = 0;

            if let Some(part) = decode_line(&line[..position])? {
                parts.push(part);
            }
        }

        self.scanned = self.buffer.len();

        Ok(())
    }

    /// Signals the end of the byte stream. Fails if a partial line is left over.
    pub fn finish(&mut self) -> Result<Vec<StreamPart>, Error> {
        self.scanned = 0;
        let rest = std::mem::take(&mut self.buffer);

        if rest.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        Err(Error::InvalidLine(
            String::from_utf8_lossy(&rest).into_owned(),
        ))
    }
}

fn decode_line(line: &[u8]) -> Result<Option<StreamPart>, Error> {
    let line = std::str::from_utf8(line)?;
    let line = line.strip_suffix('\r').unwrap_or(line);

    if line.is_empty() {
        return Ok(None);
    }

    StreamPart::decode(line)
}
