//! Accumulating decoder for the chat stream.

use serde::Serialize;
use tracing::trace;

use super::frame::StreamFrame;

/// The accumulated result of decoding a chat stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodedMessage {
    /// Concatenation of every content fragment, in arrival order.
    pub content: String,
    /// Last non-null research id seen in the stream.
    pub correlation_id: Option<String>,
    /// Whether the `[DONE]` sentinel was reached.
    pub is_complete: bool,
}

impl DecodedMessage {
    /// Fold a single update into this message.
    ///
    /// Replaying every update produced by a [`StreamDecoder`] onto an empty
    /// message yields the decoder's own result.
    pub fn apply(&mut self, update: &StreamUpdate) {
        match update {
            StreamUpdate::Delta(text) => self.content.push_str(text),
            StreamUpdate::Correlation(id) => self.correlation_id = Some(id.clone()),
            StreamUpdate::Done => self.is_complete = true,
        }
    }
}

/// An observable change produced while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    /// Non-empty text appended to the message.
    Delta(String),
    /// The research id changed to this value.
    Correlation(String),
    /// The sentinel was reached; nothing follows.
    Done,
}

/// Incremental chat stream decoder.
///
/// Feed it byte chunks as they arrive with [`push`](Self::push). A line ends
/// at `\n`, `\r` or `\r\n`; a trailing partial line is kept until the next
/// chunk (or [`finish`](Self::finish)) completes it. Once the sentinel is
/// seen all further input is dropped.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buf: Vec<u8>,
    /// Prefix of `buf` already searched for a line end.
    scanned: usize,
    /// The last line ended on a chunk-final `\r`; a leading `\n` belongs to it.
    pending_cr: bool,
    message: DecodedMessage,
    skipped: usize,
}

impl StreamDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume `chunk`, returning the updates produced by its complete lines.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamUpdate> {
        let mut updates = Vec::new();
        if self.message.is_complete || chunk.is_empty() {
            return updates;
        }

        self.buf.extend_from_slice(chunk);
        let mut start = 0;
        if std::mem::take(&mut self.pending_cr) && self.buf[0] == b'\n' {
            start = 1;
        }

        let mut search = self.scanned.max(start);
        while let Some(offset) = self.buf[search..]
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')
        {
            let end = search + offset;
            let line = self.buf[start..end].to_vec();
            start = end + 1;
            if self.buf[end] == b'\r' {
                match self.buf.get(start) {
                    Some(b'\n') => start += 1,
                    Some(_) => {}
                    None => self.pending_cr = true,
                }
            }
            search = start;

            self.consume_line(&line, &mut updates);
            if self.message.is_complete {
                self.buf.clear();
                self.scanned = 0;
                return updates;
            }
        }
        self.buf.drain(..start);
        self.scanned = self.buf.len();
        updates
    }

    /// Treat any buffered partial line as complete and consume it.
    pub fn flush(&mut self) -> Vec<StreamUpdate> {
        let mut updates = Vec::new();
        if !self.message.is_complete && !self.buf.is_empty() {
            let line = std::mem::take(&mut self.buf);
            self.consume_line(&line, &mut updates);
        }
        self.buf.clear();
        self.scanned = 0;
        self.pending_cr = false;
        updates
    }

    /// Flush the tail and return the accumulated message.
    #[must_use]
    pub fn finish(mut self) -> DecodedMessage {
        self.flush();
        if self.skipped > 0 {
            trace!(
                name: "stream.frames.skipped",
                skipped = self.skipped,
                "Skipped malformed stream frames"
            );
        }
        self.message
    }

    /// The message accumulated so far.
    pub fn message(&self) -> &DecodedMessage {
        &self.message
    }

    /// Whether the sentinel has been reached.
    pub fn is_complete(&self) -> bool {
        self.message.is_complete
    }

    /// Number of `data: ` lines dropped because they did not parse.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn consume_line(&mut self, raw: &[u8], updates: &mut Vec<StreamUpdate>) {
        let line = String::from_utf8_lossy(raw);

        match StreamFrame::parse_line(&line) {
            None => {}
            Some(Ok(StreamFrame::Done)) => {
                self.message.is_complete = true;
                updates.push(StreamUpdate::Done);
            }
            Some(Ok(StreamFrame::Content {
                content,
                correlation_id,
            })) => {
                if let Some(id) = correlation_id {
                    if self.message.correlation_id.as_deref() != Some(id.as_str()) {
                        updates.push(StreamUpdate::Correlation(id.clone()));
                    }
                    self.message.correlation_id = Some(id);
                }
                if !content.is_empty() {
                    self.message.content.push_str(&content);
                    updates.push(StreamUpdate::Delta(content));
                }
            }
            Some(Err(e)) => {
                self.skipped += 1;
                trace!(name: "stream.frame.malformed", error = %e, line = %line, "Skipping malformed frame");
            }
        }
    }
}

/// Decode a complete response body.
///
/// Never fails: lines that do not parse are skipped, and an input without
/// any frames yields an empty, incomplete message.
pub fn decode(raw_body: &str) -> DecodedMessage {
    let mut decoder = StreamDecoder::new();
    decoder.push(raw_body.as_bytes());
    decoder.finish()
}
