//! Incremental frame parsing for the streamed answer body.
//!
//! The backend answers a query with a newline-delimited stream of lines.
//! Lines carrying answer text look like:
//!
//! ```text
//! data: <payload>
//! ```
//!
//! Everything else — blank separator lines, `:` keep-alive comments,
//! `event:` lines — is valid on the wire and ignored.
//!
//! The transport fragments the body into arbitrary byte chunks: a frame may
//! span several chunks, several frames may land in one chunk, and a chunk
//! boundary may fall mid-prefix or mid-way through a multi-byte UTF-8
//! character. [`FrameParser`] owns reassembly: it buffers bytes between
//! reads, splits out complete lines on the `\n` terminator, and only
//! decodes a line once it is complete. The final answer text is therefore
//! identical no matter how the transport chunked the bytes.

/// Prefix marking a line that carries answer text.
const DATA_PREFIX: &[u8] = b"data:";

/// Reassembles `data:` frames from an arbitrarily fragmented byte stream.
///
/// Feed each transport chunk to [`push`](FrameParser::push) as it arrives;
/// call [`finish`](FrameParser::finish) once the stream ends to flush a
/// trailing frame that was missing only its terminator.
#[derive(Debug, Default)]
pub struct FrameParser {
    /// Bytes carried over from previous chunks, not yet newline-terminated.
    carry: Vec<u8>,
}

impl FrameParser {
    pub fn new() -> Self {
        FrameParser::default()
    }

    /// Consumes one transport chunk and returns the payloads of every frame
    /// completed by it, in arrival order.
    ///
    /// Non-frame lines are dropped. The trailing unterminated segment (if
    /// any) is retained for the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.carry.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.carry[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            if let Some(payload) = parse_data_line(&self.carry[start..end]) {
                payloads.push(payload);
            }
            start = end + 1;
        }
        self.carry.drain(..start);

        payloads
    }

    /// Flushes the parser at end of stream.
    ///
    /// A non-empty carry-over that is itself a complete data line missing
    /// only its terminator yields a final frame; anything else (a partial
    /// prefix, a truncated keep-alive) is an incomplete artifact and is
    /// discarded without error.
    pub fn finish(self) -> Option<String> {
        let mut carry = self.carry;
        if carry.last() == Some(&b'\r') {
            carry.pop();
        }
        if carry.is_empty() {
            return None;
        }
        parse_data_line(&carry)
    }
}

/// Decodes one complete line; returns the payload if it is a data frame.
///
/// Strips an optional trailing `\r` (CRLF streams), the `data:` prefix, and
/// at most one space after the prefix. Returns `None` for any other line.
fn parse_data_line(line: &[u8]) -> Option<String> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let rest = line.strip_prefix(DATA_PREFIX)?;
    let rest = rest.strip_prefix(b" ").unwrap_or(rest);
    Some(String::from_utf8_lossy(rest).into_owned())
}

/// Ordered, append-only answer text for one submission.
///
/// Created empty when a submission starts, appended to as frames are
/// parsed, and discarded wholesale at the start of the next submission.
#[derive(Debug, Default)]
pub struct AnswerAccumulator {
    text: String,
}

impl AnswerAccumulator {
    pub fn new() -> Self {
        AnswerAccumulator::default()
    }

    /// Appends one frame payload. Payloads are concatenated verbatim, in
    /// arrival order, with no separators.
    pub fn push(&mut self, payload: &str) {
        self.text.push_str(payload);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn into_text(self) -> String {
        self.text
    }
}
