//! Line framing for the device's text console.
//!
//! The device prints newline-terminated lines (optionally CRLF) but also
//! leaves unterminated output such as its prompt sitting on the wire. The
//! framer decodes UTF-8 incrementally and turns each read chunk into zero or
//! more lines:
//!
//! ```text
//! chunk ──► Utf8Decoder ──► buffer ──► complete lines ("\n"-terminated, "\r" stripped)
//!                                  └─► non-blank residue flushed as one partial line
//! ```
//!
//! The residue flush surfaces prompts without waiting for a terminator, at
//! the cost that a line split across two reads may come out as two lines.

use bytes::{Buf, BytesMut};

/// Character substituted for invalid UTF-8 sequences.
pub const REPLACEMENT_CHAR: char = '\u{FFFD}';

/// Streaming UTF-8 decoder.
///
/// Bytes of a multi-byte character that is cut off at the end of a chunk are
/// held back until the next chunk completes them.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: BytesMut,
}

impl Utf8Decoder {
    /// Creates a new decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a chunk, returning all text that is complete so far.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());

        loop {
            let (valid_up_to, error_len) = match std::str::from_utf8(&self.pending) {
                Ok(_) => (self.pending.len(), None),
                Err(e) => (e.valid_up_to(), e.error_len()),
            };

            let valid = self.pending.split_to(valid_up_to);
            out.push_str(&String::from_utf8_lossy(&valid));

            match error_len {
                Some(len) => {
                    tracing::trace!(
                        "replacing invalid UTF-8 sequence: {}",
                        hex::encode(&self.pending[..len])
                    );
                    self.pending.advance(len);
                    out.push(REPLACEMENT_CHAR);
                }
                // Either everything was consumed or an incomplete character
                // is waiting for more bytes.
                None => break,
            }
        }

        out
    }

    /// Returns the number of bytes held back for an incomplete character.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Turns raw console bytes into lines.
#[derive(Debug, Default)]
pub struct LineFramer {
    decoder: Utf8Decoder,
    buffer: String,
}

impl LineFramer {
    /// Creates a new framer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one read chunk and returns the lines it completes, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.decoder.decode(chunk);
        self.buffer.push_str(&text);

        let mut lines = Vec::new();
        while let Some(idx) = self.buffer.find('\n') {
            let raw = &self.buffer[..idx];
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            if !line.is_empty() {
                lines.push(line.to_owned());
            }
            self.buffer.drain(..=idx);
        }

        // Surface unterminated output (prompts) right away. Blank residue
        // stays buffered so a split "\r\n" does not produce an empty line.
        if !self.buffer.is_empty() && !self.buffer.trim().is_empty() {
            lines.push(std::mem::take(&mut self.buffer));
        }

        lines
    }

    /// Returns the text currently buffered without a terminator.
    #[must_use]
    pub fn buffered(&self) -> &str {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(framer: &mut LineFramer, chunks: &[&[u8]]) -> Vec<String> {
        chunks.iter().flat_map(|chunk| framer.feed(chunk)).collect()
    }

    #[test]
    fn test_complete_lines() {
        let mut framer = LineFramer::new();
        let lines = framer.feed(b"hello\nworld\n");
        assert_eq!(lines, vec!["hello", "world"]);
        assert_eq!(framer.buffered(), "");
    }

    #[test]
    fn test_crlf_stripped() {
        let mut framer = LineFramer::new();
        let lines = framer.feed(b"free heap: 1234\r\nuptime: 5s\r\n");
        assert_eq!(lines, vec!["free heap: 1234", "uptime: 5s"]);
    }

    #[test]
    fn test_only_trailing_cr_stripped() {
        let mut framer = LineFramer::new();
        let lines = framer.feed(b"a\rb\r\n");
        assert_eq!(lines, vec!["a\rb"]);
    }

    #[test]
    fn test_empty_lines_skipped() {
        let mut framer = LineFramer::new();
        let lines = framer.feed(b"\n\r\nfirst\n\n\nsecond\n");
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[test]
    fn test_prompt_flushed_without_newline() {
        let mut framer = LineFramer::new();
        let lines = framer.feed(b"ready\nWebScreen> ");
        assert_eq!(lines, vec!["ready", "WebScreen> "]);
        assert_eq!(framer.buffered(), "");
    }

    #[test]
    fn test_blank_residue_kept() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.feed(b"line\r"), vec!["line\r"]);

        let mut framer = LineFramer::new();
        assert_eq!(framer.feed(b"line\n  "), vec!["line"]);
        assert_eq!(framer.buffered(), "  ");
        assert_eq!(framer.feed(b"indented\n"), vec!["  indented"]);
    }

    #[test]
    fn test_split_crlf_at_chunk_boundary() {
        let mut framer = LineFramer::new();
        let lines = feed_all(&mut framer, &[b"one\r\ntwo\r", b"\nthree\r\n"]);
        // "two\r" is not blank, so it is flushed as-is before the "\n" arrives.
        assert_eq!(lines, vec!["one", "two\r", "three"]);
    }

    #[test]
    fn test_partial_line_split_into_two() {
        let mut framer = LineFramer::new();
        let lines = feed_all(&mut framer, &[b"hel", b"lo\n"]);
        assert_eq!(lines, vec!["hel", "lo"]);
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let text = "größe: 5€\n";
        let bytes = text.as_bytes();
        // Split inside the three-byte euro sign, leaving two of its bytes behind.
        let cut = bytes.len() - 2;
        let mut framer = LineFramer::new();
        assert_eq!(framer.feed(&bytes[..cut]), vec!["größe: 5"]);
        assert_eq!(framer.feed(&bytes[cut..]), vec!["€"]);

        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&bytes[..cut]), "größe: 5");
        assert_eq!(decoder.pending(), 2);
        assert_eq!(decoder.decode(&bytes[cut..]), "€\n");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"ok\xFFok"), "ok\u{FFFD}ok");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_boundary_aligned_chunks_reproduce_lines() {
        let lines = ["FILE 12 B a.txt", "DIR  scripts", "[FILE] b.bin (3 bytes)", "done"];
        let input: String = lines.iter().map(|l| format!("{l}\r\n")).collect();

        // Every grouping of whole lines into chunks yields the same lines.
        for group in 1..=lines.len() {
            let mut framer = LineFramer::new();
            let mut emitted = Vec::new();
            for chunk in lines.chunks(group) {
                let chunk: String = chunk.iter().map(|l| format!("{l}\r\n")).collect();
                emitted.extend(framer.feed(chunk.as_bytes()));
            }
            assert_eq!(emitted, lines, "group size {group}");
        }

        let mut framer = LineFramer::new();
        assert_eq!(framer.feed(input.as_bytes()), lines);
    }

    #[test]
    fn test_arbitrary_split_preserves_content() {
        let input = "alpha\nbeta gamma\ndelta\n";
        let expected: String = input.lines().collect();

        for cut in 0..=input.len() {
            let mut framer = LineFramer::new();
            let emitted = feed_all(
                &mut framer,
                &[&input.as_bytes()[..cut], &input.as_bytes()[cut..]],
            );
            assert_eq!(emitted.concat(), expected, "cut at {cut}");
            assert!(emitted.len() <= 4, "cut at {cut}");
        }
    }

    #[test]
    fn test_final_unterminated_chunk_flushed_once() {
        let mut framer = LineFramer::new();
        let lines = feed_all(&mut framer, &[b"a\nb\n", b"tail"]);
        assert_eq!(lines, vec!["a", "b", "tail"]);
        assert!(framer.feed(b"").is_empty());
    }
}
