use genai_relay_model::{Error, Framing};

use super::Chunks;

/// The payload that terminates a stream.
const DONE: &str = "[DONE]";

/// Upper bound of a single buffered line.
const MAX_LINE_LEN: usize = 16 * 1024 * 1024;

/// A type for reading `data: ` payloads of a server-sent events stream.
///
/// Lines are split on line feeds, so a payload may span any number of
/// chunks, and a chunk may hold any number of payloads. Bytes are buffered
/// until a whole line is available, so multi-byte characters split across
/// chunks are decoded correctly.
pub(crate) struct Sse {
    buf: Vec<u8>,
    // Bytes of `buf` already known to contain no line feed.
    scanned: usize,
    chunks: Chunks,
    framing: Framing,
    done: bool,
}

enum Line {
    Payload(String),
    Skip,
}

impl Sse {
    #[inline]
    pub(crate) fn new(chunks: Chunks, framing: Framing) -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            chunks,
            framing,
            done: false,
        }
    }

    /// Returns the next payload, or `None` once the stream ended, either
    /// with the `[DONE]` sentinel or at the end of the body.
    pub(crate) async fn next_payload(&mut self) -> Result<Option<String>, Error> {
        let result = self.read_payload().await;
        if !matches!(result, Ok(Some(_))) {
            self.done = true;
        }
        result
    }

    async fn read_payload(&mut self) -> Result<Option<String>, Error> {
        while !self.done {
            while let Some(line) = self.take_line() {
                match self.classify(&line)? {
                    Line::Payload(payload) if payload == DONE => {
                        return Ok(None);
                    }
                    Line::Payload(payload) => return Ok(Some(payload)),
                    Line::Skip => {}
                }
            }

            if self.buf.len() > MAX_LINE_LEN {
                return Err(Error::malformed_stream(format!(
                    "line exceeds {MAX_LINE_LEN} bytes"
                )));
            }

            match self.chunks.next_chunk().await? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => {
                    // The last line may not be terminated.
                    let rest = std::mem::take(&mut self.buf);
                    return match self.classify(&rest)? {
                        Line::Payload(payload) if payload != DONE => {
                            self.done = true;
                            Ok(Some(payload))
                        }
                        _ => Ok(None),
                    };
                }
            }
        }
        Ok(None)
    }

    /// Removes the first complete line from the buffer.
    fn take_line(&mut self) -> Option<Vec<u8>> {
        let Some(pos) = self.buf[self.scanned..].iter().position(|b| *b == b'\n')
        else {
            self.scanned = self.buf.len();
            return None;
        };
        let end = self.scanned + pos;
        let mut line: Vec<u8> = self.buf.drain(..=end).collect();
        line.pop();
        self.scanned = 0;
        Some(line)
    }

    fn classify(&self, line: &[u8]) -> Result<Line, Error> {
        let Ok(line) = str::from_utf8(line) else {
            return Err(Error::malformed_stream("line is not valid UTF-8"));
        };
        let line = line.trim_end();
        if line.is_empty() || line.starts_with(':') {
            // Blank separators and comments such as `: keep-alive`.
            return Ok(Line::Skip);
        }
        if let Some(data) = line.strip_prefix("data:") {
            let data = data.strip_prefix(' ').unwrap_or(data);
            if data.is_empty() {
                return Ok(Line::Skip);
            }
            return Ok(Line::Payload(data.to_owned()));
        }
        if self.framing.ignore_event_lines && line.starts_with("event:") {
            return Ok(Line::Skip);
        }
        Err(Error::malformed_stream(format!(
            "expected a data line, got {line:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use genai_relay_model::ErrorKind;

    use super::*;

    fn sse(chunks: &[&'static [u8]], framing: Framing) -> Sse {
        let chunks = chunks.iter().map(|c| Bytes::from_static(c)).collect();
        Sse::new(Chunks::from_vec_deque(chunks), framing)
    }

    #[tokio::test]
    async fn test_normal_payloads() {
        let mut sse = sse(
            &[b"data: hello\n\n", b"data: bye\n\ndata: [DONE]\n\n"],
            Framing::default(),
        );
        assert_eq!(sse.next_payload().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_payload().await.unwrap().unwrap(), "bye");
        assert_eq!(sse.next_payload().await.unwrap(), None);
        assert_eq!(sse.next_payload().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_lines() {
        let mut sse = sse(
            &[b"da", b"ta: hel", b"lo\r", b"\n", b"\ndata: {}\n"],
            Framing::default(),
        );
        assert_eq!(sse.next_payload().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_payload().await.unwrap().unwrap(), "{}");
        assert_eq!(sse.next_payload().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_utf8() {
        // "é" is 0xC3 0xA9.
        let mut sse = sse(&[b"data: caf\xC3", b"\xA9\n"], Framing::default());
        assert_eq!(sse.next_payload().await.unwrap().unwrap(), "café");
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline() {
        let mut sse = sse(&[b"data: a\ndata: b"], Framing::default());
        assert_eq!(sse.next_payload().await.unwrap().unwrap(), "a");
        assert_eq!(sse.next_payload().await.unwrap().unwrap(), "b");
        assert_eq!(sse.next_payload().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keep_alive_and_done() {
        let mut sse = sse(
            &[b": keep-alive\n\n:\ndata: a\n\ndata: [DONE]\n\ndata: late\n"],
            Framing::default(),
        );
        assert_eq!(sse.next_payload().await.unwrap().unwrap(), "a");
        assert_eq!(sse.next_payload().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_event_lines() {
        let mut strict = sse(&[b"event: x\ndata: a\n"], Framing::default());
        let err = strict.next_payload().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedStream);

        let mut typed = sse(
            &[b"event: x\ndata: a\n"],
            Framing {
                ignore_event_lines: true,
            },
        );
        assert_eq!(typed.next_payload().await.unwrap().unwrap(), "a");
    }

    #[tokio::test]
    async fn test_malformed_line() {
        let mut sse = sse(&[b"data: a\nxxxxxx\n"], Framing::default());
        assert_eq!(sse.next_payload().await.unwrap().unwrap(), "a");
        let err = sse.next_payload().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedStream);
        assert!(err.message().contains("xxxxxx"));
        assert_eq!(sse.next_payload().await.unwrap(), None);
    }
}
