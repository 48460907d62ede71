//! Line framing for streamed HTTP bodies
//!
//! Both providers frame their streams by newline (SSE `data:` lines and
//! NDJSON). Body chunks can end in the middle of a multi-byte character, so
//! bytes are buffered and only complete lines are decoded.

#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Next complete line, without its terminator
    pub(crate) fn next_line(&mut self) -> Option<String> {
        let pos = self.bytes.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.bytes.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&line[..pos]);
        Some(text.trim_end_matches('\r').to_string())
    }

    /// Whatever is left once the body has ended
    pub(crate) fn finish(self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.bytes).trim().to_string();
        (!rest.is_empty()).then_some(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_multibyte_character() {
        let line = "conclusão\n".as_bytes();
        // 'ã' is two bytes; split between them
        let split = line.iter().position(|b| *b == 0xC3).unwrap() + 1;

        let mut buffer = LineBuffer::default();
        buffer.push(&line[..split]);
        assert_eq!(buffer.next_line(), None);
        buffer.push(&line[split..]);
        assert_eq!(buffer.next_line().as_deref(), Some("conclusão"));
        assert_eq!(buffer.next_line(), None);
    }

    #[test]
    fn test_crlf_and_trailing_data() {
        let mut buffer = LineBuffer::default();
        buffer.push(b"data: a\r\n\r\ndata: b");
        assert_eq!(buffer.next_line().as_deref(), Some("data: a"));
        assert_eq!(buffer.next_line().as_deref(), Some(""));
        assert_eq!(buffer.next_line(), None);
        assert_eq!(buffer.finish().as_deref(), Some("data: b"));
    }
}
