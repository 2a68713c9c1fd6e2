//! framing.rs
//! Newline framing over a raw byte stream. Each connection handler owns one
//! buffer; partial lines survive chunk boundaries, and a malformed line never
//! poisons the stream because parsing resynchronizes at the next newline.

/// Accumulates incoming bytes and yields one line per `\n`.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Extract and remove the next complete line, without its newline.
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.buf.drain(..=pos).take(pos).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_newlines() {
        let mut lb = LineBuffer::new();
        lb.extend(b"one\ntwo\n");
        assert_eq!(lb.next_line().as_deref(), Some("one"));
        assert_eq!(lb.next_line().as_deref(), Some("two"));
        assert_eq!(lb.next_line(), None);
    }

    #[test]
    fn partial_line_survives_chunk_boundary() {
        let mut lb = LineBuffer::new();
        lb.extend(b"{\"sensor_id\":");
        assert_eq!(lb.next_line(), None);
        lb.extend(b"\"drone_1_env\"}\n");
        assert_eq!(
            lb.next_line().as_deref(),
            Some("{\"sensor_id\":\"drone_1_env\"}")
        );
    }

    #[test]
    fn empty_lines_come_through_empty() {
        let mut lb = LineBuffer::new();
        lb.extend(b"\n\nx\n");
        assert_eq!(lb.next_line().as_deref(), Some(""));
        assert_eq!(lb.next_line().as_deref(), Some(""));
        assert_eq!(lb.next_line().as_deref(), Some("x"));
    }

    #[test]
    fn invalid_utf8_is_replaced_not_fatal() {
        let mut lb = LineBuffer::new();
        lb.extend(&[0xff, 0xfe, b'a', b'\n', b'b', b'\n']);
        let first = lb.next_line().unwrap();
        assert!(first.ends_with('a'));
        assert_eq!(lb.next_line().as_deref(), Some("b"));
    }
}
