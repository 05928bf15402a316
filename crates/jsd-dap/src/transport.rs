use std::io::{self, BufRead, Read, Write};

use dap::events::OutputEventBody;
use dap::types::OutputEventCategory;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::protocol::{Event, Request, Response};

const CONTENT_LENGTH: &str = "Content-Length";

pub const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;
pub const MAX_HEADER_LINE_BYTES: usize = 8 * 1024;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Unexpected end of stream")]
    UnexpectedEof,
    #[error("Missing Content-Length header")]
    MissingContentLength,
    #[error("Invalid Content-Length {0:?}")]
    InvalidContentLength(String),
    #[error("Header line exceeds {MAX_HEADER_LINE_BYTES} bytes")]
    HeaderTooLong,
    #[error("Content-Length {0} exceeds {MAX_MESSAGE_BYTES} bytes")]
    MessageTooLarge(usize),
    #[error("Failed to encode message: {0}")]
    Encode(serde_json::Error),
}

impl TransportError {
    /// Whether the stream can no longer be read or written.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Io(_) | TransportError::UnexpectedEof)
    }
}

enum HeaderLine {
    Line(String),
    TooLong,
}

/// Reads one header line, discarding the remainder of a line longer than the limit.
fn read_header_line<R: BufRead>(reader: &mut R) -> io::Result<Option<HeaderLine>> {
    let mut buf = Vec::new();
    let mut too_long = false;

    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            if buf.is_empty() && !too_long {
                return Ok(None);
            }
            break;
        }

        let newline = available.iter().position(|&b| b == b'\n');
        let take = newline.map_or(available.len(), |pos| pos + 1);
        if !too_long && buf.len() + take > MAX_HEADER_LINE_BYTES {
            too_long = true;
            buf.clear();
        }
        if !too_long {
            buf.extend_from_slice(&available[..take]);
        }
        reader.consume(take);

        if newline.is_some() {
            break;
        }
    }

    if too_long {
        return Ok(Some(HeaderLine::TooLong));
    }
    Ok(Some(HeaderLine::Line(String::from_utf8_lossy(&buf).into_owned())))
}

/// Reads the body of one `Content-Length` framed message.
///
/// Returns `Ok(None)` at a clean end of stream. A frame with a missing, invalid or
/// oversized length, or an oversized header line, is consumed and reported as a
/// non-fatal error.
pub fn read_message<R: BufRead>(reader: &mut R) -> Result<Option<Vec<u8>>, TransportError> {
    let mut content_length = None;
    let mut invalid_length = None;
    let mut header_too_long = false;
    let mut saw_header = false;

    loop {
        let line = match read_header_line(reader)? {
            Some(HeaderLine::Line(line)) => line,
            Some(HeaderLine::TooLong) => {
                saw_header = true;
                header_too_long = true;
                continue;
            }
            None if saw_header => return Err(TransportError::UnexpectedEof),
            None => return Ok(None),
        };

        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            if saw_header {
                break;
            }
            // Tolerate stray blank lines between frames.
            continue;
        }
        saw_header = true;

        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
                let value = value.trim();
                match value.parse::<usize>() {
                    Ok(length) => content_length = Some(length),
                    Err(_) => invalid_length = Some(value.to_string()),
                }
            }
        }
    }

    let length = match (content_length, invalid_length) {
        (Some(length), _) => length,
        (None, Some(value)) => return Err(TransportError::InvalidContentLength(value)),
        (None, None) if header_too_long => return Err(TransportError::HeaderTooLong),
        (None, None) => return Err(TransportError::MissingContentLength),
    };

    if header_too_long || length > MAX_MESSAGE_BYTES {
        skip_body(reader, length)?;
        if header_too_long {
            return Err(TransportError::HeaderTooLong);
        }
        return Err(TransportError::MessageTooLarge(length));
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => TransportError::UnexpectedEof,
        _ => TransportError::Io(e),
    })?;

    Ok(Some(body))
}

fn skip_body<R: BufRead>(reader: &mut R, length: usize) -> Result<(), TransportError> {
    let expected = length as u64;
    let skipped = io::copy(&mut reader.by_ref().take(expected), &mut io::sink())?;
    if skipped < expected {
        return Err(TransportError::UnexpectedEof);
    }
    Ok(())
}

pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<(), TransportError> {
    let body = serde_json::to_vec(message).map_err(TransportError::Encode)?;
    write!(writer, "{}: {}\r\n\r\n", CONTENT_LENGTH, body.len())?;
    writer.write_all(&body)?;
    writer.flush()?;
    Ok(())
}

struct WriterState {
    next_seq: i64,
    out: Box<dyn Write + Send>,
}

/// The outbound half of a session, shared by the control and execution threads.
///
/// Sequence numbers are assigned under the same lock that writes the frame, so they
/// increase strictly in wire order across responses and events.
pub struct MessageWriter {
    state: Mutex<WriterState>,
}

impl std::fmt::Debug for MessageWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageWriter")
            .field("next_seq", &self.state.lock().next_seq)
            .finish()
    }
}

impl MessageWriter {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            state: Mutex::new(WriterState {
                next_seq: 1,
                out: Box::new(out),
            }),
        }
    }

    pub fn respond(&self, request: &Request, outcome: Result<Option<Value>, String>) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        let seq = state.next_seq;
        let response = match outcome {
            Ok(body) => Response::success(seq, request, body),
            Err(message) => Response::error(seq, request, message),
        };

        write_message(&mut state.out, &response)?;
        state.next_seq += 1;
        debug!(seq, command = %request.command, success = response.success, "Sent response");
        Ok(())
    }

    pub fn send_event(&self, event: &str, body: Option<Value>) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        let seq = state.next_seq;

        write_message(&mut state.out, &Event::new(seq, event, body))?;
        state.next_seq += 1;
        // Output events may carry forwarded log lines; logging them would loop.
        if event != "output" {
            debug!(seq, event, "Sent event");
        }
        Ok(())
    }

    pub fn send_output(&self, category: OutputEventCategory, output: impl Into<String>) -> Result<(), TransportError> {
        let body = OutputEventBody {
            output: output.into(),
            category: Some(category),
            group: None,
            variables_reference: None,
            source: None,
            line: None,
            column: None,
            data: None,
        };

        self.send_event("output", Some(serde_json::to_value(body).map_err(TransportError::Encode)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use std::io::Cursor;
    use std::sync::Arc;

    fn frame(body: &str) -> String {
        format!("Content-Length: {}\r\n\r\n{}", body.len(), body)
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn decode_all(bytes: Vec<u8>) -> Vec<Value> {
        let mut reader = Cursor::new(bytes);
        let mut messages = Vec::new();
        while let Some(body) = read_message(&mut reader).unwrap() {
            messages.push(serde_json::from_slice(&body).unwrap());
        }
        messages
    }

    #[test]
    fn test_read_consecutive_messages() {
        let input = format!("{}{}", frame(r#"{"seq":1}"#), frame(r#"{"seq":2}"#));
        let mut reader = Cursor::new(input.into_bytes());

        assert_eq!(read_message(&mut reader).unwrap().unwrap(), br#"{"seq":1}"#.to_vec());
        assert_eq!(read_message(&mut reader).unwrap().unwrap(), br#"{"seq":2}"#.to_vec());
        assert!(read_message(&mut reader).unwrap().is_none());
    }

    #[test]
    fn test_read_with_extra_headers() {
        let input = "Content-Type: application/vscode-jsonrpc\r\ncontent-length: 2\r\n\r\n{}";
        let mut reader = Cursor::new(input.as_bytes().to_vec());

        assert_eq!(read_message(&mut reader).unwrap().unwrap(), b"{}".to_vec());
    }

    #[rstest]
    #[case::invalid_length("Content-Length: abc\r\n\r\n", false)]
    #[case::missing_length("X-Header: 1\r\n\r\n", false)]
    #[case::truncated_body("Content-Length: 10\r\n\r\n{}", true)]
    #[case::truncated_header("Content-Length: 10\r\n", true)]
    fn test_read_malformed(#[case] input: &str, #[case] fatal: bool) {
        let mut reader = Cursor::new(input.as_bytes().to_vec());
        let err = read_message(&mut reader).unwrap_err();

        assert_eq!(err.is_fatal(), fatal);
    }

    #[rstest]
    #[case::oversized_length(format!("Content-Length: {}\r\n\r\n", MAX_MESSAGE_BYTES + 1), MAX_MESSAGE_BYTES + 1, false)]
    #[case::oversized_header_line(format!("X-Padding: {}\r\nContent-Length: 4\r\n\r\n", "a".repeat(MAX_HEADER_LINE_BYTES)), 4, true)]
    fn test_oversized_frame_is_skipped(#[case] header: String, #[case] body_len: usize, #[case] header_too_long: bool) {
        let mut input = header.into_bytes();
        input.extend(std::iter::repeat_n(b' ', body_len));
        input.extend(frame(r#"{"seq":7}"#).into_bytes());
        let mut reader = Cursor::new(input);

        let err = read_message(&mut reader).unwrap_err();
        assert!(!err.is_fatal());
        if header_too_long {
            assert!(matches!(err, TransportError::HeaderTooLong));
        } else {
            assert!(matches!(err, TransportError::MessageTooLarge(length) if length == body_len));
        }
        assert_eq!(read_message(&mut reader).unwrap().unwrap(), br#"{"seq":7}"#.to_vec());
    }

    #[test]
    fn test_oversized_length_at_end_of_stream_is_fatal() {
        let mut reader = Cursor::new(b"Content-Length: 99999999999999\r\n\r\n{}".to_vec());

        assert!(read_message(&mut reader).unwrap_err().is_fatal());
    }

    #[test]
    fn test_non_utf8_header_is_not_fatal() {
        let mut input = b"X-Bytes: \xff\xfe\r\n".to_vec();
        input.extend(frame("{}").into_bytes());
        let mut reader = Cursor::new(input);

        assert_eq!(read_message(&mut reader).unwrap().unwrap(), b"{}".to_vec());
    }

    #[test]
    fn test_malformed_frame_does_not_consume_next_frame() {
        let input = format!("Content-Length: nope\r\n\r\n{}", frame(r#"{"seq":5}"#));
        let mut reader = Cursor::new(input.into_bytes());

        assert!(read_message(&mut reader).is_err());
        assert_eq!(read_message(&mut reader).unwrap().unwrap(), br#"{"seq":5}"#.to_vec());
    }

    #[test]
    fn test_writer_sequence_is_shared() {
        let buffer = SharedBuffer::default();
        let writer = MessageWriter::new(buffer.clone());
        let request: Request =
            serde_json::from_value(json!({"seq": 10, "type": "request", "command": "initialize"})).unwrap();

        writer.respond(&request, Ok(Some(json!({})))).unwrap();
        writer.send_event("initialized", None).unwrap();
        writer.send_output(OutputEventCategory::Stderr, "oops\n").unwrap();
        writer.respond(&request, Err("bad".to_string())).unwrap();

        let messages = decode_all(buffer.0.lock().clone());
        let seqs = messages.iter().map(|m| m["seq"].as_i64().unwrap()).collect::<Vec<_>>();

        assert_eq!(seqs, vec![1, 2, 3, 4]);
        assert_eq!(messages[0]["request_seq"], json!(10));
        assert_eq!(messages[1]["event"], json!("initialized"));
        assert_eq!(messages[2]["body"]["category"], json!("stderr"));
        assert_eq!(messages[2]["body"]["output"], json!("oops\n"));
        assert_eq!(messages[3]["message"], json!("bad"));
    }
}
