use super::utf8::Utf8Decoder;
use super::{CANCELLED_MESSAGE, ResponseRecord, TRUNCATED_MESSAGE};
use promptline_common::StreamEvent;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    Receiving,
    Closed,
}

/// Synchronous NDJSON-to-event decoder.
///
/// Bytes go in through [`push`](Self::push); events for every complete line
/// come out. Once a terminal event has been produced the decoder is closed and
/// every further call returns nothing.
#[derive(Debug)]
pub struct LineDecoder {
    utf8: Utf8Decoder,
    line_buffer: String,
    state: DecoderState,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder {
    pub fn new() -> Self {
        Self {
            utf8: Utf8Decoder::new(),
            line_buffer: String::new(),
            state: DecoderState::Receiving,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == DecoderState::Closed
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.is_closed() {
            return events;
        }

        let text = self.utf8.decode(bytes);
        self.line_buffer.push_str(&text);

        while let Some(pos) = self.line_buffer.find('\n') {
            let line: String = self.line_buffer.drain(..=pos).collect();
            self.handle_line(&line, &mut events);
            if self.is_closed() {
                break;
            }
        }
        events
    }

    /// The source has ended. Any unterminated remainder is parsed as a last
    /// line; if no terminal event was produced, a fatal error is.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.is_closed() {
            return events;
        }

        let tail = self.utf8.finish();
        self.line_buffer.push_str(&tail);
        let rest = std::mem::take(&mut self.line_buffer);
        self.handle_line(&rest, &mut events);

        if !self.is_closed() {
            debug!(
                trailing = rest.trim().len(),
                "stream ended without a completion record"
            );
            events.push(StreamEvent::fatal(TRUNCATED_MESSAGE));
            self.close();
        }
        events
    }

    /// Stop decoding at the caller's request.
    pub fn cancel(&mut self) -> Option<StreamEvent> {
        self.terminate(StreamEvent::non_fatal(CANCELLED_MESSAGE))
    }

    /// Stop decoding because the source failed.
    pub fn fail(&mut self, message: impl Into<String>) -> Option<StreamEvent> {
        self.terminate(StreamEvent::fatal(message))
    }

    fn terminate(&mut self, event: StreamEvent) -> Option<StreamEvent> {
        if self.is_closed() {
            return None;
        }
        self.close();
        Some(event)
    }

    fn close(&mut self) {
        self.state = DecoderState::Closed;
        self.line_buffer.clear();
    }

    fn handle_line(&mut self, line: &str, events: &mut Vec<StreamEvent>) {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            return;
        }

        match serde_json::from_str::<ResponseRecord>(line) {
            Ok(record) => {
                let (record_events, terminal) = record.into_events();
                events.extend(record_events);
                if terminal {
                    self.close();
                }
            }
            Err(e) => {
                debug!(error = %e, len = line.len(), "skipping malformed stream line");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptline_common::ToolCall;

    const HELLO_WORLD: &str = "{\"response\":\"Hello\",\"done\":false}\n{\"response\":\" world\",\"done\":true}\n";

    fn decode_split(input: &[u8], split_at: &[usize]) -> Vec<StreamEvent> {
        let mut decoder = LineDecoder::new();
        let mut events = Vec::new();
        let mut start = 0;
        for &at in split_at {
            events.extend(decoder.push(&input[start..at]));
            start = at;
        }
        events.extend(decoder.push(&input[start..]));
        events.extend(decoder.finish());
        events
    }

    fn is_done(event: &StreamEvent) -> bool {
        matches!(event, StreamEvent::Done { .. })
    }

    #[test]
    fn test_record_split_across_chunks() {
        // a lone fragment is not a record
        let events = decode_split(b"{\"response\":\"Hel", &[]);
        assert_eq!(events, vec![StreamEvent::fatal(TRUNCATED_MESSAGE)]);

        let mut decoder = LineDecoder::new();
        let mut events = decoder.push(b"{\"response\":\"Hel");
        assert!(events.is_empty());
        events.extend(decoder.push(b"lo\",\"done\":false}\n{\"response\":\" world\",\"done\":true}\n"));
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], StreamEvent::content("Hello", false));
        assert_eq!(events[1], StreamEvent::content(" world", true));
        assert!(is_done(&events[2]));
        assert!(decoder.is_closed());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_tool_call_then_done() {
        let mut decoder = LineDecoder::new();
        let events = decoder.push(
            br#"{"message":{"tool_calls":[{"function":{"name":"getWeather","arguments":"{}"}}]},"done":true}
"#,
        );
        assert_eq!(events.len(), 2);
        match &events[0] {
            StreamEvent::ToolCalls { calls, .. } => assert_eq!(
                calls,
                &vec![ToolCall {
                    name: "getWeather".to_string(),
                    arguments_json: "{}".to_string()
                }]
            ),
            other => panic!("Expected ToolCalls, got {:?}", other),
        }
        assert!(is_done(&events[1]));
    }

    #[test]
    fn test_every_split_point_gives_same_events() {
        let input = "{\"response\":\"Grüße, \",\"done\":false}\r\n\n{\"response\":\"日本 🎉\",\"done\":false}\n{\"response\":\"\",\"done\":true,\"eval_count\":3}\n";
        let bytes = input.as_bytes();
        let whole = decode_split(bytes, &[]);
        assert_eq!(whole.len(), 4);

        for at in 1..bytes.len() {
            assert_eq!(decode_split(bytes, &[at]), whole, "split at byte {}", at);
        }
        for a in (1..bytes.len()).step_by(7) {
            for b in (a..bytes.len()).step_by(5) {
                assert_eq!(decode_split(bytes, &[a, b]), whole, "split at {} and {}", a, b);
            }
        }
    }

    #[test]
    fn test_malformed_line_skipped() {
        let mut decoder = LineDecoder::new();
        let events = decoder.push(b"not json at all\n{\"response\":\"ok\",\"done\":false}\n{\"truncated\n");
        assert_eq!(events, vec![StreamEvent::content("ok", false)]);
        assert!(!decoder.is_closed());
    }

    #[test]
    fn test_blank_lines_ignored() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"\n\r\n   \n").is_empty());
    }

    #[test]
    fn test_unterminated_final_record_is_parsed() {
        let events = decode_split(b"{\"response\":\"end\",\"done\":true}", &[]);
        assert_eq!(events[0], StreamEvent::content("end", true));
        assert!(is_done(&events[1]));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_dangling_fragment_yields_one_terminal_error() {
        let events = decode_split(b"{\"response\":\"a\",\"done\":false}\n{\"respo", &[10]);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], StreamEvent::fatal(TRUNCATED_MESSAGE));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[test]
    fn test_nothing_after_close() {
        let mut decoder = LineDecoder::new();
        let events = decoder.push(b"{\"error\":\"out of memory\"}\n{\"response\":\"late\",\"done\":false}\n");
        assert_eq!(events, vec![StreamEvent::fatal("out of memory")]);
        assert!(decoder.push(b"{\"response\":\"later\",\"done\":true}\n").is_empty());
        assert!(decoder.finish().is_empty());
        assert!(decoder.cancel().is_none());
    }

    #[test]
    fn test_cancel_is_non_fatal_and_once() {
        let mut decoder = LineDecoder::new();
        decoder.push(b"{\"response\":\"par");
        assert_eq!(decoder.cancel(), Some(StreamEvent::non_fatal(CANCELLED_MESSAGE)));
        assert!(decoder.cancel().is_none());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_fail_is_fatal() {
        let mut decoder = LineDecoder::new();
        assert_eq!(
            decoder.fail("connection reset"),
            Some(StreamEvent::fatal("connection reset"))
        );
        assert!(decoder.is_closed());
    }
}
