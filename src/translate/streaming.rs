//! Re-framing of the bridge event stream into public streaming chunks.
//!
//! The [`StreamReframer`] is fed raw body bytes as they arrive from the
//! bridge, in fragments of any size, and hands back fully-formed public
//! events. It is a plain state machine with no I/O; the async plumbing lives
//! in [`crate::proxy`].

use bytes::BytesMut;

use super::bridge_types::BridgeChunk;
use super::public_types::{
    generate_completion_id, ChatCompletionChunk, ChunkChoice, CHAT_COMPLETION_CHUNK_OBJECT,
};

/// Literal payload that ends an event stream, on both sides of the gateway.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &str = "data: ";

/// One event on the public stream.
#[derive(Debug, Clone, PartialEq)]
pub enum PublicEvent {
    Chunk(ChatCompletionChunk),
    Done,
}

impl PublicEvent {
    /// The `data:` payload of this event.
    pub fn data(&self) -> String {
        match self {
            Self::Chunk(chunk) => serde_json::to_string(chunk).unwrap_or_else(|_| "{}".to_string()),
            Self::Done => DONE_SENTINEL.to_string(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

enum Line {
    Skip,
    Done,
    Event(BridgeChunk),
    Malformed(serde_json::Error),
}

/// State machine that turns bridge SSE bytes into public events.
///
/// Usage:
///   let mut reframer = StreamReframer::new("deepseek-v3");
///   for fragment in body {
///       for event in reframer.push(&fragment) { /* send */ }
///   }
///   for event in reframer.finish() { /* send */ }
///
/// Exactly one [`PublicEvent::Done`] is produced over the lifetime of a
/// reframer, and nothing is produced after it.
#[derive(Debug)]
pub struct StreamReframer {
    model: String,
    fallback_id: String,
    fallback_created: i64,
    buffer: BytesMut,
    finished: bool,
    emitted: usize,
    skipped: usize,
}

impl StreamReframer {
    pub fn new(model: &str) -> Self {
        Self::with_fallbacks(
            model,
            generate_completion_id(),
            chrono::Utc::now().timestamp(),
        )
    }

    /// Build a reframer with fixed values for events that carry no id or
    /// creation time of their own.
    pub fn with_fallbacks(model: &str, fallback_id: String, fallback_created: i64) -> Self {
        Self {
            model: model.to_string(),
            fallback_id,
            fallback_created,
            buffer: BytesMut::new(),
            finished: false,
            emitted: 0,
            skipped: 0,
        }
    }

    /// Feed one fragment of the bridge body, returning the events it completes.
    pub fn push(&mut self, fragment: &[u8]) -> Vec<PublicEvent> {
        if self.finished {
            return Vec::new();
        }

        self.buffer.extend_from_slice(fragment);
        let mut events = Vec::new();

        // Lines are decoded whole so multi-byte characters split across
        // fragments survive.
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw = self.buffer.split_to(pos + 1);
            let line = String::from_utf8_lossy(&raw);

            match classify(&line) {
                Line::Skip => {}
                Line::Malformed(e) => {
                    self.skipped += 1;
                    tracing::debug!(error = %e, "Skipping unparseable bridge event");
                }
                Line::Event(chunk) => {
                    events.push(PublicEvent::Chunk(self.make_chunk(&chunk, true)));
                    self.emitted += 1;
                }
                Line::Done => {
                    self.buffer.clear();
                    events.push(self.terminate());
                    return events;
                }
            }
        }

        events
    }

    /// Call when the bridge body ends. Flushes an unterminated final event
    /// line, then emits the terminator unless it was already sent.
    pub fn finish(&mut self) -> Vec<PublicEvent> {
        if self.finished {
            return Vec::new();
        }

        let mut events = Vec::new();
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest);

        match classify(&line) {
            Line::Event(chunk) => {
                events.push(PublicEvent::Chunk(self.make_chunk(&chunk, false)));
                self.emitted += 1;
            }
            Line::Malformed(e) => {
                self.skipped += 1;
                tracing::debug!(error = %e, "Skipping unparseable trailing bridge event");
            }
            Line::Skip | Line::Done => {}
        }

        events.push(self.terminate());
        events
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of content chunks produced so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Number of `data:` lines dropped because they were not valid JSON.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn terminate(&mut self) -> PublicEvent {
        self.finished = true;
        PublicEvent::Done
    }

    fn make_chunk(&self, chunk: &BridgeChunk, keep_finish_reason: bool) -> ChatCompletionChunk {
        let first = chunk.choices.as_deref().and_then(|choices| choices.first());

        let delta = first
            .and_then(|c| c.delta.clone())
            .filter(|d| !d.is_null())
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
        let finish_reason = first
            .and_then(|c| c.finish_reason.clone())
            .filter(|_| keep_finish_reason);

        ChatCompletionChunk {
            id: chunk.id.clone().unwrap_or_else(|| self.fallback_id.clone()),
            object: CHAT_COMPLETION_CHUNK_OBJECT.to_string(),
            created: chunk.created.unwrap_or(self.fallback_created),
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }
}

fn classify(line: &str) -> Line {
    let Some(payload) = line.trim().strip_prefix(DATA_PREFIX) else {
        return Line::Skip;
    };
    let payload = payload.trim();

    if payload.is_empty() {
        return Line::Skip;
    }
    if payload == DONE_SENTINEL {
        return Line::Done;
    }

    match BridgeChunk::parse(payload) {
        Ok(chunk) => Line::Event(chunk),
        Err(e) => Line::Malformed(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "deepseek-v3";

    fn reframer() -> StreamReframer {
        StreamReframer::with_fallbacks(MODEL, "chatcmpl-local".to_string(), 1_700_000_000)
    }

    fn run_str(fragments: &[&str]) -> Vec<PublicEvent> {
        let bytes: Vec<&[u8]> = fragments.iter().map(|f| f.as_bytes()).collect();
        run(&bytes)
    }

    fn run(fragments: &[&[u8]]) -> Vec<PublicEvent> {
        let mut r = reframer();
        let mut events = Vec::new();
        for f in fragments {
            events.extend(r.push(f));
        }
        events.extend(r.finish());
        events
    }

    fn chunks(events: &[PublicEvent]) -> Vec<&ChatCompletionChunk> {
        events
            .iter()
            .filter_map(|e| match e {
                PublicEvent::Chunk(c) => Some(c),
                PublicEvent::Done => None,
            })
            .collect()
    }

    const STREAM: &str = concat!(
        "data: {\"id\":\"b1\",\"created\":5,\"model\":\"org/backend\",\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        ": keep-alive\n",
        "data: {\"id\":\"b1\",\"choices\":[{\"delta\":{\"content\":\"Привет\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\" мир\"},\"finish_reason\":\"stop\"}]}\r\n\r\n",
        "data: [DONE]\n\n",
    );

    #[test]
    fn test_simple_stream() {
        let events = run(&[STREAM.as_bytes()]);
        assert_eq!(events.len(), 4);
        assert!(events[3].is_done());

        let chunks = chunks(&events);
        assert_eq!(chunks[0].id, "b1");
        assert_eq!(chunks[0].created, 5);
        assert_eq!(chunks[0].choices[0].delta["role"], "assistant");
        assert_eq!(chunks[1].created, 1_700_000_000);
        assert_eq!(chunks[2].id, "chatcmpl-local");
        assert_eq!(chunks[2].choices[0].finish_reason.as_deref(), Some("stop"));
        for c in &chunks {
            assert_eq!(c.model, MODEL);
            assert_eq!(c.object, "chat.completion.chunk");
            assert_eq!(c.choices[0].index, 0);
        }
    }

    #[test]
    fn test_every_split_point_gives_same_events() {
        let bytes = STREAM.as_bytes();
        let whole = run(&[bytes]);
        for split in 0..=bytes.len() {
            let (a, b) = bytes.split_at(split);
            assert_eq!(run(&[a, b]), whole, "split at {split}");
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let bytes = STREAM.as_bytes();
        let fragments: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(run(&fragments), run(&[bytes]));
    }

    #[test]
    fn test_terminator_only() {
        let events = run_str(&["data: [DONE]\n\n"]);
        assert_eq!(events, vec![PublicEvent::Done]);
    }

    #[test]
    fn test_empty_stream_still_terminates() {
        assert_eq!(run(&[]), vec![PublicEvent::Done]);
    }

    #[test]
    fn test_unterminated_final_event_is_flushed() {
        let events = run_str(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"},\"finish_reason\":\"stop\"}]}",
        ]);
        assert_eq!(events.len(), 3);
        let chunks = chunks(&events);
        assert_eq!(chunks[1].choices[0].delta["content"], "b");
        // trailing flush never carries a finish reason
        assert_eq!(chunks[1].choices[0].finish_reason, None);
        assert!(events[2].is_done());
    }

    #[test]
    fn test_split_terminator_without_newline() {
        let events = run_str(&["data: {\"id\":\"x\"}\ndata: [DO", "NE]"]);
        assert_eq!(events.len(), 2);
        assert!(events[1].is_done());
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let mut r = reframer();
        let mut events = r.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"\n");
        events.extend(r.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n"));
        events.extend(r.finish());

        assert_eq!(r.skipped(), 1);
        assert_eq!(events.len(), 2);
        assert_eq!(chunks(&events)[0].choices[0].delta["content"], "b");
    }

    #[test]
    fn test_input_after_terminator_is_ignored() {
        let mut r = reframer();
        let events = r.push(b"data: [DONE]\ndata: {\"id\":\"late\"}\n");
        assert_eq!(events, vec![PublicEvent::Done]);
        assert!(r.is_finished());
        assert!(r.push(b"data: {\"id\":\"later\"}\n").is_empty());
        assert!(r.finish().is_empty());
    }

    #[test]
    fn test_missing_choices_gives_empty_delta() {
        let events = run_str(&["data: {\"id\":\"x\",\"choices\":[]}\n", "data: {\"id\":\"y\"}\n"]);
        for c in chunks(&events) {
            assert_eq!(c.choices[0].delta, serde_json::json!({}));
            assert_eq!(c.choices[0].finish_reason, None);
        }
    }

    #[test]
    fn test_lines_without_data_prefix_are_ignored() {
        let events = run_str(&["event: message\nid: 7\ndata:{\"id\":\"nospace\"}\nretry: 10\n"]);
        assert_eq!(events, vec![PublicEvent::Done]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let events = run(&[b"data: {\"choices\":[{\"delta\":{\"content\":\"a\xffb\"}}]}\n".as_slice()]);
        let c = chunks(&events);
        assert_eq!(c[0].choices[0].delta["content"], "a\u{fffd}b");
    }

    #[test]
    fn test_event_data_payload() {
        assert_eq!(PublicEvent::Done.data(), "[DONE]");
        let events = run_str(&["data: {\"id\":\"x\",\"created\":1}\n"]);
        let v: serde_json::Value = serde_json::from_str(&events[0].data()).unwrap();
        assert_eq!(v["model"], MODEL);
        assert_eq!(v["object"], "chat.completion.chunk");
        assert_eq!(v["choices"][0]["finish_reason"], serde_json::Value::Null);
    }

    #[test]
    fn test_wrong_typed_fields_still_emit_chunks() {
        let mut r = reframer();
        let mut events = r.push(b"data: {\"id\":123,\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n");
        events.extend(r.push(
            b"data: {\"created\":1700000000.5,\"choices\":[{\"delta\":{\"content\":\"B\"},\"finish_reason\":7}]}\n",
        ));
        events.extend(r.push(b"data: {\"choices\":{\"delta\":{\"content\":\"C\"}}}\n"));
        events.extend(r.push(b"data: [1,2,3]\n"));
        events.extend(r.finish());

        assert_eq!(r.skipped(), 0);
        assert_eq!(events.len(), 5);
        let c = chunks(&events);
        assert_eq!(c[0].id, "123");
        assert_eq!(c[0].choices[0].delta["content"], "A");
        assert_eq!(c[1].created, 1_700_000_000);
        assert_eq!(c[1].choices[0].delta["content"], "B");
        assert_eq!(c[1].choices[0].finish_reason, None);
        // a non-array choices field falls back to an empty delta
        assert_eq!(c[2].choices[0].delta, serde_json::json!({}));
        assert_eq!(c[3].id, "chatcmpl-local");
        for chunk in &c {
            assert_eq!(chunk.model, MODEL);
        }
        assert!(events[4].is_done());
    }
}
