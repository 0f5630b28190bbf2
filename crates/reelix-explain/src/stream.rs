//! Streaming JSONL parse loop for `/explore/why` (§4.J).
//!
//! The model streams one JSON object per line. Lines are parsed as soon as a
//! newline arrives; a line that fails to parse is kept in the buffer (the
//! model may still be mid-token) rather than dropped. A line that parses but
//! is missing required fields is simply skipped. Silence longer than the
//! heartbeat interval yields a heartbeat instead of blocking the caller.

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures_util::Stream;
use reelix_llm::provider::{ChatRequest, LlmProvider};
use reelix_llm::stream::StreamEvent;
use serde_json::Value;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub struct WhyItem {
    pub media_id: i64,
    pub why: String,
}

#[derive(Debug, Clone)]
pub enum WhyEvent {
    Item(WhyItem),
    Heartbeat,
}

/// Drives `provider.send_stream` in the background and yields [`WhyEvent`]s
/// as complete JSONL lines arrive, heartbeating when the model goes quiet.
pub fn stream_why_events(
    provider: Arc<dyn LlmProvider>,
    request: ChatRequest,
    heartbeat: Duration,
) -> impl Stream<Item = WhyEvent> {
    stream! {
        let (tx, mut rx) = mpsc::channel(64);
        tokio::spawn(async move {
            if let Err(err) = provider.send_stream(&request, tx).await {
                tracing::warn!(error = %err, "why stream provider call failed");
            }
        });

        let mut buffer = String::new();

        loop {
            match tokio::time::timeout(heartbeat, rx.recv()).await {
                Err(_elapsed) => yield WhyEvent::Heartbeat,
                Ok(None) => break,
                Ok(Some(StreamEvent::TextDelta { text })) => {
                    buffer.push_str(&text);
                    while let Some(item) = drain_one_line(&mut buffer) {
                        match item {
                            Some(item) => yield WhyEvent::Item(item),
                            None => continue,
                        }
                    }
                }
                Ok(Some(StreamEvent::Error { message })) => {
                    tracing::warn!(message, "why stream provider reported an error event");
                }
                Ok(Some(_other)) => {}
            }
        }

        let tail = buffer.trim();
        if !tail.is_empty() {
            if let Ok(value) = serde_json::from_str::<Value>(tail) {
                if let Some(item) = coerce_why_item(&value) {
                    yield WhyEvent::Item(item);
                }
            }
        }
    }
}

/// Pulls one complete newline-terminated line out of `buffer`.
///
/// Returns `None` when there is no full line to try yet (caller should stop
/// looping and wait for more deltas). Returns `Some(None)` when a line was
/// consumed but didn't decode into a usable item (blank, bad JSON held back
/// for more data, or missing fields) — `Some(Some(item))` on a usable item.
fn drain_one_line(buffer: &mut String) -> Option<Option<WhyItem>> {
    let pos = buffer.find('\n')?;
    let line = buffer[..pos].trim().to_string();
    if line.is_empty() {
        *buffer = buffer[pos + 1..].to_string();
        return Some(None);
    }

    match serde_json::from_str::<Value>(&line) {
        Err(_) => None, // not yet a complete JSON value; wait for more text
        Ok(value) => {
            *buffer = buffer[pos + 1..].to_string();
            Some(coerce_why_item(&value))
        }
    }
}

fn coerce_why_item(value: &Value) -> Option<WhyItem> {
    let media_id = value.get("media_id")?;
    let media_id = media_id
        .as_i64()
        .or_else(|| media_id.as_str().and_then(|s| s.parse::<i64>().ok()))?;
    let why = value.get("why")?.as_str()?;
    if why.is_empty() {
        return None;
    }
    Some(WhyItem {
        media_id,
        why: why.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_a_complete_well_formed_line() {
        let mut buffer = "{\"media_id\":1,\"why\":\"Great pacing.\"}\nrest".to_string();
        let item = drain_one_line(&mut buffer).unwrap().unwrap();
        assert_eq!(item.media_id, 1);
        assert_eq!(item.why, "Great pacing.");
        assert_eq!(buffer, "rest");
    }

    #[test]
    fn keeps_incomplete_json_in_buffer() {
        let mut buffer = "{\"media_id\":1,\"why\":\"incomple".to_string();
        assert!(drain_one_line(&mut buffer).is_none());
        assert_eq!(buffer, "{\"media_id\":1,\"why\":\"incomple");
    }

    #[test]
    fn skips_blank_lines() {
        let mut buffer = "\nmore".to_string();
        let result = drain_one_line(&mut buffer).unwrap();
        assert!(result.is_none());
        assert_eq!(buffer, "more");
    }

    #[test]
    fn skips_lines_missing_required_fields() {
        let mut buffer = "{\"media_id\":1}\nrest".to_string();
        let result = drain_one_line(&mut buffer).unwrap();
        assert!(result.is_none());
        assert_eq!(buffer, "rest");
    }

    #[test]
    fn coerces_string_media_id() {
        let value = serde_json::json!({"media_id": "42", "why": "Tense thriller."});
        let item = coerce_why_item(&value).unwrap();
        assert_eq!(item.media_id, 42);
    }
}
