// ABOUTME: Minimal server-sent-events reader for streaming provider responses.
// ABOUTME: Splits a reqwest byte stream into `event`/`data` frames separated by blank lines.

use std::collections::VecDeque;

use futures::{Stream, StreamExt};

use crate::model::ModelError;

/// One SSE frame. Multiple `data:` lines are joined with newlines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

fn parse_block(block: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data_lines.push(value),
            _ => {}
        }
    }

    if event.is_none() && data_lines.is_empty() {
        return None;
    }

    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
    })
}

/// Remove every complete frame from `buffer`. Carriage returns must already
/// be stripped.
pub(crate) fn drain_frames(buffer: &mut Vec<u8>) -> Vec<SseFrame> {
    let mut frames = Vec::new();
    while let Some(end) = buffer.windows(2).position(|w| w == b"\n\n") {
        let block: Vec<u8> = buffer.drain(..end + 2).collect();
        if let Some(frame) = parse_block(&String::from_utf8_lossy(&block)) {
            frames.push(frame);
        }
    }
    frames
}

/// Turn a streaming HTTP response body into SSE frames.
pub fn sse_frames(
    response: reqwest::Response,
) -> impl Stream<Item = Result<SseFrame, ModelError>> + Send {
    let bytes = Box::pin(response.bytes_stream());
    let state = (bytes, Vec::<u8>::new(), VecDeque::<SseFrame>::new(), false);

    futures::stream::unfold(state, |(mut bytes, mut buffer, mut pending, mut done)| async move {
        loop {
            if let Some(frame) = pending.pop_front() {
                return Some((Ok(frame), (bytes, buffer, pending, done)));
            }
            if done {
                return None;
            }
            match bytes.next().await {
                Some(Ok(chunk)) => {
                    buffer.extend(chunk.iter().filter(|b| **b != b'\r'));
                    pending.extend(drain_frames(&mut buffer));
                }
                Some(Err(e)) => {
                    done = true;
                    let err = ModelError::Provider(format!("stream read failed: {}", e));
                    return Some((Err(err), (bytes, buffer, pending, done)));
                }
                None => {
                    done = true;
                    buffer.extend_from_slice(b"\n\n");
                    pending.extend(drain_frames(&mut buffer));
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_complete_frames_and_keeps_remainder() {
        let mut buffer = b"event: ping\ndata: {\"a\":1}\n\ndata: partial".to_vec();
        let frames = drain_frames(&mut buffer);

        assert_eq!(
            frames,
            vec![SseFrame {
                event: Some("ping".to_string()),
                data: "{\"a\":1}".to_string()
            }]
        );
        assert_eq!(buffer, b"data: partial".to_vec());
    }

    #[test]
    fn joins_multi_line_data_and_skips_comments() {
        let mut buffer = b": keepalive\n\ndata: one\ndata: two\n\n".to_vec();
        let frames = drain_frames(&mut buffer);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, None);
        assert_eq!(frames[0].data, "one\ntwo");
        assert!(buffer.is_empty());
    }

    #[test]
    fn handles_multibyte_text() {
        let mut buffer = "data: caf\u{e9} \u{1f680}\n\n".as_bytes().to_vec();
        let frames = drain_frames(&mut buffer);
        assert_eq!(frames[0].data, "caf\u{e9} \u{1f680}");
    }
}
