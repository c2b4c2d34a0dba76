//! Server-sent events plumbing shared by the streaming adapters.
//!
//! Each backend frames its stream as `data: {...}` lines; only the payload
//! interpretation differs. Adapters supply a small parse function and
//! [`spawn_reader`] handles buffering, interruption and the final chunk.

use aegent_core::error::ProviderError;
use aegent_core::provider::{StreamChunk, Usage};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::trace;

/// What one `data:` payload means to the adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// A text delta to forward
    Delta(String),
    /// Token usage, usually near the end
    Usage(Usage),
    /// End of stream
    Done,
    /// Nothing of interest (pings, metadata, unparseable frames)
    Skip,
}

/// Incremental line decoder for an SSE byte stream.
///
/// Bytes are buffered until a full line arrives, so a multi-byte character
/// split across network chunks decodes intact.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns the `data:` payloads of every complete line.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw[..line_end]);
            let line = line.trim_end_matches('\r');

            // Blank separators, comments, and `event:` lines carry no payload
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    payloads.push(data.to_string());
                }
            }
        }
        payloads
    }
}

/// Drive an SSE response on a background task, forwarding text deltas.
///
/// A `done: true` chunk is always the last message unless the transport
/// fails, in which case a `StreamInterrupted` error is sent instead.
pub fn spawn_reader<F>(
    response: reqwest::Response,
    provider: String,
    parse: F,
) -> mpsc::Receiver<Result<StreamChunk, ProviderError>>
where
    F: Fn(&str) -> SseEvent + Send + 'static,
{
    let (tx, rx) = mpsc::channel(64);

    tokio::spawn(async move {
        let mut byte_stream = response.bytes_stream();
        let mut decoder = LineDecoder::new();
        let mut usage: Option<Usage> = None;

        while let Some(chunk_result) = byte_stream.next().await {
            let bytes = match chunk_result {
                Ok(b) => b,
                Err(e) => {
                    let _ = tx
                        .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                        .await;
                    return;
                }
            };

            for payload in decoder.push(&bytes) {
                match parse(&payload) {
                    SseEvent::Delta(text) => {
                        let chunk = StreamChunk {
                            content: Some(text),
                            done: false,
                            usage: None,
                        };
                        if tx.send(Ok(chunk)).await.is_err() {
                            return; // receiver dropped
                        }
                    }
                    SseEvent::Usage(u) => usage = Some(u),
                    SseEvent::Done => {
                        let _ = tx
                            .send(Ok(StreamChunk {
                                content: None,
                                done: true,
                                usage: usage.take(),
                            }))
                            .await;
                        return;
                    }
                    SseEvent::Skip => {
                        trace!(provider = %provider, data = %payload, "Skipping SSE frame");
                    }
                }
            }
        }

        // Stream ended without an explicit terminator
        let _ = tx
            .send(Ok(StreamChunk {
                content: None,
                done: true,
                usage,
            }))
            .await;
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_handles_split_lines() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"data: {\"a\":").is_empty());
        let payloads = decoder.push(b"1}\n\ndata: [DONE]\n");
        assert_eq!(payloads, vec!["{\"a\":1}", "[DONE]"]);
    }

    #[test]
    fn decoder_skips_comments_and_event_lines() {
        let mut decoder = LineDecoder::new();
        let payloads = decoder.push(b": ping\r\nevent: message_start\r\ndata: {}\r\n");
        assert_eq!(payloads, vec!["{}"]);
    }

    #[test]
    fn decoder_accepts_data_without_space() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push(b"data:{\"x\":2}\n"), vec!["{\"x\":2}"]);
    }

    #[test]
    fn decoder_keeps_multibyte_chars_split_across_chunks() {
        let line = "data: {\"text\":\"café\"}\n".as_bytes();
        // Split inside the two-byte 'é'
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(&line[..split]).is_empty());
        let payloads = decoder.push(&line[split..]);
        assert_eq!(payloads, vec!["{\"text\":\"café\"}"]);
    }
}
