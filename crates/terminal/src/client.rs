//! HTTP client for the gateway's streaming chat endpoint.

use foliobot_core::conversation::ConversationMessage;
use foliobot_core::request::ChatRequest;
use foliobot_core::stream::StreamEvent;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed stream: {0}")]
    Protocol(String),
}

pub type EventReceiver = mpsc::Receiver<Result<StreamEvent, ClientError>>;

pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ChatClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST the conversation and stream back its events.
    ///
    /// The receiver yields events in order and closes after `finish`. A stream
    /// that ends without `finish` yields a final [`ClientError::Protocol`].
    pub async fn send(
        &self,
        messages: &[ConversationMessage],
        session_id: &str,
    ) -> Result<EventReceiver, ClientError> {
        let body = ChatRequest {
            messages: messages.to_vec(),
            session_id: Some(session_id.to_string()),
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();
        debug!(request_id = %request_id, "Chat stream opened");

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::default();

            while let Some(chunk) = byte_stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send(Err(ClientError::Network(e.to_string()))).await;
                        return;
                    }
                };

                for item in decoder.feed(&bytes) {
                    let finished = matches!(&item, Ok(event) if event.is_finish());
                    if tx.send(item).await.is_err() || finished {
                        return;
                    }
                }
            }

            let _ = tx
                .send(Err(ClientError::Protocol(
                    "stream ended before finish".into(),
                )))
                .await;
        });

        Ok(rx)
    }
}

/// Incremental decoder for the gateway's SSE body.
///
/// Only `data:` lines matter: each carries one JSON event, except the
/// closing `[DONE]` sentinel. Event names, comments and blank lines are
/// skipped. Bytes are held until a full line arrives, so characters split
/// across network chunks decode intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<StreamEvent, ClientError>> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = match std::str::from_utf8(&raw[..pos]) {
                Ok(line) => line.trim_end_matches('\r'),
                Err(e) => {
                    out.push(Err(ClientError::Protocol(format!("invalid UTF-8: {e}"))));
                    continue;
                }
            };

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data == "[DONE]" {
                self.done = true;
                continue;
            }
            out.push(
                serde_json::from_str(data)
                    .map_err(|e| ClientError::Protocol(format!("bad event {data:?}: {e}"))),
            );
        }

        out
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foliobot_core::stream::FinishReason;

    #[test]
    fn decodes_frames_split_across_chunks() {
        let body = "event: text-start\ndata: {\"type\":\"text-start\",\"id\":\"answer-0\"}\n\n\
                    event: text-delta\ndata: {\"type\":\"text-delta\",\"id\":\"answer-0\",\"delta\":\"Hi\"}\n\n\
                    event: finish\ndata: {\"type\":\"finish\",\"finishReason\":\"stop\"}\n\n\
                    data: [DONE]\n\n";
        let (a, b) = body.split_at(37);

        let mut decoder = SseDecoder::default();
        let mut events: Vec<StreamEvent> = decoder.feed(a.as_bytes()).into_iter().map(Result::unwrap).collect();
        events.extend(decoder.feed(b.as_bytes()).into_iter().map(Result::unwrap));

        assert_eq!(events.len(), 3);
        assert_eq!(
            events[1],
            StreamEvent::TextDelta {
                id: "answer-0".into(),
                delta: "Hi".into()
            }
        );
        assert_eq!(
            events[2],
            StreamEvent::Finish {
                finish_reason: FinishReason::Stop
            }
        );
        assert!(decoder.is_done());
    }

    #[test]
    fn characters_split_across_chunks_decode_intact() {
        let frame = "data: {\"type\":\"text-delta\",\"id\":\"answer-0\",\"delta\":\"café 日本\"}\n".as_bytes();
        let mut decoder = SseDecoder::default();

        // Split inside the two-byte "é"
        let split = frame.iter().position(|&b| b == 0xC3).unwrap() + 1;
        assert!(decoder.feed(&frame[..split]).is_empty());
        let events = decoder.feed(&frame[split..]);

        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::TextDelta {
                id: "answer-0".into(),
                delta: "café 日本".into()
            }
        );
    }

    #[test]
    fn invalid_utf8_line_is_a_protocol_error() {
        let mut decoder = SseDecoder::default();
        let items = decoder.feed(b"data: \xff\xfe\n");
        assert!(matches!(items[0], Err(ClientError::Protocol(_))));
    }

    #[test]
    fn bad_json_is_a_protocol_error() {
        let mut decoder = SseDecoder::default();
        let items = decoder.feed(b"data: {nope}\r\n");
        assert!(matches!(items[0], Err(ClientError::Protocol(_))));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let client = ChatClient::new("http://127.0.0.1:9/api/chat");
        let err = client
            .send(&[ConversationMessage::user("hi")], "s-1")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
    }
}
