//! Single-writer multiplexer for one response stream.
//!
//! Both generation phases write into the same [`StreamSink`], one after the
//! other, through a short-lived [`PhaseWriter`]. The sink owns the invariants
//! of the wire protocol:
//!
//! - text spans are always `text-start`, `text-delta`*, `text-end`
//! - span ids are `{namespace}-{seq}` with a sequence shared by every
//!   namespace, so ids never collide across phases
//! - only the sink can emit `finish`, and [`StreamSink::finish`] consumes it,
//!   so a response gets exactly one terminal event
//!
//! Send failures mean the client went away; they are ignored and the
//! pipeline runs to completion.

use foliobot_core::stream::{FinishReason, StreamEvent};
use tokio::sync::mpsc;

pub struct StreamSink {
    tx: mpsc::Sender<StreamEvent>,
    next_seq: u64,
    open_span: Option<String>,
}

impl StreamSink {
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            tx,
            next_seq: 0,
            open_span: None,
        }
    }

    /// A sink plus the receiving half of its channel.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }

    /// Writer for one producer phase; its text spans are named `{namespace}-N`.
    pub fn phase(&mut self, namespace: &'static str) -> PhaseWriter<'_> {
        PhaseWriter {
            sink: self,
            namespace,
        }
    }

    /// Write `text` as a complete span of its own, closing any open span first.
    pub async fn inject_text(&mut self, namespace: &'static str, text: &str) {
        self.close_open_span().await;
        let id = self.open(namespace).await;
        self.send(StreamEvent::TextDelta {
            id,
            delta: text.to_string(),
        })
        .await;
        self.close_open_span().await;
    }

    pub async fn close_open_span(&mut self) {
        if let Some(id) = self.open_span.take() {
            self.send(StreamEvent::TextEnd { id }).await;
        }
    }

    pub fn has_open_span(&self) -> bool {
        self.open_span.is_some()
    }

    /// Close any open span and emit the terminal event.
    pub async fn finish(mut self, finish_reason: FinishReason) {
        self.close_open_span().await;
        self.send(StreamEvent::Finish { finish_reason }).await;
    }

    async fn open(&mut self, namespace: &str) -> String {
        let id = format!("{namespace}-{}", self.next_seq);
        self.next_seq += 1;
        self.open_span = Some(id.clone());
        self.send(StreamEvent::TextStart { id: id.clone() }).await;
        id
    }

    async fn send(&self, event: StreamEvent) {
        let _ = self.tx.send(event).await;
    }
}

/// A phase's view of the sink: text and tool events, never `finish`.
pub struct PhaseWriter<'a> {
    sink: &'a mut StreamSink,
    namespace: &'static str,
}

impl PhaseWriter<'_> {
    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// Append to the current span, opening one first if needed.
    pub async fn text_delta(&mut self, delta: &str) {
        if delta.is_empty() {
            return;
        }
        let id = match self.sink.open_span.clone() {
            Some(id) => id,
            None => self.sink.open(self.namespace).await,
        };
        self.sink
            .send(StreamEvent::TextDelta {
                id,
                delta: delta.to_string(),
            })
            .await;
    }

    pub async fn end_text(&mut self) {
        self.sink.close_open_span().await;
    }

    pub async fn tool_call(&mut self, tool_call_id: &str, tool_name: &str, input: &serde_json::Value) {
        self.sink.close_open_span().await;
        self.sink
            .send(StreamEvent::ToolCall {
                tool_call_id: tool_call_id.to_string(),
                tool_name: tool_name.to_string(),
                input: input.clone(),
            })
            .await;
    }

    pub async fn tool_result(&mut self, tool_call_id: &str, tool_name: &str, output: &str) {
        self.sink
            .send(StreamEvent::ToolResult {
                tool_call_id: tool_call_id.to_string(),
                tool_name: tool_name.to_string(),
                output: output.to_string(),
            })
            .await;
    }
}
