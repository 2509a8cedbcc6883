//! `POST /api/chat`: validate the body, start the orchestrator, stream its
//! events as SSE.
//!
//! Each [`StreamEvent`] becomes one frame whose `event:` is the event type and
//! whose `data:` is the JSON event; a final `data: [DONE]` frame follows the
//! `finish` event. Only failures before the stream starts become plain HTTP
//! errors.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{field, info, info_span, warn};

use foliobot_config::Environment;
use foliobot_core::request::{ChatRequest, LogContext};
use foliobot_core::stream::StreamEvent;

use crate::SharedState;

/// Response header carrying the request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Data of the frame sent after `finish`.
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The body is JSON but not a chat request; no generation is attempted.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Anything that fails before the stream starts.
    #[error("{message}")]
    Internal {
        message: String,
        details: Option<String>,
    },
}

impl ApiError {
    /// An internal error; `details` are exposed only in development.
    fn internal(message: &str, cause: &dyn std::fmt::Display, environment: Environment) -> Self {
        Self::Internal {
            message: message.to_string(),
            details: environment
                .is_development()
                .then(|| cause.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Validation(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "Invalid request".into(),
                    message: Some(message),
                    details: None,
                },
            ),
            Self::Internal { message, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: message,
                    message: None,
                    details,
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

pub(crate) async fn chat_handler(State(state): State<SharedState>, body: Bytes) -> Response {
    let ctx = LogContext::generate();
    let span = info_span!("chat", request_id = %ctx, session_id = field::Empty);
    let request_id = HeaderValue::from_str(&ctx.request_id).ok();

    let mut response = match parse_request(&body, state.environment) {
        Ok(request) => {
            if let Some(session_id) = &request.session_id {
                span.record("session_id", session_id.as_str());
            }
            let rx = span.in_scope(|| {
                info!(messages = request.messages.len(), "Chat request accepted");
                state.orchestrator.stream(request.messages, ctx)
            });
            sse_response(rx).into_response()
        }
        Err(e) => {
            span.in_scope(|| warn!(error = %e, "Chat request rejected"));
            e.into_response()
        }
    };

    if let Some(value) = request_id {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Parse and validate a chat body. A missing or non-array `messages` is a
/// client error; anything else that fails to parse is a server error.
pub fn parse_request(body: &[u8], environment: Environment) -> Result<ChatRequest, ApiError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::internal("Failed to parse request body", &e, environment))?;

    match value.get("messages") {
        Some(serde_json::Value::Array(_)) => {}
        Some(_) => return Err(ApiError::Validation("`messages` must be an array".into())),
        None => return Err(ApiError::Validation("`messages` is required".into())),
    }

    serde_json::from_value(value)
        .map_err(|e| ApiError::internal("Failed to read chat messages", &e, environment))
}

fn sse_response(
    rx: mpsc::Receiver<StreamEvent>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    let events = ReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(event.event_type()).data(data))
    });
    let done = tokio_stream::once(Ok(SseEvent::default().data(DONE_SENTINEL)));

    Sse::new(events.chain(done))
}
