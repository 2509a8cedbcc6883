//! The terminal session state machine.
//!
//! ```text
//!            "ai"                          "quit" (idle)
//!  Standard ──────▶ Ai ───────────────────────────────────▶ Standard
//!                    │ "quit" (streaming)                      ▲
//!                    ▼                                         │
//!               pending_quit ──── response finishes ───────────┘
//! ```
//!
//! The controller never performs I/O besides its session store. A submitted
//! chat message comes back as [`Submission::SendChat`]; the caller streams the
//! response and feeds each event to [`SessionController::apply_event`].

use foliobot_core::conversation::{ConversationMessage, ConversationRole, MessagePart};
use foliobot_core::stream::{FinishReason, StreamEvent};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::commands::StandardCommand;
use crate::history::CommandHistory;
use crate::store::SessionStore;

pub const AI_ENTERED_NOTICE: &str =
    "Entered AI Chat Mode. Ask anything about my work; type 'quit' to leave.";
pub const AI_EXITED_NOTICE: &str = "Exited AI Chat Mode";
pub const QUIT_QUEUED_NOTICE: &str =
    "Exit queued: leaving AI Chat Mode once the current response finishes.";
pub const QUIT_ALREADY_QUEUED_NOTICE: &str = "Exit is already queued.";
pub const BUSY_NOTICE: &str = "A response is still streaming, please wait.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Standard,
    Ai,
}

/// One line of the visible command log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// What the user typed, in the mode it was typed in.
    Input { mode: Mode, text: String },
    Output(String),
    Notice(String),
    Error(String),
}

/// What the caller must do after [`SessionController::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Fully handled locally.
    Handled,
    /// Stream a response for this conversation, then report back through
    /// `apply_event` / `fail_response`.
    SendChat(Vec<ConversationMessage>),
}

pub struct SessionController {
    session_id: String,
    mode: Mode,
    pending_quit: bool,
    is_loading: bool,
    /// Set when `clear` ran during a response; its remaining output is dropped.
    detached: bool,
    /// Index of the assistant message receiving the in-flight response.
    streaming_message: Option<usize>,
    log: Vec<LogEntry>,
    conversation: Vec<ConversationMessage>,
    history: CommandHistory,
    store: Arc<dyn SessionStore>,
}

impl SessionController {
    /// A new session restored from `store`.
    pub fn new(store: Arc<dyn SessionStore>, history_limit: usize) -> Self {
        let entries = store.load_history().unwrap_or_else(|e| {
            warn!(error = %e, "Command history unreadable, starting empty");
            Vec::new()
        });

        let mut controller = Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            mode: Mode::Standard,
            pending_quit: false,
            is_loading: false,
            detached: false,
            streaming_message: None,
            log: Vec::new(),
            conversation: Vec::new(),
            history: CommandHistory::from_entries(entries, history_limit),
            store,
        };
        controller.restore_conversation();
        controller
    }

    /// Load the persisted AI conversation, only if the live one is empty.
    pub fn restore_conversation(&mut self) {
        if !self.conversation.is_empty() {
            return;
        }
        match self.store.load_conversation() {
            Ok(messages) => {
                debug!(messages = messages.len(), "AI conversation restored");
                self.conversation = messages;
            }
            Err(e) => warn!(error = %e, "AI conversation unreadable, starting empty"),
        }
    }

    pub fn submit(&mut self, input: &str) -> Submission {
        let command = input.trim();

        if self.is_loading && !matches!(command, "quit" | "clear") {
            self.log.push(LogEntry::Notice(BUSY_NOTICE.into()));
            return Submission::Handled;
        }

        self.history.push(input);
        self.persist_history();
        if !command.is_empty() {
            self.log.push(LogEntry::Input {
                mode: self.mode,
                text: command.to_string(),
            });
        }

        match self.mode {
            Mode::Standard => self.submit_standard(command),
            Mode::Ai => self.submit_ai(command),
        }
    }

    fn submit_standard(&mut self, command: &str) -> Submission {
        if command.is_empty() {
            return Submission::Handled;
        }
        if command.eq_ignore_ascii_case("ai") {
            self.mode = Mode::Ai;
            self.log.push(LogEntry::Notice(AI_ENTERED_NOTICE.into()));
            return Submission::Handled;
        }

        match StandardCommand::parse(command) {
            Some(StandardCommand::Clear) => self.clear(),
            Some(cmd) => {
                if let Some(output) = cmd.output() {
                    self.log.push(LogEntry::Output(output));
                }
            }
            None => self.log.push(LogEntry::Error(format!(
                "command not found: {command}. Type 'help' to see available commands."
            ))),
        }
        Submission::Handled
    }

    fn submit_ai(&mut self, command: &str) -> Submission {
        match command {
            "" => Submission::Handled,
            "quit" => {
                self.request_quit();
                Submission::Handled
            }
            "clear" => {
                self.clear();
                Submission::Handled
            }
            text => {
                self.conversation.push(ConversationMessage::user(text));
                self.persist_conversation();
                self.is_loading = true;
                self.detached = false;
                self.streaming_message = None;
                Submission::SendChat(self.conversation.clone())
            }
        }
    }

    fn request_quit(&mut self) {
        if !self.is_loading {
            self.exit_ai_mode();
        } else if self.pending_quit {
            self.log.push(LogEntry::Notice(QUIT_ALREADY_QUEUED_NOTICE.into()));
        } else {
            self.pending_quit = true;
            self.log.push(LogEntry::Notice(QUIT_QUEUED_NOTICE.into()));
        }
    }

    fn exit_ai_mode(&mut self) {
        self.mode = Mode::Standard;
        self.log.push(LogEntry::Notice(AI_EXITED_NOTICE.into()));
    }

    /// Empty the command log and the AI conversation, live and persisted.
    pub fn clear(&mut self) {
        self.log.clear();
        self.conversation.clear();
        self.streaming_message = None;
        self.detached = self.is_loading;
        self.persist_conversation();
    }

    /// Apply one event of the in-flight response.
    pub fn apply_event(&mut self, event: &StreamEvent) {
        if !self.is_loading {
            return;
        }
        if let StreamEvent::Finish { finish_reason } = event {
            self.finish_response(*finish_reason);
            return;
        }
        if self.detached {
            return;
        }

        let part = match event {
            StreamEvent::TextStart { .. } => {
                self.streaming_message_mut().start_text();
                return;
            }
            StreamEvent::TextEnd { .. } => {
                self.streaming_message_mut().end_text();
                None
            }
            StreamEvent::TextDelta { delta, .. } => {
                self.streaming_message_mut().push_text(delta);
                None
            }
            StreamEvent::ToolCall {
                tool_call_id,
                tool_name,
                input,
            } => Some(MessagePart::ToolCall {
                tool_call_id: tool_call_id.clone(),
                tool_name: tool_name.clone(),
                input: input.clone(),
            }),
            StreamEvent::ToolResult {
                tool_call_id,
                tool_name,
                output,
            } => Some(MessagePart::ToolResult {
                tool_call_id: tool_call_id.clone(),
                tool_name: tool_name.clone(),
                output: output.clone(),
            }),
            StreamEvent::Finish { .. } => return,
        };

        if let Some(part) = part {
            self.streaming_message_mut().parts.push(part);
        }
        self.persist_conversation();
    }

    /// The transport failed before a `finish` event arrived.
    pub fn fail_response(&mut self, error: &str) {
        if !self.is_loading {
            return;
        }
        self.log.push(LogEntry::Error(format!("Chat request failed: {error}")));
        self.finish_response(FinishReason::Error);
    }

    fn finish_response(&mut self, finish_reason: FinishReason) {
        debug!(session_id = %self.session_id, finish_reason = %finish_reason, "Response finished");
        self.is_loading = false;
        self.detached = false;
        self.streaming_message = None;

        if self.pending_quit {
            self.pending_quit = false;
            self.exit_ai_mode();
        }
    }

    fn streaming_message_mut(&mut self) -> &mut ConversationMessage {
        let index = match self.streaming_message {
            Some(index) => index,
            None => {
                self.conversation
                    .push(ConversationMessage::new(ConversationRole::Assistant, Vec::new()));
                let index = self.conversation.len() - 1;
                self.streaming_message = Some(index);
                index
            }
        };
        &mut self.conversation[index]
    }

    /// Recall an older command into the input line.
    pub fn history_up(&mut self) -> Option<String> {
        self.history.up().map(str::to_string)
    }

    /// Recall a newer command; past the newest the input becomes empty.
    pub fn history_down(&mut self) -> Option<String> {
        self.history.down().map(str::to_string)
    }

    fn persist_history(&self) {
        if let Err(e) = self.store.save_history(self.history.entries()) {
            warn!(error = %e, "Failed to persist command history");
        }
    }

    fn persist_conversation(&self) {
        if let Err(e) = self.store.save_conversation(&self.conversation) {
            warn!(error = %e, "Failed to persist AI conversation");
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn pending_quit(&self) -> bool {
        self.pending_quit
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn conversation(&self) -> &[ConversationMessage] {
        &self.conversation
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }
}
