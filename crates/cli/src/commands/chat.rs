//! `foliobot chat`: terminal session against a running gateway.
//!
//! Input is read concurrently with the in-flight response, so `quit` typed
//! while the assistant is still answering is queued rather than ignored.
//! A line-based terminal cannot see arrow keys; `!up` and `!down` recall
//! history instead, and an empty Enter runs the recalled command.

use foliobot_config::AppConfig;
use foliobot_core::stream::StreamEvent;
use foliobot_terminal::client::EventReceiver;
use foliobot_terminal::{
    ChatClient, ClientError, JsonFileStore, LogEntry, Mode, SessionController, Submission,
};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(endpoint: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let endpoint = endpoint.unwrap_or_else(|| config.terminal.endpoint.clone());

    let store = Arc::new(JsonFileStore::new(&config.terminal.storage_dir));
    let mut session = SessionController::new(store, config.terminal.history_limit);
    let client = ChatClient::new(endpoint);

    println!();
    println!("  foliobot terminal");
    println!("  Endpoint:  {}", client.endpoint());
    println!("  History:   {} command(s), {} AI message(s) restored", session.history().len(), session.conversation().len());
    println!();
    println!("  Type 'help' for commands, 'ai' to chat with the assistant.");
    println!("  '!up' / '!down' recall history; Ctrl+D exits.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stream: Option<EventReceiver> = None;
    let mut printed = 0;
    let mut recalled: Option<String> = None;
    prompt(&session)?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };

                match line.trim() {
                    "!up" => {
                        recall(session.history_up(), &mut recalled);
                        continue;
                    }
                    "!down" => {
                        recall(session.history_down(), &mut recalled);
                        continue;
                    }
                    _ => {}
                }

                let input = match recalled.take() {
                    Some(previous) if line.trim().is_empty() => previous,
                    _ => line,
                };

                if let Submission::SendChat(messages) = session.submit(&input) {
                    match client.send(&messages, session.session_id()).await {
                        Ok(rx) => {
                            stream = Some(rx);
                            print!("  ");
                        }
                        Err(e) => session.fail_response(&e.to_string()),
                    }
                }

                print_log(&session, &mut printed);
                if stream.is_none() {
                    prompt(&session)?;
                }
                std::io::stdout().flush()?;
            }

            item = next_event(&mut stream), if stream.is_some() => {
                match item {
                    Some(Ok(event)) => {
                        render(&event)?;
                        session.apply_event(&event);
                        if !event.is_finish() {
                            continue;
                        }
                    }
                    Some(Err(e)) => session.fail_response(&e.to_string()),
                    None => session.fail_response(&ClientError::Protocol("stream closed".into()).to_string()),
                }

                stream = None;
                println!();
                print_log(&session, &mut printed);
                prompt(&session)?;
            }
        }
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

async fn next_event(
    stream: &mut Option<EventReceiver>,
) -> Option<Result<StreamEvent, ClientError>> {
    match stream {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn recall(line: Option<String>, recalled: &mut Option<String>) {
    match line {
        Some(line) if !line.is_empty() => {
            println!("  (recalled) {line}   [Enter to run]");
            *recalled = Some(line);
        }
        Some(_) => {
            println!("  (input cleared)");
            *recalled = None;
        }
        None => {}
    }
}

/// Print the events of the streaming answer as they arrive.
fn render(event: &StreamEvent) -> std::io::Result<()> {
    let mut out = std::io::stdout();
    match event {
        StreamEvent::TextDelta { delta, .. } => write!(out, "{delta}")?,
        StreamEvent::ToolCall { tool_name, input, .. } => {
            let target = input
                .get("table")
                .and_then(|t| t.as_str())
                .unwrap_or(tool_name.as_str());
            writeln!(out, "[retrieving {target}...]")?;
            write!(out, "  ")?;
        }
        _ => {}
    }
    out.flush()
}

/// Print log entries added since the last call. A shrunk log means it was
/// cleared, so the screen is cleared too.
fn print_log(session: &SessionController, printed: &mut usize) {
    let log = session.log();
    if log.len() < *printed {
        print!("\x1b[2J\x1b[H");
        *printed = 0;
    }
    for entry in &log[*printed..] {
        match entry {
            LogEntry::Input { .. } => {}
            LogEntry::Output(text) => {
                for line in text.lines() {
                    println!("  {line}");
                }
            }
            LogEntry::Notice(text) => println!("  * {text}"),
            LogEntry::Error(text) => println!("  ! {text}"),
        }
    }
    *printed = log.len();
}

fn prompt(session: &SessionController) -> std::io::Result<()> {
    let mut out = std::io::stdout();
    match session.mode() {
        Mode::Standard => write!(out, "guest@portfolio:~$ ")?,
        Mode::Ai => write!(out, "ai> ")?,
    }
    out.flush()
}
