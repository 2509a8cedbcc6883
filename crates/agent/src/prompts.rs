//! Fixed prompt text for the two generation phases.

use foliobot_core::tool::ToolInvocation;

/// Appended to the system prompt for the retrieval phase.
pub const RETRIEVAL_SUFFIX: &str = "## Current task: retrieval\n\
Use the query_portfolio tool to look up any portfolio data the question needs. \
Limit yourself to retrieval and reasoning; if the question needs no data, answer it directly and briefly.";

/// Appended to the system prompt for the final-answer phase.
pub const ANSWER_SUFFIX: &str = "## Current task: final answer\n\
Write the final answer for the visitor using only the retrieved data below. \
Do not call tools. Do not mention tools, queries or databases.";

/// Streamed when generation produced nothing usable.
pub const FALLBACK_TEXT: &str = "Sorry, I couldn't put together an answer just now. \
Please try rephrasing your question, or ask about my projects, skills or experience.";

pub const NO_DATA_NOTE: &str = "No portfolio data was retrieved.";

pub fn with_suffix(system_prompt: &str, suffix: &str) -> String {
    format!("{}\n\n{suffix}", system_prompt.trim_end())
}

/// Tool outputs as one block, `[tool_name] output` per call, cut to at most
/// `limit` characters. `None` when no tool produced output.
pub fn collect_tool_text<'a>(
    invocations: impl IntoIterator<Item = &'a ToolInvocation>,
    limit: usize,
) -> Option<String> {
    let joined = invocations
        .into_iter()
        .filter(|inv| !inv.output.trim().is_empty())
        .map(|inv| format!("[{}] {}", inv.tool_name, inv.output.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");

    if joined.is_empty() {
        return None;
    }
    Some(truncate_chars(&joined, limit).to_string())
}

/// At most `limit` characters of `s`, cut on a char boundary.
pub fn truncate_chars(s: &str, limit: usize) -> &str {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// The user message sent to the final-answer phase.
pub fn compose_answer_prompt(user_request: &str, tool_text: Option<&str>) -> String {
    let user_request = match user_request.trim() {
        "" => "(no question text)",
        text => text,
    };
    format!(
        "Visitor's request:\n{user_request}\n\nRetrieved portfolio data:\n{}\n\n\
         Answer the visitor's request now, in a friendly and concise way.",
        tool_text.unwrap_or(NO_DATA_NOTE)
    )
}
