//! Standard-mode command table.

/// Commands available outside AI mode. `ai` is reserved and handled by the
/// session controller itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardCommand {
    Help,
    About,
    Projects,
    Skills,
    Contact,
    Clear,
}

impl StandardCommand {
    pub const ALL: [StandardCommand; 6] = [
        Self::Help,
        Self::About,
        Self::Projects,
        Self::Skills,
        Self::Contact,
        Self::Clear,
    ];

    /// Look up a command by name, ignoring case and surrounding whitespace.
    pub fn parse(input: &str) -> Option<Self> {
        let name = input.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|cmd| cmd.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::About => "about",
            Self::Projects => "projects",
            Self::Skills => "skills",
            Self::Contact => "contact",
            Self::Clear => "clear",
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            Self::Help => "list available commands",
            Self::About => "who I am",
            Self::Projects => "things I have built",
            Self::Skills => "languages and tools I use",
            Self::Contact => "how to reach me",
            Self::Clear => "clear the screen and the AI conversation",
        }
    }

    /// Static output of the command. `Clear` has none.
    pub fn output(&self) -> Option<String> {
        let text = match self {
            Self::Help => {
                let mut lines = vec!["Available commands:".to_string()];
                for cmd in Self::ALL {
                    lines.push(format!("  {:<10} {}", cmd.name(), cmd.summary()));
                }
                lines.push(format!("  {:<10} {}", "ai", "chat with the portfolio assistant"));
                return Some(lines.join("\n"));
            }
            Self::About => {
                "Software engineer who enjoys systems programming, developer tooling and \
                 well-crafted web experiences. Type 'ai' to ask the assistant anything about my work."
            }
            Self::Projects => {
                "Selected projects live in the portfolio database. Type 'ai' and ask \
                 \"what projects have you built?\" for an up-to-date summary."
            }
            Self::Skills => {
                "Rust, TypeScript, SQL, distributed systems, CLIs and web backends. \
                 Ask the assistant (type 'ai') for details on any of them."
            }
            Self::Contact => "Reach out through the contact form on the website, or ask the assistant how best to get in touch.",
            Self::Clear => return None,
        };
        Some(text.to_string())
    }
}
