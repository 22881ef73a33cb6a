//! Line commands accepted from a supervising process

/// A command read from standard input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the download once
    Start,
    /// Leave without running
    Close,
    /// Anything else, ignored
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "start" => Command::Start,
            "close-app" => Command::Close,
            other => Command::Unknown(other.to_string()),
        }
    }
}
