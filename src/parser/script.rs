/// SQL script handling: `--` comments and `;`-separated statements.

/// Tracks whether the scanner is inside a quoted literal or identifier.
#[derive(Default)]
struct QuoteState {
    open: Option<char>,
    escaped: bool,
}

impl QuoteState {
    /// Feeds one character; returns true when it is outside any quotes.
    fn feed(&mut self, c: char) -> bool {
        if let Some(q) = self.open {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == q {
                self.open = None;
            }
            return false;
        }
        if matches!(c, '\'' | '"' | '`') {
            self.open = Some(c);
            return false;
        }
        true
    }
}

/// Cuts a trailing `--` comment from one line, leaving quoted `--` alone.
#[must_use]
pub fn strip_comment(line: &str) -> &str {
    let mut state = QuoteState::default();
    let mut prev_dash = false;
    for (i, c) in line.char_indices() {
        let outside = state.feed(c);
        if outside && c == '-' {
            if prev_dash {
                return &line[..i - 1];
            }
            prev_dash = true;
        } else {
            prev_dash = false;
        }
    }
    line
}

/// Strips comments line by line, then splits on `;` outside quotes.
/// Empty statements are dropped.
#[must_use]
pub fn split_statements(text: &str) -> Vec<String> {
    let cleaned: String = text
        .lines()
        .map(strip_comment)
        .collect::<Vec<_>>()
        .join("\n");

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = QuoteState::default();
    for c in cleaned.chars() {
        let outside = state.feed(c);
        if outside && c == ';' {
            push_statement(&mut statements, &current);
            current.clear();
        } else {
            current.push(c);
        }
    }
    push_statement(&mut statements, &current);
    statements
}

fn push_statement(statements: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}
