//! Command line tokenizer.
//!
//! Splits a raw line into argv-style tokens honoring single and double
//! quotes. A backslash suppresses the quoting behavior of an immediately
//! following quote character and is otherwise an ordinary character; no
//! un-escaping is performed. Deliberately permissive: an unterminated
//! quote closes at end-of-string rather than raising.

/// Tokenize a line. Unquoted whitespace separates tokens; consecutive
/// whitespace produces no empty tokens; an empty or all-whitespace line
/// yields an empty vector.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    // Tracks whether anything was consumed into the current token, so a
    // quoted empty string ("") still produces a token.
    let mut started = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match quote {
            Some(q) => {
                if ch == '\\'
                    && let Some(&next) = chars.peek()
                    && (next == '"' || next == '\'')
                {
                    current.push('\\');
                    current.push(next);
                    chars.next();
                } else if ch == q {
                    quote = None;
                } else {
                    current.push(ch);
                }
            },
            None => {
                if ch == '\\'
                    && let Some(&next) = chars.peek()
                    && (next == '"' || next == '\'')
                {
                    current.push('\\');
                    current.push(next);
                    chars.next();
                    started = true;
                } else if ch == '"' || ch == '\'' {
                    quote = Some(ch);
                    started = true;
                } else if ch.is_whitespace() {
                    if started {
                        tokens.push(std::mem::take(&mut current));
                        started = false;
                    }
                } else {
                    current.push(ch);
                    started = true;
                }
            },
        }
    }

    if started {
        tokens.push(current);
    }
    tokens
}
