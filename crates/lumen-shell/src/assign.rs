//! Assignment classifier.
//!
//! Detects `[set] NAME = VALUE` lines and classifies the right-hand side
//! into one of four forms. Classification is total: every line yields
//! exactly one `Assignment`, including the "not an assignment" case, and
//! the classifier is pure and side-effect-free.

/// How an assignment's value should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignKind {
    /// Not an assignment at all.
    None,
    /// Plain text (including quoted-string literals, kept verbatim).
    Literal,
    /// `$(...)`: the inner command line, delimiters stripped.
    CommandSubstitution,
    /// `${NAME}`: a process-environment reference, kept verbatim.
    EnvironmentRef,
    /// `${secret:ID}`: a secret-store reference, kept verbatim.
    SecretRef,
}

/// Result of classifying one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub is_assignment: bool,
    /// `[A-Za-z_][A-Za-z0-9_]*`; empty when not an assignment.
    pub name: String,
    /// Trimmed right-hand side; delimiters stripped for command
    /// substitution, original text retained for the reference forms.
    pub value: String,
    pub kind: AssignKind,
}

impl Assignment {
    fn none() -> Self {
        Self {
            is_assignment: false,
            name: String::new(),
            value: String::new(),
            kind: AssignKind::None,
        }
    }
}

/// Classify one input line.
pub fn classify(line: &str) -> Assignment {
    let mut rest = line.trim();

    // Optional case-insensitive `set` keyword followed by whitespace.
    if rest.len() > 3
        && rest.is_char_boundary(3)
        && rest[..3].eq_ignore_ascii_case("set")
        && rest[3..].starts_with(|c: char| c.is_whitespace())
    {
        rest = rest[3..].trim_start();
    }

    let Some((name, after_name)) = take_identifier(rest) else {
        return Assignment::none();
    };
    let after_name = after_name.trim_start();
    let Some(after_eq) = after_name.strip_prefix('=') else {
        return Assignment::none();
    };
    let value = after_eq.trim();
    if value.is_empty() {
        return Assignment::none();
    }

    let (kind, value) = classify_value(value);
    Assignment {
        is_assignment: true,
        name: name.to_string(),
        value,
        kind,
    }
}

/// Split a C-identifier off the front of `s`, if one is there.
fn take_identifier(s: &str) -> Option<(&str, &str)> {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {},
        _ => return None,
    }
    let end = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    Some((&s[..end], &s[end..]))
}

/// Value-form precedence: substitution, then secret, then environment,
/// then literal. First match wins; a substitution containing a nested
/// secret reference is still a substitution; resolving the inner
/// reference belongs to whatever executes the substituted command.
fn classify_value(value: &str) -> (AssignKind, String) {
    if let Some(inner) = value.strip_prefix("$(").and_then(|v| v.strip_suffix(')')) {
        return (AssignKind::CommandSubstitution, inner.trim().to_string());
    }
    if let Some(inner) = value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        if inner.strip_prefix("secret:").is_some_and(|id| !id.is_empty()) {
            return (AssignKind::SecretRef, value.to_string());
        }
        if is_identifier(inner) {
            return (AssignKind::EnvironmentRef, value.to_string());
        }
    }
    (AssignKind::Literal, value.to_string())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_assignment() {
        let a = classify("NAME=VALUE");
        assert!(a.is_assignment);
        assert_eq!(a.name, "NAME");
        assert_eq!(a.value, "VALUE");
        assert_eq!(a.kind, AssignKind::Literal);
    }

    #[test]
    fn set_keyword_is_case_insensitive() {
        for line in ["set retries = 3", "SET retries = 3", "Set retries=3"] {
            let a = classify(line);
            assert!(a.is_assignment, "{line}");
            assert_eq!(a.name, "retries");
            assert_eq!(a.value, "3");
        }
    }

    #[test]
    fn command_substitution() {
        let a = classify("X=$(echo hi)");
        assert_eq!(a.kind, AssignKind::CommandSubstitution);
        assert_eq!(a.value, "echo hi");
    }

    #[test]
    fn secret_reference_kept_verbatim() {
        let a = classify("Y=${secret:db_pass}");
        assert_eq!(a.kind, AssignKind::SecretRef);
        assert_eq!(a.value, "${secret:db_pass}");
    }

    #[test]
    fn environment_reference_kept_verbatim() {
        let a = classify("Z=${HOME}");
        assert_eq!(a.kind, AssignKind::EnvironmentRef);
        assert_eq!(a.value, "${HOME}");
    }

    #[test]
    fn quoted_literal_keeps_quotes() {
        let a = classify("greeting=\"hello world\"");
        assert_eq!(a.kind, AssignKind::Literal);
        assert_eq!(a.value, "\"hello world\"");
    }

    #[test]
    fn non_assignments() {
        for line in ["not an assignment", "ls -l", "", "   ", "set", "set  ", "X=", "1X=2"] {
            let a = classify(line);
            assert!(!a.is_assignment, "{line:?}");
            assert_eq!(a.kind, AssignKind::None);
            assert!(a.name.is_empty());
        }
    }

    #[test]
    fn substitution_wins_over_nested_secret() {
        let a = classify("K=$(resolve ${secret:token})");
        assert_eq!(a.kind, AssignKind::CommandSubstitution);
        assert_eq!(a.value, "resolve ${secret:token}");
    }

    #[test]
    fn braced_non_identifier_is_literal() {
        assert_eq!(classify("A=${1BAD}").kind, AssignKind::Literal);
        assert_eq!(classify("B=${secret:}").kind, AssignKind::Literal);
        assert_eq!(classify("C=${A.B}").kind, AssignKind::Literal);
    }

    #[test]
    fn classification_is_idempotent() {
        let first = classify("set url = ${secret:endpoint}");
        let second = classify("set url = ${secret:endpoint}");
        assert_eq!(first, second);
    }
}
