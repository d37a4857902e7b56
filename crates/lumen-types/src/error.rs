//! Error types for the lumen shell.

use std::io;

/// Errors produced by the lumen shell and its executors.
#[derive(Debug, thiserror::Error)]
pub enum LumenError {
    #[error("command error: {0}")]
    Command(String),

    #[error("script error: {0}")]
    Script(String),

    #[error("module error: {0}")]
    Module(String),

    #[error("settings error: {0}")]
    Settings(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, LumenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_error_display() {
        let e = LumenError::Command("unknown command: foo".into());
        assert_eq!(format!("{e}"), "command error: unknown command: foo");
    }

    #[test]
    fn script_error_display() {
        let e = LumenError::Script("unexpected token".into());
        assert_eq!(format!("{e}"), "script error: unexpected token");
    }

    #[test]
    fn module_error_display() {
        let e = LumenError::Module("deploy failed".into());
        assert_eq!(format!("{e}"), "module error: deploy failed");
    }

    #[test]
    fn settings_error_display() {
        let e = LumenError::Settings("no config dir".into());
        assert_eq!(format!("{e}"), "settings error: no config dir");
    }

    #[test]
    fn io_error_converts() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let e: LumenError = io_err.into();
        assert!(format!("{e}").starts_with("I/O error:"));
    }
}
