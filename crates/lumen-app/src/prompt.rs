//! Prompt rendering.
//!
//! `~`-abbreviated working directory, plus an optional clock and git
//! branch, both toggled through settings.

use std::fs;
use std::path::Path;

use lumen_settings::Settings;
use lumen_shell::Environment;

/// Render the prompt for the next read.
pub fn render(env: &Environment, settings: &Settings) -> String {
    let mut prompt = String::new();
    if settings.get_bool("prompt.show_time", false) {
        prompt.push_str(&format!("[{}] ", chrono::Local::now().format("%H:%M")));
    }
    prompt.push_str(&abbreviate(&env.cwd, &env.home));
    if settings.get_bool("prompt.show_git", true)
        && let Some(branch) = git_branch(&env.cwd)
    {
        prompt.push_str(&format!(" ({branch})"));
    }
    prompt.push_str(" > ");
    prompt
}

/// Replace a home-directory prefix with `~`.
fn abbreviate(cwd: &Path, home: &Path) -> String {
    if cwd == home {
        return "~".to_string();
    }
    match cwd.strip_prefix(home) {
        Ok(rest) => format!("~/{}", rest.display()),
        Err(_) => cwd.display().to_string(),
    }
}

/// Current branch name, read from `.git/HEAD` in `start` or any
/// ancestor. `None` outside a repository or on a detached head.
fn git_branch(start: &Path) -> Option<String> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        let head = d.join(".git").join("HEAD");
        if let Ok(text) = fs::read_to_string(&head) {
            return text
                .trim()
                .strip_prefix("ref: refs/heads/")
                .map(|b| b.to_string());
        }
        dir = d.parent();
    }
    None
}
