//! The read-eval-print loop.
//!
//! rustyline supplies line editing, history, and completion callbacks;
//! dispatch goes through the resolver. End-of-input is the only
//! non-command exit; an interrupt during line acquisition re-prompts.

use std::cell::RefCell;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;

use rustyline::completion::{Completer, Pair};
use rustyline::config::{CompletionType, Config};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};

use lumen_settings::Settings;
use lumen_shell::complete::{self, Strategy};
use lumen_shell::tokenize::tokenize;
use lumen_shell::Shell;

use crate::prompt;

/// rustyline hook: forwards completion requests to the engine.
struct ShellHelper {
    shell: Rc<RefCell<Shell>>,
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let before = &line[..pos];
        let mut words = tokenize(before);
        // A trailing unquoted space means a new word has begun.
        if !words.is_empty()
            && before.chars().next_back().is_some_and(|c| c.is_whitespace())
        {
            words.push(String::new());
        }

        let shell = self.shell.borrow();
        let candidates = complete::complete(
            before,
            &words,
            &*shell,
            &shell.fs_state(),
            shell.settings(),
        );

        // The engine's insert text replaces the whole partial word
        // (or script segment) the strategy matched against.
        let span = match complete::choose_strategy(before, &words) {
            Strategy::Commands(partial) => partial.len(),
            Strategy::Paths { partial, .. } => partial.len(),
            Strategy::Functions(query) => query.len(),
            Strategy::Nothing => 0,
        };
        let start = pos.saturating_sub(span);

        let pairs = candidates
            .into_iter()
            .map(|c| Pair {
                display: c.display,
                // A complete candidate takes a trailing separator; a
                // directory or function name awaits further typing.
                replacement: if c.complete {
                    format!("{} ", c.insert)
                } else {
                    c.insert
                },
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}
impl Validator for ShellHelper {}
impl Helper for ShellHelper {}

/// History file location: `<config_dir>/lumen/history.txt`.
fn history_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lumen").join("history.txt"))
}

/// Run the loop until end-of-input or an explicit exit command.
pub fn run(shell: Rc<RefCell<Shell>>, settings: Rc<Settings>) -> anyhow::Result<()> {
    let history_size = settings.get_int("history.size", 1000).max(0) as usize;
    let config = Config::builder()
        .max_history_size(history_size)?
        .completion_type(CompletionType::List)
        .build();
    let mut rl: Editor<ShellHelper, DefaultHistory> = Editor::with_config(config)?;
    rl.set_helper(Some(ShellHelper {
        shell: Rc::clone(&shell),
    }));

    let history = history_path();
    if let Some(ref path) = history {
        // Absent on first run; anything else is worth a warning.
        if let Err(e) = rl.load_history(path)
            && path.exists()
        {
            log::warn!("cannot load history from {}: {e}", path.display());
        }
    }

    loop {
        let prompt = prompt::render(shell.borrow().env(), &settings);
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);
                if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
                    break;
                }
                let output = shell.borrow_mut().dispatch(line);
                if !output.is_empty() {
                    println!("{output}");
                }
                io::stdout().flush()?;
            },
            Err(ReadlineError::Interrupted) => {
                println!("^C");
            },
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                log::error!("line input failed: {e}");
                break;
            },
        }
    }
    println!("goodbye");

    if let Some(ref path) = history {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = rl.save_history(path) {
            log::warn!("cannot save history to {}: {e}", path.display());
        }
    }
    Ok(())
}
