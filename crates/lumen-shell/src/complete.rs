//! Context-sensitive completion.
//!
//! Three closed strategies (command names, filesystem paths, script
//! function names) selected by a discriminant computed from the buffer
//! shape and the first word. Candidates are regenerated on every request
//! and never cached; completion failures degrade to zero candidates.

use std::fs;
use std::path::PathBuf;

use lumen_settings::Settings;

use crate::lookup::{self, FileCategory, PathArg};

/// One completion candidate.
///
/// `insert` is what the line editor should place in the buffer; `display`
/// may carry a decorative glyph and never affects matching. `complete`
/// false tells the widget not to append a trailing separator (directories
/// and function names awaiting more typing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub insert: String,
    pub display: String,
    pub group: Option<&'static str>,
    pub description: Option<String>,
    pub complete: bool,
}

/// Filesystem snapshot taken per completion request.
#[derive(Debug, Clone)]
pub struct FsState {
    pub cwd: PathBuf,
    pub home: PathBuf,
}

/// A known command name for command-position completion.
pub struct CommandInfo {
    pub name: String,
    pub group: &'static str,
    pub description: String,
}

/// What the completion engine needs to know about the resolver's world.
pub trait Catalog {
    /// Every name the resolver would accept as a first word.
    fn commands(&self) -> Vec<CommandInfo>;

    /// Script function names for `eval` completion.
    fn functions(&self) -> &'static [&'static str];
}

/// Characters that end a "current function" segment in script text.
const SCRIPT_DELIMITERS: &[char] = &[
    ' ', '\t', '+', '-', '*', '/', '%', '=', '<', '>', '!', '&', '|', '(', ')', ',', ';', '[',
    ']', '{', '}', '.', '"', '\'',
];

/// The closed set of completion strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Complete a command name against the catalog.
    Commands(String),
    /// Complete a script function name after the eval keyword.
    Functions(String),
    /// Complete a filesystem path for a path-taking builtin.
    Paths { arg: PathArg, partial: String },
    /// Offer nothing.
    Nothing,
}

/// Pick the strategy for the current buffer.
///
/// `words` is the tokenized buffer up to the cursor, with a trailing empty
/// word when the buffer ends in unquoted whitespace (a new word has begun).
pub fn choose_strategy(buffer: &str, words: &[String]) -> Strategy {
    match words {
        [] => Strategy::Commands(String::new()),
        [only] => Strategy::Commands(only.clone()),
        [first, .., last] => {
            let first = first.to_ascii_lowercase();
            if first == lookup::EVAL_KEYWORD {
                return match current_script_segment(buffer) {
                    Some(segment) => Strategy::Functions(segment),
                    None => Strategy::Nothing,
                };
            }
            match lookup::path_arg(&first) {
                Some(PathArg::None) | None => Strategy::Nothing,
                Some(arg) => Strategy::Paths {
                    arg,
                    partial: last.clone(),
                },
            }
        },
    }
}

/// Extract the function-name segment being typed after the eval keyword.
/// Returns `None` when there is no segment or it does not start with a
/// letter (nothing useful to complete).
fn current_script_segment(buffer: &str) -> Option<String> {
    let trimmed = buffer.trim_start();
    let tail = trimmed.get(lookup::EVAL_KEYWORD.len()..)?;
    let tail = tail.strip_prefix(' ').unwrap_or(tail);
    let segment = tail
        .split(SCRIPT_DELIMITERS)
        .filter(|s| !s.is_empty())
        .next_back()?;
    if segment.starts_with(|c: char| c.is_alphabetic()) {
        Some(segment.to_string())
    } else {
        None
    }
}

/// Produce completion candidates for the current buffer.
pub fn complete(
    buffer: &str,
    words: &[String],
    catalog: &dyn Catalog,
    fs_state: &FsState,
    settings: &Settings,
) -> Vec<Candidate> {
    match choose_strategy(buffer, words) {
        Strategy::Commands(partial) => command_candidates(&partial, catalog),
        Strategy::Functions(query) => function_candidates(&query, catalog),
        Strategy::Paths { arg, partial } => {
            let decorations = settings.get_bool("display.decorations", true);
            path_candidates(arg, &partial, fs_state, decorations)
        },
        Strategy::Nothing => Vec::new(),
    }
}

fn command_candidates(partial: &str, catalog: &dyn Catalog) -> Vec<Candidate> {
    let lower = partial.to_ascii_lowercase();
    let mut commands = catalog.commands();
    commands.sort_by(|a, b| a.name.cmp(&b.name));
    commands
        .into_iter()
        .filter(|info| info.name.to_ascii_lowercase().starts_with(&lower))
        .map(|info| Candidate {
            insert: info.name.clone(),
            display: info.name,
            group: Some(info.group),
            description: (!info.description.is_empty()).then_some(info.description),
            complete: true,
        })
        .collect()
}

fn function_candidates(query: &str, catalog: &dyn Catalog) -> Vec<Candidate> {
    catalog
        .functions()
        .iter()
        .filter(|name| name.starts_with(query))
        .map(|name| Candidate {
            insert: (*name).to_string(),
            display: format!("{name}()"),
            group: Some("function"),
            description: None,
            complete: false,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Path completion
// ---------------------------------------------------------------------------

/// Base directory to list, insert-text prefix, and the fragment to match,
/// derived from the shape of the partial path.
fn split_partial(partial: &str, fs_state: &FsState) -> (PathBuf, String, String) {
    if partial.is_empty() {
        return (fs_state.cwd.clone(), String::new(), String::new());
    }
    if partial == "~" {
        let prefix = format!("{}/", fs_state.home.display());
        return (fs_state.home.clone(), prefix, String::new());
    }
    if let Some(rest) = partial.strip_prefix("~/") {
        return match rest.rfind('/') {
            Some(i) => (
                fs_state.home.join(&rest[..i]),
                format!("~/{}", &rest[..=i]),
                rest[i + 1..].to_string(),
            ),
            None => (fs_state.home.clone(), "~/".to_string(), rest.to_string()),
        };
    }
    match partial.rfind('/') {
        Some(i) => {
            let dir_part = if i == 0 { "/" } else { &partial[..i] };
            let base = if partial.starts_with('/') {
                PathBuf::from(dir_part)
            } else {
                fs_state.cwd.join(dir_part)
            };
            (base, partial[..=i].to_string(), partial[i + 1..].to_string())
        },
        None => (fs_state.cwd.clone(), String::new(), partial.to_string()),
    }
}

fn path_candidates(
    arg: PathArg,
    partial: &str,
    fs_state: &FsState,
    decorations: bool,
) -> Vec<Candidate> {
    let (base, prefix, fragment) = split_partial(partial, fs_state);
    if !base.is_dir() {
        return Vec::new();
    }
    let Ok(entries) = fs::read_dir(&base) else {
        log::debug!("completion: cannot list {}", base.display());
        return Vec::new();
    };

    let mut found: Vec<(String, bool)> = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(&fragment) {
            continue;
        }
        // Dotfiles stay hidden unless the user is typing a dot.
        if name.starts_with('.') && !fragment.starts_with('.') {
            continue;
        }
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let keep = match arg {
            PathArg::DirOnly => is_dir,
            PathArg::Script => is_dir || lookup::is_script_source(&name),
            _ => true,
        };
        if keep {
            found.push((name, is_dir));
        }
    }

    // Directories before files, then case-insensitive by name.
    found.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| a.0.to_lowercase().cmp(&b.0.to_lowercase()))
    });

    found
        .into_iter()
        .map(|(name, is_dir)| {
            let shown = if is_dir { format!("{name}/") } else { name.clone() };
            let display = if decorations {
                format!("{} {shown}", FileCategory::of(&name, is_dir).glyph())
            } else {
                shown
            };
            Candidate {
                insert: if is_dir {
                    format!("{prefix}{name}/")
                } else {
                    format!("{prefix}{name}")
                },
                display,
                group: None,
                description: None,
                complete: !is_dir,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use tempfile::TempDir;

    struct FakeCatalog;
    impl Catalog for FakeCatalog {
        fn commands(&self) -> Vec<CommandInfo> {
            ["cat", "cd", "ls", "settings", "eval"]
                .iter()
                .map(|n| CommandInfo {
                    name: n.to_string(),
                    group: "builtin",
                    description: format!("{n} description"),
                })
                .collect()
        }
        fn functions(&self) -> &'static [&'static str] {
            &["len", "lower", "print", "upper"]
        }
    }

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn fs_state(dir: &TempDir) -> FsState {
        FsState {
            cwd: dir.path().to_path_buf(),
            home: dir.path().join("home"),
        }
    }

    fn run_paths(arg: PathArg, partial: &str, fs_state: &FsState) -> Vec<String> {
        path_candidates(arg, partial, fs_state, false)
            .into_iter()
            .map(|c| c.insert)
            .collect()
    }

    #[test]
    fn strategy_for_command_position() {
        assert_eq!(choose_strategy("", &[]), Strategy::Commands(String::new()));
        assert_eq!(
            choose_strategy("ca", &words(&["ca"])),
            Strategy::Commands("ca".to_string())
        );
    }

    #[test]
    fn strategy_for_eval_functions() {
        assert_eq!(
            choose_strategy("eval 1+le", &words(&["eval", "1+le"])),
            Strategy::Functions("le".to_string())
        );
        // Segment starting with a digit offers nothing.
        assert_eq!(
            choose_strategy("eval 12*(3", &words(&["eval", "12*(3"])),
            Strategy::Nothing
        );
    }

    #[test]
    fn strategy_for_paths_and_unknowns() {
        assert_eq!(
            choose_strategy("cd do", &words(&["cd", "do"])),
            Strategy::Paths {
                arg: PathArg::DirOnly,
                partial: "do".to_string()
            }
        );
        assert_eq!(choose_strategy("pwd x", &words(&["pwd", "x"])), Strategy::Nothing);
        assert_eq!(
            choose_strategy("unknown x", &words(&["unknown", "x"])),
            Strategy::Nothing
        );
    }

    #[test]
    fn command_completion_is_case_insensitive_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::in_memory();
        let out = complete("C", &words(&["C"]), &FakeCatalog, &fs_state(&dir), &settings);
        let names: Vec<&str> = out.iter().map(|c| c.insert.as_str()).collect();
        assert_eq!(names, vec!["cat", "cd"]);
        assert!(out[0].description.as_deref().unwrap().contains("cat"));
    }

    #[test]
    fn function_completion_prefix_match() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::in_memory();
        let out = complete(
            "eval 2 + l",
            &words(&["eval", "2", "+", "l"]),
            &FakeCatalog,
            &fs_state(&dir),
            &settings,
        );
        let names: Vec<&str> = out.iter().map(|c| c.insert.as_str()).collect();
        assert_eq!(names, vec!["len", "lower"]);
        assert!(out.iter().all(|c| !c.complete));
    }

    #[test]
    fn dotfiles_hidden_unless_dot_typed() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::write(dir.path().join(".env"), "").unwrap();
        stdfs::write(dir.path().join("config.json"), "").unwrap();
        let fs_state = fs_state(&dir);

        assert_eq!(run_paths(PathArg::Any, "", &fs_state), vec!["config.json"]);
        assert_eq!(run_paths(PathArg::Any, ".e", &fs_state), vec![".env"]);
    }

    #[test]
    fn dir_only_commands_see_only_directories() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::create_dir(dir.path().join("beta")).unwrap();
        stdfs::create_dir(dir.path().join("Alpha")).unwrap();
        stdfs::write(dir.path().join("file.txt"), "").unwrap();
        let fs_state = fs_state(&dir);

        assert_eq!(run_paths(PathArg::DirOnly, "", &fs_state), vec!["Alpha/", "beta/"]);
    }

    #[test]
    fn script_runner_sees_dirs_and_sources() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::create_dir(dir.path().join("jobs")).unwrap();
        stdfs::write(dir.path().join("a.lum"), "").unwrap();
        stdfs::write(dir.path().join("b.sh"), "").unwrap();
        let fs_state = fs_state(&dir);

        assert_eq!(run_paths(PathArg::Script, "", &fs_state), vec!["jobs/", "a.lum"]);
    }

    #[test]
    fn directories_sort_before_files_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::create_dir(dir.path().join("zoo")).unwrap();
        stdfs::write(dir.path().join("Apple.txt"), "").unwrap();
        stdfs::write(dir.path().join("banana.txt"), "").unwrap();
        let fs_state = fs_state(&dir);

        assert_eq!(
            run_paths(PathArg::Any, "", &fs_state),
            vec!["zoo/", "Apple.txt", "banana.txt"]
        );
    }

    #[test]
    fn relative_prefix_is_preserved_in_insert_text() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::create_dir_all(dir.path().join("sub/inner")).unwrap();
        stdfs::write(dir.path().join("sub/leaf.txt"), "").unwrap();
        let fs_state = fs_state(&dir);

        assert_eq!(
            run_paths(PathArg::Any, "sub/", &fs_state),
            vec!["sub/inner/", "sub/leaf.txt"]
        );
        assert_eq!(run_paths(PathArg::Any, "sub/le", &fs_state), vec!["sub/leaf.txt"]);
    }

    #[test]
    fn absolute_partial_keeps_absolute_prefix() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::write(dir.path().join("notes.txt"), "").unwrap();
        let fs_state = fs_state(&dir);

        let partial = format!("{}/no", dir.path().display());
        let expected = format!("{}/notes.txt", dir.path().display());
        assert_eq!(run_paths(PathArg::Any, &partial, &fs_state), vec![expected]);
    }

    #[test]
    fn tilde_forms_resolve_against_home() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::create_dir_all(dir.path().join("home/docs")).unwrap();
        let fs_state = fs_state(&dir);

        // `~` alone redisplays as the absolute home path.
        let out = run_paths(PathArg::Any, "~", &fs_state);
        assert_eq!(out, vec![format!("{}/docs/", fs_state.home.display())]);

        // `~/d` keeps the tilde spelling.
        assert_eq!(run_paths(PathArg::Any, "~/d", &fs_state), vec!["~/docs/"]);
        assert_eq!(run_paths(PathArg::Any, "~/docs/", &fs_state), Vec::<String>::new());
    }

    #[test]
    fn missing_base_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let fs_state = fs_state(&dir);
        assert!(run_paths(PathArg::Any, "ghost/", &fs_state).is_empty());
    }

    #[test]
    fn directory_candidates_are_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::create_dir(dir.path().join("sub")).unwrap();
        stdfs::write(dir.path().join("f.txt"), "").unwrap();
        let fs_state = fs_state(&dir);

        let out = path_candidates(PathArg::Any, "", &fs_state, false);
        assert!(!out[0].complete); // sub/
        assert!(out[1].complete); // f.txt
    }

    #[test]
    fn decorations_affect_display_only() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::write(dir.path().join("job.lum"), "").unwrap();
        let fs_state = fs_state(&dir);

        let plain = path_candidates(PathArg::Any, "", &fs_state, false);
        let decorated = path_candidates(PathArg::Any, "", &fs_state, true);
        assert_eq!(plain[0].insert, decorated[0].insert);
        assert_eq!(plain[0].display, "job.lum");
        assert!(decorated[0].display.ends_with("job.lum"));
        assert_ne!(decorated[0].display, plain[0].display);
    }
}
