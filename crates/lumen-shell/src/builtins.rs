//! Terminal-only builtin verbs: navigation, file manipulation, viewing,
//! search, word count, editing, and the LumenScript runner.
//!
//! Builtins execute entirely inside the shell and always shadow external
//! programs of the same name. Paths are resolved against the shell
//! environment's working directory, never the process working directory,
//! so the registry stays hermetic under test.

use std::collections::HashMap;
use std::fs;
use std::io::Write as _;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use lumen_script::Engine;
use lumen_types::{LumenError, Result};

use crate::lookup;
use crate::tokenize::tokenize;

/// Shell state visible to builtins.
pub struct Environment {
    /// Current working directory. `cd` rewrites it.
    pub cwd: PathBuf,
    /// The user's home directory, for `~` expansion.
    pub home: PathBuf,
    /// Editor command for `edit`.
    pub editor: String,
}

impl Environment {
    pub fn new(cwd: PathBuf, home: PathBuf, editor: String) -> Self {
        Self { cwd, home, editor }
    }
}

/// Resolve a user-typed path against the environment: `~` expansion,
/// then lexical normalization of `.` and `..` components.
pub fn resolve_path(env: &Environment, input: &str) -> PathBuf {
    let joined = if input == "~" {
        env.home.clone()
    } else if let Some(rest) = input.strip_prefix("~/") {
        env.home.join(rest)
    } else {
        let p = Path::new(input);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            env.cwd.join(p)
        }
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                normalized.pop();
            },
            other => normalized.push(other),
        }
    }
    normalized
}

/// A single builtin verb.
pub trait Command {
    /// The verb name (what the user types).
    fn name(&self) -> &str;

    /// One-line description for `help` and completion.
    fn description(&self) -> &str;

    /// Usage string (e.g. "cp <src> <dest>").
    fn usage(&self) -> &str;

    /// Execute with the given arguments against the environment.
    fn execute(&self, args: &[&str], env: &mut Environment) -> Result<String>;
}

fn usage_err(cmd: &dyn Command) -> LumenError {
    LumenError::Command(format!("usage: {}", cmd.usage()))
}

/// Registry of builtin verbs; executes one raw line at a time.
pub struct BuiltinRegistry {
    commands: HashMap<String, Box<dyn Command>>,
}

impl BuiltinRegistry {
    pub fn new(engine: Rc<Engine>) -> Self {
        let mut reg = Self {
            commands: HashMap::new(),
        };
        reg.register(Box::new(CdCmd));
        reg.register(Box::new(PwdCmd));
        reg.register(Box::new(LsCmd));
        reg.register(Box::new(CatCmd));
        reg.register(Box::new(CpCmd));
        reg.register(Box::new(MvCmd));
        reg.register(Box::new(RmCmd));
        reg.register(Box::new(MkdirCmd));
        reg.register(Box::new(TouchCmd));
        reg.register(Box::new(GrepCmd));
        reg.register(Box::new(FindCmd));
        reg.register(Box::new(WcCmd));
        reg.register(Box::new(EditCmd));
        reg.register(Box::new(RunCmd { engine }));
        reg
    }

    fn register(&mut self, cmd: Box<dyn Command>) {
        debug_assert!(
            lookup::is_builtin(cmd.name()),
            "{} is not in the builtin lookup table",
            cmd.name()
        );
        self.commands.insert(cmd.name().to_string(), cmd);
    }

    /// `(name, description)` pairs, sorted, for help and completion.
    /// Includes the resolver-intercepted `vars` verb.
    pub fn descriptions(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .commands
            .values()
            .map(|c| (c.name().to_string(), c.description().to_string()))
            .collect();
        out.push(("vars".to_string(), "List shell variables".to_string()));
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Execute one raw line. The caller has already established that the
    /// first token names a builtin.
    pub fn execute(&self, raw: &str, env: &mut Environment) -> Result<String> {
        let tokens = tokenize(raw);
        let Some(name) = tokens.first() else {
            return Ok(String::new());
        };
        let name = name.to_ascii_lowercase();
        let args: Vec<&str> = tokens[1..].iter().map(|s| s.as_str()).collect();
        match self.commands.get(&name) {
            Some(cmd) => cmd.execute(&args, env),
            None => Err(LumenError::Command(format!("unknown builtin: {name}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

struct CdCmd;
impl Command for CdCmd {
    fn name(&self) -> &str {
        "cd"
    }
    fn description(&self) -> &str {
        "Change the working directory"
    }
    fn usage(&self) -> &str {
        "cd [dir]"
    }
    fn execute(&self, args: &[&str], env: &mut Environment) -> Result<String> {
        let target = match args.first() {
            Some(arg) => resolve_path(env, arg),
            None => env.home.clone(),
        };
        if !target.is_dir() {
            return Err(LumenError::Command(format!(
                "cd: not a directory: {}",
                target.display()
            )));
        }
        env.cwd = target;
        Ok(String::new())
    }
}

struct PwdCmd;
impl Command for PwdCmd {
    fn name(&self) -> &str {
        "pwd"
    }
    fn description(&self) -> &str {
        "Print the working directory"
    }
    fn usage(&self) -> &str {
        "pwd"
    }
    fn execute(&self, _args: &[&str], env: &mut Environment) -> Result<String> {
        Ok(env.cwd.display().to_string())
    }
}

// ---------------------------------------------------------------------------
// Viewing
// ---------------------------------------------------------------------------

struct LsCmd;
impl Command for LsCmd {
    fn name(&self) -> &str {
        "ls"
    }
    fn description(&self) -> &str {
        "List directory contents"
    }
    fn usage(&self) -> &str {
        "ls [-a] [path]"
    }
    fn execute(&self, args: &[&str], env: &mut Environment) -> Result<String> {
        let show_hidden = args.contains(&"-a");
        let path_arg = args.iter().find(|a| !a.starts_with('-'));
        let dir = match path_arg {
            Some(p) => resolve_path(env, p),
            None => env.cwd.clone(),
        };

        let mut entries: Vec<(String, bool)> = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !show_hidden && name.starts_with('.') {
                continue;
            }
            let is_dir = entry.file_type()?.is_dir();
            entries.push((name, is_dir));
        }
        // Directories first, then case-insensitive by name.
        entries.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| a.0.to_lowercase().cmp(&b.0.to_lowercase()))
        });

        let lines: Vec<String> = entries
            .into_iter()
            .map(|(name, is_dir)| if is_dir { format!("{name}/") } else { name })
            .collect();
        Ok(lines.join("\n"))
    }
}

struct CatCmd;
impl Command for CatCmd {
    fn name(&self) -> &str {
        "cat"
    }
    fn description(&self) -> &str {
        "Print file contents"
    }
    fn usage(&self) -> &str {
        "cat <file...>"
    }
    fn execute(&self, args: &[&str], env: &mut Environment) -> Result<String> {
        if args.is_empty() {
            return Err(usage_err(self));
        }
        let mut parts = Vec::with_capacity(args.len());
        for arg in args {
            let path = resolve_path(env, arg);
            let text = fs::read_to_string(&path).map_err(|e| {
                LumenError::Command(format!("cat: {}: {e}", path.display()))
            })?;
            parts.push(text);
        }
        Ok(parts.concat().trim_end_matches('\n').to_string())
    }
}

// ---------------------------------------------------------------------------
// File manipulation
// ---------------------------------------------------------------------------

struct CpCmd;
impl Command for CpCmd {
    fn name(&self) -> &str {
        "cp"
    }
    fn description(&self) -> &str {
        "Copy a file"
    }
    fn usage(&self) -> &str {
        "cp <src> <dest>"
    }
    fn execute(&self, args: &[&str], env: &mut Environment) -> Result<String> {
        let [src, dest] = args else {
            return Err(usage_err(self));
        };
        let src = resolve_path(env, src);
        let dest = dest_with_filename(env, dest, &src)?;
        if src.is_dir() {
            return Err(LumenError::Command(format!(
                "cp: {} is a directory",
                src.display()
            )));
        }
        fs::copy(&src, &dest)
            .map_err(|e| LumenError::Command(format!("cp: {}: {e}", src.display())))?;
        Ok(String::new())
    }
}

struct MvCmd;
impl Command for MvCmd {
    fn name(&self) -> &str {
        "mv"
    }
    fn description(&self) -> &str {
        "Move or rename a file"
    }
    fn usage(&self) -> &str {
        "mv <src> <dest>"
    }
    fn execute(&self, args: &[&str], env: &mut Environment) -> Result<String> {
        let [src, dest] = args else {
            return Err(usage_err(self));
        };
        let src = resolve_path(env, src);
        let dest = dest_with_filename(env, dest, &src)?;
        fs::rename(&src, &dest)
            .map_err(|e| LumenError::Command(format!("mv: {}: {e}", src.display())))?;
        Ok(String::new())
    }
}

/// Resolve a destination argument; copying into an existing directory
/// keeps the source file name.
fn dest_with_filename(env: &Environment, dest: &str, src: &Path) -> Result<PathBuf> {
    let resolved = resolve_path(env, dest);
    if resolved.is_dir() {
        let name = src
            .file_name()
            .ok_or_else(|| LumenError::Command(format!("bad source path: {}", src.display())))?;
        Ok(resolved.join(name))
    } else {
        Ok(resolved)
    }
}

struct RmCmd;
impl Command for RmCmd {
    fn name(&self) -> &str {
        "rm"
    }
    fn description(&self) -> &str {
        "Remove files (or directories with -r)"
    }
    fn usage(&self) -> &str {
        "rm [-r] <path...>"
    }
    fn execute(&self, args: &[&str], env: &mut Environment) -> Result<String> {
        let recursive = args.contains(&"-r");
        let paths: Vec<&&str> = args.iter().filter(|a| !a.starts_with('-')).collect();
        if paths.is_empty() {
            return Err(usage_err(self));
        }
        for arg in paths {
            let path = resolve_path(env, arg);
            let result = if path.is_dir() {
                if recursive {
                    fs::remove_dir_all(&path)
                } else {
                    return Err(LumenError::Command(format!(
                        "rm: {} is a directory (use -r)",
                        path.display()
                    )));
                }
            } else {
                fs::remove_file(&path)
            };
            result.map_err(|e| LumenError::Command(format!("rm: {}: {e}", path.display())))?;
        }
        Ok(String::new())
    }
}

struct MkdirCmd;
impl Command for MkdirCmd {
    fn name(&self) -> &str {
        "mkdir"
    }
    fn description(&self) -> &str {
        "Create directories (parents included)"
    }
    fn usage(&self) -> &str {
        "mkdir <dir...>"
    }
    fn execute(&self, args: &[&str], env: &mut Environment) -> Result<String> {
        if args.is_empty() {
            return Err(usage_err(self));
        }
        for arg in args {
            let path = resolve_path(env, arg);
            fs::create_dir_all(&path)
                .map_err(|e| LumenError::Command(format!("mkdir: {}: {e}", path.display())))?;
        }
        Ok(String::new())
    }
}

struct TouchCmd;
impl Command for TouchCmd {
    fn name(&self) -> &str {
        "touch"
    }
    fn description(&self) -> &str {
        "Create empty files"
    }
    fn usage(&self) -> &str {
        "touch <file...>"
    }
    fn execute(&self, args: &[&str], env: &mut Environment) -> Result<String> {
        if args.is_empty() {
            return Err(usage_err(self));
        }
        for arg in args {
            let path = resolve_path(env, arg);
            fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| LumenError::Command(format!("touch: {}: {e}", path.display())))?;
        }
        Ok(String::new())
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

struct GrepCmd;
impl Command for GrepCmd {
    fn name(&self) -> &str {
        "grep"
    }
    fn description(&self) -> &str {
        "Print lines containing a pattern"
    }
    fn usage(&self) -> &str {
        "grep <pattern> <file...>"
    }
    fn execute(&self, args: &[&str], env: &mut Environment) -> Result<String> {
        let (pattern, files) = match args {
            [pattern, files @ ..] if !files.is_empty() => (pattern, files),
            _ => return Err(usage_err(self)),
        };
        let label_files = files.len() > 1;
        let mut out = Vec::new();
        for file in files {
            let path = resolve_path(env, file);
            let text = fs::read_to_string(&path).map_err(|e| {
                LumenError::Command(format!("grep: {}: {e}", path.display()))
            })?;
            for line in text.lines() {
                if line.contains(pattern) {
                    if label_files {
                        out.push(format!("{file}:{line}"));
                    } else {
                        out.push(line.to_string());
                    }
                }
            }
        }
        Ok(out.join("\n"))
    }
}

struct FindCmd;
impl Command for FindCmd {
    fn name(&self) -> &str {
        "find"
    }
    fn description(&self) -> &str {
        "Find files by name fragment"
    }
    fn usage(&self) -> &str {
        "find [dir] <fragment>"
    }
    fn execute(&self, args: &[&str], env: &mut Environment) -> Result<String> {
        let (start, fragment) = match args {
            [fragment] => (env.cwd.clone(), *fragment),
            [dir, fragment] => (resolve_path(env, dir), *fragment),
            _ => return Err(usage_err(self)),
        };
        if !start.is_dir() {
            return Err(LumenError::Command(format!(
                "find: not a directory: {}",
                start.display()
            )));
        }
        let mut matches = Vec::new();
        walk(&start, &start, fragment, &mut matches);
        matches.sort();
        Ok(matches.join("\n"))
    }
}

fn walk(root: &Path, dir: &Path, fragment: &str, matches: &mut Vec<String>) {
    // Unreadable subdirectories are skipped, not fatal.
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.contains(fragment) {
            let shown = path.strip_prefix(root).unwrap_or(&path);
            matches.push(shown.display().to_string());
        }
        if path.is_dir() {
            walk(root, &path, fragment, matches);
        }
    }
}

struct WcCmd;
impl Command for WcCmd {
    fn name(&self) -> &str {
        "wc"
    }
    fn description(&self) -> &str {
        "Count lines, words, and bytes"
    }
    fn usage(&self) -> &str {
        "wc <file...>"
    }
    fn execute(&self, args: &[&str], env: &mut Environment) -> Result<String> {
        if args.is_empty() {
            return Err(usage_err(self));
        }
        let mut out = Vec::new();
        for arg in args {
            let path = resolve_path(env, arg);
            let text = fs::read_to_string(&path)
                .map_err(|e| LumenError::Command(format!("wc: {}: {e}", path.display())))?;
            let lines = text.lines().count();
            let words = text.split_whitespace().count();
            out.push(format!("{lines:>6} {words:>6} {:>6} {arg}", text.len()));
        }
        Ok(out.join("\n"))
    }
}

// ---------------------------------------------------------------------------
// Editing and script execution
// ---------------------------------------------------------------------------

struct EditCmd;
impl Command for EditCmd {
    fn name(&self) -> &str {
        "edit"
    }
    fn description(&self) -> &str {
        "Open a file in the configured editor"
    }
    fn usage(&self) -> &str {
        "edit <file>"
    }
    fn execute(&self, args: &[&str], env: &mut Environment) -> Result<String> {
        let [file] = args else {
            return Err(usage_err(self));
        };
        let path = resolve_path(env, file);
        let status = std::process::Command::new(&env.editor)
            .arg(&path)
            .current_dir(&env.cwd)
            .status()
            .map_err(|e| LumenError::Command(format!("edit: cannot launch {}: {e}", env.editor)))?;
        if !status.success() {
            return Err(LumenError::Command(format!(
                "edit: {} exited with {status}",
                env.editor
            )));
        }
        Ok(String::new())
    }
}

struct RunCmd {
    engine: Rc<Engine>,
}
impl Command for RunCmd {
    fn name(&self) -> &str {
        "run"
    }
    fn description(&self) -> &str {
        "Run a LumenScript source file"
    }
    fn usage(&self) -> &str {
        "run <script.lum>"
    }
    fn execute(&self, args: &[&str], env: &mut Environment) -> Result<String> {
        let [file] = args else {
            return Err(usage_err(self));
        };
        if !lookup::is_script_source(file) {
            return Err(LumenError::Command(format!(
                "run: not a LumenScript source (expected .{}): {file}",
                lookup::SCRIPT_EXTENSIONS.join("/.")
            )));
        }
        let path = resolve_path(env, file);
        let source = fs::read_to_string(&path)
            .map_err(|e| LumenError::Command(format!("run: {}: {e}", path.display())))?;
        let mut sink = Vec::new();
        self.engine.evaluate(&source, &mut sink)?;
        sink.flush()?;
        Ok(String::from_utf8_lossy(&sink).trim_end().to_string())
    }
}
