//! Command resolution and dispatch.
//!
//! One line of free-form text is owned by exactly one of five execution
//! paths, tried in fixed precedence: shell-meta, script evaluation,
//! builtin verbs, framework subcommands, module shortcuts, and finally
//! the host operating system. Builtins shadow same-named modules and
//! external programs; meta shadows everything, independent of `PATH`.
//! Dispatch never raises: every executor failure becomes one formatted
//! error line.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use lumen_script::Engine;
use lumen_settings::Settings;

use crate::assign::{self, Assignment, AssignKind};
use crate::builtins::{BuiltinRegistry, Environment};
use crate::complete::{Catalog, CommandInfo, FsState};
use crate::lookup;
use crate::modules::ModuleRegistry;
use crate::subcommand::Framework;
use crate::tokenize::tokenize;

/// The resolver and all of its executors.
pub struct Shell {
    settings: Rc<Settings>,
    engine: Rc<Engine>,
    builtins: BuiltinRegistry,
    framework: Framework,
    modules: Box<dyn ModuleRegistry>,
    env: Environment,
    vars: RefCell<HashMap<String, String>>,
    last_exit: Cell<i32>,
}

impl Shell {
    /// Build a shell. Panics if any command name appears in two
    /// precedence tiers; that is a wiring bug, not a runtime condition.
    pub fn new(
        settings: Rc<Settings>,
        engine: Rc<Engine>,
        modules: Box<dyn ModuleRegistry>,
        modules_dir: PathBuf,
        env: Environment,
    ) -> Self {
        let builtins = BuiltinRegistry::new(Rc::clone(&engine));
        let framework = Framework::new(modules_dir);

        let mut meta: Vec<String> = Vec::new();
        for set in [lookup::META_HELP, lookup::META_VERSION, lookup::META_ENGINE_VERSION] {
            meta.extend(set.iter().map(|s| s.to_string()));
        }
        meta.push(lookup::EVAL_KEYWORD.to_string());
        assert_disjoint_names(&[
            ("shell-meta", meta),
            (
                "builtin",
                lookup::BUILTIN_VERBS.iter().map(|(n, _)| n.to_string()).collect(),
            ),
            (
                "framework",
                framework.descriptions().into_iter().map(|(n, _)| n).collect(),
            ),
        ]);

        Self {
            settings,
            engine,
            builtins,
            framework,
            modules,
            env,
            vars: RefCell::new(HashMap::new()),
            last_exit: Cell::new(0),
        }
    }

    /// The environment builtins see; the prompt reads the cwd from here.
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Filesystem snapshot for a completion request.
    pub fn fs_state(&self) -> FsState {
        FsState {
            cwd: self.env.cwd.clone(),
            home: self.env.home.clone(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Resolve and execute one line; returns the text to display
    /// (empty string means nothing to print).
    pub fn dispatch(&mut self, line: &str) -> String {
        let mut rest = line.trim();

        // Typing the shell's own name must not re-enter it.
        if let Some(first) = rest.split_whitespace().next()
            && first.eq_ignore_ascii_case(lookup::PROGRAM_NAME)
        {
            rest = rest[first.len()..].trim_start();
        }
        if rest.is_empty() {
            return String::new();
        }

        let assignment = assign::classify(rest);
        if assignment.is_assignment {
            return self.handle_assignment(assignment);
        }

        let expanded = self.expand_variables(rest);
        let tokens = tokenize(&expanded);
        let Some(first) = tokens.first() else {
            return String::new();
        };
        let name = first.to_ascii_lowercase();

        if lookup::META_HELP.contains(&name.as_str()) {
            return self.help_text();
        }
        if lookup::META_VERSION.contains(&name.as_str()) {
            return format!("{} {}", lookup::PROGRAM_NAME, env!("CARGO_PKG_VERSION"));
        }
        if lookup::META_ENGINE_VERSION.contains(&name.as_str()) {
            return self.engine.version();
        }

        if name == lookup::EVAL_KEYWORD {
            if tokens.len() < 2 {
                return format!("usage: {} <expression>", lookup::EVAL_KEYWORD);
            }
            return self.run_script(script_tail(&expanded));
        }

        if lookup::is_builtin(&name) {
            // `vars` reads resolver-owned state, so it is intercepted here
            // instead of living in the builtin registry.
            if name == "vars" {
                return self.render_vars();
            }
            return match self.builtins.execute(&expanded, &mut self.env) {
                Ok(text) => text,
                Err(e) => format!("error: {e}"),
            };
        }

        if self.framework.contains(&name) {
            // The framework prints its own output; returning it here too
            // would double-print.
            let code = self.framework.execute(&tokens, &self.settings, self.modules.as_ref());
            self.last_exit.set(code);
            return String::new();
        }

        if self.modules.exists(&name) {
            let mut sink = Vec::new();
            return match self.modules.execute(&name, &tokens[1..], &mut sink) {
                Ok(()) => String::from_utf8_lossy(&sink).trim().to_string(),
                Err(e) => format!("error: {e}"),
            };
        }

        self.run_external(&expanded)
    }

    // -- Assignment handling --

    fn handle_assignment(&mut self, a: Assignment) -> String {
        let value = match a.kind {
            AssignKind::Literal => a.value,
            // The inner text goes through full dispatch precedence, so a
            // substitution can invoke a builtin, a module, or the OS.
            AssignKind::CommandSubstitution => self.dispatch(&a.value).trim().to_string(),
            AssignKind::EnvironmentRef => {
                let name = a.value.trim_start_matches("${").trim_end_matches('}');
                std::env::var(name).unwrap_or_default()
            },
            // Left for an external secret store to resolve.
            AssignKind::SecretRef => a.value,
            AssignKind::None => unreachable!("classified as assignment"),
        };
        self.vars.borrow_mut().insert(a.name, value);
        String::new()
    }

    fn render_vars(&self) -> String {
        let vars = self.vars.borrow();
        if vars.is_empty() {
            return "no variables set".to_string();
        }
        let mut lines: Vec<String> = vars.iter().map(|(k, v)| format!("{k}={v}")).collect();
        lines.sort();
        lines.join("\n")
    }

    // -- Variable expansion --

    /// Expand `$NAME`, `${NAME}`, and `$?` from the variable store.
    /// Unknown names expand to empty; a `$` not followed by an
    /// identifier stays literal. Single pass; inserted text is not
    /// rescanned.
    fn expand_variables(&self, input: &str) -> String {
        let vars = self.vars.borrow();
        let chars: Vec<char> = input.chars().collect();
        let mut result = String::with_capacity(input.len());
        let mut i = 0;

        while i < chars.len() {
            if chars[i] != '$' || i + 1 >= chars.len() {
                result.push(chars[i]);
                i += 1;
                continue;
            }
            if chars[i + 1] == '?' {
                result.push_str(&self.last_exit.get().to_string());
                i += 2;
                continue;
            }
            if chars[i + 1] == '{'
                && let Some(end) = chars[i + 2..].iter().position(|&c| c == '}')
            {
                let name: String = chars[i + 2..i + 2 + end].iter().collect();
                result.push_str(vars.get(&name).map(String::as_str).unwrap_or_default());
                i += 3 + end;
                continue;
            }
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
                end += 1;
            }
            if end > start {
                let name: String = chars[start..end].iter().collect();
                result.push_str(vars.get(&name).map(String::as_str).unwrap_or_default());
                i = end;
            } else {
                result.push('$');
                i += 1;
            }
        }
        result
    }

    // -- Terminal paths --

    fn run_script(&self, src: &str) -> String {
        let mut sink = Vec::new();
        match self.engine.evaluate(src, &mut sink) {
            Ok(()) => String::from_utf8_lossy(&sink).trim_end().to_string(),
            Err(e) => format!("error: {e}"),
        }
    }

    fn run_external(&mut self, line: &str) -> String {
        log::debug!("external: {line}");
        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(line)
            .current_dir(&self.env.cwd)
            .output();
        match output {
            Ok(out) => {
                self.last_exit.set(out.status.code().unwrap_or(-1));
                let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&out.stderr));
                text.trim().to_string()
            },
            Err(e) => format!("error: cannot run {line:?}: {e}"),
        }
    }

    fn help_text(&self) -> String {
        let mut out = Vec::new();
        out.push(format!("{}: interactive operations shell", lookup::PROGRAM_NAME));
        out.push(String::new());
        out.push("builtins:".to_string());
        for (name, desc) in self.builtins.descriptions() {
            out.push(format!("  {name:<10} {desc}"));
        }
        out.push(String::new());
        out.push("subcommands:".to_string());
        for (name, about) in self.framework.descriptions() {
            out.push(format!("  {name:<10} {about}"));
        }
        out.push(String::new());
        let modules = self.modules.names();
        if modules.is_empty() {
            out.push("modules: none discovered".to_string());
        } else {
            out.push(format!("modules: {}", modules.join(", ")));
        }
        out.push(String::new());
        out.push(format!(
            "  {:<10} Evaluate a LumenScript expression",
            lookup::EVAL_KEYWORD
        ));
        out.push("  exit|quit  Leave the shell".to_string());
        out.push("Anything else runs through the operating system.".to_string());
        out.join("\n")
    }
}

impl Catalog for Shell {
    fn commands(&self) -> Vec<CommandInfo> {
        let mut out = vec![
            CommandInfo {
                name: "help".to_string(),
                group: "shell",
                description: "Show available commands".to_string(),
            },
            CommandInfo {
                name: "version".to_string(),
                group: "shell",
                description: "Show the shell version".to_string(),
            },
            CommandInfo {
                name: lookup::EVAL_KEYWORD.to_string(),
                group: "script",
                description: "Evaluate a LumenScript expression".to_string(),
            },
        ];
        for (name, description) in self.builtins.descriptions() {
            out.push(CommandInfo {
                name,
                group: "builtin",
                description,
            });
        }
        for (name, description) in self.framework.descriptions() {
            out.push(CommandInfo {
                name,
                group: "subcommand",
                description,
            });
        }
        for name in self.modules.names() {
            out.push(CommandInfo {
                name,
                group: "module",
                description: String::new(),
            });
        }
        out
    }

    fn functions(&self) -> &'static [&'static str] {
        self.engine.function_names()
    }
}

/// Text after the eval keyword and a single following space, from the
/// original (untokenized) line.
fn script_tail(line: &str) -> &str {
    let trimmed = line.trim_start();
    match trimmed.get(..lookup::EVAL_KEYWORD.len()) {
        Some(head) if head.eq_ignore_ascii_case(lookup::EVAL_KEYWORD) => {
            let tail = &trimmed[lookup::EVAL_KEYWORD.len()..];
            tail.strip_prefix(' ').unwrap_or(tail)
        },
        _ => trimmed,
    }
}

/// Panic if any command name is claimed by two precedence tiers.
fn assert_disjoint_names(tiers: &[(&str, Vec<String>)]) {
    let mut owners: HashMap<&str, &str> = HashMap::new();
    for (tier, names) in tiers {
        for name in names {
            if let Some(previous) = owners.insert(name.as_str(), *tier) {
                panic!("command name {name:?} appears in both {previous} and {tier} tiers");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Write;
    use lumen_types::{LumenError, Result};
    use tempfile::TempDir;

    struct FakeModules {
        outputs: HashMap<String, String>,
        failing: HashSet<String>,
    }

    impl FakeModules {
        fn new() -> Self {
            let mut outputs = HashMap::new();
            outputs.insert("deploy".to_string(), "deployed!\n".to_string());
            outputs.insert("run".to_string(), "module run must never win\n".to_string());
            let mut failing = HashSet::new();
            failing.insert("boom".to_string());
            Self { outputs, failing }
        }
    }

    impl ModuleRegistry for FakeModules {
        fn exists(&self, name: &str) -> bool {
            self.outputs.contains_key(name) || self.failing.contains(name)
        }
        fn names(&self) -> Vec<String> {
            let mut names: Vec<String> = self.outputs.keys().cloned().collect();
            names.extend(self.failing.iter().cloned());
            names.sort();
            names
        }
        fn execute(&self, name: &str, _argv: &[String], sink: &mut dyn Write) -> Result<()> {
            if self.failing.contains(name) {
                return Err(LumenError::Module(format!("{name} blew up")));
            }
            sink.write_all(self.outputs[name].as_bytes())?;
            Ok(())
        }
    }

    fn make_shell(dir: &TempDir) -> Shell {
        let env = Environment::new(
            dir.path().to_path_buf(),
            dir.path().join("home"),
            "true".to_string(),
        );
        Shell::new(
            Rc::new(Settings::in_memory()),
            Rc::new(Engine::new()),
            Box::new(FakeModules::new()),
            dir.path().join("modules"),
            env,
        )
    }

    #[test]
    fn empty_and_blank_lines_are_silent() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = make_shell(&dir);
        assert_eq!(shell.dispatch(""), "");
        assert_eq!(shell.dispatch("   \t "), "");
    }

    #[test]
    fn own_name_is_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = make_shell(&dir);
        let direct = shell.dispatch("version");
        assert_eq!(shell.dispatch("lumen version"), direct);
        assert_eq!(shell.dispatch("LUMEN version"), direct);
        assert_eq!(shell.dispatch("lumen"), "");
    }

    #[test]
    fn version_and_engine_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = make_shell(&dir);
        assert!(shell.dispatch("version").starts_with("lumen "));
        assert!(shell.dispatch("--version").starts_with("lumen "));
        assert!(shell.dispatch("eval-version").starts_with("LumenScript "));
        assert!(shell.dispatch("script-version").starts_with("LumenScript "));
    }

    #[test]
    fn help_lists_every_tier() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = make_shell(&dir);
        let help = shell.dispatch("help");
        for needle in ["cd", "settings", "eval", "deploy"] {
            assert!(help.contains(needle), "help missing {needle}");
        }
    }

    #[test]
    fn eval_requires_an_expression() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = make_shell(&dir);
        assert_eq!(shell.dispatch("eval"), "usage: eval <expression>");
        assert_eq!(shell.dispatch("eval 1 + 2"), "3");
        assert_eq!(shell.dispatch("eval print(\"hi\")"), "hi");
    }

    #[test]
    fn eval_errors_are_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = make_shell(&dir);
        let out = shell.dispatch("eval 1 / 0");
        assert!(out.starts_with("error:"));
        assert!(out.contains("division by zero"));
    }

    #[test]
    fn builtin_shadows_module_of_same_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = make_shell(&dir);
        // The fake registry also offers `run`; the builtin must win.
        let out = shell.dispatch("run");
        assert!(out.contains("usage: run"), "{out}");
        assert!(!out.contains("module run must never win"));
    }

    #[test]
    fn module_output_is_captured_and_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = make_shell(&dir);
        assert_eq!(shell.dispatch("deploy prod"), "deployed!");
    }

    #[test]
    fn module_failure_becomes_error_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = make_shell(&dir);
        let out = shell.dispatch("boom");
        assert!(out.starts_with("error:"));
        assert!(out.contains("boom blew up"));
    }

    #[test]
    fn unknown_names_fall_through_to_the_os() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = make_shell(&dir);
        assert_eq!(shell.dispatch("echo external-ok"), "external-ok");
    }

    #[test]
    fn builtins_shadow_external_programs() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = make_shell(&dir);
        // `pwd` exists as an OS program too; ours answers from the
        // environment, not the process working directory.
        assert_eq!(shell.dispatch("pwd"), dir.path().display().to_string());
    }

    #[test]
    fn cd_carries_across_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = make_shell(&dir);
        assert_eq!(shell.dispatch("mkdir sub"), "");
        assert_eq!(shell.dispatch("cd sub"), "");
        assert_eq!(shell.dispatch("pwd"), dir.path().join("sub").display().to_string());
    }

    #[test]
    fn literal_assignment_and_vars() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = make_shell(&dir);
        assert_eq!(shell.dispatch("set greeting = hello"), "");
        assert_eq!(shell.dispatch("count=3"), "");
        let vars = shell.dispatch("vars");
        assert!(vars.contains("greeting=hello"));
        assert!(vars.contains("count=3"));
    }

    #[test]
    fn command_substitution_runs_through_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = make_shell(&dir);
        assert_eq!(shell.dispatch("X=$(echo hi)"), "");
        assert!(shell.dispatch("vars").contains("X=hi"));
        // A substitution can just as well hit a module.
        assert_eq!(shell.dispatch("D=$(deploy)"), "");
        assert!(shell.dispatch("vars").contains("D=deployed!"));
    }

    #[test]
    fn environment_refs_resolve_at_assignment_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = make_shell(&dir);
        let path = std::env::var("PATH").unwrap();
        assert_eq!(shell.dispatch("P=${PATH}"), "");
        assert_eq!(shell.dispatch("echo $P"), path.trim());
    }

    #[test]
    fn secret_refs_are_stored_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = make_shell(&dir);
        assert_eq!(shell.dispatch("S=${secret:db_pass}"), "");
        assert!(shell.dispatch("vars").contains("S=${secret:db_pass}"));
    }

    #[test]
    fn variables_expand_into_later_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = make_shell(&dir);
        shell.dispatch("G=hi");
        assert_eq!(shell.dispatch("echo $G"), "hi");
        assert_eq!(shell.dispatch("echo ${G}!"), "hi!");
        // Unknown names expand to nothing; a lone `$` is literal.
        assert_eq!(shell.dispatch("echo $UNSET_NAME x"), "x");
        assert_eq!(shell.dispatch("echo 5$"), "5$");
    }

    #[test]
    fn no_variables_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = make_shell(&dir);
        assert_eq!(shell.dispatch("vars"), "no variables set");
    }

    #[test]
    fn catalog_spans_all_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let shell = make_shell(&dir);
        let names: HashSet<String> = shell.commands().into_iter().map(|c| c.name).collect();
        for expected in ["help", "version", "eval", "cd", "vars", "settings", "modules", "deploy"] {
            assert!(names.contains(expected), "catalog missing {expected}");
        }
    }

    #[test]
    #[should_panic(expected = "appears in both")]
    fn tier_collision_panics() {
        assert_disjoint_names(&[
            ("builtin", vec!["run".to_string()]),
            ("framework", vec!["run".to_string()]),
        ]);
    }
}
