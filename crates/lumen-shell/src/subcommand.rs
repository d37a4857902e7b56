//! Framework subcommands: structured, flag-parsing commands registered
//! under clap's own registry.
//!
//! Unlike builtins, these parse their arguments through clap, print their
//! own output directly, and hand an exit code back to the resolver (which
//! returns empty output to the REPL loop to avoid a double print).

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};

use lumen_settings::Settings;

use crate::modules::ModuleRegistry;

#[derive(Parser)]
#[command(name = "lumen", no_binary_name = true, disable_version_flag = true)]
struct FrameworkCli {
    #[command(subcommand)]
    command: FrameworkCommand,
}

#[derive(Subcommand)]
enum FrameworkCommand {
    /// Inspect or edit persisted shell settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Inspect discovered module shortcuts
    Modules {
        #[command(subcommand)]
        action: ModulesAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// List all persisted settings
    List,
    /// Print one setting
    Get { key: String },
    /// Set a setting and persist immediately
    Set { key: String, value: String },
    /// Remove a setting
    Unset { key: String },
}

#[derive(Subcommand)]
enum ModulesAction {
    /// List module names the resolver can currently see
    List,
    /// Print the modules directory
    Dir,
}

/// The framework executor and its name registry.
pub struct Framework {
    modules_dir: PathBuf,
}

impl Framework {
    pub fn new(modules_dir: PathBuf) -> Self {
        Self { modules_dir }
    }

    /// Whether `name` is registered as a framework subcommand.
    pub fn contains(&self, name: &str) -> bool {
        FrameworkCli::command()
            .get_subcommands()
            .any(|c| c.get_name() == name)
    }

    /// Registered subcommand names with their about lines, sorted.
    pub fn descriptions(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = FrameworkCli::command()
            .get_subcommands()
            .map(|c| {
                let about = c.get_about().map(|a| a.to_string()).unwrap_or_default();
                (c.get_name().to_string(), about)
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Parse and run one invocation. Prints directly; returns an exit code.
    pub fn execute(
        &self,
        argv: &[String],
        settings: &Settings,
        modules: &dyn ModuleRegistry,
    ) -> i32 {
        let cli = match FrameworkCli::try_parse_from(argv) {
            Ok(cli) => cli,
            Err(e) => {
                // clap renders its own usage/help text.
                let _ = e.print();
                return e.exit_code();
            },
        };
        match cli.command {
            FrameworkCommand::Settings { action } => self.run_settings(action, settings),
            FrameworkCommand::Modules { action } => self.run_modules(action, modules),
        }
    }

    fn run_settings(&self, action: SettingsAction, settings: &Settings) -> i32 {
        match action {
            SettingsAction::List => {
                for (key, value) in settings.entries() {
                    println!("{key} = {value}");
                }
                0
            },
            SettingsAction::Get { key } => match settings.get_raw(&key) {
                Some(value) => {
                    println!("{value}");
                    0
                },
                None => {
                    println!("{key} is not set");
                    1
                },
            },
            SettingsAction::Set { key, value } => match settings.set(&key, &value) {
                Ok(()) => 0,
                Err(e) => {
                    println!("error: {e}");
                    1
                },
            },
            SettingsAction::Unset { key } => match settings.unset(&key) {
                Ok(true) => 0,
                Ok(false) => {
                    println!("{key} is not set");
                    1
                },
                Err(e) => {
                    println!("error: {e}");
                    1
                },
            },
        }
    }

    fn run_modules(&self, action: ModulesAction, modules: &dyn ModuleRegistry) -> i32 {
        match action {
            ModulesAction::List => {
                let names = modules.names();
                if names.is_empty() {
                    println!("no modules discovered");
                } else {
                    for name in names {
                        println!("{name}");
                    }
                }
                0
            },
            ModulesAction::Dir => {
                println!("{}", self.modules_dir.display());
                0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use lumen_types::Result;

    struct NoModules;
    impl ModuleRegistry for NoModules {
        fn exists(&self, _name: &str) -> bool {
            false
        }
        fn names(&self) -> Vec<String> {
            Vec::new()
        }
        fn execute(&self, name: &str, _argv: &[String], _sink: &mut dyn Write) -> Result<()> {
            panic!("no module named {name}");
        }
    }

    fn argv(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn registry_names() {
        let fw = Framework::new(PathBuf::from("/tmp/modules"));
        assert!(fw.contains("settings"));
        assert!(fw.contains("modules"));
        assert!(!fw.contains("cd"));
        assert!(!fw.contains("eval"));

        let names: Vec<String> = fw.descriptions().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["modules".to_string(), "settings".to_string()]);
    }

    #[test]
    fn settings_set_then_get() {
        let fw = Framework::new(PathBuf::from("/tmp/modules"));
        let settings = Settings::in_memory();
        let code = fw.execute(&argv(&["settings", "set", "history.size", "99"]), &settings, &NoModules);
        assert_eq!(code, 0);
        assert_eq!(settings.get_int("history.size", 0), 99);

        assert_eq!(fw.execute(&argv(&["settings", "get", "history.size"]), &settings, &NoModules), 0);
        assert_eq!(fw.execute(&argv(&["settings", "get", "missing.key"]), &settings, &NoModules), 1);
    }

    #[test]
    fn unset_reports_absence() {
        let fw = Framework::new(PathBuf::from("/tmp/modules"));
        let settings = Settings::in_memory();
        settings.set("a", "1").unwrap();
        assert_eq!(fw.execute(&argv(&["settings", "unset", "a"]), &settings, &NoModules), 0);
        assert_eq!(fw.execute(&argv(&["settings", "unset", "a"]), &settings, &NoModules), 1);
    }

    #[test]
    fn parse_failure_is_nonzero() {
        let fw = Framework::new(PathBuf::from("/tmp/modules"));
        let settings = Settings::in_memory();
        let code = fw.execute(&argv(&["settings", "frobnicate"]), &settings, &NoModules);
        assert_ne!(code, 0);
    }

    #[test]
    fn modules_list_runs() {
        let fw = Framework::new(PathBuf::from("/tmp/modules"));
        let settings = Settings::in_memory();
        assert_eq!(fw.execute(&argv(&["modules", "list"]), &settings, &NoModules), 0);
        assert_eq!(fw.execute(&argv(&["modules", "dir"]), &settings, &NoModules), 0);
    }
}
