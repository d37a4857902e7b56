//! lumen shell entry point.
//!
//! Interactive by default; with arguments, dispatches them as one line
//! and exits, so `lumen version` from another shell answers directly
//! (the resolver strips the leading program name either way).

mod prompt;
mod repl;

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Result;

use lumen_script::Engine;
use lumen_settings::Settings;
use lumen_shell::{modules, DirModuleRegistry, Environment, Shell};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let settings = Rc::new(Settings::load_default());
    let engine = Rc::new(Engine::new());

    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
    let cwd = std::env::current_dir().unwrap_or_else(|_| home.clone());
    let default_editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let editor = settings.get_str("editor.command", &default_editor);

    let configured_dir = settings.get_str("modules.dir", "");
    let modules_dir = if configured_dir.is_empty() {
        modules::default_dir().unwrap_or_else(|| PathBuf::from("modules"))
    } else {
        PathBuf::from(configured_dir)
    };

    let registry = DirModuleRegistry::new(modules_dir.clone(), Rc::clone(&engine));
    let env = Environment::new(cwd, home, editor);
    let mut shell = Shell::new(
        Rc::clone(&settings),
        engine,
        Box::new(registry),
        modules_dir,
        env,
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        let output = shell.dispatch(&args.join(" "));
        if !output.is_empty() {
            println!("{output}");
        }
        return Ok(());
    }

    log::info!("starting lumen {}", env!("CARGO_PKG_VERSION"));
    repl::run(Rc::new(RefCell::new(shell)), settings)
}
