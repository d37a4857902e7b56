//! Module shortcuts: dynamically discovered commands invocable by name.
//!
//! A module is a file in the modules directory: a LumenScript source
//! (by extension) evaluated in-process, or any other file spawned as a
//! program. The registry is injected into the resolver as a trait so
//! dispatch can be tested against a fake, and the production registry
//! rescans the directory on every lookup: module availability may change
//! between lines, and dispatch decisions are never cached.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use lumen_script::Engine;
use lumen_types::{LumenError, Result};

use crate::lookup;

/// Named units of functionality the resolver can invoke by first word.
/// Executors write to the provided sink; nothing goes to process stdout.
pub trait ModuleRegistry {
    fn exists(&self, name: &str) -> bool;

    /// Module names, sorted, for help and completion.
    fn names(&self) -> Vec<String>;

    fn execute(&self, name: &str, argv: &[String], sink: &mut dyn Write) -> Result<()>;
}

/// Default modules directory: `<config_dir>/lumen/modules`.
pub fn default_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lumen").join("modules"))
}

/// Directory-backed module registry.
pub struct DirModuleRegistry {
    dir: PathBuf,
    engine: Rc<Engine>,
}

impl DirModuleRegistry {
    pub fn new(dir: PathBuf, engine: Rc<Engine>) -> Self {
        Self { dir, engine }
    }

    /// Find the file backing a module name. Rescan on every call.
    fn locate(&self, name: &str) -> Option<PathBuf> {
        let entries = fs::read_dir(&self.dir).ok()?;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let stem = path.file_stem()?.to_string_lossy().to_ascii_lowercase();
            if stem == name {
                return Some(path);
            }
        }
        None
    }
}

impl ModuleRegistry for DirModuleRegistry {
    fn exists(&self, name: &str) -> bool {
        self.locate(name).is_some()
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = match fs::read_dir(&self.dir) {
            Ok(entries) => entries
                .flatten()
                .filter(|e| e.path().is_file())
                .filter_map(|e| {
                    e.path()
                        .file_stem()
                        .map(|s| s.to_string_lossy().to_ascii_lowercase())
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names.dedup();
        names
    }

    fn execute(&self, name: &str, argv: &[String], sink: &mut dyn Write) -> Result<()> {
        let path = self
            .locate(name)
            .ok_or_else(|| LumenError::Module(format!("no such module: {name}")))?;

        let file_name = path.file_name().map(|s| s.to_string_lossy()).unwrap_or_default();
        if lookup::is_script_source(&file_name) {
            log::debug!("module {name}: evaluating {}", path.display());
            let source = fs::read_to_string(&path)
                .map_err(|e| LumenError::Module(format!("{name}: {e}")))?;
            return self.engine.evaluate(&source, sink);
        }

        log::debug!("module {name}: spawning {}", path.display());
        let output = std::process::Command::new(&path)
            .args(argv)
            .output()
            .map_err(|e| LumenError::Module(format!("{name}: cannot execute: {e}")))?;
        sink.write_all(&output.stdout)?;
        sink.write_all(&output.stderr)?;
        Ok(())
    }
}
