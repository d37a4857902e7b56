//! The shared command lookup table.
//!
//! Dispatch precedence and completion filtering both read from this module,
//! so the two can never disagree about which names are builtins, which take
//! path arguments, or which extensions count as LumenScript sources.

/// The shell's own program name; stripped when typed as the first word.
pub const PROGRAM_NAME: &str = "lumen";

/// First word that routes the rest of the line to the script evaluator.
pub const EVAL_KEYWORD: &str = "eval";

/// Names handled directly by the resolver before any executor runs.
pub const META_HELP: &[&str] = &["help", "--help", "-h"];
pub const META_VERSION: &[&str] = &["version", "--version"];
pub const META_ENGINE_VERSION: &[&str] = &["eval-version", "script-version"];

/// Recognized LumenScript source extensions (lowercase, no dot).
pub const SCRIPT_EXTENSIONS: &[&str] = &["lum", "lms", "lumen"];

/// What kind of path argument a builtin verb takes, for completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathArg {
    /// No path argument; completion offers nothing.
    None,
    /// Any file or directory.
    Any,
    /// Only directories (`cd`, `mkdir`).
    DirOnly,
    /// Directories plus LumenScript sources (`run`).
    Script,
}

/// Terminal-only builtin verbs with their path-argument capability.
pub const BUILTIN_VERBS: &[(&str, PathArg)] = &[
    ("cat", PathArg::Any),
    ("cd", PathArg::DirOnly),
    ("cp", PathArg::Any),
    ("edit", PathArg::Any),
    ("find", PathArg::Any),
    ("grep", PathArg::Any),
    ("ls", PathArg::Any),
    ("mkdir", PathArg::DirOnly),
    ("mv", PathArg::Any),
    ("pwd", PathArg::None),
    ("rm", PathArg::Any),
    ("run", PathArg::Script),
    ("touch", PathArg::Any),
    ("vars", PathArg::None),
    ("wc", PathArg::Any),
];

pub fn is_meta(name: &str) -> bool {
    META_HELP.contains(&name) || META_VERSION.contains(&name) || META_ENGINE_VERSION.contains(&name)
}

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_VERBS.iter().any(|(n, _)| *n == name)
}

/// Path capability of a builtin verb; `None` for unknown names.
pub fn path_arg(name: &str) -> Option<PathArg> {
    BUILTIN_VERBS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, arg)| *arg)
}

/// Whether a file name carries a recognized LumenScript extension.
pub fn is_script_source(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => SCRIPT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

/// File category used for completion display glyphs. Cosmetic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Directory,
    Script,
    Glue,
    Doc,
    Binary,
    Other,
}

impl FileCategory {
    pub fn of(name: &str, is_dir: bool) -> Self {
        if is_dir {
            return FileCategory::Directory;
        }
        if is_script_source(name) {
            return FileCategory::Script;
        }
        let ext = name
            .rsplit_once('.')
            .map(|(_, e)| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "sh" => FileCategory::Glue,
            "md" | "txt" => FileCategory::Doc,
            "bin" | "exe" | "wasm" | "o" => FileCategory::Binary,
            _ => FileCategory::Other,
        }
    }

    /// Decoration prepended to display text when decorations are enabled.
    pub fn glyph(self) -> &'static str {
        match self {
            FileCategory::Directory => "\u{1f4c1}",
            FileCategory::Script => "\u{1f4dc}",
            FileCategory::Glue => "\u{1f527}",
            FileCategory::Doc => "\u{1f4c4}",
            FileCategory::Binary => "\u{2699}",
            FileCategory::Other => "\u{00b7}",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_membership() {
        assert!(is_builtin("cd"));
        assert!(is_builtin("run"));
        assert!(!is_builtin("settings"));
        assert!(!is_builtin("eval"));
    }

    #[test]
    fn path_capabilities() {
        assert_eq!(path_arg("cd"), Some(PathArg::DirOnly));
        assert_eq!(path_arg("run"), Some(PathArg::Script));
        assert_eq!(path_arg("pwd"), Some(PathArg::None));
        assert_eq!(path_arg("ls"), Some(PathArg::Any));
        assert_eq!(path_arg("nope"), None);
    }

    #[test]
    fn verbs_sorted_and_unique() {
        let names: Vec<&str> = BUILTIN_VERBS.iter().map(|(n, _)| *n).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(names, sorted);
    }

    #[test]
    fn script_sources_by_extension() {
        assert!(is_script_source("job.lum"));
        assert!(is_script_source("job.LMS"));
        assert!(is_script_source("archive.lumen"));
        assert!(!is_script_source("job.sh"));
        assert!(!is_script_source("lum"));
    }

    #[test]
    fn file_categories() {
        assert_eq!(FileCategory::of("src", true), FileCategory::Directory);
        assert_eq!(FileCategory::of("job.lum", false), FileCategory::Script);
        assert_eq!(FileCategory::of("setup.sh", false), FileCategory::Glue);
        assert_eq!(FileCategory::of("README.md", false), FileCategory::Doc);
        assert_eq!(FileCategory::of("tool.wasm", false), FileCategory::Binary);
        assert_eq!(FileCategory::of("data.csv", false), FileCategory::Other);
    }

    #[test]
    fn meta_names() {
        for name in ["help", "--help", "-h", "version", "--version", "eval-version"] {
            assert!(is_meta(name));
        }
        assert!(!is_meta("cd"));
    }
}
