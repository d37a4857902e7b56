//! Core of the lumen shell.
//!
//! The resolution pipeline: one line of text is classified (assignment or
//! command), tokenized, and routed to exactly one of five execution paths
//! by [`dispatch::Shell`]. Completion runs out-of-band through
//! [`complete::complete`], reading the same [`lookup`] table the resolver
//! uses so the two can never disagree.

pub mod assign;
pub mod builtins;
pub mod complete;
pub mod dispatch;
pub mod lookup;
pub mod modules;
pub mod subcommand;
pub mod tokenize;

pub use builtins::Environment;
pub use complete::{Candidate, Catalog, FsState};
pub use dispatch::Shell;
pub use modules::{DirModuleRegistry, ModuleRegistry};
