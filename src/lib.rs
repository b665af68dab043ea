//! CC Safety Net - Claude Code security hook.
//!
//! A PreToolUse hook for Claude Code that blocks destructive shell
//! commands: discarding git work, recursive deletes outside the project,
//! and the same commands hidden behind wrappers, `sh -c`, xargs, parallel
//! or interpreter one-liners.

pub mod analysis;
pub mod audit;
pub mod config;
pub mod decision;
pub mod input;
pub mod output;
pub mod rules;
pub mod shell;

pub use analysis::{AnalysisContext, analyze};
pub use config::{Config, CustomRule, Modes};
pub use decision::{AnalysisResult, Decision};
pub use input::HookInput;
pub use output::format_response;
