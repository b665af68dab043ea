//! Command analysis entry points.

mod bash;
mod context;

pub(crate) use bash::Scope;
pub use bash::{
    MAX_RECURSION_DEPTH, REASON_SHELL_WRAPPER, REASON_UNPARSEABLE, analyze, analyze_segment,
};
pub use context::AnalysisContext;
