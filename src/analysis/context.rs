//! Everything an analysis needs besides the command text.

use crate::config::{CustomRule, Modes};

/// Inputs to [`analyze`](super::analyze).
#[derive(Debug, Clone, Default)]
pub struct AnalysisContext {
    /// Working directory the command starts in; `None` when unknown.
    pub cwd: Option<String>,
    pub home: Option<String>,
    /// `$TMPDIR` of the hook process.
    pub tmpdir: Option<String>,
    /// User and project rules, applied after the built-in detectors.
    pub rules: Vec<CustomRule>,
    pub modes: Modes,
}

impl AnalysisContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for a command running in `cwd`, with home and `$TMPDIR` taken
    /// from the process environment.
    pub fn from_environment(cwd: Option<&str>) -> Self {
        Self {
            cwd: cwd.map(str::to_string),
            home: dirs::home_dir().map(|p| p.to_string_lossy().into_owned()),
            tmpdir: std::env::var("TMPDIR").ok().filter(|t| !t.is_empty()),
            ..Self::default()
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_home(mut self, home: impl Into<String>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn with_tmpdir(mut self, tmpdir: impl Into<String>) -> Self {
        self.tmpdir = Some(tmpdir.into());
        self
    }

    pub fn with_rules(mut self, rules: Vec<CustomRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_modes(mut self, modes: Modes) -> Self {
        self.modes = modes;
        self
    }
}
