//! Verdict types produced by the analyzers.

use serde::Serialize;

/// The verdict for one command, segment, or nested script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing dangerous was found.
    Allow,
    /// The command must not run.
    Block(AnalysisResult),
}

/// Why a command was blocked and which piece of it triggered the block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    /// Stable identifier of the rule that fired (e.g. `git.reset.hard`).
    pub rule: String,
    /// Human-readable explanation shown to the agent.
    pub reason: String,
    /// Source text of the segment that triggered the block.
    pub segment: String,
}

impl Decision {
    /// Create an allow decision.
    pub fn allow() -> Self {
        Decision::Allow
    }

    /// Create a block decision not yet attributed to a segment.
    pub fn block(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Decision::Block(AnalysisResult {
            rule: rule.into(),
            reason: reason.into(),
            segment: String::new(),
        })
    }

    /// Check if this is a block decision.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Decision::Block(_))
    }

    /// Attribute a block to `segment` unless a nested analysis already did.
    pub fn within(self, segment: &str) -> Self {
        match self {
            Decision::Block(mut result) if result.segment.is_empty() => {
                result.segment = segment.to_string();
                Decision::Block(result)
            }
            other => other,
        }
    }

    /// Get the block details if blocked.
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            Decision::Block(result) => Some(result),
            Decision::Allow => None,
        }
    }

    pub fn into_result(self) -> Option<AnalysisResult> {
        match self {
            Decision::Block(result) => Some(result),
            Decision::Allow => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow() {
        let d = Decision::allow();
        assert!(!d.is_blocked());
        assert!(d.result().is_none());
        assert!(d.into_result().is_none());
    }

    #[test]
    fn test_block_is_attributed_once() {
        let d = Decision::block("git.reset.hard", "reason")
            .within("git reset --hard")
            .within("bash -c 'git reset --hard'");
        let result = d.into_result().unwrap();
        assert_eq!(result.rule, "git.reset.hard");
        assert_eq!(result.segment, "git reset --hard");
    }

    #[test]
    fn test_allow_stays_allow_within_segment() {
        assert_eq!(Decision::allow().within("ls"), Decision::Allow);
    }
}
