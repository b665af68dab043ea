//! Response formatting for hook output.

use serde::Serialize;

use super::redaction::safe_excerpt;
use crate::decision::AnalysisResult;

const HEADER: &str = "BLOCKED by Safety Net";
const FOOTER: &str =
    "If this operation is truly needed, ask the user for explicit permission and have them run the command manually.";

/// JSON response for denied operations (Claude Code hook format).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenyResponse {
    pub hook_specific_output: HookSpecificOutput,
}

/// The hook-specific output for PreToolUse hooks.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    /// Must be "PreToolUse" for this hook type.
    pub hook_event_name: &'static str,
    /// Always "deny".
    pub permission_decision: &'static str,
    /// Message shown to the agent.
    pub permission_decision_reason: String,
}

impl DenyResponse {
    fn new(reason: String) -> Self {
        Self {
            hook_specific_output: HookSpecificOutput {
                hook_event_name: "PreToolUse",
                permission_decision: "deny",
                permission_decision_reason: reason,
            },
        }
    }

    fn to_json(&self) -> String {
        // Only string fields: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Format a block as the deny JSON printed on stdout.
pub fn format_response(command: &str, result: &AnalysisResult) -> String {
    let reason = format!(
        "{HEADER}\n\nReason: {}\n\nCommand: {}\n\nSegment: {}\n\n{FOOTER}",
        result.reason,
        safe_excerpt(command),
        safe_excerpt(&result.segment),
    );
    DenyResponse::new(reason).to_json()
}

/// Deny JSON for hook input that could not be read, used in strict mode.
pub fn format_invalid_input(message: &str) -> String {
    DenyResponse::new(format!("{HEADER}\n\nReason: {message}")).to_json()
}
