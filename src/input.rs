//! Input parsing for Claude Code hook invocations.

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur when parsing hook input.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Invalid hook input.")]
    Json(#[from] serde_json::Error),

    #[error("Invalid hook input structure.")]
    Structure,
}

/// The input from Claude Code's PreToolUse hook.
///
/// Fields with the wrong JSON type are treated as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookInput {
    /// The tool being invoked (e.g., "Bash").
    pub tool_name: Option<String>,
    /// The tool's input parameters as raw JSON.
    pub tool_input: Value,
    /// Working directory; trimmed, `None` when empty.
    pub cwd: Option<String>,
    /// Session id for audit logging; `None` when empty.
    pub session_id: Option<String>,
}

impl HookInput {
    /// Parse from JSON string.
    pub fn parse(json: &str) -> Result<Self, InputError> {
        let Value::Object(mut obj) = serde_json::from_str::<Value>(json)? else {
            return Err(InputError::Structure);
        };
        Ok(Self {
            tool_name: take_string(&mut obj, "tool_name"),
            tool_input: obj.remove("tool_input").unwrap_or(Value::Null),
            cwd: take_string(&mut obj, "cwd")
                .map(|cwd| cwd.trim().to_string())
                .filter(|cwd| !cwd.is_empty()),
            session_id: take_string(&mut obj, "session_id").filter(|id| !id.is_empty()),
        })
    }

    pub fn is_bash(&self) -> bool {
        self.tool_name.as_deref() == Some("Bash")
    }

    /// The command of a Bash invocation.
    ///
    /// `Ok(None)` for other tools and for missing or blank commands; an error
    /// when a Bash `tool_input` is not an object.
    pub fn bash_command(&self) -> Result<Option<&str>, InputError> {
        if !self.is_bash() {
            return Ok(None);
        }
        let input = self.tool_input.as_object().ok_or(InputError::Structure)?;
        Ok(input
            .get("command")
            .and_then(Value::as_str)
            .filter(|command| !command.trim().is_empty()))
    }
}

fn take_string(obj: &mut Map<String, Value>, key: &str) -> Option<String> {
    match obj.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}
