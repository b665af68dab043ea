//! Output formatting and response generation.

mod redaction;
mod response;

pub use redaction::{MAX_EXCERPT_CHARS, redact_secrets, safe_excerpt, truncate_chars};
pub use response::{DenyResponse, HookSpecificOutput, format_invalid_input, format_response};
