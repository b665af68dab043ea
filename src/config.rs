//! Custom rule configuration and mode flags.
//!
//! Rules come from two optional files: a user config
//! (`~/.cc-safety-net/config.json`, or `$SAFETY_NET_CONFIG`) and a project
//! config (`.safety-net.json` in the working directory). Either may be TOML
//! instead when its extension is `.toml`. Project rules replace user rules
//! of the same name.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Overrides the user config path.
pub const CONFIG_PATH_ENV: &str = "SAFETY_NET_CONFIG";

const USER_CONFIG_DIR: &str = ".cc-safety-net";
const PROJECT_CONFIG_STEM: &str = ".safety-net";
const SUPPORTED_VERSION: i64 = 1;
const MAX_REASON_LENGTH: usize = 256;

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]{0,63}$").expect("rule name pattern is a valid regex")
});

static COMMAND_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]*$").expect("command pattern is a valid regex")
});

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config file is empty")]
    Empty,

    #[error("config must be an object")]
    NotObject,

    #[error("{}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl ConfigError {
    /// One message per problem found.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ConfigError::Invalid(errors) => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// A user-defined rule blocking certain arguments of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomRule {
    /// Rule name, shown in the block reason.
    pub name: String,
    /// Command basename to match.
    pub command: String,
    /// First non-option argument to match, if any.
    pub subcommand: Option<String>,
    /// Arguments that trigger the block.
    pub block_args: Vec<String>,
    pub reason: String,
}

/// A validated config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub rules: Vec<CustomRule>,
}

impl Config {
    /// Parse and validate a config file, choosing TOML or JSON by extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        if is_toml(path) {
            Self::from_toml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Err(ConfigError::Empty);
        }
        Self::from_value(&serde_json::from_str(content)?)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Err(ConfigError::Empty);
        }
        Self::from_value(&toml::from_str::<Value>(content)?)
    }

    /// Validate a parsed document.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        if !value.is_object() {
            return Err(ConfigError::NotObject);
        }
        let doc = RawConfig::deserialize(value)?;

        let version = doc
            .version
            .ok_or_else(|| invalid("missing required field 'version'"))?;
        let version = version
            .as_i64()
            .ok_or_else(|| invalid("'version' must be an integer"))?;
        if version != SUPPORTED_VERSION {
            return Err(invalid(format!(
                "unsupported version {version}, expected {SUPPORTED_VERSION}"
            )));
        }

        let rules = match doc.rules {
            None => return Ok(Config::default()),
            Some(Value::Array(rules)) => rules,
            Some(_) => return Err(invalid("'rules' must be an array")),
        };

        let mut errors = Vec::new();
        let mut seen = Vec::new();
        let mut parsed = Vec::new();
        for (index, rule) in rules.iter().enumerate() {
            match validate_rule(rule, index, &mut seen) {
                Ok(rule) => parsed.push(rule),
                Err(mut rule_errors) => errors.append(&mut rule_errors),
            }
        }

        if errors.is_empty() {
            Ok(Config { rules: parsed })
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Merge a project config over this user config. Project rules replace
    /// user rules with the same name, compared case-insensitively.
    pub fn merge(self, project: Config) -> Config {
        let mut rules: Vec<CustomRule> = self
            .rules
            .into_iter()
            .filter(|user| {
                !project
                    .rules
                    .iter()
                    .any(|p| p.name.eq_ignore_ascii_case(&user.name))
            })
            .collect();
        rules.extend(project.rules);
        Config { rules }
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name.as_str()).collect()
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(vec![message.into()])
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

/// Top-level document as written. Field types are checked afterwards so
/// every problem can be reported at once.
#[derive(Debug, Deserialize)]
struct RawConfig {
    version: Option<Value>,
    rules: Option<Value>,
}

/// One entry of `rules` as written.
#[derive(Debug, Deserialize)]
struct RawRule {
    name: Option<Value>,
    command: Option<Value>,
    subcommand: Option<Value>,
    block_args: Option<Value>,
    reason: Option<Value>,
}

impl RawRule {
    fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("command", &self.command),
            ("block_args", &self.block_args),
            ("reason", &self.reason),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(field, _)| field)
        .collect()
    }
}

fn validate_rule(
    rule: &Value,
    index: usize,
    seen: &mut Vec<String>,
) -> Result<CustomRule, Vec<String>> {
    let at = |field: &str, message: &str| format!("rules[{index}].{field}: {message}");

    if !rule.is_object() {
        return Err(vec![format!("rules[{index}]: must be an object")]);
    }
    let raw = RawRule::deserialize(rule).map_err(|e| vec![format!("rules[{index}]: {e}")])?;
    let missing = raw.missing_fields();
    if !missing.is_empty() {
        return Err(missing
            .into_iter()
            .map(|field| format!("rules[{index}]: missing required field '{field}'"))
            .collect());
    }

    let mut errors = Vec::new();

    let name = raw.name.as_ref().and_then(Value::as_str);
    match name {
        None => errors.push(at("name", "must be a string")),
        Some(n) if !NAME_PATTERN.is_match(n) => {
            errors.push(at("name", "must match pattern ^[a-zA-Z][a-zA-Z0-9_-]{0,63}$"));
        }
        Some(n) => {
            let lower = n.to_ascii_lowercase();
            if seen.contains(&lower) {
                errors.push(at("name", &format!("duplicate rule name '{n}'")));
            }
            seen.push(lower);
        }
    }

    let command = raw.command.as_ref().and_then(Value::as_str);
    match command {
        None => errors.push(at("command", "must be a string")),
        Some(c) if !COMMAND_PATTERN.is_match(c) => {
            errors.push(at("command", "must match pattern ^[a-zA-Z][a-zA-Z0-9_-]*$"));
        }
        Some(_) => {}
    }

    let subcommand = match raw.subcommand {
        None => None,
        Some(Value::String(s)) if COMMAND_PATTERN.is_match(&s) => Some(s),
        Some(Value::String(_)) => {
            errors.push(at("subcommand", "must match pattern ^[a-zA-Z][a-zA-Z0-9_-]*$"));
            None
        }
        Some(_) => {
            errors.push(at("subcommand", "must be a string"));
            None
        }
    };

    let mut block_args = Vec::new();
    match raw.block_args.as_ref().and_then(Value::as_array) {
        None => errors.push(at("block_args", "must be an array")),
        Some(args) if args.is_empty() => errors.push(at("block_args", "must not be empty")),
        Some(args) => {
            for (i, arg) in args.iter().enumerate() {
                match arg.as_str() {
                    None => errors.push(format!("rules[{index}].block_args[{i}]: must be a string")),
                    Some("") => {
                        errors.push(format!("rules[{index}].block_args[{i}]: must not be empty"));
                    }
                    Some(a) => block_args.push(a.to_string()),
                }
            }
        }
    }

    let reason = raw.reason.as_ref().and_then(Value::as_str);
    match reason {
        None => errors.push(at("reason", "must be a string")),
        Some("") => errors.push(at("reason", "must not be empty")),
        Some(r) if r.chars().count() > MAX_REASON_LENGTH => {
            errors.push(at("reason", &format!("exceeds max length of {MAX_REASON_LENGTH}")));
        }
        Some(_) => {}
    }

    match (name, command, reason) {
        (Some(name), Some(command), Some(reason)) if errors.is_empty() => Ok(CustomRule {
            name: name.to_string(),
            command: command.to_string(),
            subcommand,
            block_args,
            reason: reason.to_string(),
        }),
        _ => Err(errors),
    }
}

/// Path of the user config: `$SAFETY_NET_CONFIG`, otherwise
/// `~/.cc-safety-net/config.json` (or `config.toml` when only that exists).
pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::home_dir().map(|home| prefer_existing(home.join(USER_CONFIG_DIR).join("config")))
}

/// Path of the project config in `cwd`.
pub fn project_config_path(cwd: &Path) -> PathBuf {
    prefer_existing(cwd.join(PROJECT_CONFIG_STEM))
}

/// `<stem>.json`, unless only `<stem>.toml` exists.
fn prefer_existing(stem: PathBuf) -> PathBuf {
    let json = stem.with_extension("json");
    let toml = stem.with_extension("toml");
    if !json.exists() && toml.exists() {
        toml
    } else {
        json
    }
}

/// Load and merge user and project rules. Missing or invalid files are
/// ignored.
pub fn load_rules(cwd: Option<&Path>) -> Vec<CustomRule> {
    load_rules_from(user_config_path().as_deref(), cwd)
}

/// [`load_rules`] with an explicit user config path.
pub fn load_rules_from(user_path: Option<&Path>, cwd: Option<&Path>) -> Vec<CustomRule> {
    let user = user_path.and_then(load_optional).unwrap_or_default();
    let project = cwd
        .map(project_config_path)
        .and_then(|path| load_optional(&path))
        .unwrap_or_default();
    user.merge(project).rules
}

fn load_optional(path: &Path) -> Option<Config> {
    if !path.exists() {
        return None;
    }
    match Config::from_file(path) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "ignoring invalid config");
            None
        }
    }
}

/// Check a single file, returning its rule names.
pub fn validate_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let config = Config::from_file(path)?;
    Ok(config.rule_names().into_iter().map(str::to_string).collect())
}

/// Analysis modes, read from `SAFETY_NET_*` environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modes {
    /// Block whatever cannot be parsed.
    pub strict: bool,
    /// Block rm -rf even inside the working directory.
    pub paranoid_rm: bool,
    /// Block every interpreter one-liner.
    pub paranoid_interpreters: bool,
    /// Treat `$TMPDIR` as a temp location.
    pub allow_tmpdir_var: bool,
}

impl Default for Modes {
    fn default() -> Self {
        Self {
            strict: false,
            paranoid_rm: false,
            paranoid_interpreters: false,
            allow_tmpdir_var: true,
        }
    }
}

impl Modes {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read modes through `lookup`. `SAFETY_NET_PARANOID` turns on both
    /// paranoid modes.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let on = |name: &str| lookup(name).is_some_and(|value| is_truthy(&value));
        let paranoid = on("SAFETY_NET_PARANOID");
        Self {
            strict: on("SAFETY_NET_STRICT"),
            paranoid_rm: paranoid || on("SAFETY_NET_PARANOID_RM"),
            paranoid_interpreters: paranoid || on("SAFETY_NET_PARANOID_INTERPRETERS"),
            allow_tmpdir_var: true,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
