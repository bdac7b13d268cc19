//! The JSON envelope every query command emits: a fixed schema name
//! and version, a `summary` block every consumer can rely on, an
//! optional `_meta` block, and whatever command-specific fields ride
//! alongside. Agent mode strips the parts only a human needs and
//! applies a token budget by truncating the largest list field.
//!
//! Sorted-key serialization comes for free here rather than from a
//! custom comparator: `serde_json::Map` is backed by a `BTreeMap`
//! unless the `preserve_order` feature is enabled (it isn't in this
//! workspace), so building the envelope as a `Map` and serializing it
//! produces keys in sorted order.

use serde_json::{Map, Number, Value};

pub const ENVELOPE_SCHEMA_NAME: &str = "roam-envelope-v1";
pub const ENVELOPE_SCHEMA_VERSION: &str = "1.1.0";

/// Roughly 4 characters per token — the same rule-of-thumb budget
/// formatters everywhere use when no tokenizer is on hand.
const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeMode {
    /// Every required field plus `_meta`, pretty-printed for a human
    /// reading `--json` output directly.
    Full,
    /// Strips `schema`, `version`, and `_meta`; compact single-line
    /// JSON, for an agent that already knows what it asked for and is
    /// paying per token to read the reply.
    Agent,
}

/// A query command's result, built up field by field and rendered to
/// either presentation mode on demand.
#[derive(Debug, Clone)]
pub struct Envelope {
    command: String,
    tool_version: String,
    summary: Map<String, Value>,
    meta: Option<Map<String, Value>>,
    extra: Map<String, Value>,
}

impl Envelope {
    pub fn new(command: impl Into<String>, tool_version: impl Into<String>, verdict: impl Into<String>) -> Self {
        let mut summary = Map::new();
        summary.insert("verdict".into(), Value::String(verdict.into()));
        Self { command: command.into(), tool_version: tool_version.into(), summary, meta: None, extra: Map::new() }
    }

    pub fn summary_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.summary.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn meta_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.get_or_insert_with(Map::new).insert(key.into(), value.into());
        self
    }

    /// Truncate the largest array-valued top-level field by half,
    /// repeatedly, until the rendered size fits `budget_tokens` or no
    /// array is left to shrink. Sets `summary.truncated = true` and
    /// `summary.budget_tokens` when truncation actually happened.
    pub fn apply_budget(&mut self, budget_tokens: usize) {
        let limit_chars = budget_tokens * CHARS_PER_TOKEN;
        let mut truncated = false;
        loop {
            if self.render(EnvelopeMode::Agent).len() <= limit_chars {
                break;
            }
            let largest = self
                .extra
                .iter()
                .filter_map(|(k, v)| v.as_array().map(|a| (k.clone(), a.len())))
                .max_by_key(|(_, len)| *len);
            let Some((key, len)) = largest else { break };
            if len <= 1 {
                break;
            }
            if let Some(Value::Array(arr)) = self.extra.get_mut(&key) {
                arr.truncate(len / 2);
            }
            truncated = true;
        }
        if truncated {
            self.summary.insert("truncated".into(), Value::Bool(true));
            self.summary.insert("budget_tokens".into(), Value::Number(Number::from(budget_tokens)));
        }
    }

    fn to_value(&self, mode: EnvelopeMode) -> Value {
        let mut obj = Map::new();
        if mode == EnvelopeMode::Full {
            obj.insert("schema".into(), Value::String(ENVELOPE_SCHEMA_NAME.into()));
            obj.insert("version".into(), Value::String(self.tool_version.clone()));
        }
        obj.insert("schema_version".into(), Value::String(ENVELOPE_SCHEMA_VERSION.into()));
        obj.insert("command".into(), Value::String(self.command.clone()));
        obj.insert("summary".into(), Value::Object(self.summary.clone()));
        if mode == EnvelopeMode::Full {
            if let Some(meta) = &self.meta {
                obj.insert("_meta".into(), Value::Object(meta.clone()));
            }
        }
        for (key, value) in &self.extra {
            obj.insert(key.clone(), value.clone());
        }
        Value::Object(obj)
    }

    pub fn render(&self, mode: EnvelopeMode) -> String {
        let value = self.to_value(mode);
        match mode {
            EnvelopeMode::Full => serde_json::to_string_pretty(&value).unwrap_or_default(),
            EnvelopeMode::Agent => serde_json::to_string(&value).unwrap_or_default(),
        }
    }
}

/// Validate a deserialized envelope against the `roam-envelope-v1`
/// shape: every required field present, `summary` is an object, and
/// `schema_version` looks like `X.Y.Z`.
pub fn validate_envelope(data: &Value) -> (bool, Vec<String>) {
    const REQUIRED: [&str; 5] = ["schema", "schema_version", "command", "version", "summary"];
    let mut errors = Vec::new();
    let Value::Object(obj) = data else {
        return (false, vec!["envelope must be a JSON object".to_string()]);
    };

    for field in REQUIRED {
        if !obj.contains_key(field) {
            errors.push(format!("Missing required field: {field}"));
        }
    }

    if let Some(summary) = obj.get("summary") {
        if !summary.is_object() {
            errors.push("'summary' must be a dict".to_string());
        }
    }

    if let Some(Value::String(version)) = obj.get("schema_version") {
        let parts: Vec<&str> = version.split('.').collect();
        let valid = parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
        if !valid {
            errors.push("'schema_version' must be semantic version (X.Y.Z)".to_string());
        }
    }

    (errors.is_empty(), errors)
}
