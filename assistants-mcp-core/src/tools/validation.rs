//! Argument validation for tool handlers
//!
//! [`ArgValidator`] walks a JSON arguments object and collects every field
//! problem, so a client sees all of them in one round trip.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum metadata pairs on one object
pub const MAX_METADATA_PAIRS: usize = 16;
pub const MAX_METADATA_KEY_LEN: usize = 64;
pub const MAX_METADATA_VALUE_LEN: usize = 512;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_DESCRIPTION_LEN: usize = 512;
pub const MAX_INSTRUCTIONS_LEN: usize = 256_000;

/// One invalid field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Field path (e.g., "tools[0].type")
    pub field: String,
    pub message: String,
    /// Machine-readable reason: required, type, format, range, enum, length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref code) = self.code {
            write!(f, "[{}] {}: {}", code, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// All validation errors for one tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("Invalid arguments for '{tool}': {}", summarize(.errors))]
pub struct ValidationFailure {
    pub tool: String,
    pub errors: Vec<ValidationError>,
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationFailure {
    pub fn single(tool: impl Into<String>, error: ValidationError) -> Self {
        Self {
            tool: tool.into(),
            errors: vec![error],
        }
    }
}

/// Accumulating validator over a tool's arguments object
pub struct ArgValidator<'a> {
    tool: &'a str,
    args: Option<&'a Map<String, Value>>,
    errors: Vec<ValidationError>,
}

impl<'a> ArgValidator<'a> {
    /// Start validating `args`; `null` counts as an empty object.
    pub fn new(tool: &'a str, args: &'a Value) -> Self {
        let mut validator = Self {
            tool,
            args: None,
            errors: Vec::new(),
        };
        match args {
            Value::Object(map) => validator.args = Some(map),
            Value::Null => {}
            _ => validator.push("arguments", "must be an object", "type"),
        }
        validator
    }

    fn push(&mut self, field: &str, message: impl Into<String>, code: &str) {
        self.errors
            .push(ValidationError::new(field, message).with_code(code));
    }

    fn get(&self, field: &str) -> Option<&'a Value> {
        self.args
            .and_then(|m| m.get(field))
            .filter(|v| !v.is_null())
    }

    /// Required identifier with a fixed prefix, e.g. `asst_`
    pub fn required_id(&mut self, field: &str, prefix: &str) -> &mut Self {
        match self.get(field) {
            None => self.push(field, "is required", "required"),
            Some(value) => self.check_id(field, value, prefix),
        }
        self
    }

    pub fn optional_id(&mut self, field: &str, prefix: &str) -> &mut Self {
        if let Some(value) = self.get(field) {
            self.check_id(field, value, prefix);
        }
        self
    }

    fn check_id(&mut self, field: &str, value: &Value, prefix: &str) {
        match value.as_str() {
            None => self.push(field, "must be a string", "type"),
            Some(id) if id.trim().is_empty() => self.push(field, "must not be empty", "format"),
            Some(id) if !id.starts_with(prefix) || id.len() == prefix.len() => self.push(
                field,
                format!("must be an id starting with '{}'", prefix),
                "format",
            ),
            Some(id) if id.chars().any(|c| c.is_whitespace() || c == '/') => {
                self.push(field, "must not contain whitespace or '/'", "format")
            }
            Some(_) => {}
        }
    }

    /// Required non-empty string no longer than `max_len` characters
    pub fn required_str(&mut self, field: &str, max_len: usize) -> &mut Self {
        match self.get(field) {
            None => self.push(field, "is required", "required"),
            Some(value) => self.check_str(field, value, max_len, false),
        }
        self
    }

    pub fn optional_str(&mut self, field: &str, max_len: usize) -> &mut Self {
        if let Some(value) = self.get(field) {
            self.check_str(field, value, max_len, true);
        }
        self
    }

    fn check_str(&mut self, field: &str, value: &Value, max_len: usize, allow_empty: bool) {
        match value.as_str() {
            None => self.push(field, "must be a string", "type"),
            Some(s) if !allow_empty && s.trim().is_empty() => {
                self.push(field, "must not be empty", "length")
            }
            Some(s) if s.chars().count() > max_len => self.push(
                field,
                format!("must be at most {} characters", max_len),
                "length",
            ),
            Some(_) => {}
        }
    }

    /// `limit` in 1..=100
    pub fn optional_limit(&mut self) -> &mut Self {
        if let Some(value) = self.get("limit") {
            match value.as_u64() {
                Some(n) if (1..=100).contains(&n) => {}
                Some(_) => self.push("limit", "must be between 1 and 100", "range"),
                None => self.push("limit", "must be an integer", "type"),
            }
        }
        self
    }

    /// Pagination fields shared by every list tool
    pub fn pagination(&mut self, cursor_prefix: &str) -> &mut Self {
        self.optional_limit()
            .optional_enum("order", &["asc", "desc"])
            .optional_id("after", cursor_prefix)
            .optional_id("before", cursor_prefix)
    }

    pub fn required_enum(&mut self, field: &str, allowed: &[&str]) -> &mut Self {
        match self.get(field) {
            None => self.push(field, "is required", "required"),
            Some(value) => self.check_enum(field, value, allowed),
        }
        self
    }

    pub fn optional_enum(&mut self, field: &str, allowed: &[&str]) -> &mut Self {
        if let Some(value) = self.get(field) {
            self.check_enum(field, value, allowed);
        }
        self
    }

    fn check_enum(&mut self, field: &str, value: &Value, allowed: &[&str]) {
        match value.as_str() {
            Some(s) if allowed.contains(&s) => {}
            _ => self.push(
                field,
                format!("must be one of: {}", allowed.join(", ")),
                "enum",
            ),
        }
    }

    /// Optional number within an inclusive range
    pub fn optional_number(&mut self, field: &str, min: f64, max: f64) -> &mut Self {
        if let Some(value) = self.get(field) {
            match value.as_f64() {
                Some(n) if n >= min && n <= max => {}
                Some(_) => self.push(
                    field,
                    format!("must be between {} and {}", min, max),
                    "range",
                ),
                None => self.push(field, "must be a number", "type"),
            }
        }
        self
    }

    /// Optional positive integer
    pub fn optional_positive_int(&mut self, field: &str) -> &mut Self {
        if let Some(value) = self.get(field) {
            match value.as_u64() {
                Some(n) if n >= 1 && n <= u64::from(u32::MAX) => {}
                _ => self.push(field, "must be a positive integer", "range"),
            }
        }
        self
    }

    pub fn optional_object(&mut self, field: &str) -> &mut Self {
        if let Some(value) = self.get(field)
            && !value.is_object()
        {
            self.push(field, "must be an object", "type");
        }
        self
    }

    pub fn optional_array(&mut self, field: &str) -> &mut Self {
        if let Some(value) = self.get(field)
            && !value.is_array()
        {
            self.push(field, "must be an array", "type");
        }
        self
    }

    /// Metadata: at most 16 string pairs with bounded key and value lengths
    pub fn optional_metadata(&mut self) -> &mut Self {
        let Some(value) = self.get("metadata") else {
            return self;
        };
        let Some(map) = value.as_object() else {
            self.push("metadata", "must be an object of string values", "type");
            return self;
        };

        if map.len() > MAX_METADATA_PAIRS {
            self.push(
                "metadata",
                format!("must have at most {} keys", MAX_METADATA_PAIRS),
                "length",
            );
        }
        for (key, value) in map {
            let path = format!("metadata.{}", key);
            if key.chars().count() > MAX_METADATA_KEY_LEN {
                self.push(
                    &path,
                    format!("key must be at most {} characters", MAX_METADATA_KEY_LEN),
                    "length",
                );
            }
            match value.as_str() {
                Some(s) if s.chars().count() > MAX_METADATA_VALUE_LEN => self.push(
                    &path,
                    format!("value must be at most {} characters", MAX_METADATA_VALUE_LEN),
                    "length",
                ),
                Some(_) => {}
                None => self.push(&path, "value must be a string", "type"),
            }
        }
        self
    }

    /// Assistant tool list: each entry needs a known `type`, and function
    /// tools need a named `function` object.
    pub fn optional_tools(&mut self) -> &mut Self {
        let Some(value) = self.get("tools") else {
            return self;
        };
        let Some(items) = value.as_array() else {
            self.push("tools", "must be an array", "type");
            return self;
        };
        if items.len() > 128 {
            self.push("tools", "must have at most 128 entries", "length");
        }

        for (i, item) in items.iter().enumerate() {
            let path = format!("tools[{}]", i);
            match item.get("type").and_then(Value::as_str) {
                Some("code_interpreter") | Some("file_search") => {}
                Some("function") => {
                    let name = item
                        .get("function")
                        .and_then(|f| f.get("name"))
                        .and_then(Value::as_str);
                    match name {
                        Some(n) if is_function_name(n) => {}
                        Some(_) => self.push(
                            &format!("{}.function.name", path),
                            "must be 1-64 characters of a-z, A-Z, 0-9, '_' or '-'",
                            "format",
                        ),
                        None => self.push(
                            &format!("{}.function.name", path),
                            "is required",
                            "required",
                        ),
                    }
                }
                _ => self.push(
                    &format!("{}.type", path),
                    "must be one of: code_interpreter, file_search, function",
                    "enum",
                ),
            }
        }
        self
    }

    /// Non-empty `tool_outputs` array of `{tool_call_id, output}` strings
    pub fn required_tool_outputs(&mut self) -> &mut Self {
        let Some(value) = self.get("tool_outputs") else {
            self.push("tool_outputs", "is required", "required");
            return self;
        };
        let Some(items) = value.as_array() else {
            self.push("tool_outputs", "must be an array", "type");
            return self;
        };
        if items.is_empty() {
            self.push("tool_outputs", "must not be empty", "length");
        }

        for (i, item) in items.iter().enumerate() {
            match item.get("tool_call_id").and_then(Value::as_str) {
                Some(id) if !id.trim().is_empty() => {}
                _ => self.push(
                    &format!("tool_outputs[{}].tool_call_id", i),
                    "must be a non-empty string",
                    "required",
                ),
            }
            if !item.get("output").is_some_and(Value::is_string) {
                self.push(
                    &format!("tool_outputs[{}].output", i),
                    "must be a string",
                    "type",
                );
            }
        }
        self
    }

    /// Seed messages for thread creation
    pub fn optional_messages(&mut self) -> &mut Self {
        let Some(value) = self.get("messages") else {
            return self;
        };
        let Some(items) = value.as_array() else {
            self.push("messages", "must be an array", "type");
            return self;
        };

        for (i, item) in items.iter().enumerate() {
            match item.get("role").and_then(Value::as_str) {
                Some("user") | Some("assistant") => {}
                _ => self.push(
                    &format!("messages[{}].role", i),
                    "must be one of: user, assistant",
                    "enum",
                ),
            }
            match item.get("content").and_then(Value::as_str) {
                Some(c) if !c.trim().is_empty() => {}
                _ => self.push(
                    &format!("messages[{}].content", i),
                    "must be a non-empty string",
                    "required",
                ),
            }
        }
        self
    }

    /// Finish validation, returning every collected error
    pub fn finish(&mut self) -> Result<(), ValidationFailure> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationFailure {
                tool: self.tool.to_string(),
                errors: std::mem::take(&mut self.errors),
            })
        }
    }
}

fn is_function_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Read a string argument that validation has already checked
pub(crate) fn str_arg<'v>(tool: &str, args: &'v Value, field: &str) -> Result<&'v str, ValidationFailure> {
    args.get(field).and_then(Value::as_str).ok_or_else(|| {
        ValidationFailure::single(
            tool,
            ValidationError::new(field, "is required").with_code("required"),
        )
    })
}

/// Decode validated arguments into a request type
pub(crate) fn decode<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T, ValidationFailure> {
    let args = if args.is_null() {
        Value::Object(Map::new())
    } else {
        args.clone()
    };
    serde_json::from_value(args).map_err(|e| {
        ValidationFailure::single(
            tool,
            ValidationError::new("arguments", e.to_string()).with_code("type"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_id() {
        let args = json!({ "assistant_id": "asst_123" });
        assert!(ArgValidator::new("t", &args).required_id("assistant_id", "asst_").finish().is_ok());

        let args = json!({ "assistant_id": "thread_123" });
        let err = ArgValidator::new("t", &args)
            .required_id("assistant_id", "asst_")
            .finish()
            .unwrap_err();
        assert_eq!(err.errors[0].code.as_deref(), Some("format"));

        let args = json!({});
        let err = ArgValidator::new("t", &args)
            .required_id("assistant_id", "asst_")
            .finish()
            .unwrap_err();
        assert_eq!(err.errors[0].code.as_deref(), Some("required"));
    }

    #[test]
    fn test_bare_prefix_rejected() {
        let args = json!({ "thread_id": "thread_" });
        assert!(ArgValidator::new("t", &args).required_id("thread_id", "thread_").finish().is_err());
    }

    #[test]
    fn test_errors_accumulate() {
        let args = json!({ "limit": 0, "order": "sideways", "metadata": { "k": 1 } });
        let err = ArgValidator::new("assistant-list", &args)
            .pagination("asst_")
            .optional_metadata()
            .finish()
            .unwrap_err();

        assert_eq!(err.tool, "assistant-list");
        assert_eq!(err.errors.len(), 3);
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn test_non_object_arguments() {
        let args = json!([1, 2]);
        let err = ArgValidator::new("t", &args).finish().unwrap_err();
        assert_eq!(err.errors[0].field, "arguments");

        assert!(ArgValidator::new("t", &Value::Null).finish().is_ok());
    }

    #[test]
    fn test_metadata_limits() {
        let mut big = serde_json::Map::new();
        for i in 0..17 {
            big.insert(format!("k{}", i), json!("v"));
        }
        let args = json!({ "metadata": big });
        assert!(ArgValidator::new("t", &args).optional_metadata().finish().is_err());

        let args = json!({ "metadata": { "k": "x".repeat(513) } });
        assert!(ArgValidator::new("t", &args).optional_metadata().finish().is_err());

        let args = json!({ "metadata": { "team": "search" } });
        assert!(ArgValidator::new("t", &args).optional_metadata().finish().is_ok());
    }

    #[test]
    fn test_tools_array() {
        let args = json!({ "tools": [
            { "type": "code_interpreter" },
            { "type": "function", "function": { "name": "get_weather" } }
        ]});
        assert!(ArgValidator::new("t", &args).optional_tools().finish().is_ok());

        let args = json!({ "tools": [{ "type": "retrieval" }, { "type": "function", "function": {} }] });
        let err = ArgValidator::new("t", &args).optional_tools().finish().unwrap_err();
        assert_eq!(err.errors.len(), 2);
        assert_eq!(err.errors[0].field, "tools[0].type");
    }

    #[test]
    fn test_tool_outputs() {
        let args = json!({ "tool_outputs": [] });
        assert!(ArgValidator::new("t", &args).required_tool_outputs().finish().is_err());

        let args = json!({ "tool_outputs": [{ "tool_call_id": "call_1", "output": "ok" }] });
        assert!(ArgValidator::new("t", &args).required_tool_outputs().finish().is_ok());
    }

    #[test]
    fn test_number_range() {
        let args = json!({ "temperature": 2.5 });
        assert!(ArgValidator::new("t", &args)
            .optional_number("temperature", 0.0, 2.0)
            .finish()
            .is_err());
    }

    #[test]
    fn test_decode_reports_type_errors() {
        #[derive(Debug, Deserialize)]
        struct Req {
            #[allow(dead_code)]
            model: String,
        }
        let err = decode::<Req>("t", &json!({ "model": 3 })).unwrap_err();
        assert_eq!(err.errors[0].field, "arguments");
    }
}
