//! JSON Schema builders for tool input definitions

use serde_json::{Map, Value, json};

use super::validation::{
    MAX_DESCRIPTION_LEN, MAX_INSTRUCTIONS_LEN, MAX_METADATA_PAIRS, MAX_METADATA_VALUE_LEN,
    MAX_NAME_LEN,
};

/// Builds an `object` schema property by property
#[derive(Debug, Default)]
pub(crate) struct SchemaBuilder {
    properties: Map<String, Value>,
    required: Vec<&'static str>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(mut self, field: &'static str, schema: Value, required: bool) -> Self {
        self.properties.insert(field.to_string(), schema);
        if required {
            self.required.push(field);
        }
        self
    }

    pub fn id(self, field: &'static str, prefix: &str, description: &str) -> Self {
        self.property(
            field,
            json!({
                "type": "string",
                "pattern": format!("^{}[^\\s/]+$", prefix),
                "description": description,
            }),
            true,
        )
    }

    pub fn string(self, field: &'static str, description: &str, required: bool) -> Self {
        self.property(
            field,
            json!({ "type": "string", "description": description }),
            required,
        )
    }

    pub fn name(self) -> Self {
        self.property(
            "name",
            json!({ "type": "string", "maxLength": MAX_NAME_LEN, "description": "Display name" }),
            false,
        )
    }

    pub fn description(self) -> Self {
        self.property(
            "description",
            json!({ "type": "string", "maxLength": MAX_DESCRIPTION_LEN, "description": "Short description" }),
            false,
        )
    }

    pub fn instructions(self, description: &str) -> Self {
        self.property(
            "instructions",
            json!({ "type": "string", "maxLength": MAX_INSTRUCTIONS_LEN, "description": description }),
            false,
        )
    }

    pub fn sampling(self) -> Self {
        self.property(
            "temperature",
            json!({ "type": "number", "minimum": 0, "maximum": 2, "description": "Sampling temperature" }),
            false,
        )
        .property(
            "top_p",
            json!({ "type": "number", "minimum": 0, "maximum": 1, "description": "Nucleus sampling mass" }),
            false,
        )
    }

    pub fn metadata(self) -> Self {
        self.property(
            "metadata",
            json!({
                "type": "object",
                "maxProperties": MAX_METADATA_PAIRS,
                "additionalProperties": { "type": "string", "maxLength": MAX_METADATA_VALUE_LEN },
                "description": "Up to 16 key/value pairs",
            }),
            false,
        )
    }

    pub fn assistant_tools(self) -> Self {
        self.property(
            "tools",
            json!({
                "type": "array",
                "maxItems": 128,
                "items": {
                    "type": "object",
                    "properties": {
                        "type": { "type": "string", "enum": ["code_interpreter", "file_search", "function"] },
                        "function": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "description": { "type": "string" },
                                "parameters": { "type": "object" }
                            },
                            "required": ["name"]
                        }
                    },
                    "required": ["type"]
                },
                "description": "Tools the assistant may call",
            }),
            false,
        )
    }

    pub fn pagination(self, cursor_prefix: &str) -> Self {
        self.property(
            "limit",
            json!({ "type": "integer", "minimum": 1, "maximum": 100, "default": 20 }),
            false,
        )
        .property(
            "order",
            json!({ "type": "string", "enum": ["asc", "desc"], "default": "desc" }),
            false,
        )
        .property(
            "after",
            json!({ "type": "string", "pattern": format!("^{}", cursor_prefix), "description": "Cursor: return items after this id" }),
            false,
        )
        .property(
            "before",
            json!({ "type": "string", "pattern": format!("^{}", cursor_prefix), "description": "Cursor: return items before this id" }),
            false,
        )
    }

    pub fn build(self) -> Value {
        json!({
            "type": "object",
            "properties": Value::Object(self.properties),
            "required": self.required,
        })
    }
}
