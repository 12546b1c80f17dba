// src/tools/builder.rs
// Builder for OpenAI-compatible function tool schemas (§6's tool catalogue
// format): {type:"function", function:{name, description, parameters}}.

use serde_json::{json, Value};

pub struct ToolBuilder {
    name: String,
    description: String,
    properties: Vec<(String, Value)>,
    required: Vec<String>,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            properties: Vec::new(),
            required: Vec::new(),
        }
    }

    pub fn property(mut self, name: impl Into<String>, schema: Value, required: bool) -> Self {
        let name = name.into();
        if required {
            self.required.push(name.clone());
        }
        self.properties.push((name, schema));
        self
    }

    pub fn build(self) -> Value {
        let mut properties_obj = serde_json::Map::new();
        for (name, schema) in self.properties {
            properties_obj.insert(name, schema);
        }

        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties_obj,
                    "required": self.required
                }
            }
        })
    }
}

pub mod properties {
    use serde_json::{json, Value};

    pub fn path(description: &str) -> Value {
        json!({ "type": "string", "description": description })
    }

    pub fn string(description: &str) -> Value {
        json!({ "type": "string", "description": description })
    }

    pub fn boolean(description: &str, default: bool) -> Value {
        json!({ "type": "boolean", "description": description, "default": default })
    }

    pub fn string_array(description: &str) -> Value {
        json!({ "type": "array", "items": {"type": "string"}, "description": description })
    }

    pub fn optional_integer(description: &str) -> Value {
        json!({ "type": "integer", "description": description })
    }
}
