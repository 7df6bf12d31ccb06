//! Explicit JSON-schema construction for tool inputs.
//!
//! Parameters without a default are required; native types map to the
//! JSON-schema primitives `string`, `integer`, `number` and `boolean`.

use serde_json::{Map, Value, json};

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn property(
        mut self,
        name: &str,
        kind: &str,
        description: &str,
        default: Option<Value>,
    ) -> Self {
        let mut prop = json!({"type": kind, "description": description});
        match default {
            Some(value) => {
                prop["default"] = value;
            }
            None => self.required.push(name.to_string()),
        }
        self.properties.insert(name.to_string(), prop);
        self
    }

    #[must_use]
    pub fn required_string(self, name: &str, description: &str) -> Self {
        self.property(name, "string", description, None)
    }

    #[must_use]
    pub fn optional_string(self, name: &str, description: &str, default: &str) -> Self {
        self.property(name, "string", description, Some(json!(default)))
    }

    #[must_use]
    pub fn optional_bool(self, name: &str, description: &str, default: bool) -> Self {
        self.property(name, "boolean", description, Some(json!(default)))
    }

    #[must_use]
    pub fn required_integer(self, name: &str, description: &str) -> Self {
        self.property(name, "integer", description, None)
    }

    #[must_use]
    pub fn optional_integer(self, name: &str, description: &str, default: i64) -> Self {
        self.property(name, "integer", description, Some(json!(default)))
    }

    #[must_use]
    pub fn optional_number(self, name: &str, description: &str, default: f64) -> Self {
        self.property(name, "number", description, Some(json!(default)))
    }

    #[must_use]
    pub fn build(self) -> Value {
        json!({
            "type": "object",
            "properties": self.properties,
            "required": self.required,
        })
    }
}
