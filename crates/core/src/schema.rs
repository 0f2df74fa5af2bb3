//! Parameter schemas: the declared argument shape of a tool.
//!
//! A schema is an ordered list of parameters. It is the only valid shape of
//! the arguments a tool receives: validation coerces supplied values to the
//! declared types, rejects missing required parameters, and discards keys the
//! schema does not name.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::error::ToolError;

/// Semantic type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    /// The JSON Schema type keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Coerce a JSON value to this type, if it can be read as one.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Self::String, Value::String(_)) => Some(value.clone()),
            (Self::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (Self::String, Value::Bool(b)) => Some(Value::String(b.to_string())),

            (Self::Integer, Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::from(i))
                } else {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| Value::from(f as i64))
                }
            }
            (Self::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),

            (Self::Number, Value::Number(_)) => Some(value.clone()),
            (Self::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),

            (Self::Boolean, Value::Bool(_)) => Some(value.clone()),
            (Self::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(Value::Bool(true)),
                "false" | "no" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            (Self::Boolean, Value::Number(n)) => match n.as_i64() {
                Some(1) => Some(Value::Bool(true)),
                Some(0) => Some(Value::Bool(false)),
                _ => None,
            },

            (Self::Array, Value::Array(_)) => Some(value.clone()),
            (Self::Object, Value::Object(_)) => Some(value.clone()),
            (Self::Array | Self::Object, Value::String(s)) => {
                let parsed: Value = serde_json::from_str(s.trim()).ok()?;
                match (self, &parsed) {
                    (Self::Array, Value::Array(_)) | (Self::Object, Value::Object(_)) => Some(parsed),
                    _ => None,
                }
            }

            _ => None,
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub param_type: ParamType,
    #[serde(default)]
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Ordered parameter list of a tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    params: Vec<ParameterSpec>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required parameter.
    pub fn required(mut self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.params.push(ParameterSpec {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
            default: None,
        });
        self
    }

    /// Add an optional parameter, with an optional default applied at invocation.
    pub fn optional(
        mut self,
        name: &str,
        param_type: ParamType,
        description: &str,
        default: Option<Value>,
    ) -> Self {
        self.params.push(ParameterSpec {
            name: name.into(),
            param_type,
            description: description.into(),
            required: false,
            default,
        });
        self
    }

    pub fn params(&self) -> &[ParameterSpec] {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Validate and coerce model-supplied arguments for `tool`.
    ///
    /// The result contains exactly the required parameters plus the optional
    /// ones that were supplied. Unknown keys are discarded and `null` counts
    /// as absent.
    pub fn validate(&self, tool: &str, arguments: &Map<String, Value>) -> Result<Map<String, Value>, ToolError> {
        let mut validated = Map::new();

        for spec in &self.params {
            match arguments.get(&spec.name) {
                None | Some(Value::Null) => {
                    if spec.required {
                        return Err(ToolError::InvalidArguments {
                            tool: tool.into(),
                            field: spec.name.clone(),
                            reason: "missing required parameter".into(),
                        });
                    }
                }
                Some(value) => {
                    let coerced = spec.param_type.coerce(value).ok_or_else(|| ToolError::InvalidArguments {
                        tool: tool.into(),
                        field: spec.name.clone(),
                        reason: format!("expected {}, got {}", spec.param_type, json_kind(value)),
                    })?;
                    validated.insert(spec.name.clone(), coerced);
                }
            }
        }

        Ok(validated)
    }

    /// Fill declared defaults for optional parameters that were not supplied.
    pub fn apply_defaults(&self, arguments: &Map<String, Value>) -> Map<String, Value> {
        let mut filled = arguments.clone();
        for spec in &self.params {
            if let Some(default) = &spec.default {
                filled.entry(spec.name.clone()).or_insert_with(|| default.clone());
            }
        }
        filled
    }

    /// Render as a JSON Schema object (for native function calling).
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for spec in &self.params {
            let mut prop = Map::new();
            prop.insert("type".into(), Value::String(spec.param_type.as_str().into()));
            if !spec.description.is_empty() {
                prop.insert("description".into(), Value::String(spec.description.clone()));
            }
            if let Some(default) = &spec.default {
                prop.insert("default".into(), default.clone());
            }
            properties.insert(spec.name.clone(), Value::Object(prop));
        }

        let required: Vec<Value> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| Value::String(p.name.clone()))
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Render one readable line per parameter for the prompt catalogue.
    pub fn render_lines(&self) -> Vec<String> {
        self.params
            .iter()
            .map(|p| {
                let mut traits = format!(
                    "{}, {}",
                    p.param_type,
                    if p.required { "required" } else { "optional" }
                );
                if let Some(default) = &p.default {
                    traits.push_str(&format!(", default {default}"));
                }
                let mut line = format!("{} ({traits})", p.name);
                if !p.description.is_empty() {
                    line.push_str(": ");
                    line.push_str(&p.description);
                }
                line
            })
            .collect()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
