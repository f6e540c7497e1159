//! Operation definitions: typed parameters, expected output shape, tier.

use market_router_core::{OperationId, Tier};
use serde_json::{Map, Value, json};

use crate::openai::FunctionDefinition;

/// JSON type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamKind {
    /// JSON Schema `type` keyword for this kind.
    #[must_use]
    pub const fn json_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

/// Where a parameter is placed in the upstream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    Query,
    Path,
}

/// One named, typed input parameter of an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
    pub description: &'static str,
    pub location: ParamLocation,
    pub allowed: &'static [&'static str],
}

impl ParamSpec {
    /// An optional query parameter.
    #[must_use]
    pub const fn query(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
            description,
            location: ParamLocation::Query,
            allowed: &[],
        }
    }

    /// A path parameter. Path parameters are always required.
    #[must_use]
    pub const fn path(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::String,
            required: true,
            default: None,
            description,
            location: ParamLocation::Path,
            allowed: &[],
        }
    }

    /// Mark the parameter as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set a default applied when the argument is absent.
    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Restrict a string parameter to a fixed set of values.
    #[must_use]
    pub fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        self.allowed = allowed;
        self
    }

    fn json_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), Value::from(self.kind.json_type()));
        schema.insert("description".into(), Value::from(self.description));
        if !self.allowed.is_empty() {
            schema.insert("enum".into(), json!(self.allowed));
        }
        if let Some(default) = &self.default {
            schema.insert("default".into(), default.clone());
        }
        Value::Object(schema)
    }
}

/// Top-level JSON kind of an upstream response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Object,
    Array,
    Any,
}

/// Structural description of the expected upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputShape {
    pub kind: JsonKind,
    pub required_keys: &'static [&'static str],
}

impl OutputShape {
    /// An object that must contain `keys`.
    #[must_use]
    pub const fn object(required_keys: &'static [&'static str]) -> Self {
        Self {
            kind: JsonKind::Object,
            required_keys,
        }
    }

    /// A top-level array.
    #[must_use]
    pub const fn array() -> Self {
        Self {
            kind: JsonKind::Array,
            required_keys: &[],
        }
    }

    /// Any non-null JSON value.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            kind: JsonKind::Any,
            required_keys: &[],
        }
    }

    /// Check a response against the shape.
    ///
    /// # Errors
    ///
    /// Returns a description of the first mismatch.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        if value.is_null() {
            return Err("response body is null".to_string());
        }
        match (self.kind, value) {
            (JsonKind::Any, _) | (JsonKind::Array, Value::Array(_)) => Ok(()),
            (JsonKind::Object, Value::Object(map)) => self
                .required_keys
                .iter()
                .find(|key| !map.contains_key(**key))
                .map_or(Ok(()), |key| Err(format!("missing key '{key}'"))),
            (JsonKind::Object, _) => Err("expected a JSON object".to_string()),
            (JsonKind::Array, _) => Err("expected a JSON array".to_string()),
        }
    }
}

/// A market-data operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub id: OperationId,
    pub description: &'static str,
    /// Path relative to the API base, with `{placeholder}` segments.
    pub upstream_path: &'static str,
    pub params: Vec<ParamSpec>,
    pub output: OutputShape,
    /// Minimum subscription tier, `None` when unclassified.
    pub min_tier: Option<Tier>,
}

impl Operation {
    /// Start building an operation. Defaults: no parameters, any output, unclassified tier.
    #[must_use]
    pub fn new(id: &'static str, upstream_path: &'static str, description: &'static str) -> Self {
        Self {
            id: OperationId::from_static(id),
            description,
            upstream_path,
            params: Vec::new(),
            output: OutputShape::any(),
            min_tier: None,
        }
    }

    /// Add a parameter.
    #[must_use]
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Add several parameters.
    #[must_use]
    pub fn params(mut self, params: impl IntoIterator<Item = ParamSpec>) -> Self {
        self.params.extend(params);
        self
    }

    /// Set the expected output shape.
    #[must_use]
    pub fn output(mut self, output: OutputShape) -> Self {
        self.output = output;
        self
    }

    /// Set the minimum tier.
    #[must_use]
    pub fn tier(mut self, tier: Tier) -> Self {
        self.min_tier = Some(tier);
        self
    }

    /// Look up a parameter by name.
    #[must_use]
    pub fn find_param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// `{placeholder}` names appearing in `upstream_path`, in order.
    pub fn placeholders(&self) -> impl Iterator<Item = &'static str> {
        let path = self.upstream_path;
        path.split('/').filter_map(|segment| {
            segment
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix('}'))
        })
    }

    /// Flattened JSON Schema for the operation's arguments.
    ///
    /// Path and query parameters share one object; unknown properties are
    /// rejected.
    #[must_use]
    pub fn input_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.to_string(), p.json_schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Function definition presented to the language model.
    #[must_use]
    pub fn function_definition(&self) -> FunctionDefinition {
        FunctionDefinition {
            name: self.id.to_string(),
            description: self.description.to_string(),
            parameters: self.input_json_schema(),
        }
    }

    /// Text embedded into the semantic index for this operation.
    #[must_use]
    pub fn source_text(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|p| p.name)
            .collect::<Vec<_>>()
            .join(", ");
        if params.is_empty() {
            format!("{}: {}", self.id, self.description)
        } else {
            format!("{}: {}\nParameters: {params}", self.id, self.description)
        }
    }
}
