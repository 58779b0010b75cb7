//! Tool Schema - 参数模式
//!
//! One schema per tool drives both sides:
//! - `to_value()` renders the JSON Schema handed to the LLM
//! - `decode()` validates untyped arguments, fills declared defaults and
//!   rejects unknown fields before serde builds the typed request
//!
//! Because the same declaration serves both, the description the model sees
//! and what the decoder accepts cannot drift apart.

use serde_json::{Map, Value, json};

use super::ToolError;

/// 参数类型
#[derive(Debug, Clone, PartialEq)]
pub enum ArgType {
    String,
    /// Non-negative whole number
    Integer,
    Boolean,
    /// String restricted to the listed values
    Enum(Vec<&'static str>),
    Array(Box<ArgType>),
    Object(Vec<ArgSpec>),
}

impl ArgType {
    fn to_value(&self) -> Value {
        match self {
            Self::String => json!({ "type": "string" }),
            Self::Integer => json!({ "type": "integer", "minimum": 0 }),
            Self::Boolean => json!({ "type": "boolean" }),
            Self::Enum(values) => json!({ "type": "string", "enum": values }),
            Self::Array(items) => json!({ "type": "array", "items": items.to_value() }),
            Self::Object(fields) => object_schema(fields),
        }
    }
}

/// 参数定义
#[derive(Debug, Clone, PartialEq)]
pub struct ArgSpec {
    pub name: String,
    pub ty: ArgType,
    pub description: String,
    pub required: bool,
    pub default: Option<Value>,
}

impl ArgSpec {
    pub fn new(name: impl Into<String>, ty: ArgType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            description: description.into(),
            required: false,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    fn to_value(&self) -> Value {
        let mut value = self.ty.to_value();
        if let Value::Object(map) = &mut value {
            map.insert("description".to_string(), Value::String(self.description.clone()));
            if let Some(default) = &self.default {
                map.insert("default".to_string(), default.clone());
            }
        }
        value
    }
}

/// Tool Schema 完整定义
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolSchema {
    pub args: Vec<ArgSpec>,
}

impl ToolSchema {
    pub fn arg(&self, name: &str) -> Option<&ArgSpec> {
        self.args.iter().find(|spec| spec.name == name)
    }

    /// JSON Schema for the provider
    pub fn to_value(&self) -> Value {
        object_schema(&self.args)
    }

    /// Validate and normalize untyped arguments
    pub fn decode(&self, args: &Map<String, Value>) -> Result<Map<String, Value>, ToolError> {
        decode_object(&self.args, args, "")
    }
}

fn object_schema(fields: &[ArgSpec]) -> Value {
    let properties: Map<String, Value> = fields
        .iter()
        .map(|spec| (spec.name.clone(), spec.to_value()))
        .collect();
    let required: Vec<&str> = fields
        .iter()
        .filter(|spec| spec.required)
        .map(|spec| spec.name.as_str())
        .collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

fn decode_object(
    specs: &[ArgSpec],
    input: &Map<String, Value>,
    prefix: &str,
) -> Result<Map<String, Value>, ToolError> {
    if let Some(unknown) = input.keys().find(|key| !specs.iter().any(|s| &s.name == *key)) {
        return Err(ToolError::invalid(format!("{}{}", prefix, unknown), "unexpected field"));
    }

    let mut output = Map::new();
    for spec in specs {
        let field = format!("{}{}", prefix, spec.name);
        match input.get(&spec.name) {
            None | Some(Value::Null) => {
                if let Some(default) = &spec.default {
                    output.insert(spec.name.clone(), default.clone());
                } else if spec.required {
                    return Err(ToolError::invalid(field, "missing required field"));
                }
            }
            Some(value) => {
                output.insert(spec.name.clone(), check_value(&spec.ty, value, &field)?);
            }
        }
    }
    Ok(output)
}

fn check_value(ty: &ArgType, value: &Value, field: &str) -> Result<Value, ToolError> {
    let mismatch = |expected: &str| {
        ToolError::invalid(field, format!("expected {}, got {}", expected, type_name(value)))
    };

    match ty {
        ArgType::String => value.is_string().then(|| value.clone()).ok_or_else(|| mismatch("string")),
        ArgType::Boolean => value.is_boolean().then(|| value.clone()).ok_or_else(|| mismatch("boolean")),
        ArgType::Integer => {
            if let Some(n) = value.as_u64() {
                return Ok(Value::from(n));
            }
            // 10.0 from a model is still 10
            match value.as_f64() {
                Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
                    Ok(Value::from(f as u64))
                }
                _ => Err(mismatch("non-negative integer")),
            }
        }
        ArgType::Enum(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => Ok(value.clone()),
            _ => Err(ToolError::invalid(
                field,
                format!("expected one of {}", allowed.join(", ")),
            )),
        },
        ArgType::Array(items) => {
            let array = value.as_array().ok_or_else(|| mismatch("array"))?;
            array
                .iter()
                .enumerate()
                .map(|(i, item)| check_value(items, item, &format!("{}[{}]", field, i)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        ArgType::Object(fields) => {
            let object = value.as_object().ok_or_else(|| mismatch("object"))?;
            decode_object(fields, object, &format!("{}.", field)).map(Value::Object)
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_u64() || n.is_i64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Tool Schema 构建器
#[derive(Debug, Default)]
pub struct ToolSchemaBuilder {
    schema: ToolSchema,
}

impl ToolSchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, spec: ArgSpec) -> Self {
        self.schema.args.push(spec);
        self
    }

    /// 添加必需字符串参数
    pub fn required_string(self, name: &str, description: &str) -> Self {
        self.push(ArgSpec::new(name, ArgType::String, description).required())
    }

    /// 添加可选字符串参数
    pub fn param_string(self, name: &str, description: &str) -> Self {
        self.push(ArgSpec::new(name, ArgType::String, description))
    }

    pub fn string_default(self, name: &str, description: &str, default: &str) -> Self {
        self.push(ArgSpec::new(name, ArgType::String, description).with_default(json!(default)))
    }

    pub fn integer_default(self, name: &str, description: &str, default: u64) -> Self {
        self.push(ArgSpec::new(name, ArgType::Integer, description).with_default(json!(default)))
    }

    pub fn boolean_default(self, name: &str, description: &str, default: bool) -> Self {
        self.push(ArgSpec::new(name, ArgType::Boolean, description).with_default(json!(default)))
    }

    pub fn required_array(self, name: &str, description: &str, items: ArgType) -> Self {
        self.push(ArgSpec::new(name, ArgType::Array(Box::new(items)), description).required())
    }

    pub fn build(self) -> ToolSchema {
        self.schema
    }
}
