//! 脚本无关的中间值
//!
//! 绑定只与 [`ScriptValue`] 打交道，Lua 值在脚本边界处转换。

use property_bridge_reflection::ObjectId;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
    /// Reference to a live, non-null native object.
    Object(ObjectId),
    List(Vec<ScriptValue>),
    /// A script value with no native counterpart (functions, threads, ...).
    Foreign(&'static str),
}

impl ScriptValue {
    /// Script-facing type name, used in `TypeMismatch` messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Nil => "nil",
            ScriptValue::Boolean(_) => "boolean",
            ScriptValue::Integer(_) => "integer",
            ScriptValue::Number(_) => "number",
            ScriptValue::String(_) => "string",
            ScriptValue::Object(_) => "object",
            ScriptValue::List(_) => "table",
            ScriptValue::Foreign(name) => name,
        }
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Nil => f.write_str("nil"),
            ScriptValue::Boolean(b) => write!(f, "{b}"),
            ScriptValue::Integer(i) => write!(f, "{i}"),
            ScriptValue::Number(n) => write!(f, "{n}"),
            ScriptValue::String(s) => write!(f, "{s:?}"),
            ScriptValue::Object(id) => write!(f, "object {id}"),
            ScriptValue::List(items) => write!(f, "table[{}]", items.len()),
            ScriptValue::Foreign(name) => f.write_str(name),
        }
    }
}

impl From<bool> for ScriptValue {
    fn from(value: bool) -> Self {
        ScriptValue::Boolean(value)
    }
}

impl From<i64> for ScriptValue {
    fn from(value: i64) -> Self {
        ScriptValue::Integer(value)
    }
}

impl From<f64> for ScriptValue {
    fn from(value: f64) -> Self {
        ScriptValue::Number(value)
    }
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        ScriptValue::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(ScriptValue::Integer(1).type_name(), "integer");
        assert_eq!(ScriptValue::List(vec![]).type_name(), "table");
        assert_eq!(ScriptValue::Foreign("function").type_name(), "function");
    }

    #[test]
    fn test_display_for_messages() {
        assert_eq!(ScriptValue::Integer(300).to_string(), "300");
        assert_eq!(ScriptValue::from("Red").to_string(), "\"Red\"");
        assert_eq!(ScriptValue::Number(1.5).to_string(), "1.5");
    }
}
