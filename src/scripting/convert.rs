//! Lua 值与 [`ScriptValue`] 之间的转换

use crate::bindings::ScriptValue;
use crate::scripting::{BindingRuntime, ObjectHandle};
use mlua::{Lua, Table, Value};

/// Pushes a marshalled value into Lua.
///
/// Object references become the canonical object handle; lists become
/// sequence tables.
pub fn to_lua(lua: &Lua, runtime: &BindingRuntime, value: ScriptValue) -> mlua::Result<Value> {
    Ok(match value {
        ScriptValue::Nil | ScriptValue::Foreign(_) => Value::Nil,
        ScriptValue::Boolean(value) => Value::Boolean(value),
        ScriptValue::Integer(value) => Value::Integer(value),
        ScriptValue::Number(value) => Value::Number(value),
        ScriptValue::String(value) => Value::String(lua.create_string(&value)?),
        ScriptValue::Object(object) if object.is_null() => Value::Nil,
        ScriptValue::Object(object) => Value::UserData(runtime.object_handle(lua, object)?),
        ScriptValue::List(items) => {
            let table = lua.create_table()?;
            for (index, item) in items.into_iter().enumerate() {
                table.raw_set(index + 1, to_lua(lua, runtime, item)?)?;
            }
            Value::Table(table)
        }
    })
}

/// Reads a Lua value for marshalling.
///
/// Values with no script-side counterpart become [`ScriptValue::Foreign`]
/// so the binding can report a type mismatch. Only a top-level table is
/// read as a list; it must be a proper sequence.
pub fn from_lua(value: &Value) -> mlua::Result<ScriptValue> {
    match value {
        Value::Table(table) => sequence(table),
        other => scalar(other),
    }
}

/// `1..=n` 连续且没有其他键
fn sequence(table: &Table) -> mlua::Result<ScriptValue> {
    let len = table.raw_len();
    let mut keys = 0usize;
    for pair in table.clone().pairs::<Value, Value>() {
        let (key, _) = pair?;
        let in_range = matches!(key, Value::Integer(i) if i >= 1 && (i as u64) <= len as u64);
        if !in_range {
            return Ok(ScriptValue::Foreign("non-sequence table"));
        }
        keys += 1;
    }
    if keys != len {
        return Ok(ScriptValue::Foreign("non-sequence table"));
    }

    let mut items = Vec::with_capacity(len);
    for index in 1..=len {
        items.push(scalar(&table.raw_get::<Value>(index)?)?);
    }
    Ok(ScriptValue::List(items))
}

fn scalar(value: &Value) -> mlua::Result<ScriptValue> {
    Ok(match value {
        Value::Nil => ScriptValue::Nil,
        Value::Boolean(value) => ScriptValue::Boolean(*value),
        Value::Integer(value) => ScriptValue::Integer(*value),
        Value::Number(value) => ScriptValue::Number(*value),
        Value::String(text) => {
            let text = text.to_str()?;
            ScriptValue::String(String::from(&*text))
        }
        Value::Table(_) => ScriptValue::Foreign("nested table"),
        Value::UserData(userdata) => match userdata.borrow::<ObjectHandle>() {
            Ok(handle) => ScriptValue::Object(handle.id()),
            Err(_) => ScriptValue::Foreign("userdata"),
        },
        other => ScriptValue::Foreign(other.type_name()),
    })
}

/// `tostring`-like rendering used by the console `print`.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(value) => value.to_string(),
        Value::Integer(value) => value.to_string(),
        Value::Number(value) => value.to_string(),
        Value::String(text) => match text.to_str() {
            Ok(text) => String::from(&*text),
            Err(_) => "<binary string>".to_string(),
        },
        other => format!("{}: {:p}", other.type_name(), other.to_pointer()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_from_lua() {
        let lua = Lua::new();
        assert_eq!(from_lua(&Value::Nil).unwrap(), ScriptValue::Nil);
        assert_eq!(from_lua(&Value::Integer(7)).unwrap(), ScriptValue::Integer(7));
        assert_eq!(from_lua(&Value::Number(0.5)).unwrap(), ScriptValue::Number(0.5));
        let text = Value::String(lua.create_string("hi").unwrap());
        assert_eq!(from_lua(&text).unwrap(), ScriptValue::String("hi".into()));
    }

    #[test]
    fn test_sequence_table_becomes_list() {
        let lua = Lua::new();
        let table: Value = lua.load("{ 1, true, 2.5 }").eval().unwrap();
        assert_eq!(
            from_lua(&table).unwrap(),
            ScriptValue::List(vec![
                ScriptValue::Integer(1),
                ScriptValue::Boolean(true),
                ScriptValue::Number(2.5),
            ])
        );
    }

    #[test]
    fn test_tables_with_holes_or_keys_are_refused() {
        let lua = Lua::new();
        for code in ["{ x = 5 }", "{ 7, nil, 9 }", "{ 1, 2, x = 3 }", "{ [0] = 1, 2 }"] {
            let table: Value = lua.load(code).eval().unwrap();
            assert_eq!(
                from_lua(&table).unwrap(),
                ScriptValue::Foreign("non-sequence table"),
                "{code}"
            );
        }
        let empty: Value = lua.load("{}").eval().unwrap();
        assert_eq!(from_lua(&empty).unwrap(), ScriptValue::List(vec![]));
    }

    #[test]
    fn test_nested_and_cyclic_tables_stop_at_one_level() {
        let lua = Lua::new();
        let cyclic: Value = lua.load("local t = {}; t[1] = t; return t").eval().unwrap();
        assert_eq!(
            from_lua(&cyclic).unwrap(),
            ScriptValue::List(vec![ScriptValue::Foreign("nested table")])
        );
        let nested: Value = lua.load("{ { 1 }, 2 }").eval().unwrap();
        assert_eq!(
            from_lua(&nested).unwrap(),
            ScriptValue::List(vec![ScriptValue::Foreign("nested table"), ScriptValue::Integer(2)])
        );
    }

    #[test]
    fn test_functions_are_foreign() {
        let lua = Lua::new();
        let function: Value = lua.load("function() end").eval().unwrap();
        assert_eq!(from_lua(&function).unwrap(), ScriptValue::Foreign("function"));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&Value::Boolean(true)), "true");
        assert_eq!(display_value(&Value::Integer(-3)), "-3");
    }
}
