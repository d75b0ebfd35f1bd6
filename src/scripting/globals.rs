//! 脚本全局函数

use crate::core::error::BridgeError;
use crate::scripting::{convert, BindingRuntime};
use mlua::{AnyUserData, Function, Lua, Value, Variadic};
use property_bridge_reflection::ObjectId;

/// Registers the bridge globals in `lua`.
///
/// - `FindObject(name)` handle of the named live object, or `nil`
/// - `GetObjectById(id)` handle of a live object by identity, or `nil`
/// - `ExecuteAtEndOfFrame(fn)` queues `fn` for the end-of-frame sync point
/// - `print(...)` routes to the `script.console` log target
pub fn install(lua: &Lua) -> mlua::Result<()> {
    let globals = lua.globals();

    globals.set(
        "FindObject",
        lua.create_function(|lua, name: String| -> mlua::Result<Option<AnyUserData>> {
            let runtime = BindingRuntime::from_lua(lua)?;
            match runtime.host().find_object(&name) {
                Some(object) => runtime.object_handle(lua, object).map(Some),
                None => Ok(None),
            }
        })?,
    )?;

    globals.set(
        "GetObjectById",
        lua.create_function(|lua, id: i64| -> mlua::Result<Option<AnyUserData>> {
            let runtime = BindingRuntime::from_lua(lua)?;
            let object = ObjectId(id as u64);
            if object.is_null() || !runtime.host().is_live(object) {
                return Ok(None);
            }
            runtime.object_handle(lua, object).map(Some)
        })?,
    )?;

    globals.set(
        "ExecuteAtEndOfFrame",
        lua.create_function(|lua, callback: Function| {
            let runtime = BindingRuntime::from_lua(lua)?;
            runtime.frame().defer("ExecuteAtEndOfFrame", move || {
                callback.call::<()>(()).map_err(BridgeError::from)
            });
            Ok(())
        })?,
    )?;

    globals.set(
        "print",
        lua.create_function(|_, args: Variadic<Value>| {
            let line = args
                .iter()
                .map(convert::display_value)
                .collect::<Vec<_>>()
                .join("\t");
            tracing::info!(target: "script.console", "{}", line);
            Ok(())
        })?,
    )?;

    Ok(())
}
