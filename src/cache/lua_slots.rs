//! Lua 弱值表槽位存储

use crate::cache::{SlotIndex, SlotStorage};
use mlua::{AnyUserData, Lua, Table, Value};

/// Handles live in a Lua table with weak values, so an entry disappears
/// once no script holds the handle and the collector has run.
pub struct LuaSlots {
    table: Table,
}

impl LuaSlots {
    pub fn new(lua: &Lua) -> mlua::Result<Self> {
        let table = lua
            .load("return setmetatable({}, { __mode = 'v' })")
            .set_name("=remote_object_cache")
            .eval::<Table>()?;
        Ok(Self { table })
    }

    fn lua_index(slot: SlotIndex) -> i64 {
        i64::from(slot.0) + 1
    }
}

impl SlotStorage for LuaSlots {
    type Handle = AnyUserData;
    type Error = mlua::Error;

    fn load(&self, slot: SlotIndex) -> mlua::Result<Option<AnyUserData>> {
        self.table.raw_get(Self::lua_index(slot))
    }

    fn store(&mut self, slot: SlotIndex, handle: &AnyUserData) -> mlua::Result<()> {
        self.table.raw_set(Self::lua_index(slot), handle.clone())
    }

    fn release(&mut self, slot: SlotIndex) -> mlua::Result<()> {
        self.table.raw_set(Self::lua_index(slot), Value::Nil)
    }
}
