//! 绑定单元测试共用的夹具

use crate::bindings::{BindingBase, MarshalContext, PropertyBinding, UnsignedOverflowPolicy};
use crate::diagnostics::BindingDiagnostics;
use property_bridge_reflection::{ClassMeta, InMemoryHost, ObjectId};
use std::sync::Arc;

pub(crate) struct Fixture {
    pub host: Arc<InMemoryHost>,
    pub class: Arc<ClassMeta>,
    pub object: ObjectId,
    pub diagnostics: BindingDiagnostics,
    pub overflow: UnsignedOverflowPolicy,
}

impl Fixture {
    pub fn new(class: &Arc<ClassMeta>) -> Self {
        let host = Arc::new(InMemoryHost::new());
        let object = host.spawn(class, format!("{}_0", class.name));
        Self::with_host(host, class, object)
    }

    pub fn at(id: ObjectId, class: &Arc<ClassMeta>) -> Self {
        let host = Arc::new(InMemoryHost::new());
        let object = host.spawn_at(id, class, format!("{}_0", class.name)).unwrap();
        Self::with_host(host, class, object)
    }

    fn with_host(host: Arc<InMemoryHost>, class: &Arc<ClassMeta>, object: ObjectId) -> Self {
        Self {
            host,
            class: Arc::clone(class),
            object,
            diagnostics: BindingDiagnostics::default(),
            overflow: UnsignedOverflowPolicy::default(),
        }
    }

    pub fn cx(&self) -> MarshalContext<'_> {
        MarshalContext::new(self.overflow, &self.diagnostics)
    }

    pub fn base(&self, name: &str) -> BindingBase {
        self.base_of(self.object, name)
    }

    pub fn base_of(&self, object: ObjectId, name: &str) -> BindingBase {
        let meta = Arc::clone(self.class.find_property(name).unwrap());
        BindingBase::new(self.host.clone(), object, meta).unwrap()
    }

    pub fn bind<B: PropertyBinding>(&self, name: &str) -> B {
        B::from_base(self.base(name)).unwrap()
    }

    pub fn bytes(&self, offset: usize, len: usize) -> Vec<u8> {
        self.host.raw_bytes(self.object, offset, len).unwrap()
    }

    pub fn offset_of(&self, name: &str) -> usize {
        self.class.find_property(name).unwrap().offset
    }

    pub fn destroy(&self) {
        assert!(self.host.destroy(self.object));
    }
}
