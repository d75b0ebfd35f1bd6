//! 实时视图过滤器

use crate::core::utils::contains_ignore_case;
use property_bridge_reflection::ObjectDescriptor;

/// Decides, before an entry is listed, whether to hide it.
pub trait LiveViewFilter {
    /// `true` hides the object.
    fn pre_eval(&self, object: &ObjectDescriptor) -> bool;
}

/// Hides class-default and archetype objects unless enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncludeDefaultObjects {
    pub enabled: bool,
}

impl LiveViewFilter for IncludeDefaultObjects {
    fn pre_eval(&self, object: &ObjectDescriptor) -> bool {
        !self.enabled && object.flags.is_default_or_archetype()
    }
}

/// Hides objects whose name does not contain `text` (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    pub text: String,
}

impl SearchFilter {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl LiveViewFilter for SearchFilter {
    fn pre_eval(&self, object: &ObjectDescriptor) -> bool {
        !contains_ignore_case(&object.name, &self.text)
    }
}
