use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

/// Opaque value carried by a [`TaskItem`] payload or property.
pub type ItemValue = Arc<dyn Any + Send + Sync>;

/// The key + payload + property-bag unit of work submitted to the
/// scheduler.
///
/// Identity is the key, lazily generated when absent. Items are mutated
/// only before submission; once a timer is armed the scheduler shares the
/// item immutably with its callbacks, so reads are race-free by
/// construction.
#[derive(Default)]
pub struct TaskItem {
    key: String,
    value: Option<ItemValue>,
    properties: HashMap<String, ItemValue>,
}

impl TaskItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = key.into();
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn ensure_key(&mut self) {
        if self.key.is_empty() {
            self.key = Uuid::new_v4().to_string();
        }
    }

    pub fn set_value(&mut self, value: ItemValue) {
        self.value = Some(value);
    }

    pub fn value(&self) -> Option<&ItemValue> {
        self.value.as_ref()
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: ItemValue) {
        self.properties.insert(name.into(), value);
    }

    pub fn property(&self, name: &str) -> Option<&ItemValue> {
        self.properties.get(name)
    }

    /// Convenience lookup for boolean-typed properties; absent or
    /// differently-typed values read as `false`.
    pub fn bool_property(&self, name: &str) -> bool {
        self.properties
            .get(name)
            .and_then(|v| v.downcast_ref::<bool>())
            .copied()
            .unwrap_or(false)
    }
}
