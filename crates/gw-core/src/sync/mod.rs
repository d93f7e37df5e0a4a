use std::sync::Arc;
use parking_lot::RwLock;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::events::events::StateChanged;
use crate::events::{handler_from_fn, EventBus};

/// Last value pushed to the front end for each synchronized field
pub struct SyncManager {
    /// Synced values in first-sync order
    synced: Arc<RwLock<IndexMap<String, Value>>>,
}

impl SyncManager {
    /// Create a new synchronization manager
    pub fn new() -> Self {
        Self {
            synced: Arc::new(RwLock::new(IndexMap::new())),
        }
    }

    /// Record a value as synced to the front end
    pub fn record(&self, field: &str, value: Value) {
        self.synced.write().insert(field.to_string(), value);
    }

    /// Full synced state, e.g. for a front end that reconnects
    pub fn snapshot(&self) -> Map<String, Value> {
        self.synced
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Record every `StateChanged` published on `bus`
    pub fn attach(self: &Arc<Self>, bus: &EventBus) {
        let sync = Arc::clone(self);
        bus.subscribe::<StateChanged>(handler_from_fn(move |event| {
            if let Some(changed) = event.as_any().downcast_ref::<StateChanged>() {
                sync.record(changed.field, changed.value.clone());
            }
        }));
    }
}

impl Default for SyncManager {
    fn default() -> Self {
        Self::new()
    }
}
