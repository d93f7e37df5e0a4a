//! Shared table handle with update listeners

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::{Table, TableData};
use crate::config::TableOptions;
use crate::schema::ColumnSchema;
use crate::DataError;

/// Called after every successful mutation of a table
pub type UpdateCallback = Arc<dyn Fn() + Send + Sync>;

struct Hosted {
    table: RwLock<Table>,
    listeners: Mutex<Vec<(String, UpdateCallback)>>,
}

/// Cloneable handle to a table shared between the manager, views and widgets
#[derive(Clone)]
pub struct TableRef {
    inner: Arc<Hosted>,
}

impl TableRef {
    pub fn new(table: Table) -> Self {
        Self {
            inner: Arc::new(Hosted {
                table: RwLock::new(table),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Create a table and wrap it in a handle
    pub fn from_data(data: TableData, options: TableOptions) -> Result<Self, DataError> {
        Ok(Self::new(Table::new(data, options)?))
    }

    pub fn columns(&self) -> Vec<String> {
        self.inner.table.read().columns()
    }

    pub fn schema(&self) -> ColumnSchema {
        self.inner.table.read().schema().clone()
    }

    pub fn size(&self) -> usize {
        self.inner.table.read().size()
    }

    pub fn options(&self) -> TableOptions {
        self.inner.table.read().options().clone()
    }

    /// Run a closure against the table under a read lock
    pub fn with_table<R>(&self, f: impl FnOnce(&Table) -> R) -> R {
        f(&self.inner.table.read())
    }

    pub fn update(&self, data: TableData) -> Result<(), DataError> {
        self.inner.table.write().update(data)?;
        self.notify();
        Ok(())
    }

    pub fn clear(&self) {
        self.inner.table.write().clear();
        self.notify();
    }

    pub fn replace(&self, data: TableData) -> Result<(), DataError> {
        self.inner.table.write().replace(data)?;
        self.notify();
        Ok(())
    }

    /// Register a listener under a key, replacing any listener with that key
    pub fn on_update(&self, key: impl Into<String>, callback: UpdateCallback) {
        let key = key.into();
        let mut listeners = self.inner.listeners.lock();
        listeners.retain(|(existing, _)| *existing != key);
        listeners.push((key, callback));
    }

    pub fn remove_update(&self, key: &str) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| existing != key);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Whether two handles refer to the same table
    pub fn ptr_eq(&self, other: &TableRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify(&self) {
        // Snapshot so listeners may touch the table or the listener list
        let listeners: Vec<UpdateCallback> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in listeners {
            callback();
        }
    }
}

impl From<Table> for TableRef {
    fn from(table: Table) -> Self {
        Self::new(table)
    }
}

impl std::fmt::Debug for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableRef")
            .field("columns", &self.columns())
            .field("size", &self.size())
            .finish()
    }
}
