//! Core functionality for the notebook grid widget
//!
//! This crate provides the viewer configuration vocabulary, its validation,
//! and the state holder whose changes are synchronized to the front end.

pub mod config;
pub mod events;
pub mod state;
pub mod sync;

// Re-export commonly used types
pub use config::{
    Aggregate, FilterOperator, FilterSpec, Plugin, SortDirection, SortSpec, ValidationError,
    ViewerConfig,
};
pub use events::{handler_from_fn, Event, EventBus, EventHandler};
pub use state::ViewerState;
pub use sync::SyncManager;
