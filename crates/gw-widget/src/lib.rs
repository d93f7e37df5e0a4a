//! Notebook widget bridging a front-end grid viewer and the table engine
//!
//! The widget owns the validated viewer configuration, binds a hosted table
//! and relays the viewer's engine commands to the table manager, posting the
//! replies back through its [`Comm`].

pub mod comm;
pub mod envelope;
pub mod registration;
pub mod widget;

pub use comm::{Comm, RecordingComm};
pub use envelope::{InboundMessage, MessageKind, OutboundMessage};
pub use registration::Registration;
pub use widget::{TableBinding, TableSource, Widget, WidgetError, WidgetOptions};
