//! Table and CSV loading options

pub mod null_handling;
pub mod table_options;

pub use null_handling::*;
pub use table_options::*;
