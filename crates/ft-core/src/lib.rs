//! forum-tree/crates/ft-core/src/lib.rs
//!
//! The threaded-discussion tree: post records, cursors, the storage port,
//! and the engine that keeps ancestor aggregates consistent on insert.

pub mod config;
pub mod cursor;
pub mod error;
pub mod forum;
pub mod models;
pub mod traits;
pub mod tree;
pub mod uniq;

// Re-exporting for easier access in other crates
pub use config::*;
pub use cursor::*;
pub use error::*;
pub use forum::*;
pub use models::*;
pub use traits::*;
pub use tree::*;
pub use uniq::uniq;
