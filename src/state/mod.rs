//! State module for tracking import progress
//!
//! # Components
//!
//! - `TraversalState`: write-once title → distance map shared by the tasks of one import
//! - `Distance`: hop count from the root, or the `Invalid` sentinel
//! - `ImportNode`: a resolved article queued for link expansion

mod import_node;
mod traversal;

// Re-export main types
pub use import_node::ImportNode;
pub use traversal::{Distance, TraversalState};
