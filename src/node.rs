//! Hierarchy nodes.
//!
//! A node in an archive hierarchy is either a group or an array, identified by a [`NodePath`].
//! The node reports produced by [inspection](crate::inspect) are keyed by node path.

mod node_path;

pub use node_path::{NodePath, NodePathError};
