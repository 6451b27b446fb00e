//! Ordered index used to keep pharmacy branches sorted by ID.

mod tree;

pub use tree::*;
