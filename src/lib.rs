#![deny(unsafe_op_in_unsafe_fn)]

// ordered index over caller-owned nodes: the tree stores link topology only
pub mod node;
pub mod tree;

pub use node::{Color, Link, RBNode};
pub use tree::RBTree;
