//! Domain layer - Netspace value types
//!
//! Node records and the enum domains callers use to describe and query them.

pub mod node;

pub use node::*;
