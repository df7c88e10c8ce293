//! Physics module
//!
//! Hosts the collision model the region shape plugs into.

pub mod collision;
