//! spectrack: spec lifecycle tracking
//!
//! Keeps three views of every spec consistent: the markdown document (source
//! of truth), a local SQLite store used for queries, and an optional GitHub
//! issue used for collaboration.

pub mod cli;
pub mod core;
