//! CLI command implementations

pub mod check;
pub mod completions;
pub mod init;
pub mod normalize;
pub mod phase;
pub mod remote;
pub mod repair;
pub mod spec;
pub mod store;
pub mod validate;
pub mod workflow;
