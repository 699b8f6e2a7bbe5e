//! Harvest keeper: autonomous bounty-earning harvest scheduler.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod chain;
pub mod engine;
pub mod scheduler;
pub mod status;
