//! AML CLI - operator entry point
//!
//! This crate provides the `amlctl` binary and command orchestration.

pub mod commands;
pub mod context;

pub use context::AppContext;
