//! # curriculum
//!
//! Application layer around `curriculum-core`: the HTTP API, the CLI and
//! the configuration they share. The binary in `main.rs` is a thin wrapper
//! over this library so the integration tests can build routers directly.

pub mod api;
pub mod cli;
pub mod config;
