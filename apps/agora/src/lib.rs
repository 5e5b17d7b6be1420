//! # Agora Application Library
//!
//! The HTTP API, CLI and configuration of the Agora binary, exposed as a
//! library so integration tests can drive the router directly.

pub mod api;
pub mod cli;
pub mod config;
