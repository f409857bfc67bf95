//! # Application Module
//!
//! ## Submodules
//!
//! - [`tooling`] - MCP server processes, sessions, tool catalog and dispatch
//! - [`agent`] - Conversation engine driving the model / tool loop
//! - [`orchestrator`] - Startup, interactive run and shutdown
//! - [`stdio`] - Line-oriented terminal loop

pub mod agent;
pub mod orchestrator;
pub mod stdio;
pub mod tooling;
