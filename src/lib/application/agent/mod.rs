//! # Agent Module
//!
//! The conversation engine: owns the transcript and drives the
//! request / act / observe loop against the model.
//!
//! ## Turn loop
//!
//! 1. Take a fresh tool catalog snapshot from every connected session
//! 2. Send transcript and catalog to the model
//! 3. If the reply carries tool calls, dispatch them all concurrently and
//!    append the results in request order, then go back to 1
//! 4. Otherwise return the reply text to the caller

mod engine;
mod errors;
#[cfg(test)]
mod tests;

pub use engine::{ConversationEngine, EnginePhase, TurnOutcome};
pub use errors::AgentError;
