//! Orchestrator - the per-turn facade
//!
//! Ties together safety screening, token budgeting, caching, routing, the
//! provider gateway, checkpoints and metrics behind a single
//! [`Orchestrator::handle_turn`] call.
//!
//! # Module Structure
//!
//! - `types`: `TurnRequest`, `TurnResponse`, `TurnReply`, `TurnStatus`, stage outcomes
//! - `config`: `OrchestratorConfig` (fixed user-facing texts)
//! - `core`: `Orchestrator` struct and builder
//! - `process`: the turn pipeline and recovery

mod config;
mod core;
mod process;
mod types;


pub use config::OrchestratorConfig;
pub use core::{Orchestrator, OrchestratorBuilder};
pub use types::{TurnReply, TurnRequest, TurnResponse, TurnStatus, TurnUsage};
