//! Server module for Bastion
//!
//! # Module Structure
//!
//! - `config`: Configuration structures for all server components
//! - `loader`: Configuration loading from files and environment
//! - `providers`: Provider resolution and gateway construction
//! - `init`: Store setup, facade wiring and the HTTP run loop

pub mod config;
pub mod init;
mod loader;
mod providers;

pub use init::run;
pub use loader::load_config;
pub use providers::{resolve_provider, Resolved};
