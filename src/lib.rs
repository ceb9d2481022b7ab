// ABOUTME: Library root for rollout - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod error;
pub mod execution;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod risk;
pub mod services;
pub mod types;
