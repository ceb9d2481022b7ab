// ABOUTME: Command module aggregator for the rollout CLI.
// ABOUTME: Re-exports the run and templates command handlers.

mod run;
mod templates;

pub use run::{RunRequest, run};
pub use templates::templates;
