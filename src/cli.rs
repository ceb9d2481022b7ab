// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand, ValueEnum};
use rollout::services::ContainerOperation;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rollout")]
#[command(about = "Multi-phase deployment pipelines with risk gating and automatic rollback")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print only the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to a configuration file (default: discovered in the working directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new rollout.yml configuration file
    Init {
        /// Overwrite existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// List registered pipeline templates and their steps
    Templates,

    /// Run one pipeline against the simulated container scheduler
    Run {
        /// Application identifier
        #[arg(short, long)]
        app: String,

        /// Version to deploy
        #[arg(long = "version", value_name = "VERSION")]
        release: String,

        /// Template to instantiate
        #[arg(short, long, default_value = "standard")]
        template: String,

        /// Override the template's target environment
        #[arg(short, long)]
        environment: Option<String>,

        /// Skip the approval gate
        #[arg(long)]
        auto_approve: bool,

        /// Fail instead of compensating when a required step fails
        #[arg(long)]
        no_rollback: bool,

        /// Make a scheduler operation fail (repeatable)
        #[arg(long = "fail", value_enum, value_name = "OPERATION")]
        fail: Vec<FailOperation>,
    },
}

/// Scheduler operations that can be made to fail from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailOperation {
    CreateTaskDefinition,
    DeployService,
    ScaleService,
    GetServiceStatus,
}

impl From<FailOperation> for ContainerOperation {
    fn from(op: FailOperation) -> Self {
        match op {
            FailOperation::CreateTaskDefinition => ContainerOperation::CreateTaskDefinition,
            FailOperation::DeployService => ContainerOperation::DeployService,
            FailOperation::ScaleService => ContainerOperation::ScaleService,
            FailOperation::GetServiceStatus => ContainerOperation::GetServiceStatus,
        }
    }
}
