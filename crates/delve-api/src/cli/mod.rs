//! CLI command definitions for the `delve` binary.
//!
//! Uses clap derive macros for argument parsing. Research commands follow a
//! noun-verb pattern (e.g., `delve research start`, `delve research list`).

pub mod research;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Research what companies are doing with AI.
#[derive(Parser)]
#[command(name = "delve", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout via OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server and the research workers.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Manage research jobs.
    Research {
        #[command(subcommand)]
        action: ResearchCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ResearchCommand {
    /// Create a research job.
    Start {
        /// Company name.
        company: String,

        /// Company website.
        website: String,

        /// Agent variant (tool-calling, fixed-pipeline).
        #[arg(long, default_value = "tool-calling")]
        variant: String,

        /// Run the job in this process and follow its progress.
        #[arg(long)]
        wait: bool,
    },

    /// List research jobs, newest first.
    #[command(alias = "ls")]
    List {
        /// Filter by status (pending, in-progress, completed, failed).
        #[arg(long)]
        status: Option<String>,

        /// Filter by agent variant (tool-calling, fixed-pipeline).
        #[arg(long)]
        variant: Option<String>,
    },

    /// Show a job with its steps and report.
    Show {
        /// Job ID.
        id: String,
    },

    /// Cancel a pending or running job.
    Cancel {
        /// Job ID.
        id: String,
    },
}
