use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Synod - A single-decree Paxos cluster
#[derive(Parser)]
#[command(name = "synod")]
#[command(about = "Synod node and client utilities")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a cluster member
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },

    /// Write a sample three-member configuration
    Init {
        /// Member id this configuration is for
        #[arg(long, default_value_t = 0)]
        node_id: u32,

        /// Output path for configuration file
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,

        /// Port of member 0; member i listens on base_port + i
        #[arg(long, default_value_t = 8000)]
        base_port: u16,
    },

    /// Submit a value to a node
    Submit {
        /// RPC endpoint
        #[arg(short, long, default_value = "http://127.0.0.1:8000")]
        endpoint: String,

        /// Value to propose
        #[arg(long)]
        value: String,

        /// Forced proposal id; 0 lets the node choose
        #[arg(long, default_value_t = 0)]
        proposal_id: i64,

        /// Scripted timing profile
        #[arg(long, default_value_t = 0)]
        case: i64,
    },

    /// Show node status
    Status {
        /// RPC endpoint
        #[arg(short, long, default_value = "http://127.0.0.1:8000")]
        endpoint: String,
    },

    /// Run a multi-client submission scenario against a cluster
    Drive {
        #[arg(value_enum)]
        scenario: DriveScenario,

        /// Node endpoints, one per client, comma-separated
        #[arg(
            long,
            value_delimiter = ',',
            default_value = "http://127.0.0.1:8000,http://127.0.0.1:8001,http://127.0.0.1:8002"
        )]
        endpoints: Vec<String>,

        /// Gap between the first and second client for `two-clients`
        #[arg(long, default_value_t = 100)]
        delay_ms: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DriveScenario {
    /// One client submits "A"
    OneClient,
    /// Two clients submit "A" and "B" with generated ids
    TwoClients,
    /// Proposal 4 adopts the value proposal 3 got accepted
    MajorityAdopt,
    /// Proposal 4 overtakes proposal 3 before it is accepted
    MajorityPreempt,
    /// Three proposers preempt each other until backoff separates them
    Livelock,
}
