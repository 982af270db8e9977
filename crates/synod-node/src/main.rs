use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod driver;
mod node;

use cli::{Cli, Commands};
use config::{generate_sample_config, NodeConfig};
use node::Node;
use synod_rpc::SubmitRequest;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            run_node(config).await?;
        }
        Commands::Init {
            node_id,
            output,
            base_port,
        } => {
            init_config(node_id, output, base_port)?;
        }
        Commands::Submit {
            endpoint,
            value,
            proposal_id,
            case,
        } => {
            submit_value(&endpoint, value, proposal_id, case).await?;
        }
        Commands::Status { endpoint } => {
            show_status(&endpoint).await?;
        }
        Commands::Drive {
            scenario,
            endpoints,
            delay_ms,
        } => {
            driver::drive(scenario, &endpoints, Duration::from_millis(delay_ms)).await?;
        }
    }

    Ok(())
}

/// Run a Synod node
async fn run_node(config_path: PathBuf) -> Result<()> {
    info!("Loading configuration from {:?}", config_path);

    let config = if config_path.exists() {
        NodeConfig::load(&config_path)?
    } else {
        error!(
            "Configuration file not found: {:?}. Run 'synod init' to create one.",
            config_path
        );
        return Err(anyhow::anyhow!("Configuration file not found"));
    };

    let node = Node::new(config)?;
    node.run().await?;

    Ok(())
}

/// Initialize a new configuration file
fn init_config(node_id: u32, output: PathBuf, base_port: u16) -> Result<()> {
    info!("Generating sample configuration for member {}", node_id);

    let config = generate_sample_config(node_id, base_port)?;
    config.save(&output)?;

    info!("Configuration saved to {:?}", output);

    println!("\nConfiguration file created: {}", output.display());
    println!("Members:");
    for member in &config.members {
        println!("  {} -> {}", member.id, member.address);
    }
    println!("\nTo start the node, run:");
    println!("  synod run --config {}", output.display());

    Ok(())
}

/// Submit a single value
async fn submit_value(endpoint: &str, value: String, proposal_id: i64, case: i64) -> Result<()> {
    let request = SubmitRequest {
        value,
        proposal_id,
        case,
    };

    let client = reqwest::Client::new();
    let result = driver::submit(&client, endpoint, &request).await?;
    println!("{}", result);

    Ok(())
}

/// Show node status
async fn show_status(endpoint: &str) -> Result<()> {
    let url = format!("{}/status", endpoint.trim_end_matches('/'));

    let response = reqwest::get(&url).await?;

    if response.status().is_success() {
        let status: serde_json::Value = response.json().await?;
        println!("Node Status:");
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        error!("Failed to get status: {}", response.status());
    }

    Ok(())
}
