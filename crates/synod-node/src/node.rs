use std::sync::Arc;

use anyhow::Result;
use synod_consensus::{HttpPeer, PaxosNode, Peer, TokioClock};
use synod_core::NodeId;
use synod_rpc::{RpcConfig, RpcServer};
use tracing::{error, info};

use crate::config::NodeConfig;

/// A Synod cluster member serving the HTTP API
pub struct Node {
    config: NodeConfig,
    paxos: Arc<PaxosNode>,
}

impl Node {
    /// Create a new node from configuration
    pub fn new(config: NodeConfig) -> Result<Self> {
        config.validate()?;
        let settings = config.node_settings();

        // Bound every peer call by the phase timeout
        let client = reqwest::Client::builder()
            .timeout(settings.proposer.phase_timeout)
            .build()?;

        let remote: Vec<Arc<dyn Peer>> = config
            .remote_members()
            .map(|member| {
                Arc::new(HttpPeer::new(
                    NodeId(member.id),
                    member.address.clone(),
                    client.clone(),
                )) as Arc<dyn Peer>
            })
            .collect();

        let paxos = PaxosNode::new(
            NodeId(config.node_id),
            settings,
            remote,
            Arc::new(TokioClock),
        )?;

        Ok(Node {
            config,
            paxos: Arc::new(paxos),
        })
    }

    /// Run the node until interrupted
    pub async fn run(self) -> Result<()> {
        info!(
            "Starting Synod member {} of {}",
            self.config.node_id,
            self.config.members.len()
        );
        for member in self.config.remote_members() {
            info!("  peer {} at {}", member.id, member.address);
        }

        let rpc_server = RpcServer::new(
            RpcConfig {
                http_addr: self.config.listen_addr,
            },
            Arc::clone(&self.paxos),
        );

        if let Err(e) = rpc_server.run(shutdown_signal()).await {
            error!("RPC server error: {}", e);
            return Err(e.into());
        }

        info!("Node stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            error!("Cannot listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::generate_sample_config;

    #[tokio::test]
    async fn test_node_creation() {
        let config = generate_sample_config(1, 8000).unwrap();
        let node = Node::new(config).unwrap();

        let status = node.paxos.status().await;
        assert_eq!(status.node_id, NodeId(1));
        assert_eq!(status.cluster_size, 3);
        assert_eq!(status.quorum, 2);
        assert!(status.decision.is_none());
    }

    #[tokio::test]
    async fn test_node_rejects_invalid_config() {
        let mut config = generate_sample_config(0, 8000).unwrap();
        config.members.pop();
        config.members.pop();
        config.node_id = 1;

        assert!(Node::new(config).is_err());
    }
}
