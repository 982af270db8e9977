use synod_core::{CoreError, NodeId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error(
        "Quorum unreachable after {attempts} attempts (unreachable peers: {})",
        format_peers(.unreachable)
    )]
    QuorumUnreachable { attempts: u32, unreachable: Vec<NodeId> },

    #[error("Transport fault talking to {peer}: {reason}")]
    Transport { peer: NodeId, reason: String },

    #[error("Invalid peer set: {0}")]
    InvalidPeers(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl ConsensusError {
    /// Whether the request was rejected before any protocol state was touched
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            ConsensusError::Core(CoreError::MalformedValue(_))
                | ConsensusError::Core(CoreError::MalformedProposalId(_))
        )
    }
}

fn format_peers(peers: &[NodeId]) -> String {
    if peers.is_empty() {
        return "none".to_string();
    }
    peers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
