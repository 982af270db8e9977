use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use synod_core::{Decision, NodeId, ProposalId, Quorum, Value};
use tracing::info;

use crate::acceptor::{Acceptor, AcceptorState};
use crate::clock::Clock;
use crate::error::ConsensusError;
use crate::hooks::RoundHooks;
use crate::learner::Learner;
use crate::net::{
    AcceptRequest, AcceptResponse, DecisionResponse, LearnRequest, LearnResponse, PrepareRequest,
    PrepareResponse,
};
use crate::peer::{LocalPeer, Peer};
use crate::proposer::{ProposeOutcome, Proposer, ProposerConfig};

/// Per-node settings shared by every role
#[derive(Debug, Clone)]
pub struct NodeSettings {
    pub proposer: ProposerConfig,
    /// Largest accepted value, in bytes
    pub max_value_len: usize,
}

impl Default for NodeSettings {
    fn default() -> Self {
        NodeSettings {
            proposer: ProposerConfig::default(),
            max_value_len: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeStatus {
    pub node_id: NodeId,
    pub cluster_size: usize,
    pub quorum: usize,
    pub acceptor: AcceptorState,
    pub decision: Option<Decision>,
}

/// One cluster member: a proposer, an acceptor and a learner
pub struct PaxosNode {
    id: NodeId,
    settings: NodeSettings,
    acceptor: Arc<Acceptor>,
    learner: Arc<Learner>,
    proposer: Proposer,
}

impl PaxosNode {
    /// Create a node whose other members are reached through `remote_peers`
    pub fn new(
        id: NodeId,
        settings: NodeSettings,
        remote_peers: Vec<Arc<dyn Peer>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConsensusError> {
        let quorum = Quorum::new(remote_peers.len() + 1);
        let acceptor = Arc::new(Acceptor::new(id));
        let learner = Arc::new(Learner::new(id, quorum));

        let mut peers: Vec<Arc<dyn Peer>> = vec![Arc::new(LocalPeer::new(
            Arc::clone(&acceptor),
            Arc::clone(&learner),
        ))];
        peers.extend(remote_peers);

        Self::from_parts(id, settings, acceptor, learner, peers, clock)
    }

    /// Assemble a node from existing roles; `peers` is the full membership,
    /// including a local peer for this node
    pub fn from_parts(
        id: NodeId,
        settings: NodeSettings,
        acceptor: Arc<Acceptor>,
        learner: Arc<Learner>,
        peers: Vec<Arc<dyn Peer>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConsensusError> {
        validate_peers(id, &peers)?;

        let proposer = Proposer::new(
            id,
            settings.proposer.clone(),
            peers,
            Arc::clone(&learner),
            clock,
        )?;

        Ok(PaxosNode {
            id,
            settings,
            acceptor,
            learner,
            proposer,
        })
    }

    /// Build `size` in-process nodes wired to each other's acceptors
    pub fn local_cluster(
        size: usize,
        settings: NodeSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Vec<Arc<PaxosNode>>, ConsensusError> {
        let quorum = Quorum::new(size);
        let roles: Vec<(Arc<Acceptor>, Arc<Learner>)> = (0..size as u32)
            .map(|i| {
                (
                    Arc::new(Acceptor::new(NodeId(i))),
                    Arc::new(Learner::new(NodeId(i), quorum)),
                )
            })
            .collect();

        let peers: Vec<Arc<dyn Peer>> = roles
            .iter()
            .map(|(acceptor, learner)| {
                Arc::new(LocalPeer::new(Arc::clone(acceptor), Arc::clone(learner))) as Arc<dyn Peer>
            })
            .collect();

        roles
            .iter()
            .enumerate()
            .map(|(i, (acceptor, learner))| {
                let mut settings = settings.clone();
                // Give every proposer its own backoff sequence
                settings.proposer.backoff_seed =
                    settings.proposer.backoff_seed.map(|seed| seed + i as u64);

                PaxosNode::from_parts(
                    NodeId(i as u32),
                    settings,
                    Arc::clone(acceptor),
                    Arc::clone(learner),
                    peers.clone(),
                    Arc::clone(&clock),
                )
                .map(Arc::new)
            })
            .collect()
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn acceptor(&self) -> &Arc<Acceptor> {
        &self.acceptor
    }

    pub fn learner(&self) -> &Arc<Learner> {
        &self.learner
    }

    /// Submit a value for consensus.
    ///
    /// `proposal_id` of zero lets the node generate one. Malformed values are
    /// rejected before any acceptor is contacted.
    pub async fn submit_value(
        &self,
        value: impl Into<String>,
        proposal_id: u64,
        hooks: &dyn RoundHooks,
    ) -> Result<ProposeOutcome, ConsensusError> {
        let value = Value::parse(value, self.settings.max_value_len)?;
        let forced = ProposalId(proposal_id);

        if let Some(decision) = self.learner.current_decision() {
            info!(
                "Node {} rejects new value {:?}: {:?} already decided",
                self.id,
                value.as_str(),
                decision.value.as_str()
            );
            return Ok(ProposeOutcome::AlreadyDecided(decision));
        }

        info!(
            "Node {} proposing {:?} (forced id {})",
            self.id,
            value.as_str(),
            forced
        );
        self.proposer.propose(value, forced, hooks).await
    }

    pub async fn handle_prepare(
        &self,
        request: PrepareRequest,
    ) -> Result<PrepareResponse, ConsensusError> {
        let proposal_id = request.proposal_id.validate()?;
        Ok(self.acceptor.handle_prepare(proposal_id).await)
    }

    pub async fn handle_accept(
        &self,
        request: AcceptRequest,
    ) -> Result<AcceptResponse, ConsensusError> {
        request.proposal.id.validate()?;
        Value::parse(request.proposal.value.as_str(), self.settings.max_value_len)?;
        Ok(self.acceptor.handle_accept(request.proposal).await)
    }

    /// Record that `request.acceptors` accepted `request.proposal`.
    ///
    /// The acceptor list is taken on trust: only cluster members are
    /// expected to reach this endpoint.
    pub fn handle_learn(&self, request: LearnRequest) -> Result<LearnResponse, ConsensusError> {
        request.proposal.id.validate()?;
        Value::parse(request.proposal.value.as_str(), self.settings.max_value_len)?;

        let decision = self
            .learner
            .observe_all(&request.acceptors, &request.proposal);
        Ok(LearnResponse { decision })
    }

    pub fn handle_decision(&self) -> DecisionResponse {
        DecisionResponse {
            decision: self.learner.current_decision(),
        }
    }

    pub async fn status(&self) -> NodeStatus {
        let quorum = self.proposer.quorum();
        NodeStatus {
            node_id: self.id,
            cluster_size: quorum.size,
            quorum: quorum.threshold,
            acceptor: self.acceptor.snapshot().await,
            decision: self.learner.current_decision(),
        }
    }
}

fn validate_peers(id: NodeId, peers: &[Arc<dyn Peer>]) -> Result<(), ConsensusError> {
    let mut seen = HashSet::new();
    for peer in peers {
        if peer.id().index() >= peers.len() {
            return Err(ConsensusError::InvalidPeers(format!(
                "{} is outside a cluster of {} members",
                peer.id(),
                peers.len()
            )));
        }
        if !seen.insert(peer.id()) {
            return Err(ConsensusError::InvalidPeers(format!(
                "{} listed twice",
                peer.id()
            )));
        }
    }

    match peers.iter().find(|peer| peer.id() == id) {
        Some(peer) if peer.is_local() => Ok(()),
        Some(_) => Err(ConsensusError::InvalidPeers(format!(
            "{} must be reached in-process by its own proposer",
            id
        ))),
        None => Err(ConsensusError::InvalidPeers(format!(
            "{} is not part of its own membership",
            id
        ))),
    }
}
