use serde::{Deserialize, Serialize};
use synod_core::{Decision, NodeId, Proposal, ProposalId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareRequest {
    pub proposal_id: ProposalId,
    pub from: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareResponse {
    pub acceptor: NodeId,
    pub ok: bool,
    /// The id just promised, or the higher id that caused a rejection
    #[serde(default)]
    pub promised: Option<ProposalId>,
    /// Previously accepted proposal, only reported on a promise
    #[serde(default)]
    pub accepted: Option<Proposal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptRequest {
    pub proposal: Proposal,
    pub from: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptResponse {
    pub acceptor: NodeId,
    pub ok: bool,
    #[serde(default)]
    pub promised: Option<ProposalId>,
}

/// Relayed by a proposer once a majority of acceptors accepted `proposal`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnRequest {
    pub proposal: Proposal,
    pub acceptors: Vec<NodeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnResponse {
    #[serde(default)]
    pub decision: Option<Decision>,
}

/// A learner's answer to a decision query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResponse {
    #[serde(default)]
    pub decision: Option<Decision>,
}
