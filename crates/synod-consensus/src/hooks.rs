use std::time::Duration;

use synod_core::{NodeId, ProposalId};

/// Protocol phase a proposer is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Prepare,
    Accept,
}

/// Where in the phase the proposer is about to send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Before the broadcast to all acceptors starts
    Broadcast,
    /// Before the request to one acceptor; `local` marks the proposer's own
    Peer { id: NodeId, local: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub phase: Phase,
    /// 1-based attempt number within one `propose` call
    pub attempt: u32,
    pub proposal_id: ProposalId,
    pub target: Target,
}

/// Delay injection points around a proposer round.
///
/// Hooks only shift timing; the proposer applies the same protocol rules
/// whatever they return.
pub trait RoundHooks: Send + Sync {
    fn delay_at(&self, _checkpoint: &Checkpoint) -> Option<Duration> {
        None
    }
}

/// Hooks that never delay
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl RoundHooks for NoHooks {}
