use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use synod_core::{Decision, NodeId, Proposal, ProposalId, Quorum, Value};
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Learner that records the decision once a majority accepted a proposal
pub struct Learner {
    node: NodeId,
    quorum: Quorum,
    /// Acceptors seen accepting each (id, value) pair
    tally: Mutex<HashMap<(ProposalId, Value), HashSet<NodeId>>>,
    decision: watch::Sender<Option<Decision>>,
}

impl Learner {
    /// Create a learner for a cluster with the given quorum
    pub fn new(node: NodeId, quorum: Quorum) -> Self {
        let (decision, _) = watch::channel(None);
        Learner {
            node,
            quorum,
            tally: Mutex::new(HashMap::new()),
            decision,
        }
    }

    /// Record that `acceptor` accepted `proposal`
    pub fn observe(&self, acceptor: NodeId, proposal: &Proposal) -> Option<Decision> {
        self.observe_all(&[acceptor], proposal)
    }

    /// Record that every acceptor in `acceptors` accepted `proposal`.
    ///
    /// Returns the node's decision after the observation, if there is one.
    pub fn observe_all(&self, acceptors: &[NodeId], proposal: &Proposal) -> Option<Decision> {
        let count = {
            let mut tally = self.tally.lock().unwrap_or_else(|e| e.into_inner());
            let seen = tally
                .entry((proposal.id, proposal.value.clone()))
                .or_default();
            seen.extend(
                acceptors
                    .iter()
                    .copied()
                    .filter(|acceptor| acceptor.index() < self.quorum.size),
            );
            seen.len()
        };

        debug!(
            "Learner {} saw {} accepted by {}/{}",
            self.node, proposal, count, self.quorum.threshold
        );

        if self.quorum.is_reached(count) {
            self.decide(Decision::from(proposal.clone()));
        }

        self.current_decision()
    }

    /// Record a decision reported by another member's learner
    pub fn record(&self, decision: Decision) -> Option<Decision> {
        self.decide(decision);
        self.current_decision()
    }

    fn decide(&self, candidate: Decision) {
        let mut conflicting = None;
        let recorded = self.decision.send_if_modified(|current| match current {
            None => {
                *current = Some(candidate.clone());
                true
            }
            Some(existing) => {
                if existing.value != candidate.value {
                    conflicting = Some(existing.clone());
                }
                false
            }
        });

        if recorded {
            info!(
                "Learner {} decided {:?} at proposal {}",
                self.node,
                candidate.value.as_str(),
                candidate.proposal_id
            );
        } else if let Some(existing) = conflicting {
            error!(
                "Learner {} ignored majority for {:?} at {}: already decided {:?} at {}",
                self.node,
                candidate.value.as_str(),
                candidate.proposal_id,
                existing.value.as_str(),
                existing.proposal_id
            );
        }
    }

    /// The decision, if one has been recorded
    pub fn current_decision(&self) -> Option<Decision> {
        self.decision.borrow().clone()
    }

    /// Resolve once a decision is recorded
    pub async fn wait_decided(&self) -> Decision {
        let mut receiver = self.decision.subscribe();
        if let Ok(decision) = receiver.wait_for(Option::is_some).await {
            if let Some(decision) = decision.as_ref() {
                return decision.clone();
            }
        }
        // The sender lives as long as `self`, so the channel never closes here
        std::future::pending().await
    }
}
