use serde::{Deserialize, Serialize};
use synod_core::{NodeId, Proposal, ProposalId};
use tokio::sync::Mutex;
use tracing::debug;

use crate::net::{AcceptResponse, PrepareResponse};

/// Promise/accept state owned by one acceptor.
///
/// Both fields only ever move forward, and once both are set
/// `accepted_proposal.id <= highest_promised_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptorState {
    pub highest_promised_id: Option<ProposalId>,
    pub accepted_proposal: Option<Proposal>,
}

/// An acceptor that promises and accepts proposals under monotonic ids
pub struct Acceptor {
    /// Member this acceptor belongs to
    pub id: NodeId,
    state: Mutex<AcceptorState>,
}

impl Acceptor {
    /// Create an acceptor with empty state
    pub fn new(id: NodeId) -> Self {
        Acceptor {
            id,
            state: Mutex::new(AcceptorState::default()),
        }
    }

    /// Handle a prepare request.
    ///
    /// Promises `proposal_id` if it is strictly above every earlier promise and
    /// reports the currently accepted proposal. Otherwise the state is left
    /// untouched and the higher promise is reported back.
    pub async fn handle_prepare(&self, proposal_id: ProposalId) -> PrepareResponse {
        let mut state = self.state.lock().await;

        let fresh = !proposal_id.is_none()
            && state
                .highest_promised_id
                .map_or(true, |promised| proposal_id > promised);

        if !fresh {
            debug!(
                "Acceptor {} rejected prepare {} (promised {:?})",
                self.id, proposal_id, state.highest_promised_id
            );
            return PrepareResponse {
                acceptor: self.id,
                ok: false,
                promised: state.highest_promised_id,
                accepted: None,
            };
        }

        state.highest_promised_id = Some(proposal_id);
        debug!("Acceptor {} promised {}", self.id, proposal_id);

        PrepareResponse {
            acceptor: self.id,
            ok: true,
            promised: Some(proposal_id),
            accepted: state.accepted_proposal.clone(),
        }
    }

    /// Handle an accept request.
    ///
    /// Accepts when the proposal id is at least the highest promise.
    pub async fn handle_accept(&self, proposal: Proposal) -> AcceptResponse {
        let mut state = self.state.lock().await;

        let allowed = !proposal.id.is_none()
            && state
                .highest_promised_id
                .map_or(true, |promised| proposal.id >= promised);

        if !allowed {
            debug!(
                "Acceptor {} rejected accept {} (promised {:?})",
                self.id, proposal, state.highest_promised_id
            );
            return AcceptResponse {
                acceptor: self.id,
                ok: false,
                promised: state.highest_promised_id,
            };
        }

        state.highest_promised_id = Some(proposal.id);
        debug!("Acceptor {} accepted {}", self.id, proposal);
        let promised = Some(proposal.id);
        state.accepted_proposal = Some(proposal);

        AcceptResponse {
            acceptor: self.id,
            ok: true,
            promised,
        }
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> AcceptorState {
        self.state.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synod_core::Value;

    fn proposal(id: u64, value: &str) -> Proposal {
        Proposal::new(ProposalId(id), Value::new(value))
    }

    #[tokio::test]
    async fn test_prepare_on_idle_acceptor() {
        let acceptor = Acceptor::new(NodeId(0));

        let response = acceptor.handle_prepare(ProposalId(3)).await;
        assert!(response.ok);
        assert_eq!(response.promised, Some(ProposalId(3)));
        assert!(response.accepted.is_none());

        let state = acceptor.snapshot().await;
        assert_eq!(state.highest_promised_id, Some(ProposalId(3)));
    }

    #[tokio::test]
    async fn test_prepare_requires_strictly_higher_id() {
        let acceptor = Acceptor::new(NodeId(0));
        acceptor.handle_prepare(ProposalId(4)).await;

        let same = acceptor.handle_prepare(ProposalId(4)).await;
        assert!(!same.ok);
        assert_eq!(same.promised, Some(ProposalId(4)));

        let lower = acceptor.handle_prepare(ProposalId(3)).await;
        assert!(!lower.ok);
        assert_eq!(acceptor.snapshot().await.highest_promised_id, Some(ProposalId(4)));
    }

    #[tokio::test]
    async fn test_prepare_reports_prior_acceptance() {
        let acceptor = Acceptor::new(NodeId(0));
        acceptor.handle_prepare(ProposalId(3)).await;
        assert!(acceptor.handle_accept(proposal(3, "A")).await.ok);

        let response = acceptor.handle_prepare(ProposalId(4)).await;
        assert!(response.ok);
        assert_eq!(response.accepted, Some(proposal(3, "A")));
    }

    #[tokio::test]
    async fn test_accept_allows_equal_id() {
        let acceptor = Acceptor::new(NodeId(0));
        acceptor.handle_prepare(ProposalId(5)).await;

        assert!(acceptor.handle_accept(proposal(5, "B")).await.ok);
        let state = acceptor.snapshot().await;
        assert_eq!(state.accepted_proposal, Some(proposal(5, "B")));
        assert_eq!(state.highest_promised_id, Some(ProposalId(5)));
    }

    #[tokio::test]
    async fn test_stale_accept_leaves_state_unchanged() {
        let acceptor = Acceptor::new(NodeId(0));
        acceptor.handle_prepare(ProposalId(3)).await;
        acceptor.handle_prepare(ProposalId(4)).await;
        let before = acceptor.snapshot().await;

        let response = acceptor.handle_accept(proposal(3, "A")).await;
        assert!(!response.ok);
        assert_eq!(response.promised, Some(ProposalId(4)));
        assert_eq!(acceptor.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_accept_without_promise_raises_promise() {
        let acceptor = Acceptor::new(NodeId(0));

        assert!(acceptor.handle_accept(proposal(7, "C")).await.ok);
        assert!(!acceptor.handle_prepare(ProposalId(6)).await.ok);
        assert!(!acceptor.handle_prepare(ProposalId(7)).await.ok);
    }

    #[tokio::test]
    async fn test_zero_id_is_rejected() {
        let acceptor = Acceptor::new(NodeId(0));

        assert!(!acceptor.handle_prepare(ProposalId::NONE).await.ok);
        assert!(!acceptor.handle_accept(proposal(0, "A")).await.ok);
        assert_eq!(acceptor.snapshot().await, AcceptorState::default());
    }
}
