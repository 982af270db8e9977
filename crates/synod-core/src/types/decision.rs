use serde::{Deserialize, Serialize};

use crate::types::proposal::{Proposal, ProposalId, Value};

/// The value a learner recorded once a majority of acceptors accepted it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Proposal id that first reached a majority
    pub proposal_id: ProposalId,
    /// Decided value
    pub value: Value,
}

impl From<Proposal> for Decision {
    fn from(proposal: Proposal) -> Self {
        Decision {
            proposal_id: proposal.id,
            value: proposal.value,
        }
    }
}
