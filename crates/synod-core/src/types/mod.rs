pub mod decision;
pub mod proposal;

pub use decision::Decision;
pub use proposal::{NodeId, Proposal, ProposalId, Value};
