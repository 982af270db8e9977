use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Invalid membership: {0}")]
    InvalidMembership(String),

    #[error("Malformed value: {0}")]
    MalformedValue(String),

    #[error("Malformed proposal id: {0}")]
    MalformedProposalId(String),
}
