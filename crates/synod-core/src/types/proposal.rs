use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Index of a member in the cluster membership list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Totally ordered proposal identifier.
///
/// `ProposalId::NONE` (zero) means "let the node pick one" at the submit
/// boundary and is never produced by a [`crate::ProposalIdGenerator`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProposalId(pub u64);

impl ProposalId {
    pub const NONE: ProposalId = ProposalId(0);
    /// Largest id any member will promise, accept or generate
    pub const MAX: ProposalId = ProposalId(i64::MAX as u64);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Reject the reserved id and ids above [`ProposalId::MAX`]
    pub fn validate(self) -> Result<Self, CoreError> {
        if self.is_none() {
            return Err(CoreError::MalformedProposalId(
                "proposal id 0 is reserved".to_string(),
            ));
        }
        if self > ProposalId::MAX {
            return Err(CoreError::MalformedProposalId(format!(
                "proposal id {} exceeds {}",
                self,
                ProposalId::MAX
            )));
        }
        Ok(self)
    }
}

impl From<u64> for ProposalId {
    fn from(id: u64) -> Self {
        ProposalId(id)
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque payload agreed upon by the cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Value(String);

impl Value {
    pub fn new(value: impl Into<String>) -> Self {
        Value(value.into())
    }

    /// Build a value, rejecting empty payloads and payloads over `max_len` bytes
    pub fn parse(value: impl Into<String>, max_len: usize) -> Result<Self, CoreError> {
        let value = value.into();
        if value.is_empty() {
            return Err(CoreError::MalformedValue("value is empty".to_string()));
        }
        if value.len() > max_len {
            return Err(CoreError::MalformedValue(format!(
                "value is {} bytes, limit is {}",
                value.len(),
                max_len
            )));
        }
        Ok(Value(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::new(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A (id, value) pair a proposer attempts to get accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub value: Value,
}

impl Proposal {
    pub fn new(id: ProposalId, value: Value) -> Self {
        Proposal { id, value }
    }
}

impl fmt::Display for Proposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {:?})", self.id, self.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proposal_id_ordering() {
        assert!(ProposalId(4) > ProposalId(3));
        assert!(ProposalId::NONE.is_none());
        assert!(!ProposalId(1).is_none());
    }

    #[test]
    fn test_proposal_id_validation() {
        assert_eq!(ProposalId(3).validate(), Ok(ProposalId(3)));
        assert_eq!(ProposalId::MAX.validate(), Ok(ProposalId::MAX));
        assert!(matches!(
            ProposalId::NONE.validate(),
            Err(CoreError::MalformedProposalId(_))
        ));
        assert!(matches!(
            ProposalId(u64::MAX - 1).validate(),
            Err(CoreError::MalformedProposalId(_))
        ));
    }

    #[test]
    fn test_value_parse_limits() {
        assert!(Value::parse("A", 8).is_ok());
        assert!(matches!(
            Value::parse("", 8),
            Err(CoreError::MalformedValue(_))
        ));
        assert!(matches!(
            Value::parse("too long for limit", 8),
            Err(CoreError::MalformedValue(_))
        ));
    }

    #[test]
    fn test_value_serializes_as_plain_string() {
        let proposal = Proposal::new(ProposalId(3), Value::new("A"));
        let json = serde_json::to_string(&proposal).unwrap();
        assert_eq!(json, r#"{"id":3,"value":"A"}"#);
    }
}
