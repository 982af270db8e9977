use std::sync::Mutex;

use crate::error::CoreError;
use crate::types::{NodeId, ProposalId};

/// Generates proposal ids of the form `round * cluster_size + node_index`.
///
/// Every member owns one residue class modulo the cluster size, so ids
/// generated on different members never collide.
#[derive(Debug)]
pub struct ProposalIdGenerator {
    node_index: u64,
    cluster_size: u64,
    /// Highest round used or observed through a forced id
    last_round: Mutex<u64>,
}

impl ProposalIdGenerator {
    pub fn new(node: NodeId, cluster_size: usize) -> Result<Self, CoreError> {
        if cluster_size == 0 {
            return Err(CoreError::InvalidMembership(
                "cluster must have at least one member".to_string(),
            ));
        }
        if node.index() >= cluster_size {
            return Err(CoreError::InvalidMembership(format!(
                "{} is outside a cluster of {} members",
                node, cluster_size
            )));
        }

        Ok(ProposalIdGenerator {
            node_index: u64::from(node.0),
            cluster_size: cluster_size as u64,
            last_round: Mutex::new(0),
        })
    }

    /// Next id for this node, or `forced` when it is non-zero
    pub fn next(&self, forced: ProposalId) -> Result<ProposalId, CoreError> {
        let mut last_round = self.last_round.lock().unwrap_or_else(|e| e.into_inner());

        if !forced.is_none() {
            let forced = forced.validate()?;
            *last_round = (*last_round).max(forced.get() / self.cluster_size);
            return Ok(forced);
        }

        let round = last_round.saturating_add(1);
        let id = self.compose(round)?;
        *last_round = round;
        Ok(id)
    }

    /// Smallest id owned by this node that is strictly above `floor` and
    /// above every id handed out so far.
    ///
    /// Fails once no owned id fits under [`ProposalId::MAX`]; the generator
    /// is left unchanged then.
    pub fn next_above(&self, floor: ProposalId) -> Result<ProposalId, CoreError> {
        let mut last_round = self.last_round.lock().unwrap_or_else(|e| e.into_inner());

        let mut round = floor.get() / self.cluster_size;
        if self.compose(round).map_or(true, |id| id <= floor) {
            round = round.saturating_add(1);
        }
        round = round.max(last_round.saturating_add(1));

        let id = self.compose(round)?;
        *last_round = round;
        Ok(id)
    }

    fn compose(&self, round: u64) -> Result<ProposalId, CoreError> {
        round
            .checked_mul(self.cluster_size)
            .and_then(|base| base.checked_add(self.node_index))
            .map(ProposalId)
            .filter(|id| *id <= ProposalId::MAX)
            .ok_or_else(|| {
                CoreError::MalformedProposalId(format!(
                    "no id above round {} for member {} fits under {}",
                    round,
                    self.node_index,
                    ProposalId::MAX
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_increase() {
        let generator = ProposalIdGenerator::new(NodeId(1), 3).unwrap();
        let first = generator.next(ProposalId::NONE).unwrap();
        let second = generator.next(ProposalId::NONE).unwrap();
        assert_eq!(first, ProposalId(4));
        assert_eq!(second, ProposalId(7));
    }

    #[test]
    fn test_ids_never_collide_across_nodes() {
        let generators: Vec<_> = (0..3)
            .map(|i| ProposalIdGenerator::new(NodeId(i), 3).unwrap())
            .collect();

        let mut seen = std::collections::HashSet::new();
        for _ in 0..50 {
            for generator in &generators {
                assert!(seen.insert(generator.next(ProposalId::NONE).unwrap()));
            }
        }
    }

    #[test]
    fn test_forced_id_is_returned_and_raises_counter() {
        let generator = ProposalIdGenerator::new(NodeId(0), 3).unwrap();
        assert_eq!(generator.next(ProposalId(9)).unwrap(), ProposalId(9));
        assert!(generator.next(ProposalId::NONE).unwrap() > ProposalId(9));
    }

    #[test]
    fn test_next_above_floor() {
        let node0 = ProposalIdGenerator::new(NodeId(0), 3).unwrap();
        let node2 = ProposalIdGenerator::new(NodeId(2), 3).unwrap();

        node0.next(ProposalId(3)).unwrap();
        node2.next(ProposalId(5)).unwrap();

        assert_eq!(node0.next_above(ProposalId(5)).unwrap(), ProposalId(6));
        assert_eq!(node2.next_above(ProposalId(5)).unwrap(), ProposalId(8));
        // Lower floors never move a generator backwards
        assert_eq!(node0.next_above(ProposalId(1)).unwrap(), ProposalId(9));
    }

    #[test]
    fn test_ids_near_the_ceiling_fail_without_overflow() {
        let generator = ProposalIdGenerator::new(NodeId(1), 3).unwrap();

        assert!(matches!(
            generator.next_above(ProposalId(u64::MAX - 1)),
            Err(CoreError::MalformedProposalId(_))
        ));
        assert!(matches!(
            generator.next_above(ProposalId::MAX),
            Err(CoreError::MalformedProposalId(_))
        ));
        assert!(matches!(
            generator.next(ProposalId(u64::MAX)),
            Err(CoreError::MalformedProposalId(_))
        ));

        let single = ProposalIdGenerator::new(NodeId(0), 1).unwrap();
        assert!(single.next_above(ProposalId(u64::MAX)).is_err());

        // A failed call leaves the generator usable
        assert_eq!(generator.next(ProposalId::NONE).unwrap(), ProposalId(4));
    }

    #[test]
    fn test_highest_owned_id_is_still_generated() {
        // i64::MAX = 3 * 3074457345618258602 + 1, so member 1 owns it
        let generator = ProposalIdGenerator::new(NodeId(1), 3).unwrap();
        let below = ProposalId(ProposalId::MAX.get() - 1);

        assert_eq!(generator.next_above(below).unwrap(), ProposalId::MAX);
    }

    #[test]
    fn test_invalid_membership() {
        assert!(matches!(
            ProposalIdGenerator::new(NodeId(3), 3),
            Err(CoreError::InvalidMembership(_))
        ));
        assert!(matches!(
            ProposalIdGenerator::new(NodeId(0), 0),
            Err(CoreError::InvalidMembership(_))
        ));
    }
}
