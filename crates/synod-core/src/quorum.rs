use serde::{Deserialize, Serialize};

/// Majority threshold for a cluster of `n` members: `floor(n/2) + 1`
pub fn majority(n: usize) -> usize {
    n / 2 + 1
}

/// Fixed quorum for the lifetime of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quorum {
    /// Number of acceptors in the cluster
    pub size: usize,
    /// Responses needed for a majority
    pub threshold: usize,
}

impl Quorum {
    pub fn new(size: usize) -> Self {
        Quorum {
            size,
            threshold: majority(size),
        }
    }

    /// Check if `count` positive responses form a majority
    pub fn is_reached(&self, count: usize) -> bool {
        count >= self.threshold
    }

    /// Check if `failures` negative or missing responses rule out a majority
    pub fn is_impossible(&self, failures: usize) -> bool {
        failures > self.size.saturating_sub(self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority() {
        assert_eq!(majority(1), 1);
        assert_eq!(majority(2), 2);
        assert_eq!(majority(3), 2);
        assert_eq!(majority(4), 3);
        assert_eq!(majority(5), 3);
    }

    #[test]
    fn test_quorum_early_exit() {
        let quorum = Quorum::new(3);
        assert!(!quorum.is_reached(1));
        assert!(quorum.is_reached(2));
        assert!(!quorum.is_impossible(1));
        assert!(quorum.is_impossible(2));
    }

    #[test]
    fn test_single_member_quorum() {
        let quorum = Quorum::new(1);
        assert!(quorum.is_reached(1));
        assert!(quorum.is_impossible(1));
        assert!(!quorum.is_impossible(0));
    }
}
