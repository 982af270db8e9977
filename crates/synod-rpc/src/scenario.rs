use std::time::Duration;

use synod_consensus::{Checkpoint, Phase, RoundHooks, Target};
use synod_core::ProposalId;

use crate::error::RpcError;

/// Proposal id the race profiles script around
const SCRIPTED_PROPOSAL: ProposalId = ProposalId(3);

/// Scripted timing profile selected by the `case` field of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// No injected delays
    Normal,
    /// Proposal 3 accepts locally at once but reaches remote acceptors 1 s
    /// later, leaving room for a higher proposal to adopt its value
    AdoptAccepted,
    /// Proposal 3 waits 1 s between its prepare majority and its accept
    /// broadcast, so a higher proposal can overtake it
    PreemptBeforeAccept,
    /// Every proposer stalls 0.6 s before the accept broadcast of its first
    /// three attempts
    Livelock,
}

impl Scenario {
    pub fn from_case(case: i64) -> Result<Self, RpcError> {
        match case {
            0 => Ok(Scenario::Normal),
            1 => Ok(Scenario::AdoptAccepted),
            2 => Ok(Scenario::PreemptBeforeAccept),
            3 => Ok(Scenario::Livelock),
            other => Err(RpcError::BadRequest(format!("unknown case {}", other))),
        }
    }

    pub fn case(self) -> i64 {
        match self {
            Scenario::Normal => 0,
            Scenario::AdoptAccepted => 1,
            Scenario::PreemptBeforeAccept => 2,
            Scenario::Livelock => 3,
        }
    }
}

impl RoundHooks for Scenario {
    fn delay_at(&self, checkpoint: &Checkpoint) -> Option<Duration> {
        if checkpoint.phase != Phase::Accept {
            return None;
        }

        match (self, checkpoint.target) {
            (Scenario::AdoptAccepted, Target::Peer { local: false, .. })
                if checkpoint.proposal_id == SCRIPTED_PROPOSAL =>
            {
                Some(Duration::from_secs(1))
            }
            (Scenario::PreemptBeforeAccept, Target::Broadcast)
                if checkpoint.proposal_id == SCRIPTED_PROPOSAL =>
            {
                Some(Duration::from_secs(1))
            }
            (Scenario::Livelock, Target::Broadcast) if checkpoint.attempt <= 3 => {
                Some(Duration::from_millis(600))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use synod_consensus::{
        ConsensusError, NodeSettings, PaxosNode, ProposeOutcome, ProposerConfig, TokioClock,
    };
    use synod_core::{NodeId, Value};
    use tokio::task::JoinHandle;

    fn cluster() -> Vec<Arc<PaxosNode>> {
        let settings = NodeSettings {
            proposer: ProposerConfig {
                max_attempts: 5,
                backoff_seed: Some(7),
                ..Default::default()
            },
            ..Default::default()
        };
        PaxosNode::local_cluster(3, settings, Arc::new(TokioClock)).unwrap()
    }

    fn submit_after(
        node: &Arc<PaxosNode>,
        start_ms: u64,
        value: &str,
        proposal_id: u64,
        case: i64,
    ) -> JoinHandle<Result<ProposeOutcome, ConsensusError>> {
        let node = Arc::clone(node);
        let value = value.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(start_ms)).await;
            let scenario = Scenario::from_case(case).unwrap();
            node.submit_value(value, proposal_id, &scenario).await
        })
    }

    fn checkpoint(phase: Phase, attempt: u32, id: u64, target: Target) -> Checkpoint {
        Checkpoint {
            phase,
            attempt,
            proposal_id: ProposalId(id),
            target,
        }
    }

    fn remote() -> Target {
        Target::Peer {
            id: NodeId(1),
            local: false,
        }
    }

    #[test]
    fn test_case_mapping() {
        for case in 0..=3 {
            assert_eq!(Scenario::from_case(case).unwrap().case(), case);
        }
        assert!(matches!(Scenario::from_case(4), Err(RpcError::BadRequest(_))));
        assert!(matches!(Scenario::from_case(-1), Err(RpcError::BadRequest(_))));
    }

    #[test]
    fn test_adopt_profile_delays_remote_accepts_of_id_three() {
        let scenario = Scenario::AdoptAccepted;
        let local = Target::Peer {
            id: NodeId(0),
            local: true,
        };

        assert!(scenario.delay_at(&checkpoint(Phase::Accept, 1, 3, remote())).is_some());
        assert!(scenario.delay_at(&checkpoint(Phase::Accept, 1, 3, local)).is_none());
        assert!(scenario.delay_at(&checkpoint(Phase::Accept, 1, 4, remote())).is_none());
        assert!(scenario.delay_at(&checkpoint(Phase::Prepare, 1, 3, remote())).is_none());
    }

    #[test]
    fn test_preempt_profile_pauses_before_broadcast() {
        let scenario = Scenario::PreemptBeforeAccept;

        assert_eq!(
            scenario.delay_at(&checkpoint(Phase::Accept, 1, 3, Target::Broadcast)),
            Some(Duration::from_secs(1))
        );
        assert!(scenario.delay_at(&checkpoint(Phase::Accept, 1, 3, remote())).is_none());
        assert!(scenario.delay_at(&checkpoint(Phase::Accept, 1, 6, Target::Broadcast)).is_none());
    }

    #[test]
    fn test_livelock_profile_stops_after_three_attempts() {
        let scenario = Scenario::Livelock;

        for attempt in 1..=3 {
            assert!(scenario
                .delay_at(&checkpoint(Phase::Accept, attempt, 7, Target::Broadcast))
                .is_some());
        }
        assert!(scenario.delay_at(&checkpoint(Phase::Accept, 4, 7, Target::Broadcast)).is_none());
        assert!(Scenario::Normal
            .delay_at(&checkpoint(Phase::Accept, 1, 3, Target::Broadcast))
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_adopt_case_decides_first_value() {
        let nodes = cluster();

        let a = submit_after(&nodes[0], 0, "A", 3, 1);
        let b = submit_after(&nodes[1], 700, "B", 4, 1);

        let b = b.await.unwrap().unwrap();
        match &b {
            ProposeOutcome::Decided { decision, adopted } => {
                assert!(*adopted);
                assert_eq!(decision.value, Value::new("A"));
            }
            other => panic!("expected an adopted decision, got {:?}", other),
        }

        let a = a.await.unwrap().unwrap();
        assert_eq!(a.decision().value, Value::new("A"));
        for node in &nodes {
            assert_eq!(node.status().await.decision, Some(b.decision().clone()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_preempt_case_decides_second_value() {
        let nodes = cluster();

        let a = submit_after(&nodes[0], 0, "A", 3, 2);
        let b = submit_after(&nodes[1], 400, "B", 4, 2);

        let b = b.await.unwrap().unwrap();
        match &b {
            ProposeOutcome::Decided { decision, adopted } => {
                assert!(!*adopted);
                assert_eq!(decision.value, Value::new("B"));
            }
            other => panic!("expected a fresh decision, got {:?}", other),
        }

        let a = a.await.unwrap().unwrap();
        assert!(matches!(a, ProposeOutcome::Preempted(_)));
        assert_eq!(a.decision().value, Value::new("B"));
    }
}
