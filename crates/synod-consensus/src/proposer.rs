use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use synod_core::{Decision, NodeId, Proposal, ProposalId, ProposalIdGenerator, Quorum, Value};
use tracing::{debug, info, warn};

use crate::clock::{Backoff, Clock};
use crate::error::ConsensusError;
use crate::hooks::{Checkpoint, Phase, RoundHooks, Target};
use crate::learner::Learner;
use crate::net::{AcceptRequest, LearnRequest, PrepareRequest};
use crate::peer::Peer;

/// Configuration for the proposer
#[derive(Debug, Clone)]
pub struct ProposerConfig {
    /// Rounds attempted before giving up with `QuorumUnreachable`
    pub max_attempts: u32,
    /// Time allowed for each prepare or accept broadcast
    pub phase_timeout: Duration,
    /// Lower bound of the randomized retry delay
    pub backoff_min: Duration,
    /// Upper bound of the randomized retry delay
    pub backoff_max: Duration,
    /// Fixed seed for the retry delays, random when unset
    pub backoff_seed: Option<u64>,
}

impl Default for ProposerConfig {
    fn default() -> Self {
        ProposerConfig {
            max_attempts: 10,
            phase_timeout: Duration::from_secs(2),
            backoff_min: Duration::from_millis(50),
            backoff_max: Duration::from_millis(300),
            backoff_seed: None,
        }
    }
}

/// How a `propose` call ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposeOutcome {
    /// A decision existed before the call started
    AlreadyDecided(Decision),
    /// This proposer's accept phase reached a majority.
    ///
    /// `adopted` is set when the value came from an earlier acceptance
    /// rather than from the caller.
    Decided { decision: Decision, adopted: bool },
    /// Another proposer's decision landed while this one was retrying
    Preempted(Decision),
}

impl ProposeOutcome {
    pub fn decision(&self) -> &Decision {
        match self {
            ProposeOutcome::AlreadyDecided(decision)
            | ProposeOutcome::Decided { decision, .. }
            | ProposeOutcome::Preempted(decision) => decision,
        }
    }
}

/// Result of a single prepare/accept round
enum Round {
    Decided {
        proposal: Proposal,
        acceptors: Vec<NodeId>,
        adopted: bool,
    },
    Rejected { candidate: Value, highest_seen: ProposalId },
}

/// Responses gathered by one broadcast
struct PhaseTally {
    ok: Vec<NodeId>,
    adopted: Option<Proposal>,
    highest_seen: ProposalId,
    preempted: bool,
    unreachable: Vec<NodeId>,
}

impl PhaseTally {
    fn new(proposal_id: ProposalId) -> Self {
        PhaseTally {
            ok: Vec::new(),
            adopted: None,
            highest_seen: proposal_id,
            preempted: false,
            unreachable: Vec::new(),
        }
    }

    fn saw_promise(&mut self, promised: Option<ProposalId>, proposal_id: ProposalId) {
        if let Some(promised) = promised {
            if promised > proposal_id {
                self.preempted = true;
            }
            self.highest_seen = self.highest_seen.max(promised);
        }
    }
}

/// Proposer that drives prepare/accept rounds against every acceptor
pub struct Proposer {
    node: NodeId,
    config: ProposerConfig,
    quorum: Quorum,
    ids: ProposalIdGenerator,
    peers: Vec<Arc<dyn Peer>>,
    learner: Arc<Learner>,
    clock: Arc<dyn Clock>,
    backoff: Backoff,
    /// Unreachable peers from the most recent round
    last_unreachable: std::sync::Mutex<Vec<NodeId>>,
}

impl Proposer {
    /// Create a proposer for `node` talking to `peers`, the full membership
    pub fn new(
        node: NodeId,
        config: ProposerConfig,
        peers: Vec<Arc<dyn Peer>>,
        learner: Arc<Learner>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConsensusError> {
        let quorum = Quorum::new(peers.len());
        let ids = ProposalIdGenerator::new(node, peers.len())?;
        let backoff = Backoff::new(config.backoff_min, config.backoff_max, config.backoff_seed);

        Ok(Proposer {
            node,
            config,
            quorum,
            ids,
            peers,
            learner,
            clock,
            backoff,
            last_unreachable: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn quorum(&self) -> Quorum {
        self.quorum
    }

    /// Drive `value` to a decision.
    ///
    /// A non-zero `forced_id` is used for the first round; retries always
    /// pick a fresh id above everything observed.
    pub async fn propose(
        &self,
        value: Value,
        forced_id: ProposalId,
        hooks: &dyn RoundHooks,
    ) -> Result<ProposeOutcome, ConsensusError> {
        if let Some(decision) = self.learner.current_decision() {
            debug!("Proposer {} short-circuits: already decided", self.node);
            return Ok(ProposeOutcome::AlreadyDecided(decision));
        }

        if let Some(decision) = self.fetch_decision().await {
            info!(
                "Proposer {} learned {:?} from a peer before proposing",
                self.node,
                decision.value.as_str()
            );
            let decision = self.learner.record(decision.clone()).unwrap_or(decision);
            return Ok(ProposeOutcome::AlreadyDecided(decision));
        }

        let mut proposal_id = self.ids.next(forced_id)?;
        let mut candidate = value;

        for attempt in 1..=self.config.max_attempts {
            if attempt > 1 {
                if let Some(decision) = self.learner.current_decision() {
                    info!(
                        "Proposer {} stops retrying: {:?} already decided",
                        self.node,
                        decision.value.as_str()
                    );
                    return Ok(ProposeOutcome::Preempted(decision));
                }
            }

            info!(
                "Proposer {} attempt {} with proposal {}",
                self.node, attempt, proposal_id
            );

            match self.run_round(attempt, proposal_id, candidate, hooks).await {
                Round::Decided {
                    proposal,
                    acceptors,
                    adopted,
                } => {
                    info!(
                        "Proposer {} reached majority accept for {}",
                        self.node, proposal
                    );
                    let decision = self.relay_decision(proposal, acceptors).await;
                    return Ok(ProposeOutcome::Decided { decision, adopted });
                }
                Round::Rejected {
                    candidate: next_candidate,
                    highest_seen,
                } => {
                    candidate = next_candidate;

                    if attempt == self.config.max_attempts {
                        break;
                    }

                    let delay = self.backoff.delay(attempt);
                    debug!(
                        "Proposer {} backs off {:?} after proposal {}",
                        self.node, delay, proposal_id
                    );

                    tokio::select! {
                        _ = self.clock.sleep(delay) => {}
                        decision = self.learner.wait_decided() => {
                            info!(
                                "Proposer {} preempted by decision {:?}",
                                self.node,
                                decision.value.as_str()
                            );
                            return Ok(ProposeOutcome::Preempted(decision));
                        }
                    }

                    proposal_id = match self.ids.next_above(highest_seen.max(proposal_id)) {
                        Ok(id) => id,
                        Err(e) => {
                            warn!("Proposer {} cannot outbid {}: {}", self.node, highest_seen, e);
                            return Err(e.into());
                        }
                    };
                }
            }
        }

        if let Some(decision) = self.learner.current_decision() {
            return Ok(ProposeOutcome::Preempted(decision));
        }

        let unreachable = self
            .last_unreachable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        warn!(
            "Proposer {} gave up after {} attempts",
            self.node, self.config.max_attempts
        );
        Err(ConsensusError::QuorumUnreachable {
            attempts: self.config.max_attempts,
            unreachable,
        })
    }

    async fn run_round(
        &self,
        attempt: u32,
        proposal_id: ProposalId,
        candidate: Value,
        hooks: &dyn RoundHooks,
    ) -> Round {
        self.pause(hooks, Phase::Prepare, attempt, proposal_id, Target::Broadcast)
            .await;
        let prepare = self.prepare_phase(attempt, proposal_id, hooks).await;
        self.record_unreachable(&prepare);

        if prepare.preempted || !self.quorum.is_reached(prepare.ok.len()) {
            debug!(
                "Proposer {} prepare {} failed: {} promises, preempted: {}",
                self.node,
                proposal_id,
                prepare.ok.len(),
                prepare.preempted
            );
            return Round::Rejected {
                candidate,
                highest_seen: prepare.highest_seen,
            };
        }

        // Safety rule: push the highest-id value already accepted by the quorum
        let adopted = prepare.adopted.is_some();
        let value = match prepare.adopted {
            Some(prior) => {
                info!(
                    "Proposer {} adopts {} for proposal {}",
                    self.node, prior, proposal_id
                );
                prior.value
            }
            None => candidate,
        };
        let proposal = Proposal::new(proposal_id, value);

        self.pause(hooks, Phase::Accept, attempt, proposal_id, Target::Broadcast)
            .await;
        let accept = self.accept_phase(attempt, &proposal, hooks).await;
        self.record_unreachable(&accept);

        if self.quorum.is_reached(accept.ok.len()) {
            self.learner.observe_all(&accept.ok, &proposal);
            return Round::Decided {
                proposal,
                acceptors: accept.ok,
                adopted,
            };
        }

        debug!(
            "Proposer {} accept {} failed: {} accepted",
            self.node,
            proposal,
            accept.ok.len()
        );
        Round::Rejected {
            highest_seen: accept.highest_seen,
            candidate: proposal.value,
        }
    }

    async fn prepare_phase(
        &self,
        attempt: u32,
        proposal_id: ProposalId,
        hooks: &dyn RoundHooks,
    ) -> PhaseTally {
        let request = PrepareRequest {
            proposal_id,
            from: self.node,
        };

        let pending = self.peers.iter().map(|peer| {
            let request = request.clone();
            let delay = self.peer_delay(hooks, Phase::Prepare, attempt, proposal_id, peer);
            async move {
                if let Some(delay) = delay {
                    self.clock.sleep(delay).await;
                }
                (peer.id(), peer.prepare(request).await)
            }
        });

        let mut tally = PhaseTally::new(proposal_id);
        self.collect(Phase::Prepare, proposal_id, pending, &mut tally, |tally, response| {
            let response = response?;
            if response.ok {
                tally.ok.push(response.acceptor);
                if let Some(prior) = response.accepted {
                    let higher = tally
                        .adopted
                        .as_ref()
                        .map_or(true, |current| prior.id > current.id);
                    if higher {
                        tally.adopted = Some(prior);
                    }
                }
                Ok(true)
            } else {
                tally.saw_promise(response.promised, proposal_id);
                Ok(false)
            }
        })
        .await;

        tally
    }

    async fn accept_phase(
        &self,
        attempt: u32,
        proposal: &Proposal,
        hooks: &dyn RoundHooks,
    ) -> PhaseTally {
        let request = AcceptRequest {
            proposal: proposal.clone(),
            from: self.node,
        };

        let pending = self.peers.iter().map(|peer| {
            let request = request.clone();
            let delay = self.peer_delay(hooks, Phase::Accept, attempt, proposal.id, peer);
            async move {
                if let Some(delay) = delay {
                    self.clock.sleep(delay).await;
                }
                (peer.id(), peer.accept(request).await)
            }
        });

        let mut tally = PhaseTally::new(proposal.id);
        self.collect(Phase::Accept, proposal.id, pending, &mut tally, |tally, response| {
            let response = response?;
            if response.ok {
                tally.ok.push(response.acceptor);
                Ok(true)
            } else {
                tally.saw_promise(response.promised, proposal.id);
                Ok(false)
            }
        })
        .await;

        tally
    }

    /// Run every peer call concurrently until the outcome is certain or the
    /// phase times out.
    ///
    /// Responses that are already available when a majority is reached are
    /// still folded into the tally so a prepare sees every prior acceptance
    /// it can without waiting.
    async fn collect<I, F, R, H>(
        &self,
        phase: Phase,
        proposal_id: ProposalId,
        pending: I,
        tally: &mut PhaseTally,
        mut handle: H,
    ) where
        I: IntoIterator<Item = F>,
        F: Future<Output = (NodeId, Result<R, ConsensusError>)>,
        H: FnMut(&mut PhaseTally, Result<R, ConsensusError>) -> Result<bool, ConsensusError>,
    {
        let mut pending: FuturesUnordered<F> = pending.into_iter().collect();
        let mut responded = HashSet::new();
        let mut failures = 0;
        let mut deadline = self.clock.sleep(self.config.phase_timeout);

        loop {
            if self.quorum.is_reached(tally.ok.len())
                || self.quorum.is_impossible(failures)
                || tally.preempted
            {
                break;
            }

            tokio::select! {
                next = pending.next() => match next {
                    Some((peer, response)) => {
                        responded.insert(peer);
                        if !fold(phase, peer, &mut handle, tally, response) {
                            failures += 1;
                        }
                    }
                    None => break,
                },
                _ = &mut deadline => {
                    warn!(
                        "{:?} phase for proposal {} timed out with {} responses",
                        phase,
                        proposal_id,
                        responded.len()
                    );
                    for peer in &self.peers {
                        if !responded.contains(&peer.id()) {
                            tally.unreachable.push(peer.id());
                        }
                    }
                    return;
                }
            }
        }

        while let Some(Some((peer, response))) = pending.next().now_or_never() {
            fold(phase, peer, &mut handle, tally, response);
        }
    }

    fn peer_delay(
        &self,
        hooks: &dyn RoundHooks,
        phase: Phase,
        attempt: u32,
        proposal_id: ProposalId,
        peer: &Arc<dyn Peer>,
    ) -> Option<Duration> {
        hooks.delay_at(&Checkpoint {
            phase,
            attempt,
            proposal_id,
            target: Target::Peer {
                id: peer.id(),
                local: peer.id() == self.node,
            },
        })
    }

    async fn pause(
        &self,
        hooks: &dyn RoundHooks,
        phase: Phase,
        attempt: u32,
        proposal_id: ProposalId,
        target: Target,
    ) {
        let checkpoint = Checkpoint {
            phase,
            attempt,
            proposal_id,
            target,
        };
        if let Some(delay) = hooks.delay_at(&checkpoint) {
            debug!("Proposer {} paused {:?} at {:?}", self.node, delay, checkpoint);
            self.clock.sleep(delay).await;
        }
    }

    fn record_unreachable(&self, tally: &PhaseTally) {
        let mut last = self
            .last_unreachable
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *last = tally.unreachable.clone();
    }

    /// Ask the other members' learners for a decision this node missed.
    ///
    /// The first non-empty answer wins; faults and silence count as "none".
    async fn fetch_decision(&self) -> Option<Decision> {
        let mut pending: FuturesUnordered<_> = self
            .peers
            .iter()
            .filter(|peer| peer.id() != self.node)
            .map(|peer| async move { (peer.id(), peer.decision().await) })
            .collect();
        let mut deadline = self.clock.sleep(self.config.phase_timeout);

        loop {
            tokio::select! {
                next = pending.next() => match next {
                    Some((_, Ok(Some(decision)))) => return Some(decision),
                    Some((_, Ok(None))) => {}
                    Some((peer, Err(e))) => {
                        debug!("Decision query to {} failed: {}", peer, e);
                    }
                    None => return None,
                },
                _ = &mut deadline => {
                    debug!("Decision query from {} timed out", self.node);
                    return None;
                }
            }
        }
    }

    /// Tell every other member's learner which acceptors accepted `proposal`
    async fn relay_decision(&self, proposal: Proposal, acceptors: Vec<NodeId>) -> Decision {
        let request = LearnRequest {
            proposal,
            acceptors,
        };

        let relays = self
            .peers
            .iter()
            .filter(|peer| peer.id() != self.node)
            .map(|peer| {
                let request = request.clone();
                async move { (peer.id(), peer.learn(request).await) }
            });

        tokio::select! {
            results = join_all(relays) => {
                for (peer, result) in results {
                    if let Err(e) = result {
                        warn!("Failed to relay decision to {}: {}", peer, e);
                    }
                }
            }
            _ = self.clock.sleep(self.config.phase_timeout) => {
                warn!("Relaying decision timed out; slow learners ask for it before proposing");
            }
        }

        self.learner
            .current_decision()
            .unwrap_or_else(|| Decision::from(request.proposal))
    }
}

/// Feed one response into the tally; returns false for a rejection or fault
fn fold<R, H>(
    phase: Phase,
    peer: NodeId,
    handle: &mut H,
    tally: &mut PhaseTally,
    response: Result<R, ConsensusError>,
) -> bool
where
    H: FnMut(&mut PhaseTally, Result<R, ConsensusError>) -> Result<bool, ConsensusError>,
{
    match handle(tally, response) {
        Ok(accepted) => accepted,
        Err(e) => {
            warn!("{:?} to {} failed: {}", phase, peer, e);
            tally.unreachable.push(peer);
            false
        }
    }
}
