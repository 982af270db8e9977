//! Synod Consensus - Single-decree Paxos roles
//!
//! This crate provides the acceptor, learner and proposer roles, the peer
//! transport they talk through, and the node that colocates them.

pub mod acceptor;
pub mod clock;
pub mod error;
pub mod hooks;
pub mod learner;
pub mod net;
pub mod node;
pub mod peer;
pub mod proposer;

pub use acceptor::{Acceptor, AcceptorState};
pub use clock::{Backoff, Clock, TokioClock};
pub use error::ConsensusError;
pub use hooks::{Checkpoint, NoHooks, Phase, RoundHooks, Target};
pub use learner::Learner;
pub use net::{
    AcceptRequest, AcceptResponse, DecisionResponse, LearnRequest, LearnResponse, PrepareRequest,
    PrepareResponse,
};
pub use node::{NodeSettings, NodeStatus, PaxosNode};
pub use peer::{HttpPeer, LocalPeer, Peer};
pub use proposer::{ProposeOutcome, Proposer, ProposerConfig};
