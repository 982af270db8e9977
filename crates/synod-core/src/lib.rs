//! Synod Core - Proposal types, id generation, and quorum math
//!
//! This crate provides the foundational types shared by every role of the
//! Synod single-decree Paxos cluster.

pub mod error;
pub mod id;
pub mod quorum;
pub mod types;

pub use error::CoreError;
pub use id::ProposalIdGenerator;
pub use quorum::{majority, Quorum};
pub use types::*;
