use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use synod_core::{Decision, NodeId};

use crate::acceptor::Acceptor;
use crate::error::ConsensusError;
use crate::learner::Learner;
use crate::net::{
    AcceptRequest, AcceptResponse, DecisionResponse, LearnRequest, LearnResponse, PrepareRequest,
    PrepareResponse,
};

/// A cluster member's acceptor and learner, as seen by a proposer
#[async_trait]
pub trait Peer: Send + Sync {
    /// Member id of the remote acceptor
    fn id(&self) -> NodeId;

    /// Whether calls stay inside this process
    fn is_local(&self) -> bool {
        false
    }

    async fn prepare(&self, request: PrepareRequest) -> Result<PrepareResponse, ConsensusError>;

    async fn accept(&self, request: AcceptRequest) -> Result<AcceptResponse, ConsensusError>;

    async fn learn(&self, request: LearnRequest) -> Result<LearnResponse, ConsensusError>;

    /// The member learner's decision, if it has one
    async fn decision(&self) -> Result<Option<Decision>, ConsensusError>;
}

/// Peer backed by an acceptor and learner in the same process
pub struct LocalPeer {
    acceptor: Arc<Acceptor>,
    learner: Arc<Learner>,
}

impl LocalPeer {
    pub fn new(acceptor: Arc<Acceptor>, learner: Arc<Learner>) -> Self {
        LocalPeer { acceptor, learner }
    }
}

#[async_trait]
impl Peer for LocalPeer {
    fn id(&self) -> NodeId {
        self.acceptor.id
    }

    fn is_local(&self) -> bool {
        true
    }

    async fn prepare(&self, request: PrepareRequest) -> Result<PrepareResponse, ConsensusError> {
        Ok(self.acceptor.handle_prepare(request.proposal_id).await)
    }

    async fn accept(&self, request: AcceptRequest) -> Result<AcceptResponse, ConsensusError> {
        Ok(self.acceptor.handle_accept(request.proposal).await)
    }

    async fn learn(&self, request: LearnRequest) -> Result<LearnResponse, ConsensusError> {
        let decision = self
            .learner
            .observe_all(&request.acceptors, &request.proposal);
        Ok(LearnResponse { decision })
    }

    async fn decision(&self) -> Result<Option<Decision>, ConsensusError> {
        Ok(self.learner.current_decision())
    }
}

/// Peer reached over the node HTTP API
#[derive(Debug, Clone)]
pub struct HttpPeer {
    pub id: NodeId,
    pub address: String,
    client: reqwest::Client,
}

impl HttpPeer {
    pub fn new(id: NodeId, address: String, client: reqwest::Client) -> Self {
        HttpPeer {
            id,
            address,
            client,
        }
    }

    async fn post<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp, ConsensusError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.address.trim_end_matches('/'), path);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.fault(e))?;

        if !response.status().is_success() {
            return Err(ConsensusError::Transport {
                peer: self.id,
                reason: format!("{} returned {}", url, response.status()),
            });
        }

        response.json().await.map_err(|e| self.fault(e))
    }

    async fn get<Resp>(&self, path: &str) -> Result<Resp, ConsensusError>
    where
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.address.trim_end_matches('/'), path);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.fault(e))?;

        if !response.status().is_success() {
            return Err(ConsensusError::Transport {
                peer: self.id,
                reason: format!("{} returned {}", url, response.status()),
            });
        }

        response.json().await.map_err(|e| self.fault(e))
    }

    fn fault(&self, error: reqwest::Error) -> ConsensusError {
        ConsensusError::Transport {
            peer: self.id,
            reason: error.to_string(),
        }
    }
}

#[async_trait]
impl Peer for HttpPeer {
    fn id(&self) -> NodeId {
        self.id
    }

    async fn prepare(&self, request: PrepareRequest) -> Result<PrepareResponse, ConsensusError> {
        self.post("/paxos/prepare", &request).await
    }

    async fn accept(&self, request: AcceptRequest) -> Result<AcceptResponse, ConsensusError> {
        self.post("/paxos/accept", &request).await
    }

    async fn learn(&self, request: LearnRequest) -> Result<LearnResponse, ConsensusError> {
        self.post("/paxos/learn", &request).await
    }

    async fn decision(&self) -> Result<Option<Decision>, ConsensusError> {
        let response: DecisionResponse = self.get("/paxos/decision").await?;
        Ok(response.decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synod_core::{Proposal, ProposalId, Quorum, Value};

    #[tokio::test]
    async fn test_local_peer_round_trip() {
        let acceptor = Arc::new(Acceptor::new(NodeId(0)));
        let learner = Arc::new(Learner::new(NodeId(0), Quorum::new(1)));
        let peer = LocalPeer::new(Arc::clone(&acceptor), Arc::clone(&learner));
        let proposal = Proposal::new(ProposalId(3), Value::new("A"));

        assert!(peer.is_local());
        assert_eq!(peer.id(), NodeId(0));

        let promise = peer
            .prepare(PrepareRequest {
                proposal_id: ProposalId(3),
                from: NodeId(0),
            })
            .await
            .unwrap();
        assert!(promise.ok);

        let accepted = peer
            .accept(AcceptRequest {
                proposal: proposal.clone(),
                from: NodeId(0),
            })
            .await
            .unwrap();
        assert!(accepted.ok);

        let learned = peer
            .learn(LearnRequest {
                proposal,
                acceptors: vec![NodeId(0)],
            })
            .await
            .unwrap();
        assert_eq!(learned.decision.unwrap().value, Value::new("A"));

        let known = peer.decision().await.unwrap();
        assert_eq!(known.unwrap().value, Value::new("A"));
    }

    #[tokio::test]
    async fn test_http_peer_reports_unreachable_peer() {
        // Port 9 (discard) on localhost is not expected to accept connections
        let peer = HttpPeer::new(
            NodeId(2),
            "http://127.0.0.1:9".to_string(),
            reqwest::Client::new(),
        );

        let result = peer
            .prepare(PrepareRequest {
                proposal_id: ProposalId(3),
                from: NodeId(0),
            })
            .await;

        match result {
            Err(ConsensusError::Transport { peer, .. }) => assert_eq!(peer, NodeId(2)),
            other => panic!("expected transport fault, got {:?}", other),
        }
    }
}
