use std::fmt;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use synod_consensus::{
    AcceptRequest, AcceptResponse, ConsensusError, DecisionResponse, LearnRequest, LearnResponse,
    NodeStatus, PaxosNode, PrepareRequest, PrepareResponse, ProposeOutcome,
};
use tracing::{info, warn};

use crate::error::RpcError;
use crate::scenario::Scenario;

/// Application state shared with handlers
pub struct AppState {
    pub node: Arc<PaxosNode>,
}

// Request types

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub value: String,
    /// Zero lets the node pick an id; negative ids are rejected
    #[serde(default)]
    pub proposal_id: i64,
    #[serde(default)]
    pub case: i64,
}

// Response types

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    Decided,
    AlreadyDecided,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub status: SubmitStatus,
    /// Decided value, which may differ from the submitted one
    pub value: Option<String>,
    pub proposal_id: Option<u64>,
    pub message: String,
}

impl SubmitResponse {
    fn from_outcome(outcome: &ProposeOutcome) -> Self {
        let (status, message) = match outcome {
            ProposeOutcome::AlreadyDecided(_) => (
                SubmitStatus::AlreadyDecided,
                "Consensus already reached; no new values are accepted",
            ),
            ProposeOutcome::Decided { adopted: false, .. } => {
                (SubmitStatus::Decided, "Consensus reached on the submitted value")
            }
            ProposeOutcome::Decided { adopted: true, .. } => (
                SubmitStatus::Decided,
                "Consensus reached on a previously accepted value",
            ),
            ProposeOutcome::Preempted(_) => (
                SubmitStatus::Decided,
                "Consensus reached by a competing proposal",
            ),
        };

        let decision = outcome.decision();
        SubmitResponse {
            status,
            value: Some(decision.value.as_str().to_string()),
            proposal_id: Some(decision.proposal_id.get()),
            message: message.to_string(),
        }
    }

    fn failed(message: String) -> Self {
        SubmitResponse {
            status: SubmitStatus::Failed,
            value: None,
            proposal_id: None,
            message,
        }
    }
}

impl fmt::Display for SubmitResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, self.proposal_id) {
            (Some(value), Some(id)) => {
                write!(f, "{} '{}' (proposal {}): {}", self.status, value, id, self.message)
            }
            _ => write!(f, "{}: {}", self.status, self.message),
        }
    }
}

impl fmt::Display for SubmitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SubmitStatus::Decided => "decided",
            SubmitStatus::AlreadyDecided => "already decided",
            SubmitStatus::Failed => "failed",
        };
        f.write_str(text)
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, RpcError> {
    payload
        .map(|Json(request)| request)
        .map_err(|e| RpcError::BadRequest(e.body_text()))
}

// Handlers

/// GET /status - Node membership, acceptor state and decision
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<NodeStatus> {
    Json(state.node.status().await)
}

/// POST /submit - Drive a value to consensus
pub async fn submit_value(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), RpcError> {
    let request = body(payload)?;

    let proposal_id = u64::try_from(request.proposal_id).map_err(|_| {
        RpcError::BadRequest(format!("proposal_id {} is negative", request.proposal_id))
    })?;
    let scenario = Scenario::from_case(request.case)?;

    info!(
        "Submit {:?} (proposal_id {}, {:?})",
        request.value, proposal_id, scenario
    );

    match state
        .node
        .submit_value(request.value, proposal_id, &scenario)
        .await
    {
        Ok(outcome) => Ok((StatusCode::OK, Json(SubmitResponse::from_outcome(&outcome)))),
        Err(e @ ConsensusError::QuorumUnreachable { .. }) => {
            warn!("Submit failed: {}", e);
            Ok((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(SubmitResponse::failed(e.to_string())),
            ))
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /paxos/prepare - Phase 1 request from a proposer
pub async fn paxos_prepare(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PrepareRequest>, JsonRejection>,
) -> Result<Json<PrepareResponse>, RpcError> {
    let request = body(payload)?;
    Ok(Json(state.node.handle_prepare(request).await?))
}

/// POST /paxos/accept - Phase 2 request from a proposer
pub async fn paxos_accept(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AcceptRequest>, JsonRejection>,
) -> Result<Json<AcceptResponse>, RpcError> {
    let request = body(payload)?;
    Ok(Json(state.node.handle_accept(request).await?))
}

/// POST /paxos/learn - Acceptances relayed by a winning proposer.
///
/// The relayed acceptor list is trusted; this endpoint is meant for
/// cluster members only.
pub async fn paxos_learn(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LearnRequest>, JsonRejection>,
) -> Result<Json<LearnResponse>, RpcError> {
    let request = body(payload)?;
    Ok(Json(state.node.handle_learn(request)?))
}

/// GET /paxos/decision - This member's learned decision, if any
pub async fn paxos_decision(State(state): State<Arc<AppState>>) -> Json<DecisionResponse> {
    Json(state.node.handle_decision())
}
