use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use synod_consensus::ConsensusError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Consensus error: {0}")]
    Consensus(#[from] ConsensusError),
}

impl RpcError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RpcError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::Consensus(e) if e.is_malformed() => StatusCode::BAD_REQUEST,
            RpcError::Consensus(ConsensusError::QuorumUnreachable { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            RpcError::Consensus(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            RpcError::BadRequest(msg) => msg.clone(),
            RpcError::Consensus(e) => e.to_string(),
        };

        let body = json!({
            "error": message
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synod_core::{CoreError, NodeId};

    #[test]
    fn test_status_codes() {
        let malformed: RpcError =
            ConsensusError::from(CoreError::MalformedValue("empty".into())).into();
        assert_eq!(malformed.status_code(), StatusCode::BAD_REQUEST);

        let unreachable: RpcError = ConsensusError::QuorumUnreachable {
            attempts: 3,
            unreachable: vec![NodeId(1)],
        }
        .into();
        assert_eq!(unreachable.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let transport: RpcError = ConsensusError::Transport {
            peer: NodeId(2),
            reason: "refused".into(),
        }
        .into();
        assert_eq!(transport.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
