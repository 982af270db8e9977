use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use futures_util::future::join_all;
use synod_rpc::{SubmitRequest, SubmitResponse};
use tracing::debug;

use crate::cli::DriveScenario;

/// One scripted client in a drive scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPlan {
    pub name: String,
    /// Index into the endpoint list
    pub endpoint: usize,
    pub value: String,
    pub proposal_id: i64,
    pub case: i64,
    /// Delay before this client submits, from scenario start
    pub start: Duration,
}

impl ClientPlan {
    fn new(label: char, endpoint: usize, start: Duration) -> Self {
        ClientPlan {
            name: format!("Client {}", label),
            endpoint,
            value: label.to_string(),
            proposal_id: 0,
            case: 0,
            start,
        }
    }

    fn forced(mut self, proposal_id: i64, case: i64) -> Self {
        self.proposal_id = proposal_id;
        self.case = case;
        self
    }
}

/// Client schedule for `scenario`
pub fn plan(scenario: DriveScenario, delay: Duration) -> Vec<ClientPlan> {
    match scenario {
        DriveScenario::OneClient => vec![ClientPlan::new('A', 0, Duration::ZERO)],
        DriveScenario::TwoClients => vec![
            ClientPlan::new('A', 0, Duration::ZERO),
            ClientPlan::new('B', 1, delay),
        ],
        DriveScenario::MajorityAdopt => vec![
            ClientPlan::new('A', 0, Duration::ZERO).forced(3, 1),
            ClientPlan::new('B', 1, Duration::from_millis(700)).forced(4, 1),
        ],
        DriveScenario::MajorityPreempt => vec![
            ClientPlan::new('A', 0, Duration::ZERO).forced(3, 2),
            ClientPlan::new('B', 1, Duration::from_millis(400)).forced(4, 2),
        ],
        DriveScenario::Livelock => vec![
            ClientPlan::new('A', 0, Duration::ZERO).forced(3, 3),
            ClientPlan::new('B', 1, Duration::from_millis(500)).forced(4, 3),
            ClientPlan::new('C', 2, Duration::from_millis(1500)).forced(5, 3),
        ],
    }
}

/// Run every client of `scenario` concurrently and print what each receives
pub async fn drive(scenario: DriveScenario, endpoints: &[String], delay: Duration) -> Result<()> {
    let clients = plan(scenario, delay);

    if let Some(needed) = clients.iter().map(|c| c.endpoint + 1).max() {
        if endpoints.len() < needed {
            bail!(
                "{:?} needs {} endpoints, got {}",
                scenario,
                needed,
                endpoints.len()
            );
        }
    }

    let http = reqwest::Client::new();
    let handles = clients.into_iter().map(|client| {
        let http = http.clone();
        let endpoint = endpoints[client.endpoint].clone();
        tokio::spawn(async move {
            tokio::time::sleep(client.start).await;
            client_submit(&http, &endpoint, &client).await;
        })
    });

    for result in join_all(handles).await {
        result?;
    }

    Ok(())
}

async fn client_submit(http: &reqwest::Client, endpoint: &str, client: &ClientPlan) {
    println!(
        "[{}] Submitting value '{}' to {}",
        client.name, client.value, endpoint
    );

    let request = SubmitRequest {
        value: client.value.clone(),
        proposal_id: client.proposal_id,
        case: client.case,
    };

    match submit(http, endpoint, &request).await {
        Ok(result) => println!("[{}] Received result: {}", client.name, result),
        Err(e) => println!("[{}] Connection to {} failed: {}", client.name, endpoint, e),
    }
}

/// POST a submission to `endpoint` and decode the reply.
///
/// A `failed` status still decodes into a response; other error replies
/// become errors carrying the server's message.
pub async fn submit(
    http: &reqwest::Client,
    endpoint: &str,
    request: &SubmitRequest,
) -> Result<SubmitResponse> {
    let url = format!("{}/submit", endpoint.trim_end_matches('/'));
    let response = http.post(&url).json(request).send().await?;
    let status = response.status();
    let body: serde_json::Value = response.json().await?;
    debug!("{} returned {}: {}", url, status, body);

    if let Ok(result) = serde_json::from_value::<SubmitResponse>(body.clone()) {
        return Ok(result);
    }

    let message = body
        .get("error")
        .and_then(|e| e.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());
    Err(anyhow!("{} returned {}: {}", url, status, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority_scenarios_force_ids() {
        let clients = plan(DriveScenario::MajorityAdopt, Duration::ZERO);
        assert_eq!(clients.len(), 2);
        assert_eq!((clients[0].proposal_id, clients[0].case), (3, 1));
        assert_eq!((clients[1].proposal_id, clients[1].case), (4, 1));
        assert_eq!(clients[1].start, Duration::from_millis(700));

        let clients = plan(DriveScenario::MajorityPreempt, Duration::ZERO);
        assert_eq!(clients[1].start, Duration::from_millis(400));
        assert!(clients.iter().all(|c| c.case == 2));
    }

    #[test]
    fn test_livelock_uses_three_nodes() {
        let clients = plan(DriveScenario::Livelock, Duration::ZERO);
        let endpoints: Vec<usize> = clients.iter().map(|c| c.endpoint).collect();
        let ids: Vec<i64> = clients.iter().map(|c| c.proposal_id).collect();

        assert_eq!(endpoints, vec![0, 1, 2]);
        assert_eq!(ids, vec![3, 4, 5]);
        // C starts one second after B
        assert_eq!(clients[2].start - clients[1].start, Duration::from_secs(1));
    }

    #[test]
    fn test_two_clients_use_requested_delay() {
        let clients = plan(DriveScenario::TwoClients, Duration::from_secs(6));
        assert_eq!(clients[0].value, "A");
        assert_eq!(clients[1].value, "B");
        assert_eq!(clients[1].start, Duration::from_secs(6));
        assert!(clients.iter().all(|c| c.proposal_id == 0 && c.case == 0));
    }

    #[tokio::test]
    async fn test_drive_rejects_missing_endpoints() {
        let endpoints = vec!["http://127.0.0.1:8000".to_string()];
        let result = drive(DriveScenario::Livelock, &endpoints, Duration::ZERO).await;
        assert!(result.is_err());
    }
}
