use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use synod_consensus::{NodeSettings, ProposerConfig};

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This member's id
    pub node_id: u32,

    /// HTTP bind address
    pub listen_addr: SocketAddr,

    /// Full cluster membership, including this node
    pub members: Vec<MemberConfig>,

    #[serde(default)]
    pub proposer: ProposerSettings,

    /// Largest value accepted, in bytes
    #[serde(default = "default_max_value_len")]
    pub max_value_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberConfig {
    pub id: u32,
    /// Base URL of the member's HTTP API
    pub address: String,
}

/// Proposer retry and timeout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposerSettings {
    pub max_attempts: u32,
    pub phase_timeout_ms: u64,
    pub backoff_min_ms: u64,
    pub backoff_max_ms: u64,
    /// Fixed backoff seed for reproducible runs
    #[serde(default)]
    pub backoff_seed: Option<u64>,
}

fn default_max_value_len() -> usize {
    NodeSettings::default().max_value_len
}

impl Default for ProposerSettings {
    fn default() -> Self {
        let defaults = ProposerConfig::default();
        ProposerSettings {
            max_attempts: defaults.max_attempts,
            phase_timeout_ms: defaults.phase_timeout.as_millis() as u64,
            backoff_min_ms: defaults.backoff_min.as_millis() as u64,
            backoff_max_ms: defaults.backoff_max.as_millis() as u64,
            backoff_seed: None,
        }
    }
}

impl NodeConfig {
    /// Load and validate config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.members.is_empty() {
            bail!("members must list at least one node");
        }

        let mut ids = HashSet::new();
        for member in &self.members {
            if !ids.insert(member.id) {
                bail!("member {} is listed twice", member.id);
            }
            if member.id as usize >= self.members.len() {
                bail!(
                    "member ids must be 0..{}, found {}",
                    self.members.len(),
                    member.id
                );
            }
        }
        if !ids.contains(&self.node_id) {
            bail!("node_id {} is not in members", self.node_id);
        }

        let proposer = &self.proposer;
        if proposer.max_attempts == 0 {
            bail!("proposer.max_attempts must be at least 1");
        }
        if proposer.phase_timeout_ms == 0 {
            bail!("proposer.phase_timeout_ms must be positive");
        }
        if proposer.backoff_min_ms > proposer.backoff_max_ms {
            bail!(
                "proposer.backoff_min_ms ({}) exceeds backoff_max_ms ({})",
                proposer.backoff_min_ms,
                proposer.backoff_max_ms
            );
        }
        if self.max_value_len == 0 {
            bail!("max_value_len must be positive");
        }

        Ok(())
    }

    pub fn node_settings(&self) -> NodeSettings {
        NodeSettings {
            proposer: ProposerConfig {
                max_attempts: self.proposer.max_attempts,
                phase_timeout: Duration::from_millis(self.proposer.phase_timeout_ms),
                backoff_min: Duration::from_millis(self.proposer.backoff_min_ms),
                backoff_max: Duration::from_millis(self.proposer.backoff_max_ms),
                backoff_seed: self.proposer.backoff_seed,
            },
            max_value_len: self.max_value_len,
        }
    }

    /// Members other than this node
    pub fn remote_members(&self) -> impl Iterator<Item = &MemberConfig> {
        self.members
            .iter()
            .filter(move |member| member.id != self.node_id)
    }
}

/// Generate a sample three-member localhost configuration for `node_id`
pub fn generate_sample_config(node_id: u32, base_port: u16) -> Result<NodeConfig> {
    const MEMBERS: u16 = 3;

    if node_id >= u32::from(MEMBERS) {
        bail!("sample cluster has members 0..{}", MEMBERS);
    }
    let Some(port) = base_port.checked_add(node_id as u16) else {
        bail!("base port {} leaves no room for member {}", base_port, node_id);
    };
    if base_port.checked_add(MEMBERS - 1).is_none() {
        bail!("base port {} leaves no room for {} members", base_port, MEMBERS);
    }

    let members = (0..MEMBERS)
        .map(|i| MemberConfig {
            id: u32::from(i),
            address: format!("http://127.0.0.1:{}", base_port + i),
        })
        .collect();

    Ok(NodeConfig {
        node_id,
        listen_addr: SocketAddr::from(([127, 0, 0, 1], port)),
        members,
        proposer: ProposerSettings::default(),
        max_value_len: default_max_value_len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_config() {
        let config = generate_sample_config(1, 8000).unwrap();
        assert_eq!(config.members.len(), 3);
        assert_eq!(config.listen_addr.port(), 8001);
        assert_eq!(config.remote_members().count(), 2);
        config.validate().unwrap();
    }

    #[test]
    fn test_sample_config_rejects_unknown_member() {
        assert!(generate_sample_config(3, 8000).is_err());
        assert!(generate_sample_config(0, u16::MAX).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("synod-config-{}.json", std::process::id()));
        let config = generate_sample_config(2, 9100).unwrap();

        config.save(&path).unwrap();
        let loaded = NodeConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.node_id, 2);
        assert_eq!(loaded.listen_addr, config.listen_addr);
        assert_eq!(loaded.members[0].address, "http://127.0.0.1:9100");
    }

    #[test]
    fn test_optional_fields_default() {
        let config: NodeConfig = serde_json::from_str(
            r#"{
                "node_id": 0,
                "listen_addr": "127.0.0.1:8000",
                "members": [{ "id": 0, "address": "http://127.0.0.1:8000" }]
            }"#,
        )
        .unwrap();

        config.validate().unwrap();
        let settings = config.node_settings();
        assert_eq!(settings.max_value_len, 1024);
        assert_eq!(settings.proposer.max_attempts, 10);
        assert_eq!(settings.proposer.phase_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_validate_membership() {
        let mut config = generate_sample_config(0, 8000).unwrap();
        config.members[2].id = 1;
        assert!(config.validate().is_err());

        let mut config = generate_sample_config(0, 8000).unwrap();
        config.members[2].id = 5;
        assert!(config.validate().is_err());

        let mut config = generate_sample_config(0, 8000).unwrap();
        config.node_id = 7;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_proposer_settings() {
        let mut config = generate_sample_config(0, 8000).unwrap();
        config.proposer.backoff_min_ms = 500;
        config.proposer.backoff_max_ms = 100;
        assert!(config.validate().is_err());

        let mut config = generate_sample_config(0, 8000).unwrap();
        config.proposer.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
