// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the external RPC network.
//!
//! Every read goes through [`ConsensusClient`], so a single flaky or
//! misbehaving endpoint behind the load balancer cannot decide the answer.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use super::types::{format_balance, parse_balance, parse_node, NodeStatus};
use super::NetworkQuery;
use crate::consensus::ConsensusClient;

/// Errors from a single HTTP attempt. Folded into the vote, never surfaced.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct PoktClient {
    http: reqwest::Client,
    endpoint: url::Url,
    consensus: ConsensusClient,
}

impl PoktClient {
    pub fn new(endpoint: &str, consensus: ConsensusClient, timeout: Duration) -> Result<Self, NetworkError> {
        let endpoint: url::Url = endpoint
            .parse()
            .map_err(|e: url::ParseError| NetworkError::InvalidRpcUrl(e.to_string()))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(NetworkError::InvalidRpcUrl(format!(
                "unsupported scheme {}",
                endpoint.scheme()
            )));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint,
            consensus,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.endpoint.as_str().trim_end_matches('/'))
    }

    /// One POST attempt returning the raw JSON body.
    async fn post_query(&self, path: &str, address: &str) -> Result<serde_json::Value, NetworkError> {
        let body = json!({ "address": address, "height": 0 });
        let response = self
            .http
            .post(self.url(path))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl NetworkQuery for PoktClient {
    async fn balance(&self, address: &str) -> String {
        let body = self
            .consensus
            .query(|| self.post_query("/v1/query/balance", address))
            .await;

        match body.as_ref().and_then(parse_balance) {
            Some(raw) => format_balance(raw),
            None => {
                warn!(address, "No consensus on balance, reporting zero");
                "0".to_string()
            }
        }
    }

    async fn node(&self, address: &str) -> Option<NodeStatus> {
        let body = self
            .consensus
            .query(|| self.post_query("/v1/query/node", address))
            .await?;
        parse_node(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_endpoints() {
        let consensus = ConsensusClient::default();
        assert!(matches!(
            PoktClient::new("not a url", consensus.clone(), Duration::from_secs(1)),
            Err(NetworkError::InvalidRpcUrl(_))
        ));
        assert!(matches!(
            PoktClient::new("ftp://node.example.net", consensus, Duration::from_secs(1)),
            Err(NetworkError::InvalidRpcUrl(_))
        ));
    }

    #[test]
    fn joins_paths_without_double_slash() {
        let client = PoktClient::new(
            "https://rpc.example.net/",
            ConsensusClient::default(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            client.url("/v1/query/node"),
            "https://rpc.example.net/v1/query/node"
        );
    }

    #[tokio::test]
    async fn unreachable_network_degrades_to_defaults() {
        // Port 9 on localhost: connection refused on every attempt.
        let client = PoktClient::new(
            "http://127.0.0.1:9",
            ConsensusClient::new(3, Duration::from_millis(500)),
            Duration::from_millis(500),
        )
        .unwrap();

        assert_eq!(client.balance(&"ab".repeat(20)).await, "0");
        assert!(client.node(&"ab".repeat(20)).await.is_none());
    }
}
