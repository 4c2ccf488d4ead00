// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Response shapes and denomination helpers for the external RPC network.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Decimal places of the network's base denomination.
pub const DENOMINATION_DECIMALS: u32 = 6;

/// Node status code for a staked node.
pub const STATUS_STAKED: i64 = 2;

/// Node record as reported by `/v1/query/node`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct NodeStatus {
    pub address: String,
    #[serde(default)]
    pub chains: Vec<String>,
    #[serde(default)]
    pub jailed: bool,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub service_url: String,
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub tokens: String,
    #[serde(default)]
    pub unstaking_time: String,
}

impl NodeStatus {
    /// Staked and not jailed.
    pub fn is_active_stake(&self) -> bool {
        self.status == STATUS_STAKED && !self.jailed
    }
}

/// Interpret a majority `/v1/query/node` body.
///
/// Bodies carrying an `error` field, or not shaped like a node, are no answer.
pub fn parse_node(body: serde_json::Value) -> Option<NodeStatus> {
    if body.is_null() || body.get("error").is_some() {
        return None;
    }
    serde_json::from_value(body).ok()
}

/// Interpret a majority `/v1/query/balance` body as raw base units.
///
/// The network reports `balance` as a number or a numeric string.
pub fn parse_balance(body: &serde_json::Value) -> Option<u128> {
    match body.get("balance")? {
        serde_json::Value::Number(n) => n.as_u64().map(u128::from),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Format raw base units as a decimal string with trailing zeros trimmed.
pub fn format_balance(raw: u128) -> String {
    let divisor = 10u128.pow(DENOMINATION_DECIMALS);
    let whole = raw / divisor;
    let remainder = raw % divisor;

    if remainder == 0 {
        return whole.to_string();
    }
    let fraction = format!("{:0>width$}", remainder, width = DENOMINATION_DECIMALS as usize);
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn format_balance_cases() {
        assert_eq!(format_balance(0), "0");
        assert_eq!(format_balance(1_000_000), "1");
        assert_eq!(format_balance(1_500_000), "1.5");
        assert_eq!(format_balance(1), "0.000001");
        assert_eq!(format_balance(123_456_789), "123.456789");
    }

    #[test]
    fn parse_balance_accepts_number_or_string() {
        assert_eq!(parse_balance(&json!({"balance": 42})), Some(42));
        assert_eq!(parse_balance(&json!({"balance": "1000000"})), Some(1_000_000));
        assert_eq!(parse_balance(&json!({"balance": "abc"})), None);
        assert_eq!(parse_balance(&json!({"other": 1})), None);
    }

    #[test]
    fn parse_node_rejects_errors() {
        assert!(parse_node(json!({"error": "not found"})).is_none());
        assert!(parse_node(serde_json::Value::Null).is_none());
        assert!(parse_node(json!([1, 2])).is_none());

        let node = parse_node(json!({
            "address": "ab".repeat(20),
            "chains": ["0001"],
            "jailed": false,
            "public_key": "00",
            "service_url": "https://node.example.net:443",
            "status": 2,
            "tokens": "15000000000",
            "unstaking_time": "0001-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(node.is_active_stake());
    }

    #[test]
    fn jailed_or_unstaking_is_not_active() {
        let mut node = NodeStatus {
            address: "a".into(),
            chains: vec![],
            jailed: false,
            public_key: String::new(),
            service_url: String::new(),
            status: STATUS_STAKED,
            tokens: "1".into(),
            unstaking_time: String::new(),
        };
        assert!(node.is_active_stake());
        node.jailed = true;
        assert!(!node.is_active_stake());
        node.jailed = false;
        node.status = 1;
        assert!(!node.is_active_stake());
    }
}
