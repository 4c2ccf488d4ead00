// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Log lines shipped by provider gateways.
//!
//! Each stream is appended to a daily JSONL file per gateway under
//! `gateway_logs/{stream}/{gateway_id}/`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FileStorage, StorageError, StorageResult};

/// Which log stream a batch belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayLogStream {
    Error,
    Info,
    ServerNotice,
}

impl GatewayLogStream {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Info => "info",
            Self::ServerNotice => "server_notice",
        }
    }
}

impl fmt::Display for GatewayLogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored log line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayLogEntry {
    pub received_at: DateTime<Utc>,
    pub gateway_id: String,
    pub provider_id: String,
    pub message: String,
}

pub struct GatewayLogRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> GatewayLogRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Append a batch of already-trimmed lines. Returns how many were written.
    pub fn append(
        &self,
        stream: GatewayLogStream,
        provider_id: &str,
        gateway_id: &str,
        lines: &[String],
    ) -> StorageResult<usize> {
        let received_at = Utc::now();
        let date = received_at.format("%Y-%m-%d").to_string();
        let path = self
            .storage
            .paths()
            .gateway_log_file(stream.as_str(), gateway_id, &date);

        for message in lines {
            let entry = GatewayLogEntry {
                received_at,
                gateway_id: gateway_id.to_string(),
                provider_id: provider_id.to_string(),
                message: message.clone(),
            };
            self.storage
                .append_line(&path, &serde_json::to_string(&entry)?)?;
        }
        Ok(lines.len())
    }

    /// Entries for one gateway, stream and day (`YYYY-MM-DD`).
    pub fn read(
        &self,
        stream: GatewayLogStream,
        gateway_id: &str,
        date: &str,
    ) -> StorageResult<Vec<GatewayLogEntry>> {
        let path = self
            .storage
            .paths()
            .gateway_log_file(stream.as_str(), gateway_id, date);
        if !self.storage.exists(&path) {
            return Ok(Vec::new());
        }
        self.storage
            .read_to_string(&path)?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StorageError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fs_store::tests::temp_storage;
    use std::fs;

    #[test]
    fn streams_are_kept_apart() {
        let storage = temp_storage();
        let repo = GatewayLogRepository::new(&storage);

        let written = repo
            .append(
                GatewayLogStream::Error,
                "prov-1",
                "gw-1",
                &["upstream timeout".to_string(), "bad gateway".to_string()],
            )
            .unwrap();
        assert_eq!(written, 2);
        repo.append(GatewayLogStream::Info, "prov-1", "gw-1", &["started".to_string()])
            .unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let errors = repo.read(GatewayLogStream::Error, "gw-1", &today).unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "upstream timeout");
        assert_eq!(errors[0].provider_id, "prov-1");
        assert_eq!(repo.read(GatewayLogStream::Info, "gw-1", &today).unwrap().len(), 1);
        assert!(repo
            .read(GatewayLogStream::ServerNotice, "gw-1", &today)
            .unwrap()
            .is_empty());
        fs::remove_dir_all(storage.paths().root()).ok();
    }
}
