// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Reservation Reconciler
//!
//! Background task that repairs what a crash between the two steps of a
//! bind or unbind can leave behind, and expires old tombstones.
//!
//! ## Strategy
//!
//! Every `interval` (default 300 s) the reconciler:
//! 1. Releases host reservations whose account is gone or no longer lists
//!    the host.
//! 2. Re-reserves account bindings whose reservation is missing.
//! 3. Prunes tombstones older than their class cooldown.
//!
//! A pass that changed anything writes one audit event.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::registry::IdentifierClass;
use crate::routing::{ReconcileReport, RoutingEngine, RoutingResult};
use crate::storage::{AuditEvent, AuditEventType, AuditRepository, FileStorage};

/// Default interval between passes.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

/// Outcome of one reconciler pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct PassReport {
    pub reservations: ReconcileReport,
    pub tombstones_pruned: usize,
}

pub struct Reconciler {
    routing: Arc<RoutingEngine>,
    storage: Arc<FileStorage>,
    interval: Duration,
}

impl Reconciler {
    pub fn new(routing: Arc<RoutingEngine>, storage: Arc<FileStorage>) -> Self {
        Self {
            routing,
            storage,
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run passes until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(reconciler.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Reconciler starting");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Reconciler shutting down");
                    return;
                }
            }

            if let Err(e) = self.pass().await {
                warn!(error = %e, "Reconciler pass failed");
            }
        }
    }

    /// One full pass.
    pub async fn pass(&self) -> RoutingResult<PassReport> {
        let reservations = self.routing.reconcile_reservations().await?;

        let now = Utc::now();
        let cooldowns = self.routing.settings().cooldowns;
        let mut tombstones_pruned = 0;
        for class in IdentifierClass::ALL {
            tombstones_pruned +=
                self.routing
                    .registry()
                    .prune_expired(class, cooldowns.hours_for(class), now)?;
        }

        let report = PassReport {
            reservations,
            tombstones_pruned,
        };
        self.audit(&report);

        info!(
            orphans_released = report.reservations.orphans_released,
            reservations_restored = report.reservations.reservations_restored,
            conflicts = report.reservations.conflicts,
            tombstones_pruned,
            "Reconciler pass complete"
        );
        Ok(report)
    }

    fn audit(&self, report: &PassReport) {
        let audit = AuditRepository::new(&self.storage);
        if report.reservations.changed() {
            audit.record(
                AuditEvent::new(AuditEventType::ReservationsReconciled)
                    .with_actor("reconciler")
                    .with_details(serde_json::json!(report.reservations)),
            );
        }
        if report.tombstones_pruned > 0 {
            audit.record(
                AuditEvent::new(AuditEventType::TombstonesPruned)
                    .with_actor("reconciler")
                    .with_details(serde_json::json!({ "pruned": report.tombstones_pruned })),
            );
        }
    }
}
