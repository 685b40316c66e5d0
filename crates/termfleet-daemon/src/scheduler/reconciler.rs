//! Reconciliation loop
//!
//! One tick reads the whole fleet, prunes workstations whose retention has
//! expired, probes the rest with a bounded worker pool and applies the
//! lifecycle rules to each result. Ticks never overlap: the loop awaits each
//! tick inline, and `run_tick` itself is single-flight for callers outside
//! the loop.

use crate::config::SchedulerConfig;
use crate::dns::DnsProvider;
use crate::storage::{
    ConditionalUpdate, EventStorage, Storage, WorkstationQuery, WorkstationStorage,
    WorkstationVersion,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use termfleet_health::{probe_all, HealthProber, ProbeResult};
use termfleet_types::{GracePeriods, NewWorkstationEvent, Workstation};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{interval, MissedTickBehavior};

/// Summary of one completed tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Workstations probed
    pub checked: usize,
    /// Workstations deleted after their retention expired
    pub pruned: usize,
    /// Status changes written
    pub transitions: usize,
    /// Heartbeats written without a status change
    pub refreshed: usize,
    /// Store or DNS operations that failed
    pub failures: usize,
    pub duration: Duration,
}

impl TickReport {
    fn is_quiet(&self) -> bool {
        self.pruned == 0 && self.transitions == 0 && self.failures == 0
    }
}

/// What happened when a tick was requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Completed(TickReport),
    /// Another tick was still running
    Skipped,
}

/// Periodic reconciler
pub struct Reconciler {
    config: SchedulerConfig,
    grace: GracePeriods,
    storage: Arc<dyn Storage>,
    prober: Arc<dyn HealthProber>,
    dns: Arc<dyn DnsProvider>,
    tick_lock: Mutex<()>,
    trigger_tx: mpsc::Sender<()>,
    trigger_rx: Mutex<Option<mpsc::Receiver<()>>>,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(
        config: SchedulerConfig,
        storage: Arc<dyn Storage>,
        prober: Arc<dyn HealthProber>,
        dns: Arc<dyn DnsProvider>,
    ) -> Arc<Self> {
        // Capacity one: requests made while one is pending are coalesced.
        let (trigger_tx, trigger_rx) = mpsc::channel(1);

        Arc::new(Self {
            grace: config.grace.periods(),
            config,
            storage,
            prober,
            dns,
            tick_lock: Mutex::new(()),
            trigger_tx,
            trigger_rx: Mutex::new(Some(trigger_rx)),
        })
    }

    /// Request an extra tick as soon as the loop is free
    pub fn trigger(&self) {
        if self.trigger_tx.try_send(()).is_err() {
            tracing::debug!("Reconcile already requested");
        }
    }

    /// Run the loop until `shutdown` turns true.
    ///
    /// The first tick runs immediately. A due tick that would overlap a
    /// running one is skipped.
    pub async fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut trigger_rx = self.trigger_rx.lock().await.take();
        if trigger_rx.is_none() {
            tracing::warn!("Reconciler already started; manual triggers disabled for this loop");
        }

        let mut ticker = interval(self.config.tick_interval().max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_ms = self.config.tick_interval_ms,
            probe_timeout_ms = self.config.probe_timeout_ms,
            max_concurrent_probes = self.config.max_concurrent_probes,
            "Reconciler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.clone().run_guarded().await;
                }
                Some(()) = next_trigger(&mut trigger_rx) => {
                    self.clone().run_guarded().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Reconciler stopped");
    }

    // Runs the tick on its own task so a panic ends only that tick.
    async fn run_guarded(self: Arc<Self>) {
        let handle = tokio::spawn(async move { self.run_tick().await });
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Reconciliation tick aborted");
        }
    }

    /// Run one tick now
    pub async fn run_tick(&self) -> TickOutcome {
        self.run_tick_at(Utc::now()).await
    }

    /// Run one tick, evaluating grace periods against `now`
    pub async fn run_tick_at(&self, now: DateTime<Utc>) -> TickOutcome {
        let Ok(_guard) = self.tick_lock.try_lock() else {
            tracing::warn!("Previous reconciliation tick still running; skipping");
            return TickOutcome::Skipped;
        };

        let started = Instant::now();
        let mut report = TickReport::default();

        match self.storage.list_workstations(&WorkstationQuery::all()).await {
            Ok(workstations) => self.reconcile(workstations, now, &mut report).await,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list workstations");
                report.failures += 1;
            }
        }

        report.duration = started.elapsed();

        if report.is_quiet() {
            tracing::debug!(
                checked = report.checked,
                duration_ms = report.duration.as_millis() as u64,
                "Reconciliation tick complete"
            );
        } else {
            tracing::info!(
                checked = report.checked,
                pruned = report.pruned,
                transitions = report.transitions,
                refreshed = report.refreshed,
                failures = report.failures,
                duration_ms = report.duration.as_millis() as u64,
                "Reconciliation tick complete"
            );
        }

        TickOutcome::Completed(report)
    }

    async fn reconcile(
        &self,
        workstations: Vec<Workstation>,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) {
        let (to_prune, to_check): (Vec<_>, Vec<_>) = workstations
            .into_iter()
            .partition(|ws| self.grace.should_prune(ws, now));

        for ws in &to_prune {
            self.prune(ws, report).await;
        }

        let targets: Vec<(String, Option<String>)> = to_check
            .iter()
            .map(|ws| (ws.name.clone(), ws.domain_name.clone()))
            .collect();
        let mut by_name: HashMap<String, Workstation> = to_check
            .into_iter()
            .map(|ws| (ws.name.clone(), ws))
            .collect();

        report.checked = targets.len();

        let results = probe_all(
            self.prober.as_ref(),
            targets,
            self.config.probe_timeout(),
            self.config.max_concurrent_probes,
        )
        .await;

        for (name, result) in results {
            if let Some(ws) = by_name.remove(&name) {
                self.apply_probe(ws, &result, now, report).await;
            }
        }
    }

    async fn prune(&self, ws: &Workstation, report: &mut TickReport) {
        match self.storage.delete_workstation(&ws.name).await {
            Ok(true) => {
                report.pruned += 1;
                tracing::info!(
                    name = %ws.name,
                    terminated_at = ?ws.terminated_at,
                    "Pruned terminated workstation"
                );
            }
            Ok(false) => {
                tracing::debug!(name = %ws.name, "Workstation already gone");
                return;
            }
            Err(e) => {
                report.failures += 1;
                tracing::error!(name = %ws.name, error = %e, "Failed to prune workstation");
                return;
            }
        }

        if self.config.release_dns_on_prune {
            match self.dns.delete_record(&ws.name).await {
                Ok(true) => tracing::info!(name = %ws.name, "Released DNS record"),
                Ok(false) => tracing::debug!(name = %ws.name, "No DNS record to release"),
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(name = %ws.name, error = %e, "Failed to release DNS record");
                }
            }
        }
    }

    async fn apply_probe(
        &self,
        ws: Workstation,
        result: &ProbeResult,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) {
        let Some(transition) = self.grace.decide(&ws, result.success, now) else {
            return;
        };

        // A registration may have rewritten the record while probes ran.
        let expected = WorkstationVersion::of(&ws);
        match self
            .storage
            .update_workstation_if(&ws.name, &expected, &transition.patch)
            .await
        {
            Ok(ConditionalUpdate::Applied) => {}
            Ok(ConditionalUpdate::Changed) => {
                tracing::debug!(name = %ws.name, "Workstation changed during tick; skipping");
                return;
            }
            Ok(ConditionalUpdate::Missing) => {
                tracing::debug!(name = %ws.name, "Workstation removed during tick");
                return;
            }
            Err(e) => {
                report.failures += 1;
                tracing::error!(name = %ws.name, error = %e, "Failed to persist health check");
                return;
            }
        }

        if !transition.changes_status() {
            report.refreshed += 1;
            return;
        }

        report.transitions += 1;
        tracing::info!(
            name = %ws.name,
            old_status = %transition.from,
            new_status = %transition.to,
            probe = if result.success { "success" } else { "failed" },
            "Workstation status changed"
        );

        let event = NewWorkstationEvent::status_changed(
            ws.name.as_str(),
            transition.from,
            transition.to,
            result.success,
        );
        if let Err(e) = self.storage.append_event(event).await {
            report.failures += 1;
            tracing::error!(name = %ws.name, error = %e, "Failed to record status change");
        }
    }
}

async fn next_trigger(rx: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
