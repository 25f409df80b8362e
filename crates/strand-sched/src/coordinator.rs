use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use parking_lot::Mutex;
use rand::RngExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use strand_config::SchedulerConfig;
use strand_core::{AccountId, Clock, StrandError};

/// The workflows the coordinator knows how to schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    StorySync,
    FeedSync,
    CapabilityScan,
    /// Cheap scan fallback: no browser session. Never scheduled directly —
    /// it substitutes for [`WorkflowKind::CapabilityScan`] under degraded
    /// health.
    CapabilityRefresh,
}

impl WorkflowKind {
    /// The kinds that carry their own schedule.
    pub const SCHEDULED: [WorkflowKind; 3] = [
        WorkflowKind::StorySync,
        WorkflowKind::FeedSync,
        WorkflowKind::CapabilityScan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::StorySync => "story_sync",
            WorkflowKind::FeedSync => "feed_sync",
            WorkflowKind::CapabilityScan => "capability_scan",
            WorkflowKind::CapabilityRefresh => "capability_refresh",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "story_sync" => Some(WorkflowKind::StorySync),
            "feed_sync" => Some(WorkflowKind::FeedSync),
            "capability_scan" => Some(WorkflowKind::CapabilityScan),
            "capability_refresh" => Some(WorkflowKind::CapabilityRefresh),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract between the run loop and the scheduling policy.
pub trait Coordinator: Send + Sync {
    /// True when the workflow should run now for this account.
    fn due(&self, account: &AccountId, workflow: WorkflowKind) -> bool;

    /// Record when the workflow should next run.
    fn reschedule(&self, account: &AccountId, workflow: WorkflowKind, next_at: DateTime<Utc>);

    /// Overall health signal fed back from recent runs.
    fn health_ok(&self) -> bool;

    /// The workflow to actually execute. Under degraded health the full
    /// capability scan is substituted with the browserless refresh.
    fn effective(&self, workflow: WorkflowKind) -> WorkflowKind {
        if workflow == WorkflowKind::CapabilityScan && !self.health_ok() {
            WorkflowKind::CapabilityRefresh
        } else {
            workflow
        }
    }
}

/// How one workflow's next fire time is computed.
enum ScheduleKind {
    /// Fixed interval plus random jitter.
    Every(Duration),
    /// Cron expression; fires at the next matching instant, no jitter.
    Cron(Schedule),
}

/// Interval/cron scheduling over an injected clock.
///
/// A workflow with no recorded fire time is due immediately, so a fresh
/// process starts working without waiting out the first interval.
pub struct IntervalCoordinator {
    schedules: HashMap<WorkflowKind, ScheduleKind>,
    jitter_frac: f64,
    next_at: Mutex<HashMap<(AccountId, WorkflowKind), DateTime<Utc>>>,
    healthy: AtomicBool,
    clock: Arc<dyn Clock>,
}

impl IntervalCoordinator {
    pub fn new(config: &SchedulerConfig, clock: Arc<dyn Clock>) -> strand_core::Result<Self> {
        let mut schedules = HashMap::new();
        schedules.insert(
            WorkflowKind::StorySync,
            schedule_for(config.story_sync_cron.as_deref(), config.story_sync_secs)?,
        );
        schedules.insert(
            WorkflowKind::FeedSync,
            schedule_for(config.feed_sync_cron.as_deref(), config.feed_sync_secs)?,
        );
        schedules.insert(
            WorkflowKind::CapabilityScan,
            schedule_for(None, config.capability_scan_secs)?,
        );
        Ok(Self {
            schedules,
            jitter_frac: config.jitter_frac,
            next_at: Mutex::new(HashMap::new()),
            healthy: AtomicBool::new(true),
            clock,
        })
    }

    /// Feed back the health of the last run. A degraded signal makes
    /// [`Coordinator::effective`] substitute the cheap refresh for the scan.
    pub fn set_health(&self, ok: bool) {
        if self.healthy.swap(ok, Ordering::SeqCst) != ok {
            info!(healthy = ok, "scheduler health changed");
        }
    }

    /// Compute the next fire time for a workflow from now.
    pub fn next_fire(&self, workflow: WorkflowKind) -> DateTime<Utc> {
        let now = self.clock.now();
        match self.schedules.get(&workflow) {
            Some(ScheduleKind::Every(interval)) => now + *interval + self.jitter(*interval),
            Some(ScheduleKind::Cron(schedule)) => schedule
                .after(&now)
                .next()
                .unwrap_or_else(|| now + Duration::hours(1)),
            // The refresh fallback has no schedule of its own; it reuses the
            // scan's slot.
            None => self.next_fire(WorkflowKind::CapabilityScan),
        }
    }

    fn jitter(&self, interval: Duration) -> Duration {
        let max_ms = (interval.num_milliseconds() as f64 * self.jitter_frac) as i64;
        if max_ms <= 0 {
            return Duration::zero();
        }
        Duration::milliseconds(rand::rng().random_range(0..=max_ms))
    }
}

impl Coordinator for IntervalCoordinator {
    fn due(&self, account: &AccountId, workflow: WorkflowKind) -> bool {
        let next = self.next_at.lock();
        match next.get(&(account.clone(), workflow)) {
            Some(at) => self.clock.now() >= *at,
            None => true,
        }
    }

    fn reschedule(&self, account: &AccountId, workflow: WorkflowKind, next_at: DateTime<Utc>) {
        debug!(account = %account, workflow = %workflow, %next_at, "rescheduled");
        self.next_at
            .lock()
            .insert((account.clone(), workflow), next_at);
    }

    fn health_ok(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

fn schedule_for(cron: Option<&str>, interval_secs: u64) -> strand_core::Result<ScheduleKind> {
    match cron {
        Some(expr) => {
            let schedule = Schedule::from_str(expr).map_err(|e| {
                warn!(cron = expr, error = %e, "rejecting cron expression");
                StrandError::Config(format!("invalid cron expression {expr:?}: {e}"))
            })?;
            Ok(ScheduleKind::Cron(schedule))
        }
        None => Ok(ScheduleKind::Every(Duration::seconds(interval_secs as i64))),
    }
}
