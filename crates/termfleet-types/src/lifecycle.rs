//! Workstation lifecycle rules
//!
//! The rules are evaluated against the workstation's *current* status after a
//! single probe outcome. At most one rule fires:
//!
//! | current    | probe | condition                       | next       |
//! |------------|-------|---------------------------------|------------|
//! | STARTING   | ok    | -                               | ONLINE     |
//! | STARTING   | fail  | `now - started_at > starting`   | UNKNOWN    |
//! | ONLINE     | ok    | -                               | ONLINE (heartbeat, no event) |
//! | ONLINE     | fail  | `now - last_check > online_silence` | UNKNOWN |
//! | UNKNOWN    | ok    | -                               | ONLINE     |
//! | UNKNOWN    | fail  | `now - unknown_since > unknown` | TERMINATED |
//! | DNS_FAILED, TERMINATED | any | -                  | no change  |
//!
//! A missing anchor timestamp never satisfies an elapsed-time condition.

use crate::{Workstation, WorkstationPatch, WorkstationStatus};
use chrono::{DateTime, Duration, Utc};

/// Status-specific grace periods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GracePeriods {
    /// How long a STARTING workstation may stay silent
    pub starting: Duration,
    /// How long an ONLINE workstation may go without a successful probe
    pub online_silence: Duration,
    /// How long an UNKNOWN workstation may stay silent before termination
    pub unknown: Duration,
    /// How long a TERMINATED workstation is kept before pruning
    pub prune_after: Duration,
}

impl Default for GracePeriods {
    fn default() -> Self {
        Self {
            starting: Duration::minutes(10),
            online_silence: Duration::minutes(1),
            unknown: Duration::minutes(10),
            prune_after: Duration::minutes(50),
        }
    }
}

/// Outcome of applying the rules to one workstation
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: WorkstationStatus,
    pub to: WorkstationStatus,
    /// Field updates to persist; carries `status` only when it changes
    pub patch: WorkstationPatch,
}

impl Transition {
    /// Whether the transition moves the workstation to a new status.
    ///
    /// Only these transitions are audited.
    pub fn changes_status(&self) -> bool {
        self.from != self.to
    }

    fn came_online(from: WorkstationStatus, now: DateTime<Utc>) -> Self {
        Self {
            from,
            to: WorkstationStatus::Online,
            patch: WorkstationPatch {
                status: Some(WorkstationStatus::Online),
                last_check: Some(Some(now)),
                state_changed_at: Some(now),
                unknown_since: Some(None),
                ..Default::default()
            },
        }
    }

    fn heartbeat(now: DateTime<Utc>) -> Self {
        Self {
            from: WorkstationStatus::Online,
            to: WorkstationStatus::Online,
            patch: WorkstationPatch {
                last_check: Some(Some(now)),
                ..Default::default()
            },
        }
    }

    fn went_unknown(from: WorkstationStatus, now: DateTime<Utc>) -> Self {
        Self {
            from,
            to: WorkstationStatus::Unknown,
            patch: WorkstationPatch {
                status: Some(WorkstationStatus::Unknown),
                state_changed_at: Some(now),
                unknown_since: Some(Some(now)),
                ..Default::default()
            },
        }
    }

    fn terminated(now: DateTime<Utc>) -> Self {
        Self {
            from: WorkstationStatus::Unknown,
            to: WorkstationStatus::Terminated,
            patch: WorkstationPatch {
                status: Some(WorkstationStatus::Terminated),
                state_changed_at: Some(now),
                terminated_at: Some(Some(now)),
                // unknown_since is only meaningful while UNKNOWN
                unknown_since: Some(None),
                ..Default::default()
            },
        }
    }
}

impl GracePeriods {
    /// Decide how a probe outcome changes the workstation, if at all
    pub fn decide(
        &self,
        ws: &Workstation,
        probe_succeeded: bool,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        use WorkstationStatus::*;

        match (ws.status, probe_succeeded) {
            (Starting | Unknown, true) => Some(Transition::came_online(ws.status, now)),
            (Online, true) => Some(Transition::heartbeat(now)),
            (Starting, false) if exceeded(ws.started_at, now, self.starting) => {
                Some(Transition::went_unknown(Starting, now))
            }
            (Online, false) if exceeded(ws.last_check, now, self.online_silence) => {
                Some(Transition::went_unknown(Online, now))
            }
            (Unknown, false) if exceeded(ws.unknown_since, now, self.unknown) => {
                Some(Transition::terminated(now))
            }
            (Starting | Online | Unknown, false) => None,
            (DnsFailed | Terminated, _) => None,
        }
    }

    /// Whether a terminated workstation has outlived its retention period
    pub fn should_prune(&self, ws: &Workstation, now: DateTime<Utc>) -> bool {
        ws.status == WorkstationStatus::Terminated
            && exceeded(ws.terminated_at, now, self.prune_after)
    }
}

fn exceeded(anchor: Option<DateTime<Utc>>, now: DateTime<Utc>, period: Duration) -> bool {
    anchor.is_some_and(|at| now.signed_duration_since(at) > period)
}

/// [`GracePeriods::decide`] with the default grace periods
pub fn decide(ws: &Workstation, probe_succeeded: bool, now: DateTime<Utc>) -> Option<Transition> {
    GracePeriods::default().decide(ws, probe_succeeded, now)
}

/// [`GracePeriods::should_prune`] with the default grace periods
pub fn should_prune(ws: &Workstation, now: DateTime<Utc>) -> bool {
    GracePeriods::default().should_prune(ws, now)
}
