use chrono::{DateTime, Duration, Utc};
use rusqlite::OptionalExtension;
use tracing::debug;

use strand_core::{CapabilityState, Channel, StrandError, TargetId};

use crate::store::{db_err, StateStore};

/// One persisted capability row.
#[derive(Debug, Clone)]
pub struct InteractionRecord {
    pub target: TargetId,
    pub channel: Channel,
    pub state: CapabilityState,
    pub reason: Option<String>,
    pub retry_after_at: Option<DateTime<Utc>>,
    pub observed_at: DateTime<Utc>,
}

/// Answer to "may we attempt this target/channel right now".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Allow,
    Skip {
        state: CapabilityState,
        until: DateTime<Utc>,
    },
}

fn parse_ts(raw: &str) -> strand_core::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StrandError::State(format!("bad timestamp {raw}: {e}")))
}

impl StateStore {
    /// Upsert the capability state observed for a target on a channel.
    ///
    /// `Unavailable` must carry a strictly future `retry_after_at` — the
    /// retry window is the caller's policy and the store will not invent one.
    pub fn mark(
        &self,
        target: &TargetId,
        channel: Channel,
        state: CapabilityState,
        reason: Option<&str>,
        retry_after_at: Option<DateTime<Utc>>,
    ) -> strand_core::Result<()> {
        let now = self.clock.now();
        if state == CapabilityState::Unavailable {
            match retry_after_at {
                Some(at) if at > now => {}
                Some(at) => {
                    return Err(StrandError::InvalidTransition(format!(
                        "unavailable mark for {target}/{channel} has non-future retry_after_at {at}"
                    )));
                }
                None => {
                    return Err(StrandError::InvalidTransition(format!(
                        "unavailable mark for {target}/{channel} is missing retry_after_at"
                    )));
                }
            }
        }

        debug!(target = %target, channel = %channel, state = %state, "marking interaction state");
        let db = self.db.lock();
        db.execute(
            "INSERT INTO interaction_state (target, channel, state, reason, retry_after_at, observed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(target, channel) DO UPDATE SET
                state = excluded.state,
                reason = excluded.reason,
                retry_after_at = excluded.retry_after_at,
                observed_at = excluded.observed_at",
            rusqlite::params![
                target,
                channel.as_str(),
                state.as_str(),
                reason,
                retry_after_at.map(|t| t.to_rfc3339()),
                now.to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Load the persisted record for a target/channel, if any.
    pub fn interaction(
        &self,
        target: &TargetId,
        channel: Channel,
    ) -> strand_core::Result<Option<InteractionRecord>> {
        let db = self.db.lock();
        let row = db
            .query_row(
                "SELECT state, reason, retry_after_at, observed_at
                 FROM interaction_state WHERE target = ?1 AND channel = ?2",
                rusqlite::params![target, channel.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(db_err)?;

        let Some((state_raw, reason, retry_raw, observed_raw)) = row else {
            return Ok(None);
        };
        let state = CapabilityState::parse(&state_raw)
            .ok_or_else(|| StrandError::State(format!("unknown capability state {state_raw}")))?;
        Ok(Some(InteractionRecord {
            target: target.clone(),
            channel,
            state,
            reason,
            retry_after_at: retry_raw.as_deref().map(parse_ts).transpose()?,
            observed_at: parse_ts(&observed_raw)?,
        }))
    }

    /// Gate a contact attempt: skip while a retry window is still running,
    /// allow otherwise. An expired window allows — the state is re-evaluated
    /// on the attempt, never treated as terminal.
    pub fn gate(&self, target: &TargetId, channel: Channel) -> strand_core::Result<Gate> {
        let Some(record) = self.interaction(target, channel)? else {
            return Ok(Gate::Allow);
        };
        if let Some(until) = record.retry_after_at
            && until > self.clock.now()
        {
            return Ok(Gate::Skip {
                state: record.state,
                until,
            });
        }
        Ok(Gate::Allow)
    }

    /// Every target with at least one persisted capability row.
    pub fn known_targets(&self) -> strand_core::Result<Vec<TargetId>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare("SELECT DISTINCT target FROM interaction_state ORDER BY target")
            .map_err(db_err)?;
        let targets = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(targets)
    }

    /// The persisted state, when observed inside the freshness window.
    pub fn fresh_state(
        &self,
        target: &TargetId,
        channel: Channel,
        freshness: Duration,
    ) -> strand_core::Result<Option<CapabilityState>> {
        let Some(record) = self.interaction(target, channel)? else {
            return Ok(None);
        };
        if self.clock.now() - record.observed_at <= freshness {
            Ok(Some(record.state))
        } else {
            Ok(None)
        }
    }
}
