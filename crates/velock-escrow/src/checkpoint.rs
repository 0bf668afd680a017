//! Global checkpoint ledger for the aggregate voting-weight curve.
//!
//! The aggregate curve is piecewise linear: it decays at the sum of all
//! live lock slopes and kinks at week boundaries where locks expire. State
//! is an append-only point history (epoch 0 is a zero sentinel) plus a
//! sparse map of scheduled slope changes keyed by week boundary.
//!
//! Replay walks week boundaries from the latest checkpoint toward a target
//! time, applying decay and scheduled slope changes. Boundaries that carry
//! a nonzero slope change are persisted as their own epochs; change-free
//! boundaries only accumulate decay. The walk is bounded by
//! [`MAX_REPLAY_WEEKS`] and split into a fallible prepare step and an
//! infallible commit, so an enclosing operation that fails mid-way leaves
//! no partial history behind.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use velock_core::constants::{MAX_REPLAY_WEEKS, WEEK};
use velock_core::error::CheckpointError;
use velock_core::types::{Point, Timestamp};
use velock_curve::segment::{floor_to_week, LockSegment};

/// A fully computed replay, ready to commit.
///
/// Produced by [`CheckpointLedger::prepare`]; committing is infallible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedCheckpoint {
    /// Intermediate points at change-bearing week boundaries, in order.
    intermediates: Vec<Point>,
    /// The point at the target time.
    target: Point,
    /// Whether `target` replaces the current tip instead of appending.
    /// Set by plain catch-up replays whose target time equals the tip's
    /// timestamp, which makes `checkpoint` idempotent. Delta-carrying
    /// replays always append.
    overwrite_tip: bool,
}

impl PreparedCheckpoint {
    /// The point that will become the tip after commit.
    pub fn target(&self) -> Point {
        self.target
    }
}

/// A replay plus lock-delta adjustments, ready to commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedDelta {
    checkpoint: PreparedCheckpoint,
    /// Absolute new slope-change values, applied in order.
    updates: Vec<(Timestamp, i128)>,
}

/// Append-only history of the aggregate curve.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CheckpointLedger {
    /// Point per epoch. Index 0 is the genesis sentinel.
    points: Vec<Point>,
    /// Scheduled slope change at each week boundary. Entries for past
    /// boundaries are retained; replay never revisits them.
    slope_changes: BTreeMap<Timestamp, i128>,
}

impl CheckpointLedger {
    /// Create a ledger with a zero sentinel at `genesis`.
    pub fn new(genesis: Timestamp) -> Self {
        Self {
            points: vec![Point { bias: 0, slope: 0, timestamp: genesis }],
            slope_changes: BTreeMap::new(),
        }
    }

    /// Current epoch: the index of the latest point.
    pub fn epoch(&self) -> u64 {
        (self.points.len() - 1) as u64
    }

    /// The point recorded at `epoch`, if any.
    pub fn point(&self, epoch: u64) -> Option<Point> {
        self.points.get(epoch as usize).copied()
    }

    /// The latest point.
    pub fn tip(&self) -> Point {
        // The sentinel guarantees non-emptiness.
        self.points.last().copied().unwrap_or(Point::ZERO)
    }

    /// Scheduled slope change at week boundary `t`, 0 if none.
    pub fn slope_change_at(&self, t: Timestamp) -> i128 {
        self.slope_changes.get(&t).copied().unwrap_or(0)
    }

    /// Replay the curve from the tip to `now` without mutating.
    ///
    /// # Errors
    ///
    /// - [`CheckpointError::NonMonotonicTime`] if `now` precedes the tip
    /// - [`CheckpointError::ReplayBudgetExceeded`] if more than
    ///   [`MAX_REPLAY_WEEKS`] week boundaries lie between tip and target
    /// - [`CheckpointError::ArithmeticOverflow`] on bias/slope overflow
    pub fn prepare(&self, now: Timestamp) -> Result<PreparedCheckpoint, CheckpointError> {
        let tip = self.tip();
        if now < tip.timestamp {
            return Err(CheckpointError::NonMonotonicTime { now, tip: tip.timestamp });
        }
        let steps = (floor_to_week(now) - floor_to_week(tip.timestamp)) / WEEK;
        if steps > MAX_REPLAY_WEEKS {
            return Err(CheckpointError::ReplayBudgetExceeded { weeks: steps });
        }

        let mut bias = tip.bias;
        let mut slope = tip.slope;
        let mut last_ts = tip.timestamp;
        let mut t_i = floor_to_week(tip.timestamp);
        let mut intermediates = Vec::new();

        for _ in 0..steps {
            t_i += WEEK;
            let dslope = self.slope_change_at(t_i);
            bias = decay(bias, slope, t_i - last_ts)?;
            slope = slope
                .checked_add(dslope)
                .ok_or(CheckpointError::ArithmeticOverflow)?
                .max(0);
            last_ts = t_i;
            // A boundary short of the target gets its own epoch only when
            // it actually bends the curve; the target boundary's change is
            // folded into the target point.
            if t_i < now && dslope != 0 {
                intermediates.push(Point { bias, slope, timestamp: t_i });
            }
        }

        bias = decay(bias, slope, now - last_ts)?;
        Ok(PreparedCheckpoint {
            intermediates,
            target: Point { bias, slope, timestamp: now },
            overwrite_tip: now == tip.timestamp,
        })
    }

    /// Append a prepared replay to the history.
    pub fn commit(&mut self, prepared: PreparedCheckpoint) {
        self.points.extend(prepared.intermediates);
        if prepared.overwrite_tip {
            if let Some(last) = self.points.last_mut() {
                *last = prepared.target;
            }
        } else {
            self.points.push(prepared.target);
        }
    }

    /// Replay to `now` and commit in one step.
    pub fn checkpoint(&mut self, now: Timestamp) -> Result<(), CheckpointError> {
        let prepared = self.prepare(now)?;
        self.commit(prepared);
        Ok(())
    }

    /// Replay to `now` and fold in per-lock `(old, new)` segment changes.
    ///
    /// The target point is adjusted by each pair's bias/slope difference,
    /// and the slope-change schedule is rewritten the way the lock change
    /// requires: the old segment's expiry entry gives back `old.slope`
    /// (it no longer expires there), and the new segment's expiry entry
    /// takes on `-new.slope`.
    pub fn prepare_delta(
        &self,
        now: Timestamp,
        pairs: &[(LockSegment, LockSegment)],
    ) -> Result<PreparedDelta, CheckpointError> {
        let mut cp = self.prepare(now)?;
        // A mutation always mints its own epoch, even at the tip's
        // timestamp; only the plain catch-up collapses onto the tip.
        cp.overwrite_tip = false;
        let mut updates: Vec<(Timestamp, i128)> = Vec::new();

        // Later pairs must observe earlier pairs' schedule writes.
        let read = |updates: &[(Timestamp, i128)], t: Timestamp| {
            updates
                .iter()
                .rev()
                .find(|(ts, _)| *ts == t)
                .map(|(_, v)| *v)
                .unwrap_or_else(|| self.slope_change_at(t))
        };

        for (old, new) in pairs {
            cp.target.bias = shift(cp.target.bias, new.bias, old.bias)?;
            cp.target.slope = shift(cp.target.slope, new.slope, old.slope)?;

            if old.end > now {
                let mut d = read(&updates, old.end)
                    .checked_add(old.slope)
                    .ok_or(CheckpointError::ArithmeticOverflow)?;
                if new.end == old.end {
                    d = d.checked_sub(new.slope).ok_or(CheckpointError::ArithmeticOverflow)?;
                }
                updates.push((old.end, d));
            }
            if new.end > now && new.end > old.end {
                let d = read(&updates, new.end)
                    .checked_sub(new.slope)
                    .ok_or(CheckpointError::ArithmeticOverflow)?;
                updates.push((new.end, d));
            }
        }

        Ok(PreparedDelta { checkpoint: cp, updates })
    }

    /// Commit a prepared delta: history points plus schedule rewrites.
    pub fn commit_delta(&mut self, prepared: PreparedDelta) {
        self.commit(prepared.checkpoint);
        for (t, d) in prepared.updates {
            self.slope_changes.insert(t, d);
        }
    }

    /// Aggregate voting weight at time `t`.
    ///
    /// At or after the tip this forward-simulates read-only (same replay
    /// budget). Before the tip it binary-searches the history and decays
    /// from the preceding point, which is exact because every boundary that bends
    /// the curve is itself a recorded point.
    pub fn total_weight_at(&self, t: Timestamp) -> Result<u128, CheckpointError> {
        let tip = self.tip();
        if t >= tip.timestamp {
            let prepared = self.prepare(t)?;
            return Ok(prepared.target.bias.max(0) as u128);
        }
        let idx = self.points.partition_point(|p| p.timestamp <= t);
        if idx == 0 {
            return Ok(0);
        }
        let p = self.points[idx - 1];
        let bias = decay(p.bias, p.slope, t - p.timestamp)?;
        Ok(bias.max(0) as u128)
    }
}

/// `bias - slope * dt`, clamped at zero.
fn decay(bias: i128, slope: i128, dt: u64) -> Result<i128, CheckpointError> {
    let drop = slope
        .checked_mul(dt as i128)
        .ok_or(CheckpointError::ArithmeticOverflow)?;
    Ok(bias.checked_sub(drop).ok_or(CheckpointError::ArithmeticOverflow)?.max(0))
}

/// `value + new - old`, clamped at zero.
fn shift(value: i128, new: i128, old: i128) -> Result<i128, CheckpointError> {
    let shifted = value
        .checked_add(new)
        .and_then(|v| v.checked_sub(old))
        .ok_or(CheckpointError::ArithmeticOverflow)?;
    Ok(shifted.max(0))
}
