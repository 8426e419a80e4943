//! Position estimation math.
//!
//! There is no position feedback sensor: while the motor runs, position is
//! projected from elapsed time at a per-percent rate derived from the
//! calibrated full-traverse duration. Estimates are clamped to [0, 100]
//! on every update; 0 is fully closed, 100 fully open.

use crate::config::CoveringConfig;
use crate::traits::Direction;

/// Fully closed limit position.
pub const FULLY_CLOSED: f32 = 0.0;

/// Fully open limit position.
pub const FULLY_OPEN: f32 = 100.0;

/// Position deltas below this are not worth moving for.
pub const MIN_POS_DIFF: f32 = 0.5;

/// After an early stop, targets this close to the estimate are reconciled
/// to it instead of re-triggering a movement.
pub const TARGET_FIXUP_DIFF: f32 = 1.0;

/// Clamps a position to the valid [0, 100] range.
#[inline]
pub fn clamp(pos: f32) -> f32 {
    if pos < FULLY_CLOSED {
        FULLY_CLOSED
    } else if pos > FULLY_OPEN {
        FULLY_OPEN
    } else {
        pos
    }
}

/// Returns true for the two end-stop positions.
#[inline]
pub fn is_limit(pos: f32) -> bool {
    pos == FULLY_CLOSED || pos == FULLY_OPEN
}

/// The limit position a direction travels toward.
#[inline]
pub fn limit_of(dir: Direction) -> Option<f32> {
    match dir {
        Direction::Open => Some(FULLY_OPEN),
        Direction::Close => Some(FULLY_CLOSED),
        Direction::None => None,
    }
}

/// Milliseconds of travel per percent of position.
///
/// Manually calibrated motors heading for an end-stop use the (typically
/// longer) limit-approach time so the relay stays energized slightly past
/// the nominal full-travel point, guaranteeing the motor reaches the stop.
/// Returns 0 when the covering has no usable traverse time yet.
pub fn ms_per_pct(cfg: &CoveringConfig, target: Option<f32>) -> f32 {
    let base = if cfg.manually_calibrated
        && target.is_some_and(is_limit)
        && cfg.move_time_limit_pos_ms > 0
    {
        cfg.move_time_limit_pos_ms
    } else {
        cfg.move_time_ms
    };
    base as f32 / 100.0
}

/// Projects the position reached after `elapsed_ms` of travel.
///
/// With a degenerate rate (uncalibrated), the start position is returned
/// unchanged rather than dividing by zero.
pub fn project(start: f32, dir: Direction, elapsed_ms: u64, ms_per_pct: f32) -> f32 {
    if ms_per_pct <= 0.0 {
        return clamp(start);
    }
    let diff = elapsed_ms as f32 / ms_per_pct;
    match dir {
        Direction::Open => clamp(start + diff),
        Direction::Close => clamp(start - diff),
        Direction::None => clamp(start),
    }
}
