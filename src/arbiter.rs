//! Command arbitration decisions.
//!
//! Physical buttons and the home-hub client both ultimately move the target
//! position, but neither speaks in unambiguous terms: buttons mean
//! different things depending on wiring mode and whether the motor is
//! already running, and hub tiles send a limit value on every tap
//! regardless of intent. The pure functions here turn those inputs into
//! explicit actions; [`CoveringController`](crate::CoveringController)
//! executes them.

use crate::position::{FULLY_CLOSED, FULLY_OPEN};
use crate::traits::{Direction, InputEvent};

// ============================================================================
// Button pairs (separate momentary / separate toggle)
// ============================================================================

/// What a paired-button event should do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairAction {
    /// Nothing.
    None,
    /// Drive to the limit in the button's direction.
    MoveToLimit,
    /// Stop and hold the current position.
    Stop,
}

/// Decides the action for an event on one of a pair of direction buttons.
///
/// A press while idle heads for that button's limit; a press while moving
/// (either direction) stops. Toggle-style switches additionally stop when
/// released while the motor runs in their direction.
pub fn button_pair(
    ev: InputEvent,
    level: bool,
    toggle: bool,
    moving_dir: Direction,
    button_dir: Direction,
) -> PairAction {
    if ev != InputEvent::Change {
        return PairAction::None;
    }
    if level {
        if moving_dir == Direction::None {
            PairAction::MoveToLimit
        } else {
            PairAction::Stop
        }
    } else if toggle && moving_dir == button_dir {
        PairAction::Stop
    } else {
        PairAction::None
    }
}

// ============================================================================
// Single multi-function button
// ============================================================================

/// Target for a single-button press, cycling open - stop - close - stop.
///
/// While moving, the returned target is a nudge past the current estimate:
/// the state machine sees the requested direction no longer matches and
/// stops, reconciling the target to wherever the covering ended up.
pub fn single_press_target(cur: f32, moving_dir: Direction, last_move_dir: Direction) -> f32 {
    match moving_dir {
        Direction::None => {
            if cur == FULLY_CLOSED {
                FULLY_OPEN
            } else if cur == FULLY_OPEN || last_move_dir == Direction::Open {
                FULLY_CLOSED
            } else {
                FULLY_OPEN
            }
        }
        // Stop.
        Direction::Open => cur + 1.0,
        Direction::Close => cur - 1.0,
    }
}

// ============================================================================
// Hub target writes
// ============================================================================

/// How to interpret a hub-originated target write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientAction {
    /// Obey the value as written.
    Literal,
    /// Already there; nothing to do.
    Ignore,
    /// Most likely a tile tap: advance the open-stop-close-stop cycle.
    Toggle,
}

/// Disambiguates a hub target write.
///
/// Hub tiles behave as "prefer close": tapping a tile mid-travel sends 0
/// (fully closed) even when the user means "do the next thing". A limit
/// value therefore only means what it says when there is no recent movement
/// context (`last_move_dir` is `None` once the 60 s window expires; the
/// caller handles the expiry) or when the value is not a limit at all.
/// A limit we are already at or heading to is a no-op, unless the last
/// movement drove to that very limit, in which case the tap is the next
/// step of the cycle and toggles.
pub fn client_request(
    value: f32,
    cur: f32,
    tgt: Option<f32>,
    last_move_dir: Direction,
) -> ClientAction {
    // Intermediate positions, or no basis for guessing: do what we are told.
    if (value != FULLY_CLOSED && value != FULLY_OPEN) || last_move_dir == Direction::None {
        return ClientAction::Literal;
    }
    let at_or_heading = |p: f32| cur == p || tgt == Some(p);
    if (value == FULLY_CLOSED && at_or_heading(FULLY_CLOSED) && last_move_dir != Direction::Close)
        || (value == FULLY_OPEN && at_or_heading(FULLY_OPEN) && last_move_dir != Direction::Open)
    {
        ClientAction::Ignore
    } else {
        ClientAction::Toggle
    }
}

// ============================================================================
// Uncalibrated direct drive
// ============================================================================

/// Relay states for direct drive on an uncalibrated covering.
///
/// Without calibration the state machine cannot run, so inputs drive the
/// relays directly. Both directions at once, and reversals while the other
/// relay is still energized, force everything off: a motor must see a stop
/// between directions.
pub fn uncalibrated_drive(
    want_open: bool,
    want_close: bool,
    open_on: bool,
    close_on: bool,
) -> (bool, bool) {
    if (want_open && want_close) || (want_open && close_on) || (want_close && open_on) {
        (false, false)
    } else {
        (want_open, want_close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // button_pair
    // =========================================================================

    #[test]
    fn pair_press_while_idle_moves() {
        let action = button_pair(
            InputEvent::Change,
            true,
            false,
            Direction::None,
            Direction::Open,
        );
        assert_eq!(action, PairAction::MoveToLimit);
    }

    #[test]
    fn pair_press_while_moving_stops() {
        // Opposite direction press
        let action = button_pair(
            InputEvent::Change,
            true,
            false,
            Direction::Open,
            Direction::Close,
        );
        assert_eq!(action, PairAction::Stop);
        // Same direction press also stops
        let action = button_pair(
            InputEvent::Change,
            true,
            false,
            Direction::Open,
            Direction::Open,
        );
        assert_eq!(action, PairAction::Stop);
    }

    #[test]
    fn pair_momentary_release_is_ignored() {
        let action = button_pair(
            InputEvent::Change,
            false,
            false,
            Direction::Open,
            Direction::Open,
        );
        assert_eq!(action, PairAction::None);
    }

    #[test]
    fn pair_toggle_release_stops_matching_direction() {
        let action = button_pair(
            InputEvent::Change,
            false,
            true,
            Direction::Close,
            Direction::Close,
        );
        assert_eq!(action, PairAction::Stop);
        // Releasing the other direction's switch does nothing.
        let action = button_pair(
            InputEvent::Change,
            false,
            true,
            Direction::Close,
            Direction::Open,
        );
        assert_eq!(action, PairAction::None);
    }

    #[test]
    fn pair_only_change_events_matter() {
        for ev in [InputEvent::Single, InputEvent::Double, InputEvent::Long] {
            let action = button_pair(ev, true, false, Direction::None, Direction::Open);
            assert_eq!(action, PairAction::None);
        }
    }

    // =========================================================================
    // single_press_target
    // =========================================================================

    #[test]
    fn single_press_from_closed_opens() {
        assert_eq!(
            single_press_target(FULLY_CLOSED, Direction::None, Direction::None),
            FULLY_OPEN
        );
    }

    #[test]
    fn single_press_from_open_closes() {
        assert_eq!(
            single_press_target(FULLY_OPEN, Direction::None, Direction::Close),
            FULLY_CLOSED
        );
    }

    #[test]
    fn single_press_midway_reverses_last_direction() {
        assert_eq!(
            single_press_target(40.0, Direction::None, Direction::Open),
            FULLY_CLOSED
        );
        assert_eq!(
            single_press_target(40.0, Direction::None, Direction::Close),
            FULLY_OPEN
        );
        // No history: prefer opening.
        assert_eq!(
            single_press_target(40.0, Direction::None, Direction::None),
            FULLY_OPEN
        );
    }

    #[test]
    fn single_press_while_moving_nudges_to_stop() {
        assert_eq!(
            single_press_target(40.0, Direction::Open, Direction::Open),
            41.0
        );
        assert_eq!(
            single_press_target(40.0, Direction::Close, Direction::Close),
            39.0
        );
    }

    // =========================================================================
    // client_request
    // =========================================================================

    #[test]
    fn client_intermediate_value_is_literal() {
        assert_eq!(
            client_request(35.0, 80.0, Some(80.0), Direction::Close),
            ClientAction::Literal
        );
    }

    #[test]
    fn client_no_context_is_literal() {
        assert_eq!(
            client_request(FULLY_CLOSED, 50.0, Some(50.0), Direction::None),
            ClientAction::Literal
        );
    }

    #[test]
    fn client_repeat_toward_just_driven_limit_toggles() {
        // Just closed to 0; tile taps keep sending 0: advance the cycle.
        assert_eq!(
            client_request(FULLY_CLOSED, FULLY_CLOSED, Some(FULLY_CLOSED), Direction::Close),
            ClientAction::Toggle
        );
        assert_eq!(
            client_request(FULLY_OPEN, FULLY_OPEN, Some(FULLY_OPEN), Direction::Open),
            ClientAction::Toggle
        );
    }

    #[test]
    fn client_limit_already_reached_is_ignored() {
        // At the closed limit with the last move having gone open: the
        // request adds nothing and is not a cycle continuation either.
        assert_eq!(
            client_request(FULLY_CLOSED, FULLY_CLOSED, Some(FULLY_CLOSED), Direction::Open),
            ClientAction::Ignore
        );
        assert_eq!(
            client_request(FULLY_OPEN, 60.0, Some(FULLY_OPEN), Direction::Close),
            ClientAction::Ignore
        );
    }

    #[test]
    fn client_limit_tap_midway_toggles() {
        assert_eq!(
            client_request(FULLY_CLOSED, 50.0, Some(50.0), Direction::Open),
            ClientAction::Toggle
        );
    }

    // =========================================================================
    // uncalibrated_drive
    // =========================================================================

    #[test]
    fn uncalibrated_exclusive_directions() {
        assert_eq!(uncalibrated_drive(true, true, false, false), (false, false));
    }

    #[test]
    fn uncalibrated_no_sudden_reversal() {
        assert_eq!(uncalibrated_drive(true, false, false, true), (false, false));
        assert_eq!(uncalibrated_drive(false, true, true, false), (false, false));
    }

    #[test]
    fn uncalibrated_plain_drive_passes_through() {
        assert_eq!(uncalibrated_drive(true, false, false, false), (true, false));
        assert_eq!(uncalibrated_drive(false, true, false, false), (false, true));
        assert_eq!(uncalibrated_drive(false, false, true, true), (false, false));
    }
}
