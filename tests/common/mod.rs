#![allow(dead_code)]

use approx::assert_relative_eq;
use rangefit::kinematics::range_model::GroundStation;
use rangefit::kinematics::KinematicState;
use rangefit::least_squares::problem::ObservationSet;

pub const REFERENCE_TIMES: [f64; 5] = [0.0, 1.0, 2.0, 3.0, 4.0];

pub const REFERENCE_RANGES: [f64; 5] = [7.0, 8.00390597, 8.94427191, 9.801147892, 10.630145813];

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn reference_station() -> GroundStation {
    GroundStation::new(1.0, 1.0)
}

pub fn reference_observations() -> ObservationSet {
    ObservationSet::from_slices(&REFERENCE_TIMES, &REFERENCE_RANGES).unwrap()
}

pub fn reference_guess() -> KinematicState {
    KinematicState::new(1.5, 10.0, 2.2, 0.5, 0.3)
}

/// Trajectory the reference ranges were generated from.
pub fn reference_truth() -> KinematicState {
    KinematicState::new(1.0, 8.0, 2.0, 1.0, 0.5)
}

pub fn assert_state_close(actual: &KinematicState, expected: &KinematicState, epsilon: f64) {
    assert_relative_eq!(actual.x, expected.x, epsilon = epsilon);
    assert_relative_eq!(actual.y, expected.y, epsilon = epsilon);
    assert_relative_eq!(actual.x_dot, expected.x_dot, epsilon = epsilon);
    assert_relative_eq!(actual.y_dot, expected.y_dot, epsilon = epsilon);
    assert_relative_eq!(actual.g, expected.g, epsilon = epsilon);
}
