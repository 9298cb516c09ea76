//! # Pose estimation
//!
//! Fuses wheel odometry, the heading sensor and asynchronous vision
//! measurements into a continuously-updated field pose.
//!
//! The odometry step runs synchronously once per control cycle. Vision
//! corrections may arrive from another thread at any time and are blended
//! against a bounded history of recent poses, so a measurement captured in
//! the past can be compared against the odometry estimate at its capture
//! time rather than against the present.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use nalgebra::{SMatrix, Vector2};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

// Internal
use crate::kinematics::{self, ModulePosition, NUM_MODULES};
use util::maths;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A field-relative robot pose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Field X position.
    ///
    /// Units: meters
    pub x_m: f64,

    /// Field Y position.
    ///
    /// Units: meters
    pub y_m: f64,

    /// Heading, counter-clockwise from field X, normalised to [0, 2pi).
    ///
    /// Units: radians
    pub heading_rad: f64,
}

/// A pose estimate produced by an external vision system.
///
/// The timestamp is the capture time on the session clock, which may lie in
/// the past relative to the estimator's latest odometry sample. Trust is
/// inversely proportional to the standard deviations.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct VisionMeasurement {
    /// The estimated pose.
    pub pose: Pose,

    /// Capture time, seconds on the session clock.
    pub timestamp_s: f64,

    /// Standard deviation of the estimate on each axis: [x (m), y (m),
    /// heading (rad)].
    pub std_devs: [f64; 3],
}

/// Estimator state guarded by the mutex - everything a correction touches.
struct EstimatorState {
    /// The current best estimate of the pose.
    pose: Pose,

    /// Time-ordered record of recent (timestamp, pose) samples.
    history: VecDeque<(f64, Pose)>,

    /// Module positions at the previous odometry step.
    prev_positions: Option<[ModulePosition; NUM_MODULES]>,

    /// Timestamp of the previous odometry step.
    last_time_s: Option<f64>,

    /// Number of vision measurements dropped for falling outside the
    /// retained history.
    stale_drops: u64,
}

/// The pose estimator.
///
/// `integrate` must be called exactly once per control cycle from the control
/// thread. `add_vision_measurement` may be called from any thread; state is
/// only touched inside a short critical section so corrections never observe
/// a partially-updated pose and never block the control loop for long.
pub struct PoseEstimator {
    /// Pseudo-inverse of the module geometry matrix, for the delta solve.
    fwd_pinv: SMatrix<f64, 3, 8>,

    /// How much pose history to retain, in seconds.
    retention_window_s: f64,

    state: Mutex<EstimatorState>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Create a new pose, normalising the heading into [0, 2pi).
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            x_m,
            y_m,
            heading_rad: maths::wrap_to_2pi(heading_rad),
        }
    }

    /// The planar position of this pose.
    pub fn translation(&self) -> Vector2<f64> {
        Vector2::new(self.x_m, self.y_m)
    }
}

impl PoseEstimator {
    /// Create a new estimator from the fixed module offsets, starting at the
    /// given pose.
    pub fn new(
        offsets: [Vector2<f64>; NUM_MODULES],
        initial_pose: Pose,
        retention_window_s: f64,
    ) -> Self {
        Self {
            fwd_pinv: kinematics::geometry_pseudo_inverse(&offsets),
            retention_window_s,
            state: Mutex::new(EstimatorState {
                pose: Pose::new(initial_pose.x_m, initial_pose.y_m, initial_pose.heading_rad),
                history: VecDeque::new(),
                prev_positions: None,
                last_time_s: None,
                stale_drops: 0,
            }),
        }
    }

    /// The current pose estimate. O(1).
    pub fn current_pose(&self) -> Pose {
        self.lock().pose
    }

    /// Number of vision measurements dropped as too old to correct.
    pub fn stale_drop_count(&self) -> u64 {
        self.lock().stale_drops
    }

    /// Discard all history and set the current pose.
    ///
    /// Module positions from the previous cycle are kept so that odometry
    /// continues seamlessly from the new pose on the next cycle.
    pub fn reset_pose(&self, pose: Pose) {
        let mut state = self.lock();
        state.pose = Pose::new(pose.x_m, pose.y_m, pose.heading_rad);
        state.history.clear();
    }

    /// Advance the pose by one odometry step.
    ///
    /// The per-module distance deltas since the previous call are solved into
    /// a single chassis-relative twist, rotated into the field frame by the
    /// supplied heading (the sensed heading, not the integrated one, so wheel
    /// slip cannot accumulate into the heading estimate) and accumulated into
    /// the pose. Callers are responsible for passing headings consistent with
    /// the pose frame.
    ///
    /// Must be called exactly once per control cycle with a strictly
    /// increasing timestamp; a non-increasing timestamp is reported and
    /// ignored.
    pub fn integrate(
        &self,
        positions: &[ModulePosition; NUM_MODULES],
        heading_rad: f64,
        timestamp_s: f64,
    ) {
        let mut state = self.lock();

        if let Some(last) = state.last_time_s {
            if timestamp_s <= last {
                warn!(
                    "Odometry timestamp not monotonic ({} <= {}), step ignored",
                    timestamp_s, last
                );
                return;
            }
        }

        let heading = maths::wrap_to_2pi(heading_rad);

        if let Some(prev) = state.prev_positions {
            let mut deltas = [(0.0, 0.0); NUM_MODULES];
            for i in 0..NUM_MODULES {
                deltas[i] = (
                    positions[i].distance_m - prev[i].distance_m,
                    positions[i].angle_rad,
                );
            }

            let twist = kinematics::twist_from_deltas(&self.fwd_pinv, &deltas);

            let (sin_h, cos_h) = heading.sin_cos();
            state.pose.x_m += twist.dx_m * cos_h - twist.dy_m * sin_h;
            state.pose.y_m += twist.dx_m * sin_h + twist.dy_m * cos_h;
        }

        state.pose.heading_rad = heading;
        state.prev_positions = Some(*positions);
        state.last_time_s = Some(timestamp_s);

        let sample = (timestamp_s, state.pose);
        state.history.push_back(sample);

        // Evict samples that have aged out of the retention window
        let horizon = timestamp_s - self.retention_window_s;
        while let Some(&(t, _)) = state.history.front() {
            if t < horizon {
                state.history.pop_front();
            } else {
                break;
            }
        }
    }

    /// Blend a vision measurement into the current pose.
    ///
    /// The odometry-only pose at the measurement's capture time is
    /// interpolated from the history, the residual between it and the vision
    /// pose is weighted per axis by the measurement's trust, and the weighted
    /// residual is applied rigidly to the current pose. History itself is
    /// never rewritten - all subsequent odometry simply proceeds from the
    /// corrected estimate.
    ///
    /// Measurements older than the retained history are dropped and counted;
    /// this is expected under normal latency variance and is not a fault.
    ///
    /// Returns true if the measurement was applied.
    pub fn add_vision_measurement(&self, measurement: &VisionMeasurement) -> bool {
        let mut state = self.lock();

        let oldest = match state.history.front() {
            Some(&(t, _)) => t,
            None => {
                state.stale_drops += 1;
                debug!("Vision measurement arrived before any odometry sample, dropped");
                return false;
            }
        };

        if measurement.timestamp_s < oldest {
            state.stale_drops += 1;
            debug!(
                "Vision measurement at {} s predates retained history (oldest {} s), dropped",
                measurement.timestamp_s, oldest
            );
            return false;
        }

        let reference = interpolate(&state.history, measurement.timestamp_s);

        let residual_x = measurement.pose.x_m - reference.x_m;
        let residual_y = measurement.pose.y_m - reference.y_m;
        let residual_heading =
            maths::ang_dist_2pi(reference.heading_rad, measurement.pose.heading_rad);

        let weights = [
            trust_weight(measurement.std_devs[0]),
            trust_weight(measurement.std_devs[1]),
            trust_weight(measurement.std_devs[2]),
        ];

        state.pose.x_m += weights[0] * residual_x;
        state.pose.y_m += weights[1] * residual_y;
        state.pose.heading_rad =
            maths::wrap_to_2pi(state.pose.heading_rad + weights[2] * residual_heading);

        true
    }

    /// Lock the estimator state, recovering it if a previous holder panicked.
    fn lock(&self) -> std::sync::MutexGuard<'_, EstimatorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Correction weight for a standard deviation: 1 at perfect trust, falling
/// towards 0 as the deviation grows. Always within [0, 1].
fn trust_weight(std_dev: f64) -> f64 {
    maths::clamp(&(1.0 / (1.0 + std_dev.abs())), &0.0, &1.0)
}

/// Linearly interpolate the pose at the given time from the history.
///
/// Times beyond either end of the history clamp to the nearest sample. The
/// heading is interpolated along the shortest arc.
fn interpolate(history: &VecDeque<(f64, Pose)>, time_s: f64) -> Pose {
    let idx = history.partition_point(|&(t, _)| t <= time_s);

    if idx == 0 {
        return history.front().map(|&(_, p)| p).unwrap_or_default();
    }
    if idx == history.len() {
        return history.back().map(|&(_, p)| p).unwrap_or_default();
    }

    let (t0, p0) = history[idx - 1];
    let (t1, p1) = history[idx];

    if t1 - t0 < 1e-12 {
        return p1;
    }

    let s = (time_s - t0) / (t1 - t0);

    Pose {
        x_m: p0.x_m + (p1.x_m - p0.x_m) * s,
        y_m: p0.y_m + (p1.y_m - p0.y_m) * s,
        heading_rad: maths::wrap_to_2pi(
            p0.heading_rad + maths::ang_dist_2pi(p0.heading_rad, p1.heading_rad) * s,
        ),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const EPSILON: f64 = 1e-9;

    fn test_offsets() -> [Vector2<f64>; NUM_MODULES] {
        [
            Vector2::new(0.3, 0.3),
            Vector2::new(0.3, -0.3),
            Vector2::new(-0.3, 0.3),
            Vector2::new(-0.3, -0.3),
        ]
    }

    fn positions(distance_m: f64, angle_rad: f64) -> [ModulePosition; NUM_MODULES] {
        [ModulePosition {
            distance_m,
            angle_rad,
        }; NUM_MODULES]
    }

    #[test]
    fn test_pure_odometry_dead_reckoning() {
        let est = PoseEstimator::new(test_offsets(), Pose::default(), 2.0);

        // Anchor sample, then roll 0.1 m forward while facing field X, then
        // a further 0.1 m forward while facing field Y.
        est.integrate(&positions(0.0, 0.0), 0.0, 0.0);
        est.integrate(&positions(0.1, 0.0), 0.0, 0.02);
        est.integrate(&positions(0.2, 0.0), FRAC_PI_2, 0.04);

        let pose = est.current_pose();
        assert!((pose.x_m - 0.1).abs() < 1e-6);
        assert!((pose.y_m - 0.1).abs() < 1e-6);
        assert!((pose.heading_rad - FRAC_PI_2).abs() < EPSILON);
    }

    #[test]
    fn test_odometry_sideways_roll() {
        let est = PoseEstimator::new(test_offsets(), Pose::default(), 2.0);

        // Wheels steered to robot Y, heading fixed at zero: the robot crabs.
        est.integrate(&positions(0.0, FRAC_PI_2), 0.0, 0.0);
        est.integrate(&positions(0.25, FRAC_PI_2), 0.0, 0.02);

        let pose = est.current_pose();
        assert!(pose.x_m.abs() < 1e-6);
        assert!((pose.y_m - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_non_monotonic_timestamp_ignored() {
        let est = PoseEstimator::new(test_offsets(), Pose::default(), 2.0);

        est.integrate(&positions(0.0, 0.0), 0.0, 0.0);
        est.integrate(&positions(0.1, 0.0), 0.0, 0.02);
        let before = est.current_pose();

        est.integrate(&positions(0.5, 0.0), 0.0, 0.02);

        assert_eq!(est.current_pose(), before);
    }

    #[test]
    fn test_high_trust_vision_pulls_pose() {
        let est = PoseEstimator::new(test_offsets(), Pose::default(), 2.0);

        est.integrate(&positions(0.0, 0.0), 0.0, 0.0);
        est.integrate(&positions(0.1, 0.0), 0.0, 0.02);

        let measurement = VisionMeasurement {
            pose: Pose::new(1.0, 1.0, 0.0),
            timestamp_s: 0.02,
            std_devs: [1e-9, 1e-9, 1e-9],
        };

        assert!(est.add_vision_measurement(&measurement));

        let pose = est.current_pose();
        assert!((pose.x_m - 1.0).abs() < 1e-6);
        assert!((pose.y_m - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_low_trust_vision_barely_moves_pose() {
        let est = PoseEstimator::new(test_offsets(), Pose::default(), 2.0);

        est.integrate(&positions(0.0, 0.0), 0.0, 0.0);
        est.integrate(&positions(0.1, 0.0), 0.0, 0.02);
        let before = est.current_pose();

        let measurement = VisionMeasurement {
            pose: Pose::new(5.0, 5.0, 1.0),
            timestamp_s: 0.02,
            std_devs: [1e9, 1e9, 1e9],
        };

        assert!(est.add_vision_measurement(&measurement));

        let pose = est.current_pose();
        assert!((pose.x_m - before.x_m).abs() < 1e-6);
        assert!((pose.y_m - before.y_m).abs() < 1e-6);
    }

    #[test]
    fn test_stale_vision_dropped() {
        let est = PoseEstimator::new(test_offsets(), Pose::default(), 1.0);

        est.integrate(&positions(0.0, 0.0), 0.0, 10.0);
        est.integrate(&positions(0.1, 0.0), 0.0, 10.02);
        let before = est.current_pose();

        let measurement = VisionMeasurement {
            pose: Pose::new(1.0, 1.0, 0.0),
            timestamp_s: 2.0,
            std_devs: [0.01, 0.01, 0.01],
        };

        assert!(!est.add_vision_measurement(&measurement));
        assert_eq!(est.current_pose(), before);
        assert_eq!(est.stale_drop_count(), 1);
    }

    #[test]
    fn test_vision_matching_interpolated_history_is_neutral() {
        let est = PoseEstimator::new(test_offsets(), Pose::default(), 5.0);

        // Straight roll: history holds x = 0.0 at t = 0 and x = 1.0 at t = 1
        est.integrate(&positions(0.0, 0.0), 0.0, 0.0);
        est.integrate(&positions(1.0, 0.0), 0.0, 1.0);

        // A perfectly-trusted measurement agreeing with the interpolated
        // half-way pose leaves the current estimate untouched
        let measurement = VisionMeasurement {
            pose: Pose::new(0.5, 0.0, 0.0),
            timestamp_s: 0.5,
            std_devs: [1e-9, 1e-9, 1e-9],
        };

        assert!(est.add_vision_measurement(&measurement));

        let pose = est.current_pose();
        assert!((pose.x_m - 1.0).abs() < 1e-6);
        assert!(pose.y_m.abs() < 1e-6);
    }

    #[test]
    fn test_reset_pose_discards_history() {
        let est = PoseEstimator::new(test_offsets(), Pose::default(), 2.0);

        est.integrate(&positions(0.0, 0.0), 0.0, 0.0);
        est.integrate(&positions(0.1, 0.0), 0.0, 0.02);

        est.reset_pose(Pose::new(3.0, 4.0, 1.0));

        let pose = est.current_pose();
        assert!((pose.x_m - 3.0).abs() < EPSILON);
        assert!((pose.y_m - 4.0).abs() < EPSILON);
        assert!((pose.heading_rad - 1.0).abs() < EPSILON);

        // History was discarded, so an immediate vision measurement has no
        // reference to correct against and is dropped
        let measurement = VisionMeasurement {
            pose: Pose::new(0.0, 0.0, 0.0),
            timestamp_s: 0.02,
            std_devs: [0.01, 0.01, 0.01],
        };
        assert!(!est.add_vision_measurement(&measurement));
    }

    #[test]
    fn test_heading_normalised() {
        let est = PoseEstimator::new(test_offsets(), Pose::default(), 2.0);

        est.integrate(&positions(0.0, 0.0), -FRAC_PI_2, 0.0);

        let pose = est.current_pose();
        assert!((pose.heading_rad - 3.0 * FRAC_PI_2).abs() < EPSILON);
    }
}
