//! Parameters structure for DriveCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::kinematics::NUM_MODULES;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for drive control.
#[derive(Debug, Default, Deserialize)]
pub struct Params {
    // ---- GEOMETRY ----
    /// The position of each wheel module in the robot body frame, [x, y],
    /// in wiring order FL, FR, RL, RR.
    ///
    /// Units: meters,
    /// Frame: Robot body
    pub module_offsets_m: [[f64; 2]; NUM_MODULES],

    /// Effective wheelbase radius coupling the rotational offset into the
    /// drive-to-pose distance metric.
    ///
    /// Units: meters
    pub effective_radius_m: f64,

    // ---- CAPABILITIES ----
    /// Maximum achievable wheel speed.
    ///
    /// Units: meters/second
    pub max_speed_ms: f64,

    /// Maximum chassis acceleration used by profiled motion.
    ///
    /// Units: meters/second^2
    pub max_accel_mss: f64,

    // ---- CONTROL LOOP ----
    /// The control cycle period.
    ///
    /// Units: seconds
    pub period_s: f64,

    // ---- TRANSLATION CONTROLLER ----
    /// Translation controller proportional gain.
    pub translation_k_p: f64,

    /// Translation controller integral gain.
    pub translation_k_i: f64,

    /// Translation controller derivative gain.
    pub translation_k_d: f64,

    /// Distance within which drive-to-pose is considered arrived.
    ///
    /// Units: meters
    pub translation_tolerance_m: f64,

    // ---- ROTATION CONTROLLER ----
    /// Rotation controller proportional gain.
    pub rotation_k_p: f64,

    /// Rotation controller integral gain.
    pub rotation_k_i: f64,

    /// Rotation controller derivative gain.
    pub rotation_k_d: f64,

    /// Heading error within which the rotation controller reports on
    /// target.
    ///
    /// Units: radians
    pub rotation_tolerance_rad: f64,

    // ---- POSE ESTIMATION ----
    /// How much pose history the estimator retains for late vision
    /// corrections.
    ///
    /// Units: seconds
    pub pose_retention_window_s: f64,

    /// The pose at initialisation, [x_m, y_m, heading_rad].
    pub initial_pose: [f64; 3],

    // ---- SELF TEST ----
    /// Linear velocity commanded on both axes during the self test.
    ///
    /// Units: meters/second
    pub self_test_speed_ms: f64,

    /// How long the self test drives before checking.
    ///
    /// Units: seconds
    pub self_test_duration_s: f64,

    /// Minimum sign-corrected module speed the self test requires.
    ///
    /// Units: meters/second
    pub self_test_min_speed_ms: f64,

    /// Steer angle tolerance for the self test.
    ///
    /// Units: radians
    pub self_test_angle_tol_rad: f64,

    // ---- CHARACTERIZATION ----
    /// Voltage ramp rate of the quasistatic routines.
    ///
    /// Units: volts/second
    pub char_quasistatic_ramp_vps: f64,

    /// Voltage step of the dynamic routines.
    ///
    /// Units: volts
    pub char_dynamic_step_v: f64,

    /// How long each characterization routine runs.
    ///
    /// Units: seconds
    pub char_duration_s: f64,
}
