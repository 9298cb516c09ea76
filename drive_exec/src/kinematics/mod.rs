//! # Swerve drive kinematics
//!
//! Pure conversions between chassis-level velocity and the four wheel-module
//! vectors, given the fixed module mounting geometry. The inverse solve is
//! exact; the forward solve is a least-squares fit over the overdetermined
//! wheel measurements, using a pseudo-inverse computed once at construction.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{SMatrix, SVector, Vector2};
use serde::{Deserialize, Serialize};

// Internal
use util::maths;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The number of wheel modules on the robot.
pub const NUM_MODULES: usize = 4;

/// Singular values below this threshold are discarded in the pseudo-inverse.
const PINV_EPSILON: f64 = 1e-10;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The composite planar motion of the chassis.
///
/// Linear components are in meters/second, the angular component in
/// radians/second. Unless stated otherwise by the producing function these
/// are robot-relative; conversion to or from the field frame requires the
/// current heading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChassisVelocity {
    /// Velocity along the robot X (forward) axis.
    ///
    /// Units: meters/second
    pub vx_ms: f64,

    /// Velocity along the robot Y (left) axis.
    ///
    /// Units: meters/second
    pub vy_ms: f64,

    /// Angular velocity about the robot Z axis (counter-clockwise positive).
    ///
    /// Units: radians/second
    pub omega_rads: f64,
}

/// The state of a single wheel module - drive speed and steer angle.
///
/// Speed may be signed, a negative speed meaning the wheel is driven in
/// reverse at the given angle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleState {
    /// Wheel speed along the module's current direction.
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// Steer axis angle, counter-clockwise from robot X.
    ///
    /// Units: radians
    pub angle_rad: f64,
}

/// The accumulated position of a single wheel module.
///
/// Distance accumulates monotonically in magnitude between encoder resets
/// and is used for odometry deltas. The angle is the absolute steer angle,
/// not wrapped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModulePosition {
    /// Total distance the wheel has rolled.
    ///
    /// Units: meters
    pub distance_m: f64,

    /// Steer axis angle.
    ///
    /// Units: radians
    pub angle_rad: f64,
}

/// A small chassis-relative displacement, the product of the least-squares
/// solve over the four module position deltas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Twist {
    /// Displacement along the robot X axis (meters).
    pub dx_m: f64,

    /// Displacement along the robot Y axis (meters).
    pub dy_m: f64,

    /// Rotation about the robot Z axis (radians).
    pub dtheta_rad: f64,
}

/// Swerve kinematics solver for the four-module drivetrain.
pub struct SwerveKinematics {
    /// Module mounting positions in the robot body frame, fixed at
    /// construction.
    offsets: [Vector2<f64>; NUM_MODULES],

    /// Pseudo-inverse of the geometry matrix, mapping the eight wheel vector
    /// components back to (vx, vy, omega).
    fwd_pinv: SMatrix<f64, 3, 8>,

    /// Last commanded angle per module, held when the commanded vector is
    /// too small to define a direction.
    prev_angles_rad: [f64; NUM_MODULES],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ChassisVelocity {
    pub fn new(vx_ms: f64, vy_ms: f64, omega_rads: f64) -> Self {
        Self {
            vx_ms,
            vy_ms,
            omega_rads,
        }
    }

    /// Convert a field-relative velocity into the robot frame given the
    /// current heading.
    pub fn from_field_relative(field: Self, heading_rad: f64) -> Self {
        let (sin_h, cos_h) = heading_rad.sin_cos();
        Self {
            vx_ms: field.vx_ms * cos_h + field.vy_ms * sin_h,
            vy_ms: -field.vx_ms * sin_h + field.vy_ms * cos_h,
            omega_rads: field.omega_rads,
        }
    }

    /// Convert this robot-relative velocity into the field frame given the
    /// current heading.
    pub fn to_field_relative(self, heading_rad: f64) -> Self {
        let (sin_h, cos_h) = heading_rad.sin_cos();
        Self {
            vx_ms: self.vx_ms * cos_h - self.vy_ms * sin_h,
            vy_ms: self.vx_ms * sin_h + self.vy_ms * cos_h,
            omega_rads: self.omega_rads,
        }
    }

    /// Compensate a continuous velocity demand for being applied over one
    /// discrete control period.
    ///
    /// While a demand is held constant over a tick the chassis rotates, so
    /// naively applying it translates the robot along a curve rather than
    /// the commanded straight line. This computes the twist which, when
    /// integrated over the period, produces the commanded displacement.
    pub fn discretize(self, period_s: f64) -> Self {
        let dx = self.vx_ms * period_s;
        let dy = self.vy_ms * period_s;
        let dtheta = self.omega_rads * period_s;

        let half_dtheta = dtheta / 2.0;
        let cos_minus_one = dtheta.cos() - 1.0;

        let half_theta_by_tan = if cos_minus_one.abs() < 1e-9 {
            1.0 - dtheta * dtheta / 12.0
        } else {
            -(half_dtheta * dtheta.sin()) / cos_minus_one
        };

        Self {
            vx_ms: (dx * half_theta_by_tan + dy * half_dtheta) / period_s,
            vy_ms: (-dx * half_dtheta + dy * half_theta_by_tan) / period_s,
            omega_rads: self.omega_rads,
        }
    }

    /// The planar speed magnitude of this velocity (meters/second).
    pub fn speed_ms(&self) -> f64 {
        self.vx_ms.hypot(self.vy_ms)
    }
}

impl SwerveKinematics {
    /// Create a new solver from the fixed module mounting positions.
    pub fn new(offsets: [Vector2<f64>; NUM_MODULES]) -> Self {
        Self {
            offsets,
            fwd_pinv: geometry_pseudo_inverse(&offsets),
            prev_angles_rad: [0.0; NUM_MODULES],
        }
    }

    /// The module mounting positions in the robot body frame.
    pub fn offsets(&self) -> &[Vector2<f64>; NUM_MODULES] {
        &self.offsets
    }

    /// Inverse kinematics - the module states required to achieve the given
    /// robot-relative chassis velocity.
    ///
    /// Each module's required planar velocity is the chassis linear velocity
    /// plus the rotational contribution `omega x offset`. A module whose
    /// required vector is too small to define a direction keeps its previous
    /// commanded angle.
    pub fn inverse(&mut self, velocity: ChassisVelocity) -> [ModuleState; NUM_MODULES] {
        let mut states = [ModuleState::default(); NUM_MODULES];

        for i in 0..NUM_MODULES {
            let vx = velocity.vx_ms - velocity.omega_rads * self.offsets[i].y;
            let vy = velocity.vy_ms + velocity.omega_rads * self.offsets[i].x;

            let speed = vx.hypot(vy);

            let angle = if speed > 1e-9 {
                maths::wrap_to_2pi(vy.atan2(vx))
            } else {
                self.prev_angles_rad[i]
            };

            self.prev_angles_rad[i] = angle;

            states[i] = ModuleState {
                speed_ms: speed,
                angle_rad: angle,
            };
        }

        states
    }

    /// Forward kinematics - the chassis velocity best fitting the measured
    /// module states, in the least-squares sense.
    pub fn forward(&self, states: &[ModuleState; NUM_MODULES]) -> ChassisVelocity {
        let mut components = SVector::<f64, 8>::zeros();

        for (i, state) in states.iter().enumerate() {
            components[2 * i] = state.speed_ms * state.angle_rad.cos();
            components[2 * i + 1] = state.speed_ms * state.angle_rad.sin();
        }

        let solution = self.fwd_pinv * components;

        ChassisVelocity {
            vx_ms: solution[0],
            vy_ms: solution[1],
            omega_rads: solution[2],
        }
    }

    /// Solve the chassis-relative twist corresponding to the given per-module
    /// (distance delta, angle) pairs.
    pub fn twist(&self, deltas: &[(f64, f64); NUM_MODULES]) -> Twist {
        twist_from_deltas(&self.fwd_pinv, deltas)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Scale all module speeds down uniformly so that none exceeds the given
/// maximum.
///
/// Scaling all four speeds by the same factor preserves the ratios between
/// them and therefore the shape of the commanded motion, only reducing its
/// magnitude.
pub fn desaturate(states: &mut [ModuleState; NUM_MODULES], max_speed_ms: f64) -> bool {
    let largest = states
        .iter()
        .map(|s| s.speed_ms.abs())
        .fold(0.0f64, f64::max);

    if largest > max_speed_ms {
        let scale = max_speed_ms / largest;
        for state in states.iter_mut() {
            state.speed_ms *= scale;
        }
        true
    } else {
        false
    }
}

/// Minimise steering travel to reach a desired state.
///
/// If the desired angle is more than 90 degrees away from the module's
/// current angle, the same wheel velocity can be achieved by flipping the
/// target angle half a turn and reversing the drive direction.
pub fn optimize_angle(desired: ModuleState, current_angle_rad: f64) -> ModuleState {
    let error = maths::ang_dist_2pi(current_angle_rad, desired.angle_rad);

    if error.abs() > std::f64::consts::FRAC_PI_2 {
        ModuleState {
            speed_ms: -desired.speed_ms,
            angle_rad: maths::wrap_to_2pi(desired.angle_rad + std::f64::consts::PI),
        }
    } else {
        desired
    }
}

// ---------------------------------------------------------------------------
// CRATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the pseudo-inverse of the fixed geometry matrix for the given
/// module offsets.
///
/// The geometry matrix maps (vx, vy, omega) to the eight wheel vector
/// components, two rows per module:
///
/// ```text
/// [ 1  0  -offset_y ]
/// [ 0  1   offset_x ]
/// ```
pub(crate) fn geometry_pseudo_inverse(
    offsets: &[Vector2<f64>; NUM_MODULES],
) -> SMatrix<f64, 3, 8> {
    let mut geometry = SMatrix::<f64, 8, 3>::zeros();

    for (i, offset) in offsets.iter().enumerate() {
        geometry[(2 * i, 0)] = 1.0;
        geometry[(2 * i, 2)] = -offset.y;
        geometry[(2 * i + 1, 1)] = 1.0;
        geometry[(2 * i + 1, 2)] = offset.x;
    }

    // The geometry matrix always has full column rank for distinct offsets,
    // so the pseudo-inverse cannot fail for a positive epsilon.
    geometry
        .pseudo_inverse(PINV_EPSILON)
        .expect("geometry matrix pseudo-inverse failed")
}

/// Least-squares solve of (distance delta, angle) pairs into a chassis twist.
pub(crate) fn twist_from_deltas(
    fwd_pinv: &SMatrix<f64, 3, 8>,
    deltas: &[(f64, f64); NUM_MODULES],
) -> Twist {
    let mut components = SVector::<f64, 8>::zeros();

    for (i, (distance, angle)) in deltas.iter().enumerate() {
        components[2 * i] = distance * angle.cos();
        components[2 * i + 1] = distance * angle.sin();
    }

    let solution = fwd_pinv * components;

    Twist {
        dx_m: solution[0],
        dy_m: solution[1],
        dtheta_rad: solution[2],
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
