//! Simulated module and gyro variants
//!
//! The simulated module advances first-order steer and drive dynamics by one
//! control period every time a setpoint is applied, which the drive does
//! unconditionally once per cycle. The simulated gyro integrates the chassis
//! angular rate fed back to it, rather than pretending to sense a heading.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use super::{ControlMode, Gyro, SwerveModule};
use crate::kinematics::{self, ModulePosition, ModuleState};
use util::maths;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Steer axis first-order time constant.
///
/// Units: seconds
const STEER_TAU_S: f64 = 0.05;

/// Drive axis first-order time constant.
///
/// Units: seconds
const DRIVE_TAU_S: f64 = 0.1;

/// Modelled drive motor velocity constant, for characterization voltages.
///
/// Units: volts per meter/second
const DRIVE_KV_V_PER_MS: f64 = 2.6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A simulated wheel module with first-order steer and drive responses.
pub struct SimModule {
    name: String,
    period_s: f64,

    desired: ModuleState,

    /// Current steer angle. Continuous, not wrapped.
    angle_rad: f64,

    /// Current drive speed.
    speed_ms: f64,

    /// Accumulated drive distance.
    distance_m: f64,
}

/// A simulated heading sensor integrating the chassis angular rate.
pub struct SimGyro {
    heading_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimModule {
    pub fn new(name: &str, period_s: f64) -> Self {
        Self {
            name: String::from(name),
            period_s,
            desired: ModuleState::default(),
            angle_rad: 0.0,
            speed_ms: 0.0,
            distance_m: 0.0,
        }
    }

    /// Advance the dynamics one period towards the given targets.
    fn step(&mut self, target_angle_rad: f64, target_speed_ms: f64) {
        let steer_alpha = 1.0 - (-self.period_s / STEER_TAU_S).exp();
        let drive_alpha = 1.0 - (-self.period_s / DRIVE_TAU_S).exp();

        let angle_error =
            maths::ang_dist_2pi(maths::wrap_to_2pi(self.angle_rad), target_angle_rad);

        self.angle_rad += angle_error * steer_alpha;
        self.speed_ms += (target_speed_ms - self.speed_ms) * drive_alpha;
        self.distance_m += self.speed_ms * self.period_s;
    }
}

impl SwerveModule for SimModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&mut self) -> ModuleState {
        ModuleState {
            speed_ms: self.speed_ms,
            angle_rad: maths::wrap_to_2pi(self.angle_rad),
        }
    }

    fn position(&mut self) -> ModulePosition {
        ModulePosition {
            distance_m: self.distance_m,
            angle_rad: self.angle_rad,
        }
    }

    fn desired_state(&self) -> ModuleState {
        self.desired
    }

    fn set_setpoint(&mut self, desired: ModuleState, _mode: ControlMode) {
        let desired = kinematics::optimize_angle(desired, maths::wrap_to_2pi(self.angle_rad));
        self.desired = desired;

        self.step(desired.angle_rad, desired.speed_ms);
    }

    fn apply_characterization(&mut self, angle_rad: f64, volts: f64) {
        self.desired = ModuleState {
            speed_ms: 0.0,
            angle_rad: maths::wrap_to_2pi(angle_rad),
        };

        self.step(self.desired.angle_rad, volts / DRIVE_KV_V_PER_MS);
    }

    fn reset_position(&mut self) {
        self.distance_m = 0.0;
    }

    fn shutdown(&mut self) {
        self.speed_ms = 0.0;
        self.desired = ModuleState::default();
    }
}

impl SimGyro {
    pub fn new() -> Self {
        Self { heading_rad: 0.0 }
    }
}

impl Default for SimGyro {
    fn default() -> Self {
        Self::new()
    }
}

impl Gyro for SimGyro {
    fn heading_rad(&mut self) -> f64 {
        self.heading_rad
    }

    fn observe(&mut self, omega_rads: f64, period_s: f64) {
        self.heading_rad += omega_rads * period_s;
    }

    fn reset(&mut self) {
        self.heading_rad = 0.0;
    }

    fn shutdown(&mut self) {}
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    const EPSILON: f64 = 1e-6;

    #[test]
    fn test_sim_module_converges_to_setpoint() {
        let mut module = SimModule::new("FL", 0.02);

        let target = ModuleState {
            speed_ms: 2.0,
            angle_rad: FRAC_PI_4,
        };

        for _ in 0..500 {
            module.set_setpoint(target, ControlMode::ClosedLoopVelocity);
        }

        let state = module.state();
        assert!((state.speed_ms - 2.0).abs() < EPSILON);
        assert!((state.angle_rad - FRAC_PI_4).abs() < EPSILON);
    }

    #[test]
    fn test_sim_module_accumulates_distance() {
        let mut module = SimModule::new("FL", 0.02);

        for _ in 0..500 {
            module.set_setpoint(
                ModuleState {
                    speed_ms: 1.0,
                    angle_rad: 0.0,
                },
                ControlMode::ClosedLoopVelocity,
            );
        }

        // 10 seconds at (nearly) 1 m/s, minus the spin-up transient
        let position = module.position();
        assert!(position.distance_m > 9.0);
        assert!(position.distance_m <= 10.0);

        module.reset_position();
        assert!(module.position().distance_m.abs() < EPSILON);
    }

    #[test]
    fn test_sim_gyro_integrates_rate() {
        let mut gyro = SimGyro::new();

        for _ in 0..50 {
            gyro.observe(FRAC_PI_2, 0.02);
        }

        // 1 second at pi/2 rad/s
        assert!((gyro.heading_rad() - FRAC_PI_2).abs() < EPSILON);

        gyro.reset();
        assert!(gyro.heading_rad().abs() < EPSILON);
    }
}
