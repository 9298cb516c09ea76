//! # Hardware capability interfaces
//!
//! The drive consumes its actuators and sensors through the capability
//! traits defined here, never through concrete driver types. Three variants
//! of each capability exist:
//!
//! - real ([`real::RealModule`], [`real::RealGyro`]): the control logic over
//!   an abstract hardware backend supplied by the integrator,
//! - simulated ([`sim::SimModule`], [`sim::SimGyro`]): first-order dynamics
//!   advanced once per control cycle,
//! - none ([`none::NoModule`], [`none::NoGyro`]): inert stubs.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod none;
pub mod real;
pub mod sim;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Internal
use crate::kinematics::{ModulePosition, ModuleState};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How a module's drive actuator interprets a commanded speed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    /// Drive voltage proportional to the commanded speed. Used for teleop,
    /// where the operator closes the loop.
    #[default]
    OpenLoopVelocity,

    /// Closed-loop tracking of the commanded speed. Used by automated
    /// motion primitives.
    ClosedLoopVelocity,
}

/// Errors raised by hardware backends.
///
/// These never propagate into the control loop - the capability
/// implementations degrade to last-known-good values and surface persistent
/// faults through telemetry.
#[derive(Debug, Error)]
pub enum HwError {
    #[error("Failed to read sensor: {0}")]
    SensorRead(String),

    #[error("Failed to write actuator demand: {0}")]
    ActuatorWrite(String),
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A single swerve wheel module: independently steered and driven.
///
/// Setpoints are re-issued every control cycle, so implementations advance
/// their control (and any simulated dynamics) inside `set_setpoint` /
/// `apply_characterization` rather than in a separate tick entry point.
pub trait SwerveModule {
    /// Short identifier for reporting ("FL", "FR", ...).
    fn name(&self) -> &str;

    /// The measured drive speed and steer angle.
    fn state(&mut self) -> ModuleState;

    /// The measured accumulated drive distance and steer angle.
    fn position(&mut self) -> ModulePosition;

    /// The most recently commanded state, after angle optimisation.
    fn desired_state(&self) -> ModuleState;

    /// Command a new desired state.
    ///
    /// The steer axis is always driven closed-loop to the target angle; the
    /// drive axis follows `mode`. The target angle is first optimised so the
    /// steering mechanism never travels more than a quarter turn.
    fn set_setpoint(&mut self, desired: ModuleState, mode: ControlMode);

    /// Hold the given steer angle and apply a raw drive voltage, bypassing
    /// the speed loops. Used by the characterization routines.
    fn apply_characterization(&mut self, angle_rad: f64, volts: f64);

    /// Reset the accumulated drive distance to zero.
    fn reset_position(&mut self);

    /// Release the underlying hardware. Called exactly once.
    fn shutdown(&mut self);
}

/// The robot's heading sensor.
pub trait Gyro {
    /// The current heading, counter-clockwise positive.
    ///
    /// Units: radians
    fn heading_rad(&mut self) -> f64;

    /// Feed back the chassis angular rate for this cycle.
    ///
    /// Real sensors ignore this; the simulated variant integrates it to
    /// produce its heading.
    fn observe(&mut self, omega_rads: f64, period_s: f64) {
        let _ = (omega_rads, period_s);
    }

    /// Zero the heading.
    fn reset(&mut self);

    /// Release the underlying hardware. Called exactly once.
    fn shutdown(&mut self);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Control gains and limits for a real module's steer and drive loops.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct ModuleGains {
    /// Steer loop proportional gain (volts per radian).
    pub steer_k_p: f64,
    /// Steer loop integral gain.
    pub steer_k_i: f64,
    /// Steer loop derivative gain.
    pub steer_k_d: f64,

    /// Drive loop proportional gain (volts per m/s of error).
    pub drive_k_p: f64,
    /// Drive loop integral gain.
    pub drive_k_i: f64,
    /// Drive loop derivative gain.
    pub drive_k_d: f64,

    /// Drive static friction feedforward (volts).
    pub drive_k_s: f64,
    /// Drive velocity feedforward (volts per m/s).
    pub drive_k_v: f64,

    /// Actuator voltage limit (volts).
    pub max_volts: f64,

    /// Wheel speed corresponding to full open-loop voltage (m/s).
    pub max_speed_ms: f64,
}
