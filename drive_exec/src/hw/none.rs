//! No-op module and gyro stubs
//!
//! Used when the drive must exist without any hardware at all, for example
//! on a bench setup with the drivetrain removed. Commands are accepted and
//! discarded; all measurements read zero.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use super::{ControlMode, Gyro, SwerveModule};
use crate::kinematics::{ModulePosition, ModuleState};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A nonexistent wheel module.
pub struct NoModule;

/// A nonexistent heading sensor.
pub struct NoGyro;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SwerveModule for NoModule {
    fn name(&self) -> &str {
        "none"
    }

    fn state(&mut self) -> ModuleState {
        ModuleState::default()
    }

    fn position(&mut self) -> ModulePosition {
        ModulePosition::default()
    }

    fn desired_state(&self) -> ModuleState {
        ModuleState::default()
    }

    fn set_setpoint(&mut self, _desired: ModuleState, _mode: ControlMode) {}

    fn apply_characterization(&mut self, _angle_rad: f64, _volts: f64) {}

    fn reset_position(&mut self) {}

    fn shutdown(&mut self) {}
}

impl Gyro for NoGyro {
    fn heading_rad(&mut self) -> f64 {
        0.0
    }

    fn reset(&mut self) {}

    fn shutdown(&mut self) {}
}
