//! # Drive control module
//!
//! The swerve drive facade. Owns the four wheel modules, the heading sensor,
//! the kinematics solver, the pose estimator and the motion controllers, and
//! exposes the drive's motion primitives. One call to
//! [`util::module::State::proc`] is one control cycle.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod calc_drive_to;
mod calc_velocity;
mod characterize;
mod cmd;
mod params;
mod state;
mod tm;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use cmd::*;
pub use params::*;
pub use self_test::*;
pub use state::*;
pub use tm::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Module reporting names, in wiring order.
pub const MODULE_NAMES: [&str; crate::kinematics::NUM_MODULES] = ["FL", "FR", "RL", "RR"];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during DriveCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum DriveCtrlError {
    #[error("Drive processing requested before initialisation")]
    NotInitialised,
}
