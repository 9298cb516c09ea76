//! Commands passed into DriveCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use crate::pose_est::Pose;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The frame a commanded velocity is expressed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    /// The robot's own frame: X forward, Y left.
    Robot,
    /// The fixed field frame.
    Field,
}

/// The rotation target of a heading-locked drive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum HeadingTarget {
    /// A fixed field-relative heading.
    ///
    /// Units: radians
    Heading(f64),

    /// A field point to keep facing; the target heading is the live bearing
    /// from the robot to this point.
    ///
    /// Units: meters
    Point([f64; 2]),
}

/// The system-identification voltage profiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharRoutine {
    /// Slow voltage ramp, all modules pointing forward.
    TranslationQuasistatic,
    /// Voltage step, all modules pointing forward.
    TranslationDynamic,
    /// Slow voltage ramp in the turn-in-place configuration.
    RotationQuasistatic,
    /// Voltage step in the turn-in-place configuration.
    RotationDynamic,
}

/// Direction of a characterization routine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharDirection {
    Forward,
    Reverse,
}

/// A drive motion primitive.
///
/// The active command is re-evaluated every control cycle until replaced;
/// module setpoints are unconditionally recomputed and re-issued each cycle,
/// so a new command naturally supersedes the previous one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum DriveCmd {
    /// Bring all drive axes to rest, holding the current steer angles.
    Stop,

    /// Point the modules into an X arrangement, resisting pushes.
    Lock,

    /// Open-loop velocity drive (teleop).
    Velocity {
        vx_ms: f64,
        vy_ms: f64,
        omega_rads: f64,
        frame: Frame,
    },

    /// Velocity drive with the rotation axis closed onto a heading target.
    /// Linear velocities are field-relative.
    HeadingLock {
        vx_ms: f64,
        vy_ms: f64,
        target: HeadingTarget,
    },

    /// Closed-loop straight-line drive to a field pose. Terminates on
    /// tolerance; callers needing a time bound must impose one externally.
    DriveTo { target: Pose },

    /// Run a system-identification voltage profile for a bounded duration.
    Characterize {
        routine: CharRoutine,
        direction: CharDirection,
    },

    /// Run the automated drive functional check.
    SelfTest,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveCmd {
    /// Determine if the command is valid (i.e. contains no undefined
    /// values).
    pub fn is_valid(&self) -> bool {
        match *self {
            DriveCmd::Stop | DriveCmd::Lock | DriveCmd::Characterize { .. } | DriveCmd::SelfTest => {
                true
            }
            DriveCmd::Velocity {
                vx_ms,
                vy_ms,
                omega_rads,
                ..
            } => vx_ms.is_finite() && vy_ms.is_finite() && omega_rads.is_finite(),
            DriveCmd::HeadingLock {
                vx_ms,
                vy_ms,
                target,
            } => {
                let target_ok = match target {
                    HeadingTarget::Heading(h) => h.is_finite(),
                    HeadingTarget::Point(p) => p[0].is_finite() && p[1].is_finite(),
                };
                vx_ms.is_finite() && vy_ms.is_finite() && target_ok
            }
            DriveCmd::DriveTo { target } => {
                target.x_m.is_finite() && target.y_m.is_finite() && target.heading_rad.is_finite()
            }
        }
    }

    /// Short name for reporting.
    pub fn name(&self) -> &'static str {
        match self {
            DriveCmd::Stop => "stop",
            DriveCmd::Lock => "lock",
            DriveCmd::Velocity { .. } => "velocity",
            DriveCmd::HeadingLock { .. } => "heading_lock",
            DriveCmd::DriveTo { .. } => "drive_to",
            DriveCmd::Characterize { .. } => "characterize",
            DriveCmd::SelfTest => "self_test",
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_nan_velocity_invalid() {
        let cmd = DriveCmd::Velocity {
            vx_ms: f64::NAN,
            vy_ms: 0.0,
            omega_rads: 0.0,
            frame: Frame::Field,
        };

        assert!(!cmd.is_valid());
    }

    #[test]
    fn test_finite_commands_valid() {
        assert!(DriveCmd::Stop.is_valid());
        assert!(DriveCmd::Lock.is_valid());
        assert!(DriveCmd::HeadingLock {
            vx_ms: 1.0,
            vy_ms: 0.0,
            target: HeadingTarget::Point([2.0, 2.0]),
        }
        .is_valid());
    }

    #[test]
    fn test_nan_target_invalid() {
        let cmd = DriveCmd::DriveTo {
            target: Pose {
                x_m: 1.0,
                y_m: f64::INFINITY,
                heading_rad: 0.0,
            },
        };

        assert!(!cmd.is_valid());
    }
}
