//! Characterization routine processing
//!
//! Open-loop voltage profiles for system identification: a slow quasistatic
//! ramp and a dynamic step, each in a pure-translation configuration (all
//! modules forward) and a pure-rotation configuration (modules tangential,
//! turn-in-place). The routines only excite the drivetrain and surface raw
//! data through telemetry; feedforward constant extraction happens offline.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::info;
use std::f64::consts::FRAC_PI_4;

// Internal imports
use super::{CharDirection, CharRoutine, DriveCtrl, DriveCmd};
use crate::hw::ControlMode;
use crate::kinematics::{ChassisVelocity, ModuleState, NUM_MODULES};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Steer angles of the turn-in-place configuration, in wiring order
/// FL, FR, RL, RR: each wheel tangential to the chassis centre.
const ROTATION_ANGLES_RAD: [f64; NUM_MODULES] = [
    3.0 * FRAC_PI_4,
    FRAC_PI_4,
    5.0 * FRAC_PI_4,
    7.0 * FRAC_PI_4,
];

/// Steer angles of the pure-translation configuration.
const TRANSLATION_ANGLES_RAD: [f64; NUM_MODULES] = [0.0; NUM_MODULES];

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveCtrl {
    /// One cycle of a characterization routine.
    pub(crate) fn proc_characterize(
        &mut self,
        routine: CharRoutine,
        direction: CharDirection,
        time_s: f64,
    ) -> ([ModuleState; NUM_MODULES], ControlMode) {
        let elapsed_s = time_s - self.cmd_start_s;

        if elapsed_s >= self.params.char_duration_s {
            info!("Characterization routine {:?} complete", routine);
            self.report.characterization_complete = true;
            self.current_cmd = DriveCmd::Stop;

            return self.issue_chassis(ChassisVelocity::default(), ControlMode::OpenLoopVelocity);
        }

        let magnitude_v = match routine {
            CharRoutine::TranslationQuasistatic | CharRoutine::RotationQuasistatic => {
                self.params.char_quasistatic_ramp_vps * elapsed_s
            }
            CharRoutine::TranslationDynamic | CharRoutine::RotationDynamic => {
                self.params.char_dynamic_step_v
            }
        };

        let volts = match direction {
            CharDirection::Forward => magnitude_v,
            CharDirection::Reverse => -magnitude_v,
        };

        let angles = match routine {
            CharRoutine::TranslationQuasistatic | CharRoutine::TranslationDynamic => {
                TRANSLATION_ANGLES_RAD
            }
            CharRoutine::RotationQuasistatic | CharRoutine::RotationDynamic => ROTATION_ANGLES_RAD,
        };

        for (module, angle) in self.modules.iter_mut().zip(angles.iter()) {
            module.apply_characterization(*angle, volts);
        }

        (self.module_setpoints(), ControlMode::OpenLoopVelocity)
    }
}
