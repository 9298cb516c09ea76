//! Drive telemetry snapshot
//!
//! One flat record per control cycle, built explicitly from the facade's
//! state and handed to the observer (archiver, dashboard bridge). One-way
//! and read-only: nothing here feeds back into control.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal imports
use super::DriveCtrl;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Flat per-cycle drive telemetry record.
#[derive(Clone, Debug, Serialize)]
pub struct DriveTm {
    /// Cycle timestamp on the session clock (seconds).
    pub time_s: f64,

    /// Active command name.
    pub cmd: String,

    // Estimated pose
    pub pose_x_m: f64,
    pub pose_y_m: f64,
    pub pose_heading_rad: f64,

    // Measured module speeds (m/s)
    pub fl_speed_ms: f64,
    pub fr_speed_ms: f64,
    pub rl_speed_ms: f64,
    pub rr_speed_ms: f64,

    // Measured module angles (rad)
    pub fl_angle_rad: f64,
    pub fr_angle_rad: f64,
    pub rl_angle_rad: f64,
    pub rr_angle_rad: f64,

    // Commanded module speeds (m/s)
    pub fl_dem_speed_ms: f64,
    pub fr_dem_speed_ms: f64,
    pub rl_dem_speed_ms: f64,
    pub rr_dem_speed_ms: f64,

    // Commanded module angles (rad)
    pub fl_dem_angle_rad: f64,
    pub fr_dem_angle_rad: f64,
    pub rl_dem_angle_rad: f64,
    pub rr_dem_angle_rad: f64,

    // Measured chassis velocity, robot frame
    pub robot_vx_ms: f64,
    pub robot_vy_ms: f64,
    pub robot_omega_rads: f64,

    // Measured chassis velocity, field frame
    pub field_vx_ms: f64,
    pub field_vy_ms: f64,
    pub field_omega_rads: f64,

    // Controller state
    pub rotation_setpoint_rad: f64,
    pub rotation_error_rad: f64,
    pub translation_setpoint_m: f64,
    pub translation_error_m: f64,

    // Status
    pub desaturated: bool,
    pub stale_vision_drops: u64,
    pub self_test_passed: Option<bool>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveCtrl {
    /// Build the telemetry snapshot for the cycle which just processed.
    pub fn telemetry(&self, time_s: f64) -> DriveTm {
        let pose = self.pose();
        let states = self.module_states();
        let setpoints = self.module_setpoints();
        let robot_vel = self.robot_relative_velocity();
        let field_vel = self.field_relative_velocity();

        let (rotation_setpoint_rad, rotation_error_rad) = match &self.rotation_ctrl {
            Some(ctrl) => (ctrl.setpoint(), ctrl.error()),
            None => (0.0, 0.0),
        };

        let (translation_setpoint_m, translation_error_m) = match &self.translation_ctrl {
            Some(ctrl) => (ctrl.setpoint().position, ctrl.error()),
            None => (0.0, 0.0),
        };

        DriveTm {
            time_s,
            cmd: String::from(self.current_cmd.name()),
            pose_x_m: pose.x_m,
            pose_y_m: pose.y_m,
            pose_heading_rad: pose.heading_rad,
            fl_speed_ms: states[0].speed_ms,
            fr_speed_ms: states[1].speed_ms,
            rl_speed_ms: states[2].speed_ms,
            rr_speed_ms: states[3].speed_ms,
            fl_angle_rad: states[0].angle_rad,
            fr_angle_rad: states[1].angle_rad,
            rl_angle_rad: states[2].angle_rad,
            rr_angle_rad: states[3].angle_rad,
            fl_dem_speed_ms: setpoints[0].speed_ms,
            fr_dem_speed_ms: setpoints[1].speed_ms,
            rl_dem_speed_ms: setpoints[2].speed_ms,
            rr_dem_speed_ms: setpoints[3].speed_ms,
            fl_dem_angle_rad: setpoints[0].angle_rad,
            fr_dem_angle_rad: setpoints[1].angle_rad,
            rl_dem_angle_rad: setpoints[2].angle_rad,
            rr_dem_angle_rad: setpoints[3].angle_rad,
            robot_vx_ms: robot_vel.vx_ms,
            robot_vy_ms: robot_vel.vy_ms,
            robot_omega_rads: robot_vel.omega_rads,
            field_vx_ms: field_vel.vx_ms,
            field_vy_ms: field_vel.vy_ms,
            field_omega_rads: field_vel.omega_rads,
            rotation_setpoint_rad,
            rotation_error_rad,
            translation_setpoint_m,
            translation_error_m,
            desaturated: self.report.desaturated,
            stale_vision_drops: self.report.stale_vision_drops,
            self_test_passed: self.self_test_report.as_ref().map(|r| r.passed),
        }
    }
}

impl DriveTm {
    /// The snapshot as a flat name-to-value mapping for external observers.
    ///
    /// Non-numeric fields are folded to numbers (booleans to 0/1, the
    /// self-test tri-state to -1/0/1 for not-run/failed/passed).
    pub fn flat(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("time_s", self.time_s),
            ("pose_x_m", self.pose_x_m),
            ("pose_y_m", self.pose_y_m),
            ("pose_heading_rad", self.pose_heading_rad),
            ("fl_speed_ms", self.fl_speed_ms),
            ("fr_speed_ms", self.fr_speed_ms),
            ("rl_speed_ms", self.rl_speed_ms),
            ("rr_speed_ms", self.rr_speed_ms),
            ("fl_angle_rad", self.fl_angle_rad),
            ("fr_angle_rad", self.fr_angle_rad),
            ("rl_angle_rad", self.rl_angle_rad),
            ("rr_angle_rad", self.rr_angle_rad),
            ("fl_dem_speed_ms", self.fl_dem_speed_ms),
            ("fr_dem_speed_ms", self.fr_dem_speed_ms),
            ("rl_dem_speed_ms", self.rl_dem_speed_ms),
            ("rr_dem_speed_ms", self.rr_dem_speed_ms),
            ("fl_dem_angle_rad", self.fl_dem_angle_rad),
            ("fr_dem_angle_rad", self.fr_dem_angle_rad),
            ("rl_dem_angle_rad", self.rl_dem_angle_rad),
            ("rr_dem_angle_rad", self.rr_dem_angle_rad),
            ("robot_vx_ms", self.robot_vx_ms),
            ("robot_vy_ms", self.robot_vy_ms),
            ("robot_omega_rads", self.robot_omega_rads),
            ("field_vx_ms", self.field_vx_ms),
            ("field_vy_ms", self.field_vy_ms),
            ("field_omega_rads", self.field_omega_rads),
            ("rotation_setpoint_rad", self.rotation_setpoint_rad),
            ("rotation_error_rad", self.rotation_error_rad),
            ("translation_setpoint_m", self.translation_setpoint_m),
            ("translation_error_m", self.translation_error_m),
            ("desaturated", self.desaturated as u8 as f64),
            ("stale_vision_drops", self.stale_vision_drops as f64),
            (
                "self_test_passed",
                match self.self_test_passed {
                    None => -1.0,
                    Some(false) => 0.0,
                    Some(true) => 1.0,
                },
            ),
        ]
    }
}
