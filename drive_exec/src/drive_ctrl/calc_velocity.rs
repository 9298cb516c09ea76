//! Velocity and heading-locked drive calculations

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal imports
use super::{DriveCtrl, Frame, HeadingTarget};
use crate::kinematics::ChassisVelocity;
use util::maths;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveCtrl {
    /// Resolve an open-loop velocity command into the robot frame.
    pub(crate) fn calc_velocity(
        &self,
        vx_ms: f64,
        vy_ms: f64,
        omega_rads: f64,
        frame: Frame,
    ) -> ChassisVelocity {
        let velocity = ChassisVelocity::new(vx_ms, vy_ms, omega_rads);

        match frame {
            Frame::Robot => velocity,
            Frame::Field => ChassisVelocity::from_field_relative(velocity, self.heading()),
        }
    }

    /// Resolve a heading-locked drive: field-relative linear velocities pass
    /// straight through while the angular rate comes from the rotation
    /// controller tracking the live target heading.
    pub(crate) fn calc_heading_lock(
        &mut self,
        vx_ms: f64,
        vy_ms: f64,
        target: HeadingTarget,
    ) -> ChassisVelocity {
        let pose = self.pose();

        let target_heading_rad = match target {
            HeadingTarget::Heading(heading) => maths::wrap_to_2pi(heading),
            HeadingTarget::Point(point) => {
                let dx = point[0] - pose.x_m;
                let dy = point[1] - pose.y_m;

                if dx.hypot(dy) < 1e-6 {
                    // Bearing to a coincident point is undefined; hold the
                    // current heading rather than chase a NaN
                    pose.heading_rad
                } else {
                    maths::wrap_to_2pi(dy.atan2(dx))
                }
            }
        };

        // Controllers are built at init, before any command is accepted
        let omega_rads = self
            .rotation_ctrl
            .as_mut()
            .unwrap()
            .calculate(pose.heading_rad, target_heading_rad);

        ChassisVelocity::from_field_relative(
            ChassisVelocity::new(vx_ms, vy_ms, omega_rads),
            pose.heading_rad,
        )
    }
}
