//! Drive-to-pose calculations
//!
//! Straight-line closed-loop drive to a field pose. The planar offset and
//! the rotational offset (scaled by the effective wheelbase radius) combine
//! into a single 3D error vector; the profiled translation controller drives
//! the error's magnitude to zero and its output is applied along the error's
//! unit direction.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector3;

// Internal imports
use super::DriveCtrl;
use crate::kinematics::ChassisVelocity;
use crate::pose_est::Pose;
use util::maths;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveCtrl {
    /// The field-frame error of the current pose relative to the target:
    /// [x offset, y offset, heading offset * effective radius].
    fn drive_to_error(&self, target: Pose) -> Vector3<f64> {
        let pose = self.pose();

        Vector3::new(
            pose.x_m - target.x_m,
            pose.y_m - target.y_m,
            maths::ang_dist_2pi(target.heading_rad, pose.heading_rad)
                * self.params.effective_radius_m,
        )
    }

    /// The scalar distance metric driven to zero by drive-to-pose.
    pub(crate) fn drive_to_distance(&self, target: Pose) -> f64 {
        self.drive_to_error(target).norm()
    }

    /// One cycle of the drive-to-pose loop.
    pub(crate) fn calc_drive_to(&mut self, target: Pose) -> ChassisVelocity {
        let error = self.drive_to_error(target);
        let distance = error.norm();

        // Controllers are built at init, before any command is accepted
        let output = self
            .translation_ctrl
            .as_mut()
            .unwrap()
            .calculate(distance, 0.0);

        self.report.drive_to_complete = self.translation_ctrl.as_ref().unwrap().at_goal();

        if distance < 1e-9 {
            // On top of the target the error direction is undefined
            return ChassisVelocity::default();
        }

        // The controller output is negative while the error shrinks, so
        // scaling the unit error direction by it points at the target
        let velocity = error / distance * output;

        let field = ChassisVelocity::new(
            velocity[0],
            velocity[1],
            velocity[2] / self.params.effective_radius_m,
        );

        ChassisVelocity::from_field_relative(field, self.pose().heading_rad)
    }
}
