//! Implementations for the DriveCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use nalgebra::Vector2;
use serde::Serialize;
use std::f64::consts::{FRAC_PI_4, TAU};
use std::sync::Arc;

// Internal
use super::{DriveCmd, DriveCtrlError, Params, SelfTestReport, MODULE_NAMES};
use crate::hw::{ControlMode, Gyro, SwerveModule};
use crate::kinematics::{
    self, ChassisVelocity, ModulePosition, ModuleState, SwerveKinematics, NUM_MODULES,
};
use crate::pose_est::{Pose, PoseEstimator, VisionMeasurement};
use crate::motion::{PidController, ProfiledPidController};
use util::{
    maths,
    module::State,
    params,
    raise_error,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drive control module state
pub struct DriveCtrl {
    pub(crate) params: Params,

    pub(crate) report: StatusReport,

    /// The heading sensor.
    gyro: Box<dyn Gyro>,

    /// The four wheel modules, in wiring order FL, FR, RL, RR.
    pub(crate) modules: [Box<dyn SwerveModule>; NUM_MODULES],

    /// Kinematics solver, built at init from the module offsets.
    pub(crate) kinematics: Option<SwerveKinematics>,

    /// The pose estimator. Shared so vision collaborators on other threads
    /// can inject measurements directly.
    pose_est: Option<Arc<PoseEstimator>>,

    /// Profiled distance controller for drive-to-pose.
    pub(crate) translation_ctrl: Option<ProfiledPidController>,

    /// Continuous-wrap heading controller for heading-locked drives.
    pub(crate) rotation_ctrl: Option<PidController>,

    /// The active motion primitive.
    pub(crate) current_cmd: DriveCmd,

    /// Session time at which the active primitive started.
    pub(crate) cmd_start_s: f64,

    /// Added to the raw gyro reading to produce the field heading, so the
    /// pose heading survives odometry resets without touching the sensor.
    heading_offset_rad: f64,

    /// Module states measured at the top of the current cycle.
    pub(crate) measured_states: [ModuleState; NUM_MODULES],

    /// Module positions measured at the top of the current cycle.
    pub(crate) measured_positions: [ModulePosition; NUM_MODULES],

    /// The most recent self test result.
    pub(crate) self_test_report: Option<SelfTestReport>,

    /// Set once shutdown has run, so hardware is released exactly once.
    shutdown_done: bool,
}

/// Input data to drive control.
#[derive(Default)]
pub struct InputData {
    /// The cycle timestamp on the session clock.
    ///
    /// Units: seconds
    pub time_s: f64,

    /// The drive command to begin executing, or `None` to continue with the
    /// current command.
    pub cmd: Option<DriveCmd>,

    /// Vision measurements delivered since the previous cycle.
    pub vision: Vec<VisionMeasurement>,
}

/// Output demands from DriveCtrl for this cycle.
#[derive(Clone, Copy, Serialize, Debug)]
pub struct OutputData {
    /// The module demands actually issued, after desaturation.
    pub module_demands: [ModuleState; NUM_MODULES],

    /// The control mode the demands were issued under.
    pub mode: ControlMode,
}

impl Default for OutputData {
    fn default() -> Self {
        OutputData {
            module_demands: [ModuleState::default(); NUM_MODULES],
            mode: ControlMode::OpenLoopVelocity,
        }
    }
}

/// Status report for DriveCtrl processing.
#[derive(Clone, Copy, Default, Serialize, Debug)]
pub struct StatusReport {
    /// Module demands were scaled down to the speed limit this cycle.
    pub desaturated: bool,

    /// A received command was rejected as invalid this cycle.
    pub cmd_rejected: bool,

    /// Drive-to-pose reached its target this cycle.
    pub drive_to_complete: bool,

    /// A characterization routine finished this cycle.
    pub characterization_complete: bool,

    /// The self test finished this cycle.
    pub self_test_complete: bool,

    /// Total vision measurements dropped as too old to apply.
    pub stale_vision_drops: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for DriveCtrl {
    type InitData = &'static str;
    type InitError = params::LoadError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = DriveCtrlError;

    /// Initialise the DriveCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, _session: &Session)
        -> Result<(), Self::InitError>
    {
        let loaded = params::load(init_data)?;
        self.init_from_params(loaded);

        Ok(())
    }

    /// Perform cyclic processing of drive control.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        if self.kinematics.is_none() {
            return Err(DriveCtrlError::NotInitialised);
        }

        // Clear the status report
        self.report = StatusReport::default();

        // ---- SENSING ----

        for i in 0..NUM_MODULES {
            self.measured_states[i] = self.modules[i].state();
            self.measured_positions[i] = self.modules[i].position();
        }

        // Feed the measured chassis rate back to the heading sensor; only
        // the simulated variant acts on this.
        let measured_vel = self.robot_relative_velocity();
        self.gyro
            .observe(measured_vel.omega_rads, self.params.period_s);

        let heading = maths::wrap_to_2pi(self.gyro.heading_rad() + self.heading_offset_rad);

        // ---- POSE ESTIMATION ----

        // Estimator is always present alongside kinematics
        let estimator = self.pose_est.as_ref().unwrap();

        estimator.integrate(&self.measured_positions, heading, input_data.time_s);

        for measurement in &input_data.vision {
            estimator.add_vision_measurement(measurement);
        }

        self.report.stale_vision_drops = estimator.stale_drop_count();

        // ---- COMMAND HANDLING ----

        if let Some(cmd) = input_data.cmd {
            self.accept_cmd(cmd, input_data.time_s);
        }

        // ---- PRIMITIVE EVALUATION & ACTUATION ----

        let (module_demands, mode) = match self.current_cmd {
            DriveCmd::Stop => {
                self.issue_chassis(ChassisVelocity::default(), ControlMode::OpenLoopVelocity)
            }

            DriveCmd::Lock => {
                let states = lock_states();
                let issued = self.set_module_states(&states, ControlMode::OpenLoopVelocity);
                (issued, ControlMode::OpenLoopVelocity)
            }

            DriveCmd::Velocity {
                vx_ms,
                vy_ms,
                omega_rads,
                frame,
            } => {
                let velocity = self.calc_velocity(vx_ms, vy_ms, omega_rads, frame);
                self.issue_chassis(velocity, ControlMode::OpenLoopVelocity)
            }

            DriveCmd::HeadingLock {
                vx_ms,
                vy_ms,
                target,
            } => {
                let velocity = self.calc_heading_lock(vx_ms, vy_ms, target);
                self.issue_chassis(velocity, ControlMode::OpenLoopVelocity)
            }

            DriveCmd::DriveTo { target } => {
                let velocity = self.calc_drive_to(target);
                self.issue_chassis(velocity, ControlMode::ClosedLoopVelocity)
            }

            DriveCmd::Characterize { routine, direction } => {
                self.proc_characterize(routine, direction, input_data.time_s)
            }

            DriveCmd::SelfTest => self.proc_self_test(input_data.time_s),
        };

        Ok((
            OutputData {
                module_demands,
                mode,
            },
            self.report,
        ))
    }
}

impl DriveCtrl {
    /// Create a new drive over the given heading sensor and wheel modules.
    ///
    /// The drive is not usable until initialised with parameters.
    pub fn new(gyro: Box<dyn Gyro>, modules: [Box<dyn SwerveModule>; NUM_MODULES]) -> Self {
        Self {
            params: Params::default(),
            report: StatusReport::default(),
            gyro,
            modules,
            kinematics: None,
            pose_est: None,
            translation_ctrl: None,
            rotation_ctrl: None,
            current_cmd: DriveCmd::Stop,
            cmd_start_s: 0.0,
            heading_offset_rad: 0.0,
            measured_states: [ModuleState::default(); NUM_MODULES],
            measured_positions: [ModulePosition::default(); NUM_MODULES],
            self_test_report: None,
            shutdown_done: false,
        }
    }

    /// Create a drive over simulated hardware.
    pub fn simulated(period_s: f64) -> Self {
        use crate::hw::sim::{SimGyro, SimModule};

        Self::new(
            Box::new(SimGyro::new()),
            MODULE_NAMES.map(|name| Box::new(SimModule::new(name, period_s)) as Box<dyn SwerveModule>),
        )
    }

    /// Create a nonexistent drive which accepts and discards all commands.
    pub fn none() -> Self {
        use crate::hw::none::{NoGyro, NoModule};

        Self::new(
            Box::new(NoGyro),
            [
                Box::new(NoModule) as Box<dyn SwerveModule>,
                Box::new(NoModule),
                Box::new(NoModule),
                Box::new(NoModule),
            ],
        )
    }

    /// Initialise from an already-loaded parameter set.
    ///
    /// Embedders with their own configuration source can use this directly
    /// in place of [`State::init`].
    pub fn init_from_params(&mut self, loaded: Params) {
        self.params = loaded;

        let offsets = offsets_from_params(&self.params);

        let initial_pose = Pose::new(
            self.params.initial_pose[0],
            self.params.initial_pose[1],
            self.params.initial_pose[2],
        );

        self.kinematics = Some(SwerveKinematics::new(offsets));
        self.pose_est = Some(Arc::new(PoseEstimator::new(
            offsets,
            initial_pose,
            self.params.pose_retention_window_s,
        )));

        let mut translation_ctrl = ProfiledPidController::new(
            self.params.translation_k_p,
            self.params.translation_k_i,
            self.params.translation_k_d,
            self.params.max_speed_ms,
            self.params.max_accel_mss,
            self.params.period_s,
        );
        translation_ctrl.set_tolerance(self.params.translation_tolerance_m);
        self.translation_ctrl = Some(translation_ctrl);

        let mut rotation_ctrl = PidController::new(
            self.params.rotation_k_p,
            self.params.rotation_k_i,
            self.params.rotation_k_d,
            self.params.period_s,
        );
        rotation_ctrl.enable_continuous_input(0.0, TAU);
        rotation_ctrl.set_tolerance(self.params.rotation_tolerance_rad);
        self.rotation_ctrl = Some(rotation_ctrl);

        self.gyro.reset();
        self.heading_offset_rad = initial_pose.heading_rad;
    }

    // ---- POSE & TELEMETRY ACCESSORS ----

    /// The currently-estimated field pose.
    pub fn pose(&self) -> Pose {
        self.pose_est
            .as_ref()
            .map(|est| est.current_pose())
            .unwrap_or_default()
    }

    /// The currently-estimated field-relative heading.
    ///
    /// Units: radians
    pub fn heading(&self) -> f64 {
        self.pose().heading_rad
    }

    /// A handle to the pose estimator for vision collaborators running on
    /// other threads.
    pub fn pose_estimator(&self) -> Option<Arc<PoseEstimator>> {
        self.pose_est.clone()
    }

    /// The module states measured at the top of the current cycle.
    pub fn module_states(&self) -> [ModuleState; NUM_MODULES] {
        self.measured_states
    }

    /// The module positions measured at the top of the current cycle.
    pub fn module_positions(&self) -> [ModulePosition; NUM_MODULES] {
        self.measured_positions
    }

    /// The most recently commanded module states, after angle optimisation.
    pub fn module_setpoints(&self) -> [ModuleState; NUM_MODULES] {
        let mut setpoints = [ModuleState::default(); NUM_MODULES];
        for (setpoint, module) in setpoints.iter_mut().zip(self.modules.iter()) {
            *setpoint = module.desired_state();
        }
        setpoints
    }

    /// The measured robot-relative chassis velocity, from the forward
    /// kinematics solve of the measured module states.
    pub fn robot_relative_velocity(&self) -> ChassisVelocity {
        match &self.kinematics {
            Some(kin) => kin.forward(&self.measured_states),
            None => ChassisVelocity::default(),
        }
    }

    /// The measured field-relative chassis velocity.
    pub fn field_relative_velocity(&self) -> ChassisVelocity {
        self.robot_relative_velocity()
            .to_field_relative(self.heading())
    }

    /// Whether the rotation controller is within its heading tolerance.
    pub fn at_rotation_setpoint(&self) -> bool {
        self.rotation_ctrl
            .as_ref()
            .map(|ctrl| ctrl.at_setpoint())
            .unwrap_or(false)
    }

    /// Whether drive-to-pose has reached its target.
    pub fn drive_to_complete(&self) -> bool {
        self.translation_ctrl
            .as_ref()
            .map(|ctrl| ctrl.at_goal())
            .unwrap_or(false)
    }

    /// Whether the robot is facing a field point within the rotation
    /// tolerance.
    pub fn is_facing(&self, target_m: [f64; 2]) -> bool {
        let pose = self.pose();
        let dx = target_m[0] - pose.x_m;
        let dy = target_m[1] - pose.y_m;

        if dx.hypot(dy) < 1e-6 {
            // Bearing undefined on top of the target; count that as facing
            return true;
        }

        let bearing = maths::wrap_to_2pi(dy.atan2(dx));
        let tolerance = self
            .rotation_ctrl
            .as_ref()
            .map(|ctrl| ctrl.tolerance())
            .unwrap_or(0.0);

        maths::ang_dist_2pi(pose.heading_rad, bearing).abs() < tolerance
    }

    /// The active drive command.
    pub fn current_cmd(&self) -> DriveCmd {
        self.current_cmd
    }

    /// The most recent self test result, if one has run.
    pub fn self_test_report(&self) -> Option<&SelfTestReport> {
        self.self_test_report.as_ref()
    }

    /// The control loop period from the loaded parameters.
    ///
    /// Units: seconds
    pub fn loop_period_s(&self) -> f64 {
        self.params.period_s
    }

    // ---- RESETS & SHUTDOWN ----

    /// Reset the pose estimate to the given pose, discarding history.
    pub fn reset_odometry(&mut self, pose: Pose) {
        if let Some(est) = &self.pose_est {
            est.reset_pose(pose);
        }

        // Re-anchor the heading offset so subsequent gyro readings map onto
        // the new pose heading
        let raw = self.gyro.heading_rad();
        self.heading_offset_rad = maths::wrap_to_2pi(pose.heading_rad - raw);
    }

    /// Zero the heading: the current direction becomes field heading zero.
    pub fn zero_heading(&mut self) {
        self.gyro.reset();
        self.heading_offset_rad = 0.0;

        let pose = self.pose();
        if let Some(est) = &self.pose_est {
            est.reset_pose(Pose::new(pose.x_m, pose.y_m, 0.0));
        }
    }

    /// Reset all drive encoders to read a distance of zero.
    pub fn reset_encoders(&mut self) {
        for module in self.modules.iter_mut() {
            module.reset_position();
        }
    }

    /// Release all hardware handles. Safe to call once; repeats are ignored.
    pub fn shutdown(&mut self) {
        if self.shutdown_done {
            warn!("Drive shutdown requested more than once, ignored");
            return;
        }

        for module in self.modules.iter_mut() {
            module.shutdown();
        }
        self.gyro.shutdown();

        self.shutdown_done = true;
    }

    // ---- COMMANDING ----

    /// Set the states of each of the wheel modules, desaturating first.
    ///
    /// The number of demanded states must equal the number of modules; a
    /// mismatch is a programming error and fails fast.
    ///
    /// Returns the demands actually issued.
    pub fn set_module_states(
        &mut self,
        desired: &[ModuleState],
        mode: ControlMode,
    ) -> [ModuleState; NUM_MODULES] {
        if desired.len() != NUM_MODULES {
            raise_error!(
                "Demanded {} module states but the drive has {} modules",
                desired.len(),
                NUM_MODULES
            );
        }

        let mut states = [ModuleState::default(); NUM_MODULES];
        states.copy_from_slice(desired);

        self.report.desaturated = kinematics::desaturate(&mut states, self.params.max_speed_ms);

        for (module, state) in self.modules.iter_mut().zip(states.iter()) {
            module.set_setpoint(*state, mode);
        }

        states
    }

    /// Convert a robot-relative chassis velocity into module demands and
    /// issue them.
    pub(crate) fn issue_chassis(
        &mut self,
        velocity: ChassisVelocity,
        mode: ControlMode,
    ) -> ([ModuleState; NUM_MODULES], ControlMode) {
        let discretized = velocity.discretize(self.params.period_s);

        // Kinematics presence is checked at the top of proc
        let states = self.kinematics.as_mut().unwrap().inverse(discretized);

        (self.set_module_states(&states, mode), mode)
    }

    /// Begin executing a new command, resetting the controllers it engages.
    fn accept_cmd(&mut self, cmd: DriveCmd, time_s: f64) {
        if !cmd.is_valid() {
            warn!("Rejected invalid drive command: {:?}", cmd);
            self.report.cmd_rejected = true;
            return;
        }

        // Newly-engaged controllers restart from the current measurement so
        // no stale integrator or profile state carries over
        match cmd {
            DriveCmd::HeadingLock { .. } => {
                if let Some(ctrl) = self.rotation_ctrl.as_mut() {
                    ctrl.reset();
                }
            }
            DriveCmd::DriveTo { target } => {
                let distance = self.drive_to_distance(target);
                if let Some(ctrl) = self.translation_ctrl.as_mut() {
                    ctrl.reset(distance);
                }
            }
            _ => (),
        }

        info!("Drive command: {}", cmd.name());

        self.current_cmd = cmd;
        self.cmd_start_s = time_s;
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Module offsets as vectors, from the parameter arrays.
fn offsets_from_params(params: &Params) -> [Vector2<f64>; NUM_MODULES] {
    params.module_offsets_m.map(|o| Vector2::new(o[0], o[1]))
}

/// The X brake arrangement: every wheel's rolling direction points at the
/// chassis centre, so pushes from any direction fight a locked wheel.
fn lock_states() -> [ModuleState; NUM_MODULES] {
    let front = ModuleState {
        speed_ms: 0.0,
        angle_rad: FRAC_PI_4,
    };
    let back = ModuleState {
        speed_ms: 0.0,
        angle_rad: maths::wrap_to_2pi(-FRAC_PI_4),
    };

    [front, back, back, front]
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::drive_ctrl::{CharDirection, CharRoutine, Frame, HeadingTarget};
    use std::f64::consts::{FRAC_PI_2, PI};

    const PERIOD_S: f64 = 0.02;

    fn test_params() -> Params {
        Params {
            module_offsets_m: [[0.3, 0.3], [0.3, -0.3], [-0.3, 0.3], [-0.3, -0.3]],
            effective_radius_m: 0.42,
            max_speed_ms: 4.0,
            max_accel_mss: 8.0,
            period_s: PERIOD_S,
            translation_k_p: 3.0,
            translation_k_i: 0.0,
            translation_k_d: 0.0,
            translation_tolerance_m: 0.05,
            rotation_k_p: 4.0,
            rotation_k_i: 0.0,
            rotation_k_d: 0.0,
            rotation_tolerance_rad: 0.05,
            pose_retention_window_s: 2.0,
            initial_pose: [0.0, 0.0, 0.0],
            self_test_speed_ms: 1.5,
            self_test_duration_s: 0.75,
            self_test_min_speed_ms: 1.0,
            self_test_angle_tol_rad: 0.05,
            char_quasistatic_ramp_vps: 1.0,
            char_dynamic_step_v: 6.0,
            char_duration_s: 2.0,
        }
    }

    fn sim_drive() -> DriveCtrl {
        let mut drive = DriveCtrl::simulated(PERIOD_S);
        drive.init_from_params(test_params());
        drive
    }

    fn tick(drive: &mut DriveCtrl, cycle: u64, cmd: Option<DriveCmd>) -> (OutputData, StatusReport) {
        drive
            .proc(&InputData {
                time_s: cycle as f64 * PERIOD_S,
                cmd,
                vision: Vec::new(),
            })
            .unwrap()
    }

    #[test]
    fn test_proc_before_init_fails() {
        let mut drive = DriveCtrl::simulated(PERIOD_S);

        assert!(drive.proc(&InputData::default()).is_err());
    }

    #[test]
    #[should_panic]
    fn test_module_state_count_mismatch_panics() {
        let mut drive = sim_drive();

        drive.set_module_states(
            &[ModuleState::default(); 3],
            ControlMode::OpenLoopVelocity,
        );
    }

    #[test]
    fn test_velocity_drive_moves_forward() {
        let mut drive = sim_drive();

        let cmd = DriveCmd::Velocity {
            vx_ms: 1.0,
            vy_ms: 0.0,
            omega_rads: 0.0,
            frame: Frame::Robot,
        };

        tick(&mut drive, 1, Some(cmd));
        for cycle in 2..101 {
            tick(&mut drive, cycle, None);
        }

        let pose = drive.pose();
        assert!(pose.x_m > 1.0);
        assert!(pose.y_m.abs() < 0.05);
    }

    #[test]
    fn test_invalid_command_rejected_and_previous_kept() {
        let mut drive = sim_drive();

        let good = DriveCmd::Velocity {
            vx_ms: 1.0,
            vy_ms: 0.0,
            omega_rads: 0.0,
            frame: Frame::Robot,
        };
        tick(&mut drive, 1, Some(good));

        let bad = DriveCmd::Velocity {
            vx_ms: f64::NAN,
            vy_ms: 0.0,
            omega_rads: 0.0,
            frame: Frame::Robot,
        };
        let (_, report) = tick(&mut drive, 2, Some(bad));

        assert!(report.cmd_rejected);
        assert_eq!(drive.current_cmd(), good);
    }

    #[test]
    fn test_stop_holds_steer_angles() {
        let mut drive = sim_drive();

        // Crab left so the modules steer to 90 degrees
        let cmd = DriveCmd::Velocity {
            vx_ms: 0.0,
            vy_ms: 1.0,
            omega_rads: 0.0,
            frame: Frame::Robot,
        };
        tick(&mut drive, 1, Some(cmd));
        for cycle in 2..20 {
            tick(&mut drive, cycle, None);
        }

        let (output, _) = tick(&mut drive, 20, Some(DriveCmd::Stop));

        for demand in &output.module_demands {
            assert!(demand.speed_ms.abs() < 1e-9);
            assert!((demand.angle_rad - FRAC_PI_2).abs() < 1e-6);
        }
    }

    #[test]
    fn test_lock_forms_x_arrangement() {
        let mut drive = sim_drive();

        let (output, _) = tick(&mut drive, 1, Some(DriveCmd::Lock));

        let angles: Vec<f64> = output
            .module_demands
            .iter()
            .map(|d| d.angle_rad)
            .collect();

        assert!((angles[0] - FRAC_PI_4).abs() < 1e-9);
        assert!((angles[1] - 7.0 * FRAC_PI_4).abs() < 1e-9);
        assert!((angles[2] - 7.0 * FRAC_PI_4).abs() < 1e-9);
        assert!((angles[3] - FRAC_PI_4).abs() < 1e-9);
        assert!(output.module_demands.iter().all(|d| d.speed_ms == 0.0));
    }

    #[test]
    fn test_demands_desaturated_to_max_speed() {
        let mut drive = sim_drive();

        // Well beyond the 4 m/s limit
        let cmd = DriveCmd::Velocity {
            vx_ms: 40.0,
            vy_ms: 0.0,
            omega_rads: 0.0,
            frame: Frame::Robot,
        };

        let (output, report) = tick(&mut drive, 1, Some(cmd));

        assert!(report.desaturated);
        for demand in &output.module_demands {
            assert!(demand.speed_ms.abs() <= 4.0 + 1e-9);
        }
    }

    #[test]
    fn test_heading_lock_converges_to_target() {
        let mut drive = sim_drive();

        let cmd = DriveCmd::HeadingLock {
            vx_ms: 0.0,
            vy_ms: 0.0,
            target: HeadingTarget::Heading(FRAC_PI_2),
        };

        tick(&mut drive, 1, Some(cmd));
        for cycle in 2..301 {
            tick(&mut drive, cycle, None);
        }

        let error = maths::ang_dist_2pi(drive.heading(), FRAC_PI_2);
        assert!(error.abs() < 0.1);
        assert!(drive.at_rotation_setpoint());
    }

    #[test]
    fn test_drive_to_terminates_when_started_within_tolerance() {
        let mut drive = sim_drive();

        let cmd = DriveCmd::DriveTo {
            target: Pose::new(0.01, 0.0, 0.0),
        };

        tick(&mut drive, 1, Some(cmd));

        let mut completed = false;
        for cycle in 2..52 {
            let (_, report) = tick(&mut drive, cycle, None);
            if report.drive_to_complete {
                completed = true;
                break;
            }
        }

        assert!(completed);
    }

    #[test]
    fn test_drive_to_not_complete_while_error_large() {
        let mut drive = sim_drive();

        let target = Pose::new(2.0, 0.0, 0.0);
        tick(&mut drive, 1, Some(DriveCmd::DriveTo { target }));

        for cycle in 2..20 {
            let (_, report) = tick(&mut drive, cycle, None);

            if drive.drive_to_distance(target) > drive.params.translation_tolerance_m {
                assert!(!report.drive_to_complete);
            }
        }
    }

    #[test]
    fn test_drive_to_reaches_target() {
        let mut drive = sim_drive();

        let target = Pose::new(1.0, 0.5, FRAC_PI_2);
        tick(&mut drive, 1, Some(DriveCmd::DriveTo { target }));

        let mut completed = false;
        for cycle in 2..1001 {
            let (_, report) = tick(&mut drive, cycle, None);
            if report.drive_to_complete {
                completed = true;
                break;
            }
        }

        assert!(completed);

        let pose = drive.pose();
        assert!((pose.x_m - 1.0).abs() < 0.1);
        assert!((pose.y_m - 0.5).abs() < 0.1);
        assert!(maths::ang_dist_2pi(pose.heading_rad, FRAC_PI_2).abs() < 0.2);
    }

    #[test]
    fn test_self_test_passes_on_simulated_drive() {
        let mut drive = sim_drive();

        tick(&mut drive, 1, Some(DriveCmd::SelfTest));

        let mut completed = false;
        for cycle in 2..101 {
            let (_, report) = tick(&mut drive, cycle, None);
            if report.self_test_complete {
                completed = true;
                break;
            }
        }

        assert!(completed);

        let report = drive.self_test_report().unwrap();
        assert!(report.passed, "failing checks: {:?}", report.checks);
        assert_eq!(report.checks.len(), NUM_MODULES * 2);
    }

    #[test]
    fn test_self_test_fails_on_nonexistent_drive() {
        let mut drive = DriveCtrl::none();
        drive.init_from_params(test_params());

        tick(&mut drive, 1, Some(DriveCmd::SelfTest));
        for cycle in 2..101 {
            let (_, report) = tick(&mut drive, cycle, None);
            if report.self_test_complete {
                break;
            }
        }

        assert!(!drive.self_test_report().unwrap().passed);
    }

    #[test]
    fn test_characterization_runs_to_completion() {
        let mut drive = sim_drive();

        let cmd = DriveCmd::Characterize {
            routine: CharRoutine::TranslationQuasistatic,
            direction: CharDirection::Forward,
        };

        tick(&mut drive, 1, Some(cmd));

        let mut completed = false;
        for cycle in 2..151 {
            let (_, report) = tick(&mut drive, cycle, None);
            if report.characterization_complete {
                completed = true;
                break;
            }
        }

        assert!(completed);
        assert_eq!(drive.current_cmd(), DriveCmd::Stop);

        // The ramp actually moved the drivetrain
        assert!(drive.module_states().iter().any(|s| s.speed_ms.abs() > 0.0));
    }

    #[test]
    fn test_reset_odometry_re_anchors_heading() {
        let mut drive = sim_drive();

        tick(&mut drive, 1, None);

        drive.reset_odometry(Pose::new(2.0, 3.0, PI));

        let pose = drive.pose();
        assert!((pose.x_m - 2.0).abs() < 1e-9);
        assert!((pose.y_m - 3.0).abs() < 1e-9);
        assert!((pose.heading_rad - PI).abs() < 1e-9);

        // The next cycle's gyro reading maps onto the new heading
        tick(&mut drive, 2, Some(DriveCmd::Stop));
        assert!(maths::ang_dist_2pi(drive.heading(), PI).abs() < 1e-6);

        drive.zero_heading();
        assert!(drive.heading().abs() < 1e-9);
    }

    #[test]
    fn test_vision_measurement_corrects_pose() {
        let mut drive = sim_drive();

        tick(&mut drive, 1, None);
        tick(&mut drive, 2, None);

        let (_, report) = {
            let measurement = VisionMeasurement {
                pose: Pose::new(1.0, 2.0, 0.0),
                timestamp_s: 2.0 * PERIOD_S,
                std_devs: [1e-9, 1e-9, 1e-9],
            };

            drive
                .proc(&InputData {
                    time_s: 3.0 * PERIOD_S,
                    cmd: None,
                    vision: vec![measurement],
                })
                .unwrap()
        };

        assert_eq!(report.stale_vision_drops, 0);

        let pose = drive.pose();
        assert!((pose.x_m - 1.0).abs() < 1e-3);
        assert!((pose.y_m - 2.0).abs() < 1e-3);
    }
}
