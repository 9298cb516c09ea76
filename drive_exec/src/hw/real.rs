//! Real-hardware module and gyro variants
//!
//! The control loops live here; raw actuator and sensor access is delegated
//! to backend traits implemented by the hardware integration crate. A failed
//! backend read degrades to the last-known-good value rather than
//! propagating into the control loop.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;

// Internal
use super::{ControlMode, Gyro, HwError, ModuleGains, SwerveModule};
use crate::kinematics::{self, ModulePosition, ModuleState};
use crate::motion::PidController;
use util::maths;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Raw actuator/sensor access for one wheel module.
///
/// Implementations own the motor controller and encoder handles; they are
/// expected to be cheap passthroughs with no control logic.
pub trait ModuleBackend {
    fn set_drive_voltage(&mut self, volts: f64) -> Result<(), HwError>;
    fn set_steer_voltage(&mut self, volts: f64) -> Result<(), HwError>;
    fn drive_velocity_ms(&mut self) -> Result<f64, HwError>;
    fn drive_distance_m(&mut self) -> Result<f64, HwError>;
    fn steer_angle_rad(&mut self) -> Result<f64, HwError>;
    fn reset_drive_distance(&mut self) -> Result<(), HwError>;
    fn shutdown(&mut self);
}

/// Raw access to a heading sensor.
pub trait GyroBackend {
    fn heading_rad(&mut self) -> Result<f64, HwError>;
    fn reset(&mut self) -> Result<(), HwError>;
    fn shutdown(&mut self);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A real wheel module: closed-loop steering, open- or closed-loop drive.
pub struct RealModule<B: ModuleBackend> {
    name: String,
    backend: B,
    gains: ModuleGains,

    steer_ctrl: PidController,
    drive_ctrl: PidController,

    desired: ModuleState,

    // Last-known-good sensor values
    last_velocity_ms: f64,
    last_distance_m: f64,
    last_angle_rad: f64,

    /// Set while backend reads are failing, to report the fault transition
    /// only once.
    read_fault: bool,
}

/// A real heading sensor over a [`GyroBackend`].
pub struct RealGyro<B: GyroBackend> {
    backend: B,
    last_heading_rad: f64,
    read_fault: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<B: ModuleBackend> RealModule<B> {
    pub fn new(name: &str, backend: B, gains: ModuleGains, period_s: f64) -> Self {
        let mut steer_ctrl = PidController::new(
            gains.steer_k_p,
            gains.steer_k_i,
            gains.steer_k_d,
            period_s,
        );
        steer_ctrl.enable_continuous_input(0.0, std::f64::consts::TAU);

        let drive_ctrl = PidController::new(
            gains.drive_k_p,
            gains.drive_k_i,
            gains.drive_k_d,
            period_s,
        );

        Self {
            name: String::from(name),
            backend,
            gains,
            steer_ctrl,
            drive_ctrl,
            desired: ModuleState::default(),
            last_velocity_ms: 0.0,
            last_distance_m: 0.0,
            last_angle_rad: 0.0,
            read_fault: false,
        }
    }

    /// Whether the most recent backend reads failed.
    pub fn read_fault(&self) -> bool {
        self.read_fault
    }

    /// Refresh the sensor caches, keeping the previous values on failure.
    fn sense(&mut self) {
        let velocity = self.backend.drive_velocity_ms();
        let distance = self.backend.drive_distance_m();
        let angle = self.backend.steer_angle_rad();

        let failed = velocity.is_err() || distance.is_err() || angle.is_err();

        if let Ok(v) = velocity {
            self.last_velocity_ms = v;
        }
        if let Ok(d) = distance {
            self.last_distance_m = d;
        }
        if let Ok(a) = angle {
            self.last_angle_rad = a;
        }

        if failed && !self.read_fault {
            warn!(
                "Module {} sensor read failed, using last-known-good values",
                self.name
            );
        }
        self.read_fault = failed;
    }

    /// Drive the steer axis closed-loop to the target angle.
    fn steer_to(&mut self, angle_rad: f64) {
        let volts = self
            .steer_ctrl
            .calculate(maths::wrap_to_2pi(self.last_angle_rad), angle_rad);
        let volts = maths::clamp(&volts, &-self.gains.max_volts, &self.gains.max_volts);

        if let Err(e) = self.backend.set_steer_voltage(volts) {
            warn!("Module {} steer demand failed: {}", self.name, e);
        }
    }

    fn drive_volts(&mut self, volts: f64) {
        let volts = maths::clamp(&volts, &-self.gains.max_volts, &self.gains.max_volts);

        if let Err(e) = self.backend.set_drive_voltage(volts) {
            warn!("Module {} drive demand failed: {}", self.name, e);
        }
    }
}

impl<B: ModuleBackend> SwerveModule for RealModule<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&mut self) -> ModuleState {
        self.sense();
        ModuleState {
            speed_ms: self.last_velocity_ms,
            angle_rad: self.last_angle_rad,
        }
    }

    fn position(&mut self) -> ModulePosition {
        self.sense();
        ModulePosition {
            distance_m: self.last_distance_m,
            angle_rad: self.last_angle_rad,
        }
    }

    fn desired_state(&self) -> ModuleState {
        self.desired
    }

    fn set_setpoint(&mut self, desired: ModuleState, mode: ControlMode) {
        self.sense();

        let desired = kinematics::optimize_angle(desired, maths::wrap_to_2pi(self.last_angle_rad));
        self.desired = desired;

        self.steer_to(desired.angle_rad);

        let volts = match mode {
            ControlMode::OpenLoopVelocity => maths::lin_map(
                (-self.gains.max_speed_ms, self.gains.max_speed_ms),
                (-self.gains.max_volts, self.gains.max_volts),
                desired.speed_ms,
            ),
            ControlMode::ClosedLoopVelocity => {
                self.gains.drive_k_s * desired.speed_ms.signum()
                    + self.gains.drive_k_v * desired.speed_ms
                    + self
                        .drive_ctrl
                        .calculate(self.last_velocity_ms, desired.speed_ms)
            }
        };

        self.drive_volts(volts);
    }

    fn apply_characterization(&mut self, angle_rad: f64, volts: f64) {
        self.sense();

        self.desired = ModuleState {
            speed_ms: 0.0,
            angle_rad: maths::wrap_to_2pi(angle_rad),
        };

        self.steer_to(self.desired.angle_rad);
        self.drive_volts(volts);
    }

    fn reset_position(&mut self) {
        if let Err(e) = self.backend.reset_drive_distance() {
            warn!("Module {} distance reset failed: {}", self.name, e);
        }
        self.last_distance_m = 0.0;
    }

    fn shutdown(&mut self) {
        // Bring the actuators to rest before releasing the hardware
        let _ = self.backend.set_drive_voltage(0.0);
        let _ = self.backend.set_steer_voltage(0.0);
        self.backend.shutdown();
    }
}

impl<B: GyroBackend> RealGyro<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            last_heading_rad: 0.0,
            read_fault: false,
        }
    }
}

impl<B: GyroBackend> Gyro for RealGyro<B> {
    fn heading_rad(&mut self) -> f64 {
        match self.backend.heading_rad() {
            Ok(heading) => {
                self.last_heading_rad = heading;
                self.read_fault = false;
            }
            Err(e) => {
                if !self.read_fault {
                    warn!("Gyro read failed, using last-known-good heading: {}", e);
                }
                self.read_fault = true;
            }
        }

        self.last_heading_rad
    }

    fn reset(&mut self) {
        if let Err(e) = self.backend.reset() {
            warn!("Gyro reset failed: {}", e);
        }
        self.last_heading_rad = 0.0;
    }

    fn shutdown(&mut self) {
        self.backend.shutdown();
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;
    use std::f64::consts::{FRAC_PI_4, PI};
    use std::rc::Rc;

    const EPSILON: f64 = 1e-9;

    /// Backend state recording demands and returning scripted sensor values.
    #[derive(Default)]
    struct MockState {
        drive_volts: f64,
        steer_volts: f64,
        velocity_ms: f64,
        distance_m: f64,
        angle_rad: f64,
        fail_reads: bool,
    }

    /// Shared handle to the mock state, so tests can script sensor values
    /// and inspect demands while the module owns the backend.
    #[derive(Clone)]
    struct MockBackend(Rc<RefCell<MockState>>);

    impl MockBackend {
        fn new() -> Self {
            Self(Rc::new(RefCell::new(MockState::default())))
        }
    }

    impl ModuleBackend for MockBackend {
        fn set_drive_voltage(&mut self, volts: f64) -> Result<(), HwError> {
            self.0.borrow_mut().drive_volts = volts;
            Ok(())
        }

        fn set_steer_voltage(&mut self, volts: f64) -> Result<(), HwError> {
            self.0.borrow_mut().steer_volts = volts;
            Ok(())
        }

        fn drive_velocity_ms(&mut self) -> Result<f64, HwError> {
            let state = self.0.borrow();
            if state.fail_reads {
                Err(HwError::SensorRead(String::from("mock failure")))
            } else {
                Ok(state.velocity_ms)
            }
        }

        fn drive_distance_m(&mut self) -> Result<f64, HwError> {
            let state = self.0.borrow();
            if state.fail_reads {
                Err(HwError::SensorRead(String::from("mock failure")))
            } else {
                Ok(state.distance_m)
            }
        }

        fn steer_angle_rad(&mut self) -> Result<f64, HwError> {
            let state = self.0.borrow();
            if state.fail_reads {
                Err(HwError::SensorRead(String::from("mock failure")))
            } else {
                Ok(state.angle_rad)
            }
        }

        fn reset_drive_distance(&mut self) -> Result<(), HwError> {
            self.0.borrow_mut().distance_m = 0.0;
            Ok(())
        }

        fn shutdown(&mut self) {}
    }

    fn test_gains() -> ModuleGains {
        ModuleGains {
            steer_k_p: 4.0,
            steer_k_i: 0.0,
            steer_k_d: 0.0,
            drive_k_p: 1.0,
            drive_k_i: 0.0,
            drive_k_d: 0.0,
            drive_k_s: 0.1,
            drive_k_v: 2.5,
            max_volts: 12.0,
            max_speed_ms: 4.0,
        }
    }

    #[test]
    fn test_open_loop_voltage_scale() {
        let backend = MockBackend::new();
        let mut module = RealModule::new("FL", backend.clone(), test_gains(), 0.02);

        module.set_setpoint(
            ModuleState {
                speed_ms: 2.0,
                angle_rad: 0.0,
            },
            ControlMode::OpenLoopVelocity,
        );

        // Half of max speed maps to half of max volts
        assert!((backend.0.borrow().drive_volts - 6.0).abs() < EPSILON);
    }

    #[test]
    fn test_setpoint_applies_angle_flip() {
        let backend = MockBackend::new();
        let mut module = RealModule::new("FL", backend, test_gains(), 0.02);

        module.set_setpoint(
            ModuleState {
                speed_ms: 1.0,
                angle_rad: 3.0 * FRAC_PI_4,
            },
            ControlMode::OpenLoopVelocity,
        );

        let desired = module.desired_state();
        assert!((desired.speed_ms + 1.0).abs() < EPSILON);
        assert!((desired.angle_rad - 7.0 * FRAC_PI_4).abs() < EPSILON);
    }

    #[test]
    fn test_closed_loop_uses_feedforward_and_feedback() {
        let backend = MockBackend::new();
        backend.0.borrow_mut().velocity_ms = 1.0;
        let mut module = RealModule::new("FL", backend.clone(), test_gains(), 0.02);

        module.set_setpoint(
            ModuleState {
                speed_ms: 2.0,
                angle_rad: 0.0,
            },
            ControlMode::ClosedLoopVelocity,
        );

        // k_s + k_v * 2.0 + k_p * (2.0 - 1.0)
        let expected = 0.1 + 2.5 * 2.0 + 1.0 * 1.0;
        assert!((backend.0.borrow().drive_volts - expected).abs() < EPSILON);
    }

    #[test]
    fn test_failed_reads_hold_last_known_good() {
        let backend = MockBackend::new();
        backend.0.borrow_mut().velocity_ms = 1.5;
        backend.0.borrow_mut().angle_rad = PI;

        let mut module = RealModule::new("FL", backend.clone(), test_gains(), 0.02);

        let good = module.state();
        assert!((good.speed_ms - 1.5).abs() < EPSILON);

        {
            let mut state = backend.0.borrow_mut();
            state.fail_reads = true;
            state.velocity_ms = 99.0;
        }

        let degraded = module.state();
        assert!((degraded.speed_ms - 1.5).abs() < EPSILON);
        assert!((degraded.angle_rad - PI).abs() < EPSILON);
        assert!(module.read_fault());
    }

    #[test]
    fn test_characterization_applies_raw_volts() {
        let backend = MockBackend::new();
        let mut module = RealModule::new("FL", backend.clone(), test_gains(), 0.02);

        module.apply_characterization(std::f64::consts::FRAC_PI_2, 3.5);

        assert!((backend.0.borrow().drive_volts - 3.5).abs() < EPSILON);

        // The steer loop keeps running towards the characterization angle
        assert!(backend.0.borrow().steer_volts > 0.0);
    }
}
