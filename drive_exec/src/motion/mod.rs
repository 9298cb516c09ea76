//! # Motion controllers
//!
//! The feedback building blocks for the drive's closed-loop primitives: a
//! fixed-period PID controller (with optional continuous, wrap-around input
//! for angles), a trapezoidal motion profile, and the profiled PID
//! controller combining the two.
//!
//! All controllers advance by exactly one control period per `calculate`
//! call; the period is supplied at construction from the loop parameters.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use util::maths;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A fixed-period PID controller.
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Dervative gain
    k_d: f64,

    /// Seconds between calls to `calculate`.
    period_s: f64,

    /// When set, measurement and setpoint wrap within this (min, max) range
    /// and the error is taken as the shortest signed distance across the
    /// wrap.
    continuous_range: Option<(f64, f64)>,

    /// Absolute error below which `at_setpoint` reports true.
    tolerance: f64,

    /// Most recent setpoint.
    setpoint: f64,

    /// Most recent error.
    error: f64,

    /// Previous error, for the derivative term.
    prev_error: Option<f64>,

    /// The integral accumulation
    integral: f64,

    /// Whether a measurement has been seen since the last reset.
    have_measurement: bool,
}

/// A profile sample: position and velocity at an instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ProfileState {
    pub position: f64,
    pub velocity: f64,
}

/// A trapezoidal motion profile limited by maximum velocity and
/// acceleration.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct TrapezoidProfile {
    max_velocity: f64,
    max_acceleration: f64,
}

/// A PID controller whose setpoint follows a trapezoidal profile towards the
/// goal rather than jumping to it.
#[derive(Debug, Serialize, Clone)]
pub struct ProfiledPidController {
    pid: PidController,
    profile: TrapezoidProfile,
    period_s: f64,
    setpoint: ProfileState,
    goal: ProfileState,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {
    /// Create a new controller with the given gains and control period.
    pub fn new(k_p: f64, k_i: f64, k_d: f64, period_s: f64) -> Self {
        Self {
            k_p,
            k_i,
            k_d,
            period_s,
            continuous_range: None,
            tolerance: 0.0,
            setpoint: 0.0,
            error: 0.0,
            prev_error: None,
            integral: 0.0,
            have_measurement: false,
        }
    }

    /// Treat the input as continuous over the given range, taking errors as
    /// the shortest signed distance across the wrap boundary.
    pub fn enable_continuous_input(&mut self, min: f64, max: f64) {
        self.continuous_range = Some((min, max));
    }

    /// Set the absolute error tolerance used by `at_setpoint`.
    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.tolerance = tolerance;
    }

    /// Get the value of the controller for the given measurement and
    /// setpoint, advancing one period.
    pub fn calculate(&mut self, measurement: f64, setpoint: f64) -> f64 {
        self.setpoint = setpoint;

        let mut error = setpoint - measurement;

        if let Some((min, max)) = self.continuous_range {
            let span = max - min;
            error = maths::rem_euclid(error + span / 2.0, span) - span / 2.0;
        }

        self.integral += error * self.period_s;

        let derivative = match self.prev_error {
            Some(prev) => (error - prev) / self.period_s,
            None => 0.0,
        };

        self.prev_error = Some(error);
        self.error = error;
        self.have_measurement = true;

        self.k_p * error + self.k_i * self.integral + self.k_d * derivative
    }

    /// Whether the most recent error is within the tolerance.
    ///
    /// Always false until `calculate` has been called after a reset.
    pub fn at_setpoint(&self) -> bool {
        self.have_measurement && self.error.abs() < self.tolerance
    }

    /// Clear accumulated state: integral, derivative memory and the
    /// at-setpoint latch.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
        self.error = 0.0;
        self.have_measurement = false;
    }

    /// Most recent setpoint.
    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    /// Most recent error.
    pub fn error(&self) -> f64 {
        self.error
    }

    /// The at-setpoint tolerance.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }
}

impl TrapezoidProfile {
    pub fn new(max_velocity: f64, max_acceleration: f64) -> Self {
        Self {
            max_velocity,
            max_acceleration,
        }
    }

    /// Advance `current` by `dt` seconds along the profile towards `goal`.
    ///
    /// The returned state never exceeds the velocity constraint and moves
    /// between samples within the acceleration constraint. When the goal is
    /// closer than a full trapezoid allows, the profile truncates into a
    /// triangle.
    pub fn calculate(&self, dt: f64, current: ProfileState, goal: ProfileState) -> ProfileState {
        // Mirror everything if the goal lies behind the current position so
        // the maths below can assume forward travel.
        let direction = if current.position > goal.position {
            -1.0
        } else {
            1.0
        };

        let mut current = ProfileState {
            position: current.position * direction,
            velocity: current.velocity * direction,
        };
        let goal = ProfileState {
            position: goal.position * direction,
            velocity: goal.velocity * direction,
        };

        if current.velocity > self.max_velocity {
            current.velocity = self.max_velocity;
        }

        // Times to come to rest from the endpoint velocities, used to cut
        // the leading and trailing ramps off the full trapezoid.
        let cutoff_begin = current.velocity / self.max_acceleration;
        let cutoff_dist_begin = cutoff_begin * cutoff_begin * self.max_acceleration / 2.0;

        let cutoff_end = goal.velocity / self.max_acceleration;
        let cutoff_dist_end = cutoff_end * cutoff_end * self.max_acceleration / 2.0;

        let full_trapezoid_dist =
            cutoff_dist_begin + (goal.position - current.position) + cutoff_dist_end;

        let mut acceleration_time = self.max_velocity / self.max_acceleration;

        let mut full_speed_dist = full_trapezoid_dist
            - acceleration_time * acceleration_time * self.max_acceleration;

        // Goal too close for a cruise phase: triangular profile
        if full_speed_dist < 0.0 {
            acceleration_time = (full_trapezoid_dist / self.max_acceleration).sqrt();
            full_speed_dist = 0.0;
        }

        let end_accel = acceleration_time - cutoff_begin;
        let end_full_speed = end_accel + full_speed_dist / self.max_velocity;
        let end_decel = end_full_speed + acceleration_time - cutoff_end;

        let mut result = current;

        if dt < end_accel {
            result.velocity += dt * self.max_acceleration;
            result.position += (current.velocity + dt * self.max_acceleration / 2.0) * dt;
        } else if dt < end_full_speed {
            result.velocity = self.max_velocity;
            result.position += (current.velocity + end_accel * self.max_acceleration / 2.0)
                * end_accel
                + self.max_velocity * (dt - end_accel);
        } else if dt <= end_decel {
            let time_left = end_decel - dt;
            result.velocity = goal.velocity + time_left * self.max_acceleration;
            result.position =
                goal.position - (goal.velocity + time_left * self.max_acceleration / 2.0) * time_left;
        } else {
            result = goal;
        }

        ProfileState {
            position: result.position * direction,
            velocity: result.velocity * direction,
        }
    }
}

impl ProfiledPidController {
    /// Create a new profiled controller with the given gains, motion
    /// constraints and control period.
    pub fn new(
        k_p: f64,
        k_i: f64,
        k_d: f64,
        max_velocity: f64,
        max_acceleration: f64,
        period_s: f64,
    ) -> Self {
        Self {
            pid: PidController::new(k_p, k_i, k_d, period_s),
            profile: TrapezoidProfile::new(max_velocity, max_acceleration),
            period_s,
            setpoint: ProfileState::default(),
            goal: ProfileState::default(),
        }
    }

    /// Set the absolute error tolerance used by `at_goal`.
    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.pid.set_tolerance(tolerance);
    }

    /// Reset onto the given measurement: the profile restarts from rest at
    /// the measurement and all PID state clears.
    pub fn reset(&mut self, measurement: f64) {
        self.pid.reset();
        self.setpoint = ProfileState {
            position: measurement,
            velocity: 0.0,
        };
    }

    /// Advance the profiled setpoint one period towards the goal position
    /// and return the feedback output for the given measurement.
    pub fn calculate(&mut self, measurement: f64, goal_position: f64) -> f64 {
        self.goal = ProfileState {
            position: goal_position,
            velocity: 0.0,
        };

        self.setpoint = self.profile.calculate(self.period_s, self.setpoint, self.goal);

        self.pid.calculate(measurement, self.setpoint.position)
    }

    /// Whether the measurement is within tolerance and the profile has
    /// reached the goal.
    pub fn at_goal(&self) -> bool {
        self.pid.at_setpoint() && self.setpoint == self.goal
    }

    /// The current profiled setpoint.
    pub fn setpoint(&self) -> ProfileState {
        self.setpoint
    }

    /// Most recent error against the profiled setpoint.
    pub fn error(&self) -> f64 {
        self.pid.error()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
