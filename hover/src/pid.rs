use crate::config::Gains;
use crate::error::HoverError;
use crate::types::Position;

/// Single axis Proportional Integral Derivative controller with a clamped integrator
#[derive(Debug, Clone)]
pub struct Pid {
    gains: Gains,
    /// Sample period in seconds
    period: f64,
    set_point: f64,
    integral: f64,
    previous_error: f64,
}

impl Pid {
    pub fn new(gains: Gains, period: f64) -> Result<Self, HoverError> {
        if !(period.is_finite() && period > 0.0) {
            return Err(HoverError::Config(format!("PID period must be positive, got {}", period)));
        }
        if !(gains.integrator_max.is_finite() && gains.integrator_max > 0.0) {
            return Err(HoverError::Config(format!(
                "PID integrator limit must be positive, got {}",
                gains.integrator_max
            )));
        }
        Ok(Self {
            gains,
            period,
            set_point: 0.0,
            integral: 0.0,
            previous_error: 0.0,
        })
    }

    /// Replace the target. Only meant to be used before the loop starts.
    pub fn set_point(&mut self, value: f64) {
        self.set_point = value;
    }

    pub fn target(&self) -> f64 {
        self.set_point
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Compute the correction for a new measurement.
    ///
    /// The integral term uses what was accumulated by the previous samples, the current error is
    /// integrated afterward and the result clamped to the integrator limit. A non-finite
    /// measurement gives no correction and leaves the state untouched.
    pub fn update(&mut self, measurement: f64) -> f64 {
        if !measurement.is_finite() {
            return 0.0;
        }
        let error = self.set_point - measurement;

        let derivative = (error - self.previous_error) / self.period;
        self.previous_error = error;

        let correction = self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * derivative;

        let limit = self.gains.integrator_max;
        self.integral = (self.integral + error * self.period).clamp(-limit, limit);

        correction
    }

    /// Drop the accumulated integral, the derivative memory is kept
    pub fn reset_integrator(&mut self) {
        self.integral = 0.0;
    }
}

/// The two horizontal position controllers, roll acts along world Y and pitch along world X
#[derive(Debug, Clone)]
pub struct PositionPid {
    pub roll: Pid,
    pub pitch: Pid,
}

impl PositionPid {
    pub fn new(gains: Gains, period: f64, target: Position) -> Result<Self, HoverError> {
        let mut roll = Pid::new(gains, period)?;
        roll.set_point(target.y);
        let mut pitch = Pid::new(gains, period)?;
        pitch.set_point(target.x);
        Ok(Self {
            roll,
            pitch,
        })
    }

    /// Returns the (roll, pitch) corrections
    pub fn update(&mut self, position: &Position) -> (f64, f64) {
        (self.roll.update(position.y), self.pitch.update(position.x))
    }

    pub fn reset_integrators(&mut self) {
        self.roll.reset_integrator();
        self.pitch.reset_integrator();
    }
}
