use crate::config::PwmBand;
use crate::frame::TiltAngles;
use crate::pid::PositionPid;
use crate::types::{FeedSample, RcCommand};

/// Largest tilt the vehicle can be commanded to, in degrees
pub const MAX_ANGLE: f64 = 50.0;

const PWM_MIN: f64 = 1000.0;
const PWM_MAX: f64 = 2000.0;

/// Map an angle in degrees onto PWM units, 0° is 1500 and ±MAX_ANGLE the ends of the range
pub fn to_pwm(angle: f64) -> f64 {
    let angle = angle.clamp(-MAX_ANGLE, MAX_ANGLE);
    (angle + MAX_ANGLE) * (PWM_MAX - PWM_MIN) / (2.0 * MAX_ANGLE) + PWM_MIN
}

/// Blends the computed tilt with the pilot sticks and applies the safety limits
#[derive(Debug, Clone, Copy)]
pub struct CommandShaper {
    autonomous_band: PwmBand,
    transport_band: PwmBand,
}

impl CommandShaper {
    pub fn new(autonomous_band: PwmBand, transport_band: PwmBand) -> Self {
        Self {
            autonomous_band,
            transport_band,
        }
    }

    /// Build the command for this cycle.
    ///
    /// With position hold engaged the computed roll and pitch replace the pilot ones, limited to
    /// the autonomous band. Otherwise the pilot sticks pass through and the integrators of `pids`
    /// are reset. Every channel ends up within the transport band, non-finite inputs included.
    pub fn shape(&self, sample: &FeedSample, tilt: TiltAngles, pids: &mut PositionPid) -> RcCommand {
        // non-finite sticks fall back to neutral, non-finite tilt to the pilot value
        let mut command = sample.pilot.or_finite(RcCommand::default());
        if sample.autonomous {
            let computed = RcCommand {
                roll: to_pwm(tilt.roll),
                pitch: to_pwm(tilt.pitch),
                ..command
            }
            .or_finite(command);
            command.roll = self.autonomous_band.limit(computed.roll);
            command.pitch = self.autonomous_band.limit(computed.pitch);
        } else {
            pids.reset_integrators();
        }
        command.map(|channel| self.transport_band.limit(channel))
    }
}

impl Default for CommandShaper {
    fn default() -> Self {
        Self::new(PwmBand::AUTONOMOUS, PwmBand::TRANSPORT)
    }
}
