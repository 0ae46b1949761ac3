/// Standard gravity in m/s²
pub const GRAVITY: f64 = 9.81;

/// Desired tilt in the vehicle heading frame, in radians
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TiltAngles {
    pub roll: f64,
    pub pitch: f64,
}

impl TiltAngles {
    pub fn to_degrees(self) -> Self {
        Self {
            roll: self.roll.to_degrees(),
            pitch: self.pitch.to_degrees(),
        }
    }
}

/// Rotate the world frame corrections into the vehicle frame and turn them into tilt angles.
///
/// `roll_correction` acts along world Y and `pitch_correction` along world X. Both are treated as
/// desired lateral accelerations, the small angle approximation gives tilt ≈ acceleration / g.
pub fn to_vehicle_frame(roll_correction: f64, pitch_correction: f64, heading: f64) -> TiltAngles {
    let (sin, cos) = heading.sin_cos();
    TiltAngles {
        roll: (roll_correction * cos - pitch_correction * sin) / GRAVITY,
        pitch: (pitch_correction * cos + roll_correction * sin) / GRAVITY,
    }
}
