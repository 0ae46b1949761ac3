use serde::{Deserialize, Serialize};

/// Number of values carried by one feed sample
pub const FEED_VALUES: usize = 11;

/// Position in the motion capture frame (north east down, z negative up)
#[derive(Serialize, Deserialize, Default, Copy, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Attitude as reported by the flight controller, in degrees
#[derive(Default, Copy, Clone, Debug, PartialEq)]
pub struct Attitude {
    pub roll: f64,
    pub pitch: f64,
    pub heading: f64,
}

/// RC command vector in PWM units, ordered roll, pitch, yaw, throttle
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RcCommand {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub throttle: f64,
}

impl Default for RcCommand {
    fn default() -> Self {
        Self {
            roll: 1500.0,
            pitch: 1500.0,
            yaw: 1500.0,
            throttle: 1000.0,
        }
    }
}

impl RcCommand {
    pub fn channels(&self) -> [f64; 4] {
        [self.roll, self.pitch, self.yaw, self.throttle]
    }

    /// Replace every non-finite channel with the one of `fallback`
    pub fn or_finite(self, fallback: RcCommand) -> Self {
        let pick = |value: f64, other: f64| if value.is_finite() { value } else { other };
        Self {
            roll: pick(self.roll, fallback.roll),
            pitch: pick(self.pitch, fallback.pitch),
            yaw: pick(self.yaw, fallback.yaw),
            throttle: pick(self.throttle, fallback.throttle),
        }
    }

    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            roll: f(self.roll),
            pitch: f(self.pitch),
            yaw: f(self.yaw),
            throttle: f(self.throttle),
        }
    }
}

/// One complete datagram from the motion capture station
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FeedSample {
    /// Raw pilot sticks
    pub pilot: RcCommand,
    pub position: Position,
    /// Position hold engaged
    pub autonomous: bool,
    /// Heading in radians
    pub heading: f64,
    pub aux: [f64; 2],
}

impl FeedSample {
    /// Build a sample from the wire order
    /// `[roll, pitch, yaw, throttle, x, y, z, autonomy, heading, aux_a, aux_b]`
    pub fn from_values(v: [f64; FEED_VALUES]) -> Self {
        Self {
            pilot: RcCommand {
                roll: v[0],
                pitch: v[1],
                yaw: v[2],
                throttle: v[3],
            },
            position: Position {
                x: v[4],
                y: v[5],
                z: v[6],
            },
            autonomous: v[7] == 1.0,
            heading: v[8],
            aux: [v[9], v[10]],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_field_order() {
        let sample = FeedSample::from_values([1100.0, 1200.0, 1300.0, 1400.0, 0.5, -0.5, -1.2, 1.0, 0.3, 7.0, 8.0]);
        assert_eq!(sample.pilot.channels(), [1100.0, 1200.0, 1300.0, 1400.0]);
        assert_eq!(
            sample.position,
            Position {
                x: 0.5,
                y: -0.5,
                z: -1.2
            }
        );
        assert!(sample.autonomous);
        assert_eq!(sample.heading, 0.3);
        assert_eq!(sample.aux, [7.0, 8.0]);
    }

    #[test]
    fn test_or_finite_replaces_bad_channels() {
        let command = RcCommand {
            roll: f64::NAN,
            pitch: 1400.0,
            yaw: f64::INFINITY,
            throttle: f64::NEG_INFINITY,
        }
        .or_finite(RcCommand::default());
        assert_eq!(command.channels(), [1500.0, 1400.0, 1500.0, 1000.0]);
    }

    #[test]
    fn test_autonomy_flag_only_on_one() {
        let mut values = [0.0; FEED_VALUES];
        values[7] = 0.0;
        assert!(!FeedSample::from_values(values).autonomous);
        values[7] = 2.0;
        assert!(!FeedSample::from_values(values).autonomous);
    }
}
