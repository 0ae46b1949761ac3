use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::HoverError;
use crate::msp::{self, MspCode};
use crate::types::Attitude;

/// Synchronous link to the onboard flight controller
pub trait FlightLink {
    /// Query the flight controller for its current attitude
    fn refresh_attitude(&mut self) -> Result<Attitude, HoverError>;

    /// Dispatch `channel_count` channels of `command` as a `code` message
    fn send_command(&mut self, channel_count: usize, code: MspCode, command: &[f64]) -> Result<(), HoverError>;
}

/// MultiWii flight controller reached through MSP over a serial port
pub struct MultiWii<P> {
    port: P,
    attitude: Attitude,
}

impl MultiWii<File> {
    /// Open the serial device. Baud rate and line discipline are set up outside the process.
    pub fn open<T: AsRef<Path>>(path: T) -> Result<Self> {
        let port = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())
            .with_context(|| format!("Opening flight controller on {}", path.as_ref().display()))?;
        Ok(Self::new(port))
    }
}

impl<P: Read + Write> MultiWii<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            attitude: Attitude::default(),
        }
    }

    /// Last attitude received
    pub fn attitude(&self) -> Attitude {
        self.attitude
    }

    fn request(&mut self, code: MspCode, payload: &[u8]) -> Result<(), HoverError> {
        let frame = msp::encode_request(code, payload)?;
        self.port.write_all(&frame).map_err(transport)?;
        self.port.flush().map_err(transport)
    }

    #[cfg(test)]
    fn port(&self) -> &P {
        &self.port
    }
}

fn transport(e: std::io::Error) -> HoverError {
    HoverError::Transport(format!("flight controller link: {}", e))
}

impl<P: Read + Write> FlightLink for MultiWii<P> {
    fn refresh_attitude(&mut self) -> Result<Attitude, HoverError> {
        self.request(MspCode::Attitude, &[])?;
        let (code, payload) = msp::read_reply(&mut self.port).map_err(|e| match e {
            HoverError::Io(e) => transport(e),
            e => e,
        })?;
        if MspCode::try_from(code)? != MspCode::Attitude {
            return Err(HoverError::Protocol(format!("expected attitude reply, got code {}", code)));
        }
        let [roll, pitch, heading] = msp::attitude_payload(&payload)?;
        self.attitude = Attitude {
            roll,
            pitch,
            heading,
        };
        Ok(self.attitude)
    }

    fn send_command(&mut self, channel_count: usize, code: MspCode, command: &[f64]) -> Result<(), HoverError> {
        if command.len() != channel_count {
            return Err(HoverError::Protocol(format!(
                "{} channels announced but {} given",
                channel_count,
                command.len()
            )));
        }
        self.request(code, &msp::rc_payload(command))
    }
}
