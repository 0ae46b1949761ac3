use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use anyhow::Result;

use crate::config::ControlConfig;
use crate::error::HoverError;
use crate::feed::FeedBoard;
use crate::flight_link::FlightLink;
use crate::frame::{to_vehicle_frame, TiltAngles};
use crate::msp::MspCode;
use crate::pid::PositionPid;
use crate::shaper::CommandShaper;
use crate::telemetry::{unix_seconds, TelemetryLog, TelemetryRecord};
use crate::timer::PeriodicTimer;
use crate::types::RcCommand;

/// Channels sent to the flight controller: roll, pitch, yaw, throttle
pub const RC_CHANNELS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    WaitingForFeed,
    Running,
    /// A cycle failed, no more commands are sent
    Faulted,
    /// Stopped on operator request
    Stopped,
}

/// Everything one control cycle computed
#[derive(Debug, Clone, Copy)]
pub struct Cycle {
    /// Roll (world Y) and pitch (world X) PID corrections
    pub corrections: (f64, f64),
    /// Desired tilt in degrees
    pub tilt: TiltAngles,
    pub command: RcCommand,
    pub record: TelemetryRecord,
}

pub struct ControlLoop<L, T> {
    config: ControlConfig,
    board: Arc<FeedBoard>,
    link: L,
    timer: T,
    pids: PositionPid,
    shaper: CommandShaper,
    stop: Arc<AtomicBool>,
    state: LoopState,
    cycles: u64,
}

impl<L: FlightLink, T: PeriodicTimer> ControlLoop<L, T> {
    pub fn new(
        config: ControlConfig,
        board: Arc<FeedBoard>,
        link: L,
        timer: T,
        stop: Arc<AtomicBool>,
    ) -> Result<Self, HoverError> {
        let pids = PositionPid::new(config.gains, config.period.as_secs_f64(), config.target)?;
        let shaper = CommandShaper::new(config.autonomous_band, config.transport_band);
        Ok(Self {
            config,
            board,
            link,
            timer,
            pids,
            shaper,
            stop,
            state: LoopState::WaitingForFeed,
            cycles: 0,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn pids(&self) -> &PositionPid {
        &self.pids
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Wait for the feed, then hold position until stopped or faulted
    pub fn run(&mut self) -> Result<()> {
        if !self.wait_for_feed()? {
            return Ok(());
        }
        let telemetry = if self.config.logging {
            match TelemetryLog::create(&self.config.log_dir, SystemTime::now()) {
                Ok(telemetry) => Some(telemetry),
                Err(e) => {
                    self.state = LoopState::Faulted;
                    return Err(e);
                },
            }
        } else {
            None
        };
        self.fly(telemetry)?;
        Ok(())
    }

    /// Block until the feed published its first sample.
    ///
    /// Returns `false` when stopped while waiting. No command is sent in this state.
    pub fn wait_for_feed(&mut self) -> Result<bool, HoverError> {
        self.state = LoopState::WaitingForFeed;
        let start = Instant::now();
        loop {
            if self.stopped() {
                self.state = LoopState::Stopped;
                return Ok(false);
            }
            let remaining = self.config.startup_timeout.saturating_sub(start.elapsed());
            if self.board.wait_sample(self.config.feed_poll.min(remaining)).is_some() {
                log::info!("Position feed is active");
                return Ok(true);
            }
            if start.elapsed() >= self.config.startup_timeout {
                self.state = LoopState::Faulted;
                log::error!("Position feed silent for {:?}", self.config.startup_timeout);
                return Err(HoverError::FeedTimeout(self.config.startup_timeout));
            }
            log::info!("Waiting for position feed...");
        }
    }

    /// Run cycles until the stop flag is raised or a cycle fails.
    ///
    /// `telemetry` is owned by this call, it is released on every exit path and returned on stop.
    pub fn fly<W: Write>(
        &mut self,
        mut telemetry: Option<TelemetryLog<W>>,
    ) -> Result<Option<TelemetryLog<W>>, HoverError> {
        self.state = LoopState::Running;
        log::info!(
            "Holding {:?} every {:?}, telemetry {}",
            self.config.target,
            self.timer.period(),
            if telemetry.is_some() { "on" } else { "off" }
        );

        while !self.stopped() {
            let start = Instant::now();
            let result = self.cycle().and_then(|cycle| match telemetry.as_mut() {
                Some(log) => log.write(&cycle.record),
                None => Ok(()),
            });
            if let Err(e) = result {
                self.state = LoopState::Faulted;
                log::error!("Control loop stopped after {} cycles: {}", self.cycles, e);
                return Err(e);
            }
            self.timer.wait(start.elapsed());
        }

        if let Some(log) = telemetry.as_mut() {
            log.flush()?;
        }
        self.state = LoopState::Stopped;
        log::info!("Control loop stopped after {} cycles", self.cycles);
        Ok(telemetry)
    }

    /// One control cycle: sample, attitude, PIDs, frame transform, shaping, dispatch
    pub fn cycle(&mut self) -> Result<Cycle, HoverError> {
        let sample = self.board.latest().ok_or_else(|| HoverError::Transport(String::from("position feed lost")))?;
        let attitude = self.link.refresh_attitude()?;

        let corrections = self.pids.update(&sample.position);
        let tilt = to_vehicle_frame(corrections.0, corrections.1, sample.heading).to_degrees();
        let command = self.shaper.shape(&sample, tilt, &mut self.pids);

        self.link.send_command(RC_CHANNELS, MspCode::SetRawRc, &command.channels())?;
        self.cycles += 1;

        log::trace!(
            "pos {:.3} {:.3} {:.3} tilt {:.2} {:.2} rc {:?} auto {}",
            sample.position.x,
            sample.position.y,
            sample.position.z,
            tilt.roll,
            tilt.pitch,
            command.channels(),
            sample.autonomous
        );

        Ok(Cycle {
            corrections,
            tilt,
            command,
            record: TelemetryRecord::new(unix_seconds(SystemTime::now()), attitude, &sample),
        })
    }
}
