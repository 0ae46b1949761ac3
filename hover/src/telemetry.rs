use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

use crate::error::HoverError;
use crate::types::{Attitude, FeedSample, Position, RcCommand};

pub const HEADER: [&str; 13] = [
    "timestamp",
    "roll",
    "pitch",
    "heading",
    "pilot_roll",
    "pilot_pitch",
    "pilot_yaw",
    "pilot_throttle",
    "x",
    "y",
    "z",
    "aux_a",
    "aux_b",
];

/// Seconds since the UNIX epoch
pub fn unix_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or_default()
}

/// One control cycle as written in the telemetry file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryRecord {
    pub timestamp: f64,
    pub attitude: Attitude,
    pub pilot: RcCommand,
    pub position: Position,
    pub aux: [f64; 2],
}

impl TelemetryRecord {
    pub fn new(timestamp: f64, attitude: Attitude, sample: &FeedSample) -> Self {
        Self {
            timestamp,
            attitude,
            pilot: sample.pilot,
            position: sample.position,
            aux: sample.aux,
        }
    }

    fn fields(&self) -> [f64; 13] {
        [
            self.timestamp,
            self.attitude.roll,
            self.attitude.pitch,
            self.attitude.heading,
            self.pilot.roll,
            self.pilot.pitch,
            self.pilot.yaw,
            self.pilot.throttle,
            self.position.x,
            self.position.y,
            self.position.z,
            self.aux[0],
            self.aux[1],
        ]
    }
}

/// Append only CSV telemetry, one row per completed cycle
pub struct TelemetryLog<W: Write> {
    writer: BufWriter<W>,
    rows: u64,
}

impl TelemetryLog<File> {
    /// Create `mw-<start>.csv` in `dir`, named by the run start time
    pub fn create(dir: &Path, start: SystemTime) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("Creating telemetry directory {}", dir.display()))?;
        let path = Self::file_name(dir, start);
        let file = File::create(&path).with_context(|| format!("Creating telemetry file {}", path.display()))?;
        log::info!("Telemetry written to {}", path.display());
        Ok(Self::new(file)?)
    }

    pub fn file_name(dir: &Path, start: SystemTime) -> PathBuf {
        let seconds = start.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default();
        dir.join(format!("mw-{}.csv", seconds))
    }
}

impl<W: Write> TelemetryLog<W> {
    /// Wrap `writer` and write the header row
    pub fn new(writer: W) -> Result<Self, HoverError> {
        let mut writer = BufWriter::new(writer);
        writeln!(writer, "{}", HEADER.join(","))?;
        Ok(Self {
            writer,
            rows: 0,
        })
    }

    pub fn write(&mut self, record: &TelemetryRecord) -> Result<(), HoverError> {
        let row = record.fields().iter().map(|field| field.to_string()).collect::<Vec<_>>().join(",");
        writeln!(self.writer, "{}", row)?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn flush(&mut self) -> Result<(), HoverError> {
        Ok(self.writer.flush()?)
    }

    pub fn into_inner(self) -> Result<W, HoverError> {
        self.writer.into_inner().map_err(|e| HoverError::Io(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record() -> TelemetryRecord {
        let sample = FeedSample::from_values([1400.0, 1600.0, 1500.0, 1300.0, 0.5, -0.25, -1.0, 1.0, 0.1, 7.0, 8.0]);
        let attitude = Attitude {
            roll: 1.5,
            pitch: -2.0,
            heading: 180.0,
        };
        TelemetryRecord::new(1_700_000_000.5, attitude, &sample)
    }

    #[test]
    fn test_header_and_rows() {
        let mut log = TelemetryLog::new(Vec::new()).unwrap();
        log.write(&record()).unwrap();
        log.write(&record()).unwrap();
        assert_eq!(log.rows(), 2);

        let text = String::from_utf8(log.into_inner().unwrap()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER.join(","));
        assert_eq!(lines[1], "1700000000.5,1.5,-2,180,1400,1600,1500,1300,0.5,-0.25,-1,7,8");
        assert_eq!(lines[0].split(',').count(), lines[1].split(',').count());
    }

    #[test]
    fn test_file_named_by_start() {
        let start = UNIX_EPOCH + Duration::from_secs(1_234);
        assert_eq!(TelemetryLog::file_name(Path::new("logs"), start), PathBuf::from("logs/mw-1234.csv"));
    }

    #[test]
    fn test_create_file() {
        let dir = std::env::temp_dir().join(format!("hover-telemetry-{}", std::process::id()));
        let start = UNIX_EPOCH + Duration::from_secs(42);
        {
            let mut log = TelemetryLog::create(&dir, start).unwrap();
            log.write(&record()).unwrap();
        }
        let text = fs::read_to_string(dir.join("mw-42.csv")).unwrap();
        assert_eq!(text.lines().count(), 2);
        fs::remove_dir_all(&dir).unwrap();
    }
}
