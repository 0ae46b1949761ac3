use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

const QUEUE_DEPTH: usize = 64;

struct SyncRecord {
    timestamp: Instant,
    level: Level,
    target: String,
    content: String,
}

/// Receiving end of the logger, drained by the main thread
pub struct LogSink {
    receiver: Receiver<SyncRecord>,
    start: Instant,
}

/// Logger that never blocks the caller: records are queued and printed by [`LogSink`]
pub struct Logger {
    sender: SyncSender<SyncRecord>,
    level: LevelFilter,
}

impl Logger {
    pub fn init(level: LevelFilter) -> LogSink {
        let (logger, sink) = Self::new(level);
        let _ = log::set_logger(Box::leak(Box::new(logger))).map(|()| log::set_max_level(level));
        sink
    }

    fn new(level: LevelFilter) -> (Self, LogSink) {
        let (sender, receiver) = sync_channel(QUEUE_DEPTH);
        let logger = Self {
            sender,
            level,
        };
        let sink = LogSink {
            receiver,
            start: Instant::now(),
        };
        (logger, sink)
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            // a full queue drops the record rather than stalling the control loop
            let _ = self.sender.try_send(SyncRecord {
                timestamp: Instant::now(),
                level: record.level(),
                target: record.target().to_owned(),
                content: std::fmt::format(*record.args()),
            });
        }
    }

    fn flush(&self) {}
}

impl LogSink {
    /// Print every queued record, returns how many were printed
    pub fn handle_logs(&mut self) -> usize {
        let mut printed = 0;
        for record in self.receiver.try_iter() {
            println!("{}", self.format(&record));
            printed += 1;
        }
        printed
    }

    fn format(&self, record: &SyncRecord) -> String {
        format!(
            "[{:<9.5}] {:<5} {}: {}",
            record.timestamp.duration_since(self.start).as_secs_f32(),
            record.level,
            record.target,
            record.content
        )
    }
}
