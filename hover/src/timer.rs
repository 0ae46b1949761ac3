use std::thread;
use std::time::Duration;

/// Paces the control loop, called once at the end of every cycle
pub trait PeriodicTimer {
    fn period(&self) -> Duration;

    /// Wait for the next cycle. `work` is how long this cycle's work took.
    fn wait(&mut self, work: Duration);
}

/// Sleeps the nominal period after the work, without any drift correction.
///
/// The actual period is the work time plus the nominal period.
pub struct SleepTimer {
    period: Duration,
    overruns: u64,
}

impl SleepTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            overruns: 0,
        }
    }

    /// Cycles whose work alone exceeded the period
    pub fn overruns(&self) -> u64 {
        self.overruns
    }
}

impl PeriodicTimer for SleepTimer {
    fn period(&self) -> Duration {
        self.period
    }

    fn wait(&mut self, work: Duration) {
        if work > self.period {
            self.overruns += 1;
            log::debug!("Control cycle overrun: {:?} of work for a {:?} period", work, self.period);
        }
        thread::sleep(self.period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_sleep_timer_sleeps_nominal_period() {
        let mut timer = SleepTimer::new(Duration::from_millis(5));
        let start = Instant::now();
        timer.wait(Duration::from_millis(3));
        assert!(start.elapsed() >= Duration::from_millis(5));
        assert_eq!(timer.overruns(), 0);
    }

    #[test]
    fn test_overrun_is_counted_not_skipped() {
        let mut timer = SleepTimer::new(Duration::from_millis(2));
        let start = Instant::now();
        timer.wait(Duration::from_millis(10));
        assert!(start.elapsed() >= Duration::from_millis(2));
        assert_eq!(timer.overruns(), 1);
    }
}
