use anyhow::Result;
use std::collections::VecDeque;
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Initializes the tracing subscriber used by the binary entry point.
///
/// Verbosity follows the same occurrence-count convention as the
/// original CLI: 0 = warn, 1 = info, 2 = debug, 3+ = trace. An explicit
/// `RUST_LOG` always wins over the verbosity count.
pub fn start_loggers(verbosity_level: u8) -> Result<()> {
    let default_level = match verbosity_level {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    tracing::info!(level = default_level, "logging initialized");
    Ok(())
}

pub trait MpscChannelHelper<T> {
    fn try_recv_optional(&mut self) -> std::result::Result<Option<T>, mpsc::TryRecvError>;
}

impl<T> MpscChannelHelper<T> for mpsc::Receiver<T> {
    fn try_recv_optional(&mut self) -> std::result::Result<Option<T>, mpsc::TryRecvError> {
        match self.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(error) => match error {
                mpsc::TryRecvError::Empty => Ok(None),
                mpsc::TryRecvError::Disconnected => Err(error),
            },
        }
    }
}

/// Tracks the realized control-loop tick rate over a sliding window and
/// reports it periodically, so drift between the nominal `time_delta`
/// and the measured loop period shows up in logs rather than silently.
pub struct RateTracker {
    window: VecDeque<Instant>,
    window_size: usize,
    report_period: Duration,
    last_report: Instant,
}

impl RateTracker {
    pub fn new(window_size: usize, report_period: Duration) -> Self {
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size,
            report_period,
            last_report: Instant::now(),
        }
    }

    pub fn tick(&mut self) {
        let now = Instant::now();
        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(now);
    }

    fn elapsed_hz(&self) -> Option<f32> {
        let first = self.window.front()?;
        let last = self.window.back()?;
        let elapsed = last.duration_since(*first).as_secs_f32();
        if elapsed <= 0.0 || self.window.len() < 2 {
            return None;
        }
        Some((self.window.len() - 1) as f32 / elapsed)
    }

    /// Returns `Some(hz)` at most once per `report_period`.
    pub async fn report(&mut self) -> Result<Option<f32>> {
        if self.last_report.elapsed() < self.report_period {
            return Ok(None);
        }
        self.last_report = Instant::now();
        Ok(self.elapsed_hz())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_tracker_reports_none_without_ticks() {
        let tracker = RateTracker::new(4, Duration::from_millis(0));
        assert_eq!(tracker.elapsed_hz(), None);
    }

    #[test]
    fn rate_tracker_window_caps_at_size() {
        let mut tracker = RateTracker::new(3, Duration::from_millis(0));
        for _ in 0..10 {
            tracker.tick();
        }
        assert_eq!(tracker.window.len(), 3);
    }
}
