//! Progress reporting handles threaded through the frame loop.

use std::time::Duration;

use indicatif::{HumanDuration, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::info;

const LOG_INTERVAL: Duration = Duration::from_secs(5);
const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} frames ({percent}%) {per_sec} ETA {eta}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {pos} frames {per_sec}";

/// One progress update, emitted after every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressTick {
    pub done: u64,
    /// `None` when the source cannot tell its length up front.
    pub total: Option<u64>,
    pub elapsed: Duration,
}

impl ProgressTick {
    /// Remaining time extrapolated from the average frame time so far.
    pub fn eta(&self) -> Option<Duration> {
        let total = self.total?;
        if self.done == 0 {
            return None;
        }
        let remaining = total.saturating_sub(self.done);
        let per_frame = self.elapsed.as_secs_f64() / self.done as f64;
        Some(Duration::from_secs_f64(per_frame * remaining as f64))
    }

    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.done as f64 / secs
        } else {
            0.0
        }
    }
}

pub trait ProgressReporter {
    fn tick(&mut self, tick: &ProgressTick);

    /// Called once after the last frame.
    fn finish(&mut self, _tick: &ProgressTick) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn tick(&mut self, _tick: &ProgressTick) {}
}

/// Terminal progress bar. Shows a bar with ETA when the source knows its
/// length and a spinner with the running frame count otherwise.
pub struct ConsoleProgress {
    bar: ProgressBar,
    styled: bool,
}

impl ConsoleProgress {
    pub fn stderr() -> Self {
        Self::new(ProgressDrawTarget::stderr())
    }

    pub fn new(target: ProgressDrawTarget) -> Self {
        Self {
            bar: ProgressBar::with_draw_target(None, target),
            styled: false,
        }
    }

    fn apply_style(&mut self, total: Option<u64>) {
        if self.styled {
            return;
        }
        self.styled = true;
        let style = match total {
            Some(total) => {
                self.bar.set_length(total);
                ProgressStyle::with_template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-")
            }
            None => ProgressStyle::with_template(SPINNER_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        };
        self.bar.set_style(style);
    }
}

impl ProgressReporter for ConsoleProgress {
    fn tick(&mut self, tick: &ProgressTick) {
        self.apply_style(tick.total);
        self.bar.set_position(tick.done);
    }

    fn finish(&mut self, tick: &ProgressTick) {
        self.apply_style(tick.total);
        self.bar.set_position(tick.done);
        self.bar.finish();
    }
}

/// Periodic `info!` lines, for non-interactive runs.
#[derive(Debug)]
pub struct LogProgress {
    interval: Duration,
    next_at: Duration,
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(LOG_INTERVAL)
    }
}

impl LogProgress {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_at: Duration::ZERO,
        }
    }
}

impl ProgressReporter for LogProgress {
    fn tick(&mut self, tick: &ProgressTick) {
        if tick.elapsed < self.next_at {
            return;
        }
        self.next_at = tick.elapsed + self.interval;
        info!(
            done = tick.done,
            total = ?tick.total,
            fps = %format!("{:.1}", tick.rate()),
            eta = %tick
                .eta()
                .map(|eta| HumanDuration(eta).to_string())
                .unwrap_or_else(|| "unknown".into()),
            "progress"
        );
    }

    fn finish(&mut self, tick: &ProgressTick) {
        info!(
            done = tick.done,
            elapsed = %HumanDuration(tick.elapsed),
            "all frames handled"
        );
    }
}
