use std::{
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Sender, bounded};
use serde::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::{debug, warn};

use crate::telemetry;

pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// CPU and memory usage of this process over a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceSummary {
    pub samples: u64,
    pub avg_cpu_percent: f32,
    pub peak_cpu_percent: f32,
    pub avg_memory_mb: f64,
    pub peak_memory_mb: f64,
    pub duration_seconds: f64,
}

#[derive(Debug, Default)]
struct Accumulator {
    samples: u64,
    cpu_sum: f64,
    cpu_peak: f32,
    mem_sum: f64,
    mem_peak: f64,
}

impl Accumulator {
    fn record(&mut self, cpu_percent: f32, memory_bytes: u64) {
        let memory_mb = memory_bytes as f64 / (1024.0 * 1024.0);
        self.samples += 1;
        self.cpu_sum += f64::from(cpu_percent);
        self.cpu_peak = self.cpu_peak.max(cpu_percent);
        self.mem_sum += memory_mb;
        self.mem_peak = self.mem_peak.max(memory_mb);
    }

    fn summary(&self, duration: Duration) -> ResourceSummary {
        let n = self.samples.max(1) as f64;
        ResourceSummary {
            samples: self.samples,
            avg_cpu_percent: (self.cpu_sum / n) as f32,
            peak_cpu_percent: self.cpu_peak,
            avg_memory_mb: self.mem_sum / n,
            peak_memory_mb: self.mem_peak,
            duration_seconds: duration.as_secs_f64(),
        }
    }
}

/// Background sampler of this process. It only observes; the frame loop
/// never waits on it.
pub struct ResourceMonitor {
    stop_tx: Sender<()>,
    handle: thread::JoinHandle<ResourceSummary>,
}

impl ResourceMonitor {
    pub fn start() -> Option<Self> {
        Self::with_interval(SAMPLE_INTERVAL)
    }

    /// `None` when the process cannot be inspected on this platform.
    pub fn with_interval(interval: Duration) -> Option<Self> {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => pid,
            Err(err) => {
                warn!("resource monitor disabled: {err}");
                return None;
            }
        };

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let spawned = telemetry::spawn_thread("resource-monitor", move || {
            let started = Instant::now();
            let mut system = System::new();
            let mut acc = Accumulator::default();
            // The first refresh only primes the CPU counters.
            refresh(&mut system, pid);
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                        refresh(&mut system, pid);
                        if let Some(process) = system.process(pid) {
                            acc.record(process.cpu_usage(), process.memory());
                        }
                    }
                    _ => break,
                }
            }
            acc.summary(started.elapsed())
        });

        match spawned {
            Ok(handle) => Some(Self { stop_tx, handle }),
            Err(err) => {
                warn!("failed to spawn resource monitor: {err}");
                None
            }
        }
    }

    pub fn stop(self) -> ResourceSummary {
        let _ = self.stop_tx.send(());
        match self.handle.join() {
            Ok(summary) => {
                debug!(samples = summary.samples, "resource monitor stopped");
                summary
            }
            Err(_) => {
                warn!("resource monitor thread panicked");
                ResourceSummary::default()
            }
        }
    }
}

fn refresh(system: &mut System, pid: Pid) {
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing().with_cpu().with_memory(),
    );
}
