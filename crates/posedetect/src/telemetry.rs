//! Tracing subscriber setup and the Prometheus metrics recorder.

use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock},
    thread,
};

use anyhow::{Context, Result, anyhow};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{
    Registry,
    filter::{EnvFilter, LevelFilter, filter_fn},
    fmt,
    prelude::*,
};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Logging and instrumentation knobs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryOptions {
    /// `-1` quiet, `0` info, `1` debug, `2+` trace. `RUST_LOG` wins when set.
    pub verbosity: i8,
    /// Plain-text copy of the log.
    pub log_file: Option<PathBuf>,
    /// Chrome trace JSON capturing pipeline spans.
    pub chrome_trace_path: Option<PathBuf>,
    /// Prometheus text exposition written at the end of the run.
    pub metrics_out: Option<PathBuf>,
}

/// Keeps the chrome trace writer alive until the run ends.
pub struct TelemetryGuard {
    _chrome_guard: Option<tracing_chrome::FlushGuard>,
}

fn default_level(verbosity: i8) -> LevelFilter {
    match verbosity {
        i8::MIN..=-1 => LevelFilter::ERROR,
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn build_filter(verbosity: i8) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default_level(verbosity).into())
        .from_env_lossy()
}

/// Install the global subscriber: console output, optional log file,
/// optional chrome trace, and the span-trace error layer.
pub fn init(opts: &TelemetryOptions) -> Result<TelemetryGuard> {
    let (chrome_layer, chrome_guard) = match opts.chrome_trace_path.as_ref() {
        Some(path) => {
            let (layer, guard) = build_chrome_layer(path)
                .with_context(|| format!("creating chrome trace {}", path.display()))?;
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let file_layer = match opts.log_file.as_ref() {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(build_filter(opts.verbosity)),
            )
        }
        None => None,
    };

    let span_only = filter_fn(|metadata| metadata.is_span());
    let subscriber = tracing_subscriber::registry()
        .with(chrome_layer.map(|layer| layer.with_filter(span_only)))
        .with(file_layer)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(io::stderr)
                .with_filter(build_filter(opts.verbosity)),
        )
        .with(tracing_error::ErrorLayer::default());

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| anyhow!("tracing subscriber already installed: {err}"))?;

    Ok(TelemetryGuard {
        _chrome_guard: chrome_guard,
    })
}

/// Ensure the global metrics recorder is installed and return its handle.
pub fn init_metrics_recorder() -> Result<&'static PrometheusHandle> {
    if let Some(handle) = PROM_HANDLE.get() {
        return Ok(handle);
    }
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|err| anyhow!("metrics recorder already installed: {err}"))?;
    Ok(PROM_HANDLE.get_or_init(|| handle))
}

/// Write the current Prometheus exposition to `path`, if a recorder exists.
pub fn write_metrics(path: &Path) -> Result<()> {
    let handle = PROM_HANDLE
        .get()
        .ok_or_else(|| anyhow!("metrics recorder not installed"))?;
    handle.run_upkeep();
    fs::write(path, handle.render())
        .with_context(|| format!("writing metrics to {}", path.display()))
}

/// Spawn a thread that inherits the current tracing dispatcher.
pub fn spawn_thread<F, T>(name: impl Into<String>, f: F) -> io::Result<thread::JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let dispatch = tracing::dispatcher::get_default(|current| current.clone());
    thread::Builder::new()
        .name(name.into())
        .spawn(move || tracing::dispatcher::with_default(&dispatch, f))
}

fn build_chrome_layer(
    path: &Path,
) -> io::Result<(tracing_chrome::ChromeLayer<Registry>, tracing_chrome::FlushGuard)> {
    let file = File::create(path)?;
    let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
        .writer(file)
        .include_args(true)
        .trace_style(tracing_chrome::TraceStyle::Threaded)
        .build();
    Ok((layer, guard))
}
