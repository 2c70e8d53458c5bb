use std::process::ExitCode;

use clap::Parser;
use posedetect::{
    PoseCliArgs, RunConfig,
    error::EXIT_FATAL,
    pipeline,
    telemetry::{self, TelemetryOptions},
};
use tracing::{error, warn};

/// Detect human pose landmarks in videos and images.
#[derive(Debug, Parser)]
#[command(name = "posedetect", version, about)]
struct Cli {
    #[command(flatten)]
    args: PoseCliArgs,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match RunConfig::try_from(cli.args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err:#}");
            return exit(EXIT_FATAL);
        }
    };

    let _telemetry = match telemetry::init(&config.telemetry) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("warning: logging setup failed: {err:#}");
            None
        }
    };
    if config.telemetry.metrics_out.is_some() {
        if let Err(err) = telemetry::init_metrics_recorder() {
            warn!("metrics disabled: {err:#}");
        }
    }

    let code = match pipeline::run(&config, Some(pipeline::interrupt_flag())) {
        Ok(report) => {
            print!("{}", report.summary());
            let code = report.exit_code(config.min_success_rate);
            if code != 0 && !report.interrupted {
                warn!(
                    success_rate = report.stats.success_rate,
                    min_success_rate = config.min_success_rate,
                    "success rate below threshold"
                );
            }
            code
        }
        Err(err) => {
            error!("{err}");
            err.exit_code()
        }
    };

    flush_metrics(&config.telemetry);
    exit(code)
}

fn flush_metrics(opts: &TelemetryOptions) {
    if let Some(path) = opts.metrics_out.as_deref() {
        if let Err(err) = telemetry::write_metrics(path) {
            warn!("{err:#}");
        }
    }
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
