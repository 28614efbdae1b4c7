//! Reservation Simulation CLI
//!
//! Runs the two-phase reservation workload for one parameter `A`: `A`
//! flights, `A` relayer threads and `A²` producer threads, with the
//! validator on the main thread.
//!
//! # Output Format
//!
//! Check lines are written to stdout, one per check, for example:
//! `phase 1: total keysum check: expected 36, found 36 [ok]`
//!
//! A summary is written to stderr upon completion:
//! `flights=N phase=P stacked=N queued=N inserted=N pulled=N refused=N elapsed_ms=N`
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `warn,reservation_sim=info`).
//!
//! # Exit Codes
//!
//! - `0`: Run reached `DONE`
//! - `1`: Run aborted (allocation, thread spawn or barrier failure)
//! - `2`: Invalid arguments or configuration error
//! - `3`: Phase-1 invariant violation
//! - `4`: Phase-2 invariant violation
//! - `5`: A worker thread panicked

use reservation_sim::sim::DEFAULT_THREAD_STACK_SIZE;
use reservation_sim::{Phase, RunReport, SimConfig, SimError, Simulation};
use std::env;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn print_usage(exe: &std::ffi::OsStr) {
    eprintln!(
        "usage: {} [OPTIONS] <A>

ARGS:
    <A>                         Number of flights (1..=64); spawns A relayers and A^2 producers

OPTIONS:
    --thread-stack-size=<N>     Worker stack size in bytes (default: {})
    --help, -h                  Show this help message",
        exe.to_string_lossy(),
        DEFAULT_THREAD_STACK_SIZE
    );
}

fn print_summary(report: &RunReport) {
    let stats = &report.stats;
    eprintln!(
        "flights={} phase={} stacked={} queued={} inserted={} pulled={} refused={} elapsed_ms={}",
        report.flights,
        report.phase,
        stats.stacked,
        stats.queued,
        stats.inserted,
        stats.pulled,
        stats.refused,
        report.elapsed.as_millis()
    );
}

fn exit_code(err: &SimError) -> u8 {
    match err {
        SimError::Config(_) => 2,
        SimError::Invariant { violation, .. } => match violation.phase {
            Phase::Phase1Check => 3,
            _ => 4,
        },
        SimError::WorkerPanicked { .. } => 5,
        _ => 1,
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,reservation_sim=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args_os();
    let exe = args.next().unwrap_or_else(|| "reservation-sim".into());
    let mut flights: Option<String> = None;
    let mut stack_size: Option<usize> = None;

    for arg in args {
        let Some(flag) = arg.to_str() else {
            eprintln!("argument is not valid UTF-8: {}", arg.to_string_lossy());
            print_usage(&exe);
            return ExitCode::from(2);
        };
        if let Some(value) = flag.strip_prefix("--thread-stack-size=") {
            match value.parse() {
                Ok(bytes) => stack_size = Some(bytes),
                Err(_) => {
                    eprintln!("invalid --thread-stack-size value: {}", value);
                    return ExitCode::from(2);
                }
            }
            continue;
        }
        match flag {
            "--help" | "-h" => {
                print_usage(&exe);
                return ExitCode::SUCCESS;
            }
            _ if flag.starts_with("--") => {
                eprintln!("unknown flag: {}", flag);
                print_usage(&exe);
                return ExitCode::from(2);
            }
            _ => {}
        }

        if flights.is_some() {
            print_usage(&exe);
            return ExitCode::from(2);
        }
        flights = Some(flag.to_string());
    }

    let Some(flights) = flights else {
        print_usage(&exe);
        return ExitCode::from(2);
    };

    let config = SimConfig::from_arg(&flights).and_then(|config| {
        let config = match stack_size {
            Some(bytes) => config.with_thread_stack_size(bytes),
            None => config,
        };
        config.validate().map(|()| config)
    });
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            print_usage(&exe);
            return ExitCode::from(2);
        }
    };

    let result = Simulation::new(config).and_then(Simulation::run);
    match result {
        Ok(report) => {
            print!("{}", report);
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            if let SimError::Invariant { report, .. } = &err {
                print!("{}", report);
                print_summary(report);
            }
            eprintln!("error: {}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reservation_sim::sim::{BarrierError, Role};
    use reservation_sim::{CheckLine, ConfigError, InvariantViolation, RunStats};
    use std::time::Duration;

    fn violation_at(phase: Phase) -> SimError {
        SimError::Invariant {
            violation: InvariantViolation {
                phase,
                line: CheckLine::TotalSize {
                    expected: 27,
                    found: 28,
                },
            },
            report: Box::new(RunReport {
                flights: 3,
                phase: Phase::Failed,
                checks: Vec::new(),
                stats: RunStats::default(),
                elapsed: Duration::ZERO,
            }),
        }
    }

    #[test]
    fn exit_codes_distinguish_failure_kinds() {
        assert_eq!(exit_code(&SimError::Config(ConfigError::ZeroFlights)), 2);
        assert_eq!(exit_code(&violation_at(Phase::Phase1Check)), 3);
        assert_eq!(exit_code(&violation_at(Phase::Phase2Check)), 4);
        assert_eq!(
            exit_code(&SimError::WorkerPanicked {
                role: Role::Producer(1)
            }),
            5
        );
        assert_eq!(
            exit_code(&SimError::Barrier {
                role: Role::Validator,
                source: BarrierError::Broken {
                    barrier: "produced"
                },
            }),
            1
        );
    }
}
