//! Runs that fail a phase-1 check: the relayers must stand down and the run
//! must still terminate with a `FAILED` report.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use reservation_sim::{CheckKind, CheckLine, Phase, Reservation, SimConfig, SimError, Simulation};

const RUN_TIMEOUT: Duration = Duration::from_secs(30);

/// Run with one extra reservation planted on flight 2's stack before any
/// worker starts.
fn run_with_planted_reservation() -> Result<reservation_sim::RunReport, SimError> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let sim = Simulation::new(SimConfig::new(3)).unwrap();
        sim.state().slots()[2]
            .stack()
            .try_push(Reservation {
                producer_id: 0,
                reservation_number: 1000,
            })
            .unwrap();
        let _ = tx.send(sim.run());
    });
    rx.recv_timeout(RUN_TIMEOUT)
        .expect("failed run did not terminate")
}

#[test]
fn surplus_reservation_fails_phase_one_and_skips_relay() {
    let Err(SimError::Invariant { violation, report }) = run_with_planted_reservation() else {
        panic!("expected a phase-1 invariant violation");
    };

    assert_eq!(violation.phase, Phase::Phase1Check);
    assert_eq!(violation.kind(), CheckKind::TotalSize);
    assert_eq!(
        violation.line,
        CheckLine::TotalSize {
            expected: 27,
            found: 28
        }
    );

    assert_eq!(report.phase, Phase::Failed);
    assert!(!report.is_done());
    assert_eq!(report.checks.len(), 1);
    assert_eq!(report.checks[0].phase(), Phase::Phase1Check);
    assert_eq!(report.stats.stacked + report.stats.queued, 27);
    assert_eq!(report.stats.inserted, 0);
    assert_eq!(report.stats.refused, 0);
    assert_eq!(report.stats.pulled, 0);
}

#[test]
fn failed_report_text_stops_after_phase_one() {
    let Err(SimError::Invariant { report, .. }) = run_with_planted_reservation() else {
        panic!("expected a phase-1 invariant violation");
    };

    let text = report.to_string();
    assert!(text.lines().all(|line| line.starts_with("phase 1: ")));
    assert!(text
        .lines()
        .any(|line| line == "phase 1: total size check: expected 27, found 28 [FAILED]"));
    assert!(text
        .lines()
        .any(|line| line == "phase 1: total keysum check: expected 378, found 1378 [FAILED]"));
}
