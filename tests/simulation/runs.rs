//! Full runs for small `A`, checked against the closed-form invariants.

use reservation_sim::sim::{CheckKind, CheckLine, MIN_THREAD_STACK_SIZE};
use reservation_sim::{Phase, RunReport, SimConfig, Simulation};

fn run(flights: u32) -> RunReport {
    let config = SimConfig::new(flights).with_thread_stack_size(MIN_THREAD_STACK_SIZE);
    Simulation::new(config)
        .expect("valid config")
        .run()
        .unwrap_or_else(|err| panic!("A={flights}: {err}"))
}

fn line(report: &RunReport, phase: usize, kind: CheckKind) -> CheckLine {
    *report.checks[phase]
        .lines()
        .iter()
        .find(|line| line.kind() == kind)
        .unwrap_or_else(|| panic!("missing {kind:?} line"))
}

#[test]
fn small_runs_reach_done() {
    for flights in 1..=4 {
        let report = run(flights);
        let config = SimConfig::new(flights);

        assert_eq!(report.phase, Phase::Done, "A={flights}\n{report}");
        assert_eq!(report.checks.len(), 2);
        assert_eq!(report.checks[0].phase(), Phase::Phase1Check);
        assert_eq!(report.checks[1].phase(), Phase::Phase2Check);

        for phase in 0..2 {
            assert_eq!(
                line(&report, phase, CheckKind::TotalSize),
                CheckLine::TotalSize {
                    expected: config.expected_total(),
                    found: config.expected_total(),
                }
            );
            assert_eq!(
                line(&report, phase, CheckKind::KeySum),
                CheckLine::KeySum {
                    expected: config.expected_key_sum(),
                    found: config.expected_key_sum(),
                }
            );
            let overflow_lines = report.checks[phase]
                .lines()
                .iter()
                .filter(|line| line.kind() == CheckKind::Overflow)
                .count();
            assert_eq!(overflow_lines, flights as usize);
        }
    }
}

#[test]
fn phase_two_drains_everything_it_relays() {
    for flights in 2..=4 {
        let report = run(flights);
        let stats = report.stats;

        assert_eq!(stats.stacked + stats.queued, SimConfig::new(flights).expected_total());
        assert_eq!(stats.inserted, stats.queued, "A={flights}");
        assert_eq!(stats.pulled, stats.inserted, "A={flights}");
        assert_eq!(stats.refused, 0);
        assert_eq!(
            line(&report, 1, CheckKind::Completion),
            CheckLine::Completion {
                center: 0,
                inserters: 0,
                queued: 0,
            }
        );
    }
}

#[test]
fn repeated_runs_are_stable() {
    for _ in 0..16 {
        assert!(run(3).is_done());
    }
}
