//! The two-flight scenario: 4 producers, capacities 4 and 6, 8 reservations
//! with key sum 36.

use reservation_sim::sim::{Validator, MIN_THREAD_STACK_SIZE};
use reservation_sim::{Phase, SimConfig, Simulation};

#[test]
fn two_flight_constants() {
    let config = SimConfig::new(2);
    assert_eq!(config.producers(), 4);
    assert_eq!(config.relayers(), 2);
    assert_eq!(config.stack_capacity(0), 4);
    assert_eq!(config.stack_capacity(1), 6);
    assert_eq!(config.expected_total(), 8);
    assert_eq!(config.expected_key_sum(), 36);
}

#[test]
fn two_flight_run_prints_passing_checks() {
    let config = SimConfig::new(2).with_thread_stack_size(MIN_THREAD_STACK_SIZE);
    let report = Simulation::new(config).unwrap().run().unwrap();
    assert_eq!(report.phase, Phase::Done);

    let text = report.to_string();
    let expected = [
        "phase 1: flight 0 stack overflow check: expected size <= 4, found 4 [ok]",
        "phase 1: flight 1 stack overflow check: expected size <= 6, found 4 [ok]",
        "phase 1: total size check: expected 8, found 8 [ok]",
        "phase 1: total keysum check: expected 36, found 36 [ok]",
        "phase 2: flight 0 stack overflow check: expected size <= 4, found 4 [ok]",
        "phase 2: flight 1 stack overflow check: expected size <= 6, found 4 [ok]",
        "phase 2: total size check: expected 8, found 8 [ok]",
        "phase 2: total keysum check: expected 36, found 36 [ok]",
        "phase 2: completion check: expected center=0 inserters=0 queued=0, \
         found center=0 inserters=0 queued=0 [ok]",
    ];
    assert_eq!(text.lines().collect::<Vec<_>>(), expected);
}

#[test]
fn three_flight_layout_after_phase_one() {
    // Capacities 7, 10, 13 against 9 reservations per flight: only flight 0
    // overflows, by two.
    let sim = Simulation::new(SimConfig::new(3)).unwrap();
    let state = sim.state();
    let config = state.config();
    for producer_id in 1..=config.producers() {
        for slot in state.slots() {
            slot.route(reservation_sim::Reservation {
                producer_id,
                reservation_number: config.reservation_number(slot.index(), producer_id),
            })
            .unwrap();
        }
    }

    let queued: Vec<usize> = state.slots().iter().map(|s| s.queue().len()).collect();
    assert_eq!(queued, vec![2, 0, 0]);
    assert!(Validator::new(state).check_phase1().passed());
    assert_eq!(Validator::new(state).prepare_relay(), 1);
}
