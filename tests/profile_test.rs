mod utils;

use sardine::{PatBuilder, StopId};
use utils::*;

#[test]
fn forward_cross_transfers_profile() {
    let timetable = forward_cross_transfer_network();
    let reverse = timetable.transfer_graph().reverse();
    let settings = zero_cost_settings();
    let loads = uncapacitated_loads(timetable.num_connections());
    let mut builder = PatBuilder::new(&timetable, &reverse, &settings, &loads);

    // destination T
    let pat_data = builder.run(vertex(4));

    let profile = pat_data.profiles.entries(StopId::new(0));
    assert_eq!(profile.len(), 2);
    // departing at 101 rides via A, walks over to B and arrives at 125
    assert_eq!(profile[0].departure_time, 101);
    assert_eq!(profile[0].pat, 125.0);
    // departing at 100 rides via B, walks over to A, changes at C, arrives at 120
    assert_eq!(profile[1].departure_time, 100);
    assert_eq!(profile[1].pat, 120.0);
}

#[test]
fn backward_cross_transfers_profile() {
    let timetable = backward_cross_transfer_network();
    let reverse = timetable.transfer_graph().reverse();
    let settings = zero_cost_settings();
    let loads = uncapacitated_loads(timetable.num_connections());
    let mut builder = PatBuilder::new(&timetable, &reverse, &settings, &loads);

    // destination S
    let pat_data = builder.run(vertex(0));

    let profile = pat_data.profiles.entries(StopId::new(4));
    assert_eq!(profile.len(), 2);
    assert_eq!(profile[0].departure_time, 105);
    assert_eq!(profile[0].pat, 125.0);
    assert_eq!(profile[1].departure_time, 100);
    assert_eq!(profile[1].pat, 124.0);
}

#[test]
fn best_pat_is_the_better_of_boarding_and_skipping() {
    let timetable = forward_cross_transfer_network();
    let reverse = timetable.transfer_graph().reverse();
    let settings = zero_cost_settings();
    let loads = uncapacitated_loads(timetable.num_connections());
    let mut builder = PatBuilder::new(&timetable, &reverse, &settings, &loads);
    let pat_data = builder.run(vertex(4));

    for label in &pat_data.connection_labels {
        assert_eq!(label.best_pat(), label.hop_on_pat.min(label.skip_pat));
        assert!(label.best_pat() <= label.skip_pat);
    }
}

#[test]
fn waiting_profiles_are_monotone_envelopes() {
    let timetable = forward_cross_transfer_network();
    let reverse = timetable.transfer_graph().reverse();
    let settings = zero_cost_settings();
    let loads = uncapacitated_loads(timetable.num_connections());
    let mut builder = PatBuilder::new(&timetable, &reverse, &settings, &loads);
    let pat_data = builder.run(vertex(4));

    for stop in timetable.stop_ids() {
        let entries = pat_data.profiles.entries(stop);
        for pair in entries.windows(2) {
            // strictly decreasing departure times from head to tail
            assert!(pair[0].departure_time > pair[1].departure_time);
            // without waiting costs, later insertions must strictly improve
            assert!(pair[0].pat > pair[1].pat);
        }
    }
}

#[test]
fn every_connection_is_scanned_exactly_once() {
    let timetable = forward_cross_transfer_network();
    let reverse = timetable.transfer_graph().reverse();
    let settings = zero_cost_settings();
    let loads = uncapacitated_loads(timetable.num_connections());
    let mut builder = PatBuilder::new(&timetable, &reverse, &settings, &loads);
    builder.run(vertex(4));
    assert_eq!(
        builder.statistics.connections_scanned,
        timetable.num_connections() as u64
    );
    // a second run resets the counters instead of accumulating
    builder.run(vertex(0));
    assert_eq!(
        builder.statistics.connections_scanned,
        timetable.num_connections() as u64
    );
}
