mod utils;

use rstest::rstest;
use sardine::{
    CapacityAssignment, DecisionModelType, Demand, DemandEntry, GroupKind, Settings,
    ThreadPinning, Timetable, TransferGraph,
};
use utils::*;

fn demand_entry(
    demand_index: usize,
    origin: usize,
    destination: usize,
    earliest_departure: i32,
    passenger_count: u64,
) -> DemandEntry {
    DemandEntry {
        demand_index,
        origin: vertex(origin),
        destination: vertex(destination),
        earliest_departure,
        passenger_count,
    }
}

#[test]
fn optimal_passengers_cross_sides_twice() {
    let timetable = forward_cross_transfer_network();
    let settings = zero_cost_settings();
    let capacities = uncapacitated(timetable.num_connections());
    let mut assignment = CapacityAssignment::new(&timetable, &capacities, settings).unwrap();

    let demand = Demand::new(vec![demand_entry(0, 0, 4, 90, 10)], &timetable).unwrap();
    let summary = assignment
        .run(&demand, &ThreadPinning::default())
        .unwrap();
    assert!(summary.converged);

    let data = assignment.assignment_data();
    assert_eq!(data.groups.len(), 1);
    assert_eq!(data.groups[0].size, 10);
    // S -> B by trip, walk over to A, ride to C, ride to T
    assert_eq!(
        data.journeys[0],
        vec![connection_id(0), connection_id(2), connection_id(4)]
    );
    assert!(data.unassigned_groups.is_empty());
    assert!(data.direct_walking_groups.is_empty());

    let counts = assignment.passenger_counts_per_connection();
    assert_eq!(counts, vec![10.0, 0.0, 10.0, 0.0, 10.0]);
}

#[test]
fn walking_dominates_slow_transit() {
    let graph = TransferGraph::new(2, &[(vertex(0), vertex(1), 5), (vertex(1), vertex(0), 5)])
        .unwrap();
    let timetable = Timetable::new(
        stops(&["O", "T"], 0),
        trips(1),
        vec![connection(0, 1, 100, 110, 0)],
        graph,
    )
    .unwrap();
    let settings = zero_cost_settings();
    let capacities = uncapacitated(1);
    let mut assignment = CapacityAssignment::new(&timetable, &capacities, settings).unwrap();

    let demand = Demand::new(vec![demand_entry(0, 0, 1, 100, 10)], &timetable).unwrap();
    // walking takes 5, the connection arrives 10 after departure
    assignment.run(&demand, &ThreadPinning::default()).unwrap();

    let data = assignment.assignment_data();
    assert_eq!(data.direct_walking_groups.len(), 1);
    assert!(data.unassigned_groups.is_empty());
    assert_eq!(assignment.passenger_counts_per_connection(), vec![0.0]);
}

#[test]
fn unreachable_demand_is_reported_not_assigned() {
    let timetable = Timetable::new(
        stops(&["A", "B", "X"], 0),
        trips(1),
        vec![connection(0, 1, 100, 200, 0)],
        TransferGraph::new(3, &[]).unwrap(),
    )
    .unwrap();
    let settings = zero_cost_settings();
    let capacities = uncapacitated(1);
    let mut assignment = CapacityAssignment::new(&timetable, &capacities, settings).unwrap();

    let demand = Demand::new(
        vec![demand_entry(0, 2, 1, 100, 5), demand_entry(1, 0, 1, 50, 5)],
        &timetable,
    )
    .unwrap();
    let summary = assignment.run(&demand, &ThreadPinning::default()).unwrap();
    assert!(summary.converged);

    let data = assignment.assignment_data();
    assert_eq!(data.unassigned_groups.len(), 1);
    let unassigned = data.filter_demand(&demand);
    assert_eq!(unassigned.len(), 1);
    assert_eq!(unassigned[0].demand_index, 0);
    // the reachable entry still loads the connection
    assert_eq!(assignment.passenger_counts_per_connection(), vec![5.0]);
}

#[test]
fn bottleneck_loads_split_roughly_by_capacity() {
    let timetable = Timetable::new(
        stops(&["A", "B"], 0),
        trips(2),
        vec![
            connection(0, 1, 100, 200, 0),
            connection(0, 1, 101, 200, 1),
        ],
        TransferGraph::new(2, &[]).unwrap(),
    )
    .unwrap();
    let settings = Settings {
        passenger_multiplier: 1,
        decision_model: DecisionModelType::Logit,
        decision_beta: 0.1,
        congestion_enter_costs: 600.0,
        congestion_travel_costs: 0.0,
        congestion_exit_costs: 0.0,
        load_factor_cutoff: 0.5,
        load_factor_switch_point: 1.0,
        load_factor_coefficient1: 8.0,
        load_factor_coefficient2: 1.0,
        max_iterations: 500,
        ..zero_cost_settings()
    };
    let capacities = vec![100.0, 50.0];
    let mut assignment = CapacityAssignment::new(&timetable, &capacities, settings).unwrap();

    let demand = Demand::new(vec![demand_entry(0, 0, 1, 50, 120)], &timetable).unwrap();
    assignment.run(&demand, &ThreadPinning::default()).unwrap();

    let counts = assignment.passenger_counts_per_connection();
    let total: f64 = counts.iter().sum();
    assert!((total - 120.0).abs() < 1e-9);
    // the smoothed loads settle even when single iterations still flap
    let loads = assignment.connection_loads();
    assert!(loads[0].load <= 100.0 + 1.0);
    assert!(loads[1].load <= 50.0 + 1.0);
    // loads settle proportionally to capacity, within 5%
    let ratio = loads[0].load / loads[1].load;
    assert!(
        (ratio - 2.0).abs() <= 0.1,
        "load ratio {} strays from the capacity ratio",
        ratio
    );

    // every passenger unit of the entry ended up in some group
    let data = assignment.assignment_data();
    let produced: u64 = data
        .groups
        .iter()
        .filter(|group| group.demand_index == 0)
        .map(|group| group.size)
        .sum();
    assert_eq!(produced, 120);
}

#[test]
fn overload_is_survived_and_reported() {
    let timetable = Timetable::new(
        stops(&["A", "B"], 0),
        trips(1),
        vec![connection(0, 1, 100, 200, 0)],
        TransferGraph::new(2, &[]).unwrap(),
    )
    .unwrap();
    let settings = zero_cost_settings();
    let capacities = vec![150.0];
    let mut assignment = CapacityAssignment::new(&timetable, &capacities, settings).unwrap();

    let demand = Demand::new(vec![demand_entry(0, 0, 1, 50, 300)], &timetable).unwrap();
    let summary = assignment.run(&demand, &ThreadPinning::default()).unwrap();
    assert!(summary.converged);

    assert_eq!(assignment.passenger_counts_per_connection(), vec![300.0]);
    let last = assignment.iteration_stats().last().unwrap();
    assert_eq!(last.overloaded_connections, 1);
    assert!((last.max_relative_overload - 2.0).abs() < 1e-9);
}

#[rstest]
#[case(DecisionModelType::Optimal, false)]
#[case(DecisionModelType::Logit, false)]
#[case(DecisionModelType::Logit, true)]
#[case(DecisionModelType::Kirchhoff, false)]
#[case(DecisionModelType::RelativeLogit, false)]
fn results_are_independent_of_thread_count(
    #[case] decision_model: DecisionModelType,
    #[case] randomized_choices: bool,
) {
    let timetable = forward_cross_transfer_network();
    let settings = Settings {
        decision_model,
        randomized_choices,
        decision_beta: 0.01,
        random_seed: 7,
        ..zero_cost_settings()
    };
    let capacities = uncapacitated(timetable.num_connections());
    let demand = Demand::new(
        vec![
            demand_entry(0, 0, 4, 90, 10),
            demand_entry(1, 2, 4, 100, 3),
            demand_entry(2, 1, 3, 90, 2),
            demand_entry(3, 0, 3, 90, 4),
        ],
        &timetable,
    )
    .unwrap();

    let mut runs = Vec::new();
    for num_threads in [1, 3] {
        let mut assignment =
            CapacityAssignment::new(&timetable, &capacities, settings.clone()).unwrap();
        assignment
            .run(&demand, &ThreadPinning::new(num_threads, 1))
            .unwrap();
        let data = assignment.assignment_data();
        let groups: Vec<(usize, u64, GroupKind)> = data
            .groups
            .iter()
            .zip(data.group_kinds())
            .map(|(group, kind)| (group.demand_index, group.size, kind))
            .collect();
        runs.push((assignment.passenger_counts_per_connection(), groups));
    }
    assert_eq!(runs[0].0, runs[1].0);
    assert_eq!(runs[0].1, runs[1].1);
}

#[test]
fn uncongested_loads_scale_linearly_with_demand() {
    let timetable = Timetable::new(
        stops(&["A", "B"], 0),
        trips(2),
        vec![
            connection(0, 1, 100, 200, 0),
            connection(0, 1, 110, 210, 1),
        ],
        TransferGraph::new(2, &[]).unwrap(),
    )
    .unwrap();
    let settings = Settings {
        passenger_multiplier: 100,
        decision_model: DecisionModelType::Logit,
        decision_beta: 0.1,
        ..zero_cost_settings()
    };
    let capacities = uncapacitated(2);

    let mut counts = Vec::new();
    for passengers in [100, 200] {
        let mut assignment =
            CapacityAssignment::new(&timetable, &capacities, settings.clone()).unwrap();
        let demand = Demand::new(
            vec![demand_entry(0, 0, 1, 50, passengers)],
            &timetable,
        )
        .unwrap();
        assignment.run(&demand, &ThreadPinning::default()).unwrap();
        counts.push(assignment.passenger_counts_per_connection());
    }
    for (small, large) in counts[0].iter().zip(&counts[1]) {
        assert!(
            (2.0 * small - large).abs() < 0.05,
            "doubling demand should double the load: {} vs {}",
            small,
            large
        );
    }
}

#[test]
fn csv_writers_produce_the_expected_columns() {
    let timetable = forward_cross_transfer_network();
    let settings = zero_cost_settings();
    let capacities = uncapacitated(timetable.num_connections());
    let mut assignment = CapacityAssignment::new(&timetable, &capacities, settings).unwrap();
    let demand = Demand::new(vec![demand_entry(0, 0, 4, 90, 10)], &timetable).unwrap();
    assignment.run(&demand, &ThreadPinning::default()).unwrap();

    let dir = std::env::temp_dir().join(format!("sardine_writer_test_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let loads_path = dir.join("connections.csv");
    assignment.write_connections_with_load(&loads_path).unwrap();
    let content = std::fs::read_to_string(&loads_path).unwrap();
    let mut lines = content.lines();
    assert_eq!(
        lines.next().unwrap(),
        "connection,departure_stop,arrival_stop,departure,arrival,trip,load"
    );
    assert_eq!(content.lines().count(), 1 + timetable.num_connections());

    let groups_path = dir.join("groups.csv");
    assignment.write_groups(&groups_path).unwrap();
    let content = std::fs::read_to_string(&groups_path).unwrap();
    assert!(content.starts_with("group,demand_index,size,kind"));
    assert!(content.contains("transit"));

    let journeys_path = dir.join("journeys.csv");
    assignment
        .write_assigned_journeys(&journeys_path, &demand)
        .unwrap();
    let content = std::fs::read_to_string(&journeys_path).unwrap();
    // three legs for the single group
    assert_eq!(content.lines().count(), 4);

    std::fs::remove_dir_all(&dir).ok();
}
