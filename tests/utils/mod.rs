#![allow(dead_code)]

use sardine::{
    Connection, ConnectionId, ConnectionLoad, Settings, StopData, StopId, Time, Timetable,
    TransferGraph, TripData, TripId, VertexId,
};

pub fn stops(names: &[&str], min_transfer_time: Time) -> Vec<StopData> {
    names
        .iter()
        .map(|name| StopData {
            name: name.to_string(),
            min_transfer_time,
        })
        .collect()
}

pub fn trips(count: usize) -> Vec<TripData> {
    (0..count)
        .map(|i| TripData {
            name: format!("trip {}", i),
        })
        .collect()
}

pub fn connection(from: usize, to: usize, dep: Time, arr: Time, trip: usize) -> Connection {
    Connection {
        departure_stop: StopId::new(from),
        arrival_stop: StopId::new(to),
        departure_time: dep,
        arrival_time: arr,
        trip: TripId::new(trip),
    }
}

pub fn connection_id(idx: usize) -> ConnectionId {
    ConnectionId::new(idx)
}

pub fn vertex(idx: usize) -> VertexId {
    VertexId::new(idx)
}

/// Settings under which the perceived arrival time of a journey equals its
/// plain arrival time: no waiting, walking or transfer weights, no delay
/// window. Congestion settings keep their defaults and only matter once a
/// load snapshot says so.
pub fn zero_cost_settings() -> Settings {
    Settings {
        passenger_multiplier: 1,
        waiting_costs: 0.0,
        walking_costs: 0.0,
        transfer_costs: 0.0,
        max_delay: 0,
        ..Settings::default()
    }
}

pub fn uncapacitated_loads(num_connections: usize) -> Vec<ConnectionLoad> {
    vec![ConnectionLoad::new(1.0e9); num_connections]
}

pub fn uncapacitated(num_connections: usize) -> Vec<f64> {
    vec![1.0e9; num_connections]
}

/// Five stops S, A, B, C, T with a walking link between A and B (two
/// minutes, through a contracted hub) and five single-connection trips.
/// Going from S towards T, the fast journey changes sides twice: depart at
/// 100 via B, walk to A, ride to C, arrive 120; or depart at 101 via A,
/// walk to B, arrive 125.
pub fn forward_cross_transfer_network() -> Timetable {
    let graph = TransferGraph::new(
        5,
        &[(vertex(1), vertex(2), 2), (vertex(2), vertex(1), 2)],
    )
    .unwrap();
    Timetable::new(
        stops(&["S", "A", "B", "C", "T"], 5),
        trips(5),
        vec![
            connection(0, 2, 100, 105, 1),
            connection(0, 1, 101, 105, 0),
            connection(1, 3, 108, 110, 2),
            connection(2, 4, 108, 125, 4),
            connection(3, 4, 118, 120, 3),
        ],
        graph,
    )
    .unwrap()
}

/// The mirrored network: all connections run towards S, and the profile is
/// built for destination S with demand starting at T.
pub fn backward_cross_transfer_network() -> Timetable {
    let graph = TransferGraph::new(
        5,
        &[(vertex(1), vertex(2), 2), (vertex(2), vertex(1), 2)],
    )
    .unwrap();
    Timetable::new(
        stops(&["S", "A", "B", "C", "T"], 5),
        trips(5),
        vec![
            connection(4, 2, 100, 117, 4),
            connection(4, 3, 105, 107, 3),
            connection(3, 1, 115, 117, 2),
            connection(1, 0, 120, 124, 0),
            connection(2, 0, 120, 125, 1),
        ],
        graph,
    )
    .unwrap()
}
