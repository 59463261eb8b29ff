use log::info;

use crate::time::Time;

pub mod transfer_graph;

pub use transfer_graph::{TransferEdge, TransferGraph, TransferGraphError};

/// A vertex of the walking graph. Stops form the prefix `[0, num_stops)` of
/// the vertex range; the remaining vertices are pure walking vertices which
/// carry no timetable events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VertexId {
    idx: usize,
}

impl VertexId {
    pub fn new(idx: usize) -> Self {
        Self { idx }
    }

    pub fn idx(self) -> usize {
        self.idx
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StopId {
    idx: usize,
}

impl StopId {
    pub fn new(idx: usize) -> Self {
        Self { idx }
    }

    pub fn idx(self) -> usize {
        self.idx
    }
}

impl From<StopId> for VertexId {
    fn from(stop: StopId) -> Self {
        VertexId::new(stop.idx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TripId {
    idx: usize,
}

impl TripId {
    pub fn new(idx: usize) -> Self {
        Self { idx }
    }

    pub fn idx(self) -> usize {
        self.idx
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId {
    idx: usize,
}

impl ConnectionId {
    pub fn new(idx: usize) -> Self {
        Self { idx }
    }

    pub fn idx(self) -> usize {
        self.idx
    }
}

/// An elementary timetable event: one vehicle driving from one stop to the
/// next without intermediate halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub departure_stop: StopId,
    pub arrival_stop: StopId,
    pub departure_time: Time,
    pub arrival_time: Time,
    pub trip: TripId,
}

#[derive(Debug, Clone)]
pub struct StopData {
    pub name: String,
    pub min_transfer_time: Time,
}

#[derive(Debug, Clone)]
pub struct TripData {
    pub name: String,
}

#[derive(Debug, Clone)]
pub enum TimetableError {
    ConnectionsNotSorted {
        index: usize,
    },
    DepartureAfterArrival {
        index: usize,
    },
    InvalidStop {
        index: usize,
        stop: usize,
    },
    InvalidTrip {
        index: usize,
        trip: usize,
    },
    NegativeMinTransferTime {
        stop: usize,
        min_transfer_time: Time,
    },
    TripNotChained {
        index: usize,
    },
    TransferGraphTooSmall {
        num_vertices: usize,
        num_stops: usize,
    },
}

impl std::fmt::Display for TimetableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use TimetableError::*;
        match self {
            ConnectionsNotSorted { index } => write!(
                f,
                "Connection {} departs before its predecessor; connections must be \
                 sorted by (departure time, arrival time, trip)",
                index
            ),
            DepartureAfterArrival { index } => {
                write!(f, "Connection {} arrives before it departs", index)
            }
            InvalidStop { index, stop } => {
                write!(f, "Connection {} references unknown stop {}", index, stop)
            }
            InvalidTrip { index, trip } => {
                write!(f, "Connection {} references unknown trip {}", index, trip)
            }
            NegativeMinTransferTime {
                stop,
                min_transfer_time,
            } => write!(
                f,
                "Stop {} has negative minimum transfer time {}",
                stop, min_transfer_time
            ),
            TripNotChained { index } => write!(
                f,
                "Connection {} does not continue its trip where the previous \
                 connection of the trip ended",
                index
            ),
            TransferGraphTooSmall {
                num_vertices,
                num_stops,
            } => write!(
                f,
                "The transfer graph has {} vertices but the timetable has {} stops",
                num_vertices, num_stops
            ),
        }
    }
}

impl std::error::Error for TimetableError {}

/// Read-only view of a schedule-based network: stops, trips, the globally
/// time-sorted connection array and the walking graph between vertices.
#[derive(Debug, Clone)]
pub struct Timetable {
    stops: Vec<StopData>,
    trips: Vec<TripData>,
    connections: Vec<Connection>,
    /// For each connection, the next connection of the same trip, if any.
    next_in_trip: Vec<Option<ConnectionId>>,
    transfer_graph: TransferGraph,
}

impl Timetable {
    /// Validates the input and derives the per-trip connection chain.
    ///
    /// Connections must arrive globally sorted by
    /// `(departure_time, arrival_time, trip)` and every trip's connections
    /// must form a chain in space and time.
    pub fn new(
        stops: Vec<StopData>,
        trips: Vec<TripData>,
        connections: Vec<Connection>,
        transfer_graph: TransferGraph,
    ) -> Result<Self, TimetableError> {
        if transfer_graph.num_vertices() < stops.len() {
            return Err(TimetableError::TransferGraphTooSmall {
                num_vertices: transfer_graph.num_vertices(),
                num_stops: stops.len(),
            });
        }
        for (idx, stop) in stops.iter().enumerate() {
            if stop.min_transfer_time < 0 {
                return Err(TimetableError::NegativeMinTransferTime {
                    stop: idx,
                    min_transfer_time: stop.min_transfer_time,
                });
            }
        }

        let mut last_of_trip: Vec<Option<usize>> = vec![None; trips.len()];
        let mut next_in_trip: Vec<Option<ConnectionId>> = vec![None; connections.len()];
        for (index, connection) in connections.iter().enumerate() {
            for stop in [connection.departure_stop, connection.arrival_stop] {
                if stop.idx() >= stops.len() {
                    return Err(TimetableError::InvalidStop {
                        index,
                        stop: stop.idx(),
                    });
                }
            }
            if connection.trip.idx() >= trips.len() {
                return Err(TimetableError::InvalidTrip {
                    index,
                    trip: connection.trip.idx(),
                });
            }
            if connection.departure_time > connection.arrival_time {
                return Err(TimetableError::DepartureAfterArrival { index });
            }
            if index > 0 {
                let previous = &connections[index - 1];
                let previous_key = (
                    previous.departure_time,
                    previous.arrival_time,
                    previous.trip.idx(),
                );
                let key = (
                    connection.departure_time,
                    connection.arrival_time,
                    connection.trip.idx(),
                );
                if key < previous_key {
                    return Err(TimetableError::ConnectionsNotSorted { index });
                }
            }
            if let Some(previous_index) = last_of_trip[connection.trip.idx()] {
                let previous = &connections[previous_index];
                if previous.arrival_stop != connection.departure_stop
                    || previous.arrival_time > connection.departure_time
                {
                    return Err(TimetableError::TripNotChained { index });
                }
                next_in_trip[previous_index] = Some(ConnectionId::new(index));
            }
            last_of_trip[connection.trip.idx()] = Some(index);
        }

        info!(
            "Timetable with {} stops, {} trips, {} connections, {} walking edges",
            stops.len(),
            trips.len(),
            connections.len(),
            transfer_graph.num_edges()
        );

        Ok(Self {
            stops,
            trips,
            connections,
            next_in_trip,
            transfer_graph,
        })
    }

    pub fn num_stops(&self) -> usize {
        self.stops.len()
    }

    pub fn num_trips(&self) -> usize {
        self.trips.len()
    }

    pub fn num_connections(&self) -> usize {
        self.connections.len()
    }

    pub fn num_vertices(&self) -> usize {
        self.transfer_graph.num_vertices()
    }

    pub fn is_stop(&self, vertex: VertexId) -> bool {
        vertex.idx() < self.stops.len()
    }

    /// The stop behind `vertex`, if `vertex` is a stop.
    pub fn stop_at(&self, vertex: VertexId) -> Option<StopId> {
        self.is_stop(vertex).then(|| StopId::new(vertex.idx()))
    }

    pub fn stop_data(&self, stop: StopId) -> &StopData {
        &self.stops[stop.idx()]
    }

    pub fn trip_data(&self, trip: TripId) -> &TripData {
        &self.trips[trip.idx()]
    }

    pub fn min_transfer_time(&self, stop: StopId) -> Time {
        self.stops[stop.idx()].min_transfer_time
    }

    pub fn connection(&self, id: ConnectionId) -> &Connection {
        &self.connections[id.idx()]
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn connection_ids(&self) -> impl Iterator<Item = ConnectionId> {
        (0..self.connections.len()).map(ConnectionId::new)
    }

    pub fn stop_ids(&self) -> impl Iterator<Item = StopId> {
        (0..self.stops.len()).map(StopId::new)
    }

    /// The connection the vehicle serves right after `id`, if the trip
    /// continues.
    pub fn next_in_trip(&self, id: ConnectionId) -> Option<ConnectionId> {
        self.next_in_trip[id.idx()]
    }

    pub fn transfer_graph(&self) -> &TransferGraph {
        &self.transfer_graph
    }
}
