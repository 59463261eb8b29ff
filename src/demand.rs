use log::warn;

use crate::time::Time;
use crate::timetable::{Timetable, VertexId};

/// One row of the travel-demand table: a number of passengers who want to go
/// from `origin` to `destination`, ready to leave from `earliest_departure`
/// onwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemandEntry {
    pub demand_index: usize,
    pub origin: VertexId,
    pub destination: VertexId,
    pub earliest_departure: Time,
    pub passenger_count: u64,
}

#[derive(Debug, Clone)]
pub enum DemandError {
    UnknownVertex {
        demand_index: usize,
        vertex: usize,
        num_vertices: usize,
    },
}

impl std::fmt::Display for DemandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DemandError::UnknownVertex {
                demand_index,
                vertex,
                num_vertices,
            } => write!(
                f,
                "Demand entry {} references vertex {} but the network has only {} vertices",
                demand_index, vertex, num_vertices
            ),
        }
    }
}

impl std::error::Error for DemandError {}

/// The full demand table. Entries need not be sorted; partitioning and
/// ordering happen in [`SplitDemand`].
#[derive(Debug, Clone, Default)]
pub struct Demand {
    pub entries: Vec<DemandEntry>,
}

impl Demand {
    pub fn new(entries: Vec<DemandEntry>, timetable: &Timetable) -> Result<Self, DemandError> {
        let num_vertices = timetable.num_vertices();
        for entry in &entries {
            for vertex in [entry.origin, entry.destination] {
                if vertex.idx() >= num_vertices {
                    return Err(DemandError::UnknownVertex {
                        demand_index: entry.demand_index,
                        vertex: vertex.idx(),
                        num_vertices,
                    });
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn total_passengers(&self) -> u64 {
        self.entries.iter().map(|e| e.passenger_count).sum()
    }
}

/// Demand partitioned by destination vertex, each bucket sorted by earliest
/// departure time. A destination is the unit of parallel work, so buckets
/// stay untouched after construction and every iteration walks them in the
/// same order.
#[derive(Debug)]
pub struct SplitDemand {
    destinations: Vec<VertexId>,
    entries_by_destination: Vec<Vec<DemandEntry>>,
    pub rejected_departure_stop_entries: usize,
}

impl SplitDemand {
    pub fn new(demand: &Demand, timetable: &Timetable, allow_departure_stops: bool) -> Self {
        let mut bucket_of_destination = vec![usize::MAX; timetable.num_vertices()];
        let mut destinations = Vec::new();
        let mut entries_by_destination: Vec<Vec<DemandEntry>> = Vec::new();
        let mut rejected = 0;

        for entry in &demand.entries {
            if !allow_departure_stops && timetable.is_stop(entry.origin) {
                warn!(
                    "Skipping demand entry {} because its origin {} is a stop \
                     and departure stops are not allowed",
                    entry.demand_index,
                    entry.origin.idx()
                );
                rejected += 1;
                continue;
            }
            let destination = entry.destination;
            let bucket = if bucket_of_destination[destination.idx()] == usize::MAX {
                bucket_of_destination[destination.idx()] = destinations.len();
                destinations.push(destination);
                entries_by_destination.push(Vec::new());
                destinations.len() - 1
            } else {
                bucket_of_destination[destination.idx()]
            };
            entries_by_destination[bucket].push(*entry);
        }

        for bucket in &mut entries_by_destination {
            bucket.sort_by_key(|e| (e.earliest_departure, e.demand_index));
        }

        Self {
            destinations,
            entries_by_destination,
            rejected_departure_stop_entries: rejected,
        }
    }

    pub fn num_destinations(&self) -> usize {
        self.destinations.len()
    }

    pub fn destination(&self, bucket: usize) -> VertexId {
        self.destinations[bucket]
    }

    pub fn entries(&self, bucket: usize) -> &[DemandEntry] {
        &self.entries_by_destination[bucket]
    }
}
