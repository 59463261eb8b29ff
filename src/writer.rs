use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

use crate::assignment::data::GroupKind;
use crate::assignment::CapacityAssignment;
use crate::demand::Demand;

#[derive(Debug)]
pub enum WriteError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::Io(err) => write!(f, "I/O error while writing: {}", err),
            WriteError::Csv(err) => write!(f, "CSV error while writing: {}", err),
        }
    }
}

impl std::error::Error for WriteError {}

impl From<std::io::Error> for WriteError {
    fn from(err: std::io::Error) -> Self {
        WriteError::Io(err)
    }
}

impl From<csv::Error> for WriteError {
    fn from(err: csv::Error) -> Self {
        WriteError::Csv(err)
    }
}

fn kind_name(kind: GroupKind) -> &'static str {
    match kind {
        GroupKind::Transit => "transit",
        GroupKind::DirectWalking => "direct_walking",
        GroupKind::Unassigned => "unassigned",
    }
}

#[derive(Serialize)]
struct ConnectionLoadRecord<'a> {
    connection: usize,
    departure_stop: &'a str,
    arrival_stop: &'a str,
    departure: i32,
    arrival: i32,
    trip: &'a str,
    load: f64,
}

#[derive(Serialize)]
struct AssignmentRecord {
    connection: usize,
    group: usize,
}

#[derive(Serialize)]
struct GroupRecord {
    group: usize,
    demand_index: usize,
    size: u64,
    kind: &'static str,
}

#[derive(Serialize)]
struct JourneyLegRecord<'a> {
    demand_index: usize,
    group: usize,
    size: u64,
    origin: usize,
    destination: usize,
    earliest_departure: i32,
    leg: Option<usize>,
    connection: Option<usize>,
    from_stop: Option<&'a str>,
    departure: Option<i32>,
    to_stop: Option<&'a str>,
    arrival: Option<i32>,
    trip: Option<&'a str>,
}

#[derive(Serialize)]
struct ConnectionStatisticsRecord<'a> {
    prefix: &'a str,
    connection: usize,
    departure: i32,
    arrival: i32,
    capacity: f64,
    load: f64,
    relative_load: f64,
    groups: usize,
}

impl CapacityAssignment<'_> {
    /// One row per connection with its expected passenger count.
    pub fn write_connections_with_load<P: AsRef<Path>>(&self, path: P) -> Result<(), WriteError> {
        let timetable = self.timetable();
        let mut writer = csv::Writer::from_path(path)?;
        for connection_id in timetable.connection_ids() {
            let connection = timetable.connection(connection_id);
            writer.serialize(ConnectionLoadRecord {
                connection: connection_id.idx(),
                departure_stop: &timetable.stop_data(connection.departure_stop).name,
                arrival_stop: &timetable.stop_data(connection.arrival_stop).name,
                departure: connection.departure_time,
                arrival: connection.arrival_time,
                trip: &timetable.trip_data(connection.trip).name,
                load: self.passenger_count_for_connection(connection_id),
            })?;
        }
        writer.flush()?;
        Ok(())
    }

    /// One row per (connection, group) pair, for apportionment downstream.
    pub fn write_assignment<P: AsRef<Path>>(&self, path: P) -> Result<(), WriteError> {
        let data = self.assignment_data();
        let mut writer = csv::Writer::from_path(path)?;
        for connection_id in self.timetable().connection_ids() {
            for group in &data.groups_per_connection[connection_id.idx()] {
                writer.serialize(AssignmentRecord {
                    connection: connection_id.idx(),
                    group: group.idx(),
                })?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// One row per produced group.
    pub fn write_groups<P: AsRef<Path>>(&self, path: P) -> Result<(), WriteError> {
        let data = self.assignment_data();
        let kinds = data.group_kinds();
        let mut writer = csv::Writer::from_path(path)?;
        for (index, group) in data.groups.iter().enumerate() {
            writer.serialize(GroupRecord {
                group: index,
                demand_index: group.demand_index,
                size: group.size,
                kind: kind_name(kinds[index]),
            })?;
        }
        writer.flush()?;
        Ok(())
    }

    /// One row per journey leg of every group, joined with the demand entry
    /// the group came from. Groups without legs (walking or unassigned) get
    /// a single row with empty leg columns.
    pub fn write_assigned_journeys<P: AsRef<Path>>(
        &self,
        path: P,
        demand: &Demand,
    ) -> Result<(), WriteError> {
        let timetable = self.timetable();
        let data = self.assignment_data();
        let entry_by_demand_index: HashMap<usize, &crate::demand::DemandEntry> = demand
            .entries
            .iter()
            .map(|entry| (entry.demand_index, entry))
            .collect();
        let mut writer = csv::Writer::from_path(path)?;
        for (index, group) in data.groups.iter().enumerate() {
            let entry = match entry_by_demand_index.get(&group.demand_index) {
                Some(entry) => entry,
                None => continue,
            };
            let journey = &data.journeys[index];
            if journey.is_empty() {
                writer.serialize(JourneyLegRecord {
                    demand_index: group.demand_index,
                    group: index,
                    size: group.size,
                    origin: entry.origin.idx(),
                    destination: entry.destination.idx(),
                    earliest_departure: entry.earliest_departure,
                    leg: None,
                    connection: None,
                    from_stop: None,
                    departure: None,
                    to_stop: None,
                    arrival: None,
                    trip: None,
                })?;
                continue;
            }
            for (leg, connection_id) in journey.iter().enumerate() {
                let connection = timetable.connection(*connection_id);
                writer.serialize(JourneyLegRecord {
                    demand_index: group.demand_index,
                    group: index,
                    size: group.size,
                    origin: entry.origin.idx(),
                    destination: entry.destination.idx(),
                    earliest_departure: entry.earliest_departure,
                    leg: Some(leg),
                    connection: Some(connection_id.idx()),
                    from_stop: Some(&timetable.stop_data(connection.departure_stop).name),
                    departure: Some(connection.departure_time),
                    to_stop: Some(&timetable.stop_data(connection.arrival_stop).name),
                    arrival: Some(connection.arrival_time),
                    trip: Some(&timetable.trip_data(connection.trip).name),
                })?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// One row per iteration with the convergence diagnostics.
    pub fn write_iteration_statistics<P: AsRef<Path>>(&self, path: P) -> Result<(), WriteError> {
        let mut writer = csv::Writer::from_path(path)?;
        for stats in self.iteration_stats() {
            writer.serialize(stats)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Per-connection load statistics, tagged with `prefix` so several runs
    /// can share one file.
    pub fn write_connection_statistics<P: AsRef<Path>>(
        &self,
        path: P,
        prefix: &str,
    ) -> Result<(), WriteError> {
        let timetable = self.timetable();
        let data = self.assignment_data();
        let mut writer = csv::Writer::from_path(path)?;
        for connection_id in timetable.connection_ids() {
            let connection = timetable.connection(connection_id);
            let load = self.passenger_count_for_connection(connection_id);
            let capacity = self.connection_loads()[connection_id.idx()].capacity;
            writer.serialize(ConnectionStatisticsRecord {
                prefix,
                connection: connection_id.idx(),
                departure: connection.departure_time,
                arrival: connection.arrival_time,
                capacity,
                load,
                relative_load: load / capacity,
                groups: data.groups_per_connection[connection_id.idx()].len(),
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}
