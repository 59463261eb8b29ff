use log::trace;

use crate::engine::profile::ProfileContainer;
use crate::engine::stop_label::StopLabel;
use crate::loads::ConnectionLoad;
use crate::settings::Settings;
use crate::time::{is_unreachable, PerceivedTime, Time, UNREACHABLE};
use crate::timetable::{Timetable, TransferGraph, VertexId};

/// Everything the backward scan learned about one connection.
///
/// `trip_pat` is the perceived arrival time of somebody who is already
/// sitting in the vehicle when it serves this connection and stays onboard
/// past it. `transfer_pat` and `failure_transfer_pat` are the raw transfer
/// evaluations at the arrival respectively departure stop, without
/// congestion terms. `hop_on_pat` is the boarding value including the
/// failure branch; `skip_pat` the value of letting the vehicle go.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLabel {
    pub trip_pat: PerceivedTime,
    pub transfer_pat: PerceivedTime,
    pub failure_transfer_pat: PerceivedTime,
    pub hop_on_pat: PerceivedTime,
    pub skip_pat: PerceivedTime,
    pub load_factor: f64,
}

impl Default for ConnectionLabel {
    fn default() -> Self {
        Self {
            trip_pat: UNREACHABLE,
            transfer_pat: UNREACHABLE,
            failure_transfer_pat: UNREACHABLE,
            hop_on_pat: UNREACHABLE,
            skip_pat: UNREACHABLE,
            load_factor: 0.0,
        }
    }
}

impl ConnectionLabel {
    pub fn best_pat(&self) -> PerceivedTime {
        self.hop_on_pat.min(self.skip_pat)
    }
}

/// Counters of a backward scan, kept for diagnostics. The builder resets
/// them at the start of every run; the coordinator merges them across
/// destinations and iterations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanStatistics {
    pub connections_scanned: u64,
    pub profile_entries_added: u64,
    pub edges_relaxed: u64,
}

impl ScanStatistics {
    pub fn merge(&mut self, other: &ScanStatistics) {
        self.connections_scanned += other.connections_scanned;
        self.profile_entries_added += other.profile_entries_added;
        self.edges_relaxed += other.edges_relaxed;
    }
}

/// The outcome of one backward scan: per-stop waiting profiles, per-vertex
/// walking distances to the destination and per-connection labels. Built
/// once per (destination, iteration) and read-only during the matching
/// forward pass.
#[derive(Debug)]
pub struct PatData {
    pub target: VertexId,
    pub profiles: ProfileContainer,
    pub transfer_distance_to_target: Vec<PerceivedTime>,
    pub connection_labels: Vec<ConnectionLabel>,
}

impl PatData {
    /// Perceived arrival time of walking straight to the destination from
    /// `vertex` at `time`.
    pub fn target_pat(&self, vertex: VertexId, time: Time) -> PerceivedTime {
        let distance = self.transfer_distance_to_target[vertex.idx()];
        if is_unreachable(distance) {
            UNREACHABLE
        } else {
            time as f64 + distance
        }
    }
}

/// Builds [`PatData`] for one destination with one reverse sweep over the
/// connection array, against a fixed snapshot of connection loads.
///
/// The builder owns its scratch state so that a worker can reuse it across
/// destinations without reallocating.
pub struct PatBuilder<'a> {
    timetable: &'a Timetable,
    reverse_graph: &'a TransferGraph,
    settings: &'a Settings,
    loads: &'a [ConnectionLoad],
    trip_pat: Vec<PerceivedTime>,
    stop_labels: Vec<StopLabel>,
    load_factor_correction: f64,
    pub statistics: ScanStatistics,
}

impl<'a> PatBuilder<'a> {
    pub fn new(
        timetable: &'a Timetable,
        reverse_graph: &'a TransferGraph,
        settings: &'a Settings,
        loads: &'a [ConnectionLoad],
    ) -> Self {
        debug_assert_eq!(loads.len(), timetable.num_connections());
        let load_factor_correction = {
            let shifted = settings.load_factor_switch_point - settings.load_factor_cutoff;
            settings.load_factor_coefficient1 * shifted * shifted
                - settings.load_factor_coefficient2
        };
        Self {
            timetable,
            reverse_graph,
            settings,
            loads,
            trip_pat: vec![UNREACHABLE; timetable.num_trips()],
            stop_labels: vec![StopLabel::new(); timetable.num_stops()],
            load_factor_correction,
            statistics: ScanStatistics::default(),
        }
    }

    /// Congestion multiplier for the given relative load: zero below the
    /// cutoff, quadratic up to the switch point, exponential beyond, with
    /// the exponential branch shifted to join the quadratic one continuously.
    pub fn load_factor(&self, relative_load: f64) -> f64 {
        let settings = self.settings;
        if relative_load <= settings.load_factor_cutoff {
            0.0
        } else if relative_load <= settings.load_factor_switch_point {
            let shifted = relative_load - settings.load_factor_cutoff;
            settings.load_factor_coefficient1 * shifted * shifted
        } else {
            settings.load_factor_coefficient2
                * (relative_load - settings.load_factor_switch_point).exp()
                + self.load_factor_correction
        }
    }

    pub fn run(&mut self, target: VertexId) -> PatData {
        let timetable = self.timetable;
        let settings = self.settings;
        let reverse_graph = self.reverse_graph;
        self.statistics = ScanStatistics::default();
        self.clear();

        let mut transfer_distance = vec![UNREACHABLE; timetable.num_vertices()];
        for edge in reverse_graph.edges_from(target) {
            transfer_distance[edge.to.idx()] =
                (1.0 + settings.walking_costs) * edge.travel_time as f64;
            self.statistics.edges_relaxed += 1;
        }
        transfer_distance[target.idx()] = 0.0;

        let mut labels = vec![ConnectionLabel::default(); timetable.num_connections()];

        for (index, connection) in timetable.connections().iter().enumerate().rev() {
            self.statistics.connections_scanned += 1;
            let connection_id = crate::timetable::ConnectionId::new(index);
            let departure_stop = connection.departure_stop;
            let arrival_stop = connection.arrival_stop;

            let skip_entry = self.stop_labels[departure_stop.idx()].skip_entry().copied();
            if let Some(entry) = &skip_entry {
                debug_assert!(
                    entry.departure_time >= connection.departure_time,
                    "connections scanned out of order"
                );
            }

            let load_factor = self.load_factor(self.loads[index].relative_load());
            let travel_time = connection.arrival_time - connection.departure_time;
            let enter_cost = load_factor * settings.congestion_enter_costs;
            let travel_cost = load_factor * travel_time as f64 * settings.congestion_travel_costs;
            let exit_cost = load_factor * settings.congestion_exit_costs;
            let full_load_cost = enter_cost + travel_cost + exit_cost;

            let label = &mut labels[index];
            label.load_factor = load_factor;
            label.trip_pat = self.trip_pat[connection.trip.idx()];
            label.transfer_pat = self.stop_labels[arrival_stop.idx()].evaluate_with_delay(
                connection.arrival_time,
                settings.max_delay,
                settings.waiting_costs,
            ) + settings.transfer_costs;
            label.failure_transfer_pat = self.stop_labels[departure_stop.idx()]
                .evaluate_with_delay(
                    connection.departure_time,
                    settings.max_delay,
                    settings.waiting_costs,
                )
                + settings.transfer_costs;
            label.skip_pat = skip_entry
                .map(|e| e.evaluate(connection.departure_time, settings.waiting_costs))
                .unwrap_or(UNREACHABLE);

            let travel_pat = label.trip_pat + enter_cost + travel_cost;
            let walking_pat = {
                let distance = transfer_distance[arrival_stop.idx()];
                if is_unreachable(distance) {
                    UNREACHABLE
                } else {
                    connection.arrival_time as f64 + distance + full_load_cost
                }
            };
            let transfer_pat = label.transfer_pat + full_load_cost;
            let pat = travel_pat.min(walking_pat).min(transfer_pat);

            self.trip_pat[connection.trip.idx()] = if is_unreachable(pat) {
                UNREACHABLE
            } else {
                pat - enter_cost
            };
            if is_unreachable(pat) {
                continue;
            }

            let failure_target_pat = {
                let distance = transfer_distance[departure_stop.idx()];
                if is_unreachable(distance) {
                    UNREACHABLE
                } else {
                    connection.departure_time as f64 + distance
                }
            };
            let next_pat = self.stop_labels[departure_stop.idx()]
                .failure_entry(connection.departure_time)
                .map(|e| e.evaluate(connection.departure_time, settings.waiting_costs))
                .unwrap_or(UNREACHABLE);
            let stranding_pat =
                pat + (1.0 + settings.waiting_costs) * settings.stranding_waiting_time as f64;
            let failure_pat = failure_target_pat.min(next_pat).min(stranding_pat);
            let boarding_probability = self.loads[index].boarding_probability();
            let expected_pat = boarding_probability * pat
                + (1.0 - boarding_probability) * (failure_pat + settings.failure_costs);
            label.hop_on_pat = expected_pat;

            if expected_pat >= label.skip_pat {
                continue;
            }

            let buffer_time = timetable.min_transfer_time(departure_stop);
            let added = self.stop_labels[departure_stop.idx()].add_waiting_entry(
                connection.departure_time,
                connection_id,
                expected_pat,
                settings.waiting_costs,
            );
            debug_assert!(added, "an entry better than the skip entry must improve");
            self.statistics.profile_entries_added += 1;
            self.stop_labels[departure_stop.idx()].add_transfer_entry(
                connection.departure_time,
                connection_id,
                expected_pat,
                0,
                buffer_time,
                settings.walking_costs,
                settings.waiting_costs,
            );
            for edge in reverse_graph.edges_from(departure_stop.into()) {
                let neighbor = match timetable.stop_at(edge.to) {
                    Some(stop) => stop,
                    None => continue,
                };
                let neighbor_buffer = if settings.use_transfer_buffer_times {
                    buffer_time
                } else {
                    0
                };
                self.stop_labels[neighbor.idx()].add_transfer_entry(
                    connection.departure_time,
                    connection_id,
                    expected_pat,
                    edge.travel_time,
                    neighbor_buffer,
                    settings.walking_costs,
                    settings.waiting_costs,
                );
                self.statistics.edges_relaxed += 1;
            }
        }

        let mut profiles = ProfileContainer::new();
        let num_entries: usize = self
            .stop_labels
            .iter()
            .map(|label| label.waiting_profile().len())
            .sum();
        profiles.reserve(num_entries);
        for label in &self.stop_labels {
            profiles.add_profile(label.waiting_profile());
        }
        profiles.reset_scan_indices();

        trace!(
            "Built profiles towards vertex {} with {} entries",
            target.idx(),
            num_entries
        );

        PatData {
            target,
            profiles,
            transfer_distance_to_target: transfer_distance,
            connection_labels: labels,
        }
    }

    fn clear(&mut self) {
        for pat in &mut self.trip_pat {
            *pat = UNREACHABLE;
        }
        for label in &mut self.stop_labels {
            label.clear();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::timetable::{Connection, StopData, StopId, TripData, TripId};

    fn build_timetable(connections: Vec<Connection>, num_stops: usize) -> Timetable {
        let stops = (0..num_stops)
            .map(|i| StopData {
                name: format!("stop {}", i),
                min_transfer_time: 0,
            })
            .collect();
        let num_trips = connections
            .iter()
            .map(|c| c.trip.idx() + 1)
            .max()
            .unwrap_or(0);
        let trips = (0..num_trips)
            .map(|i| TripData {
                name: format!("trip {}", i),
            })
            .collect();
        Timetable::new(
            stops,
            trips,
            connections,
            TransferGraph::new(num_stops, &[]).unwrap(),
        )
        .unwrap()
    }

    fn uncongested(n: usize) -> Vec<ConnectionLoad> {
        vec![ConnectionLoad::new(1000.0); n]
    }

    #[test]
    fn load_factor_is_continuous_at_the_switch_point() {
        let timetable = build_timetable(Vec::new(), 1);
        let reverse = timetable.transfer_graph().reverse();
        let settings = Settings::default();
        let loads = uncongested(0);
        let builder = PatBuilder::new(&timetable, &reverse, &settings, &loads);
        let switch = settings.load_factor_switch_point;
        let below = builder.load_factor(switch - 1e-9);
        let above = builder.load_factor(switch + 1e-9);
        assert!((below - above).abs() < 1e-6);
        assert_eq!(builder.load_factor(settings.load_factor_cutoff), 0.0);
        assert!(builder.load_factor(2.0) > builder.load_factor(1.5));
    }

    #[test]
    fn single_connection_reaches_the_target() {
        let connection = Connection {
            departure_stop: StopId::new(0),
            arrival_stop: StopId::new(1),
            departure_time: 100,
            arrival_time: 200,
            trip: TripId::new(0),
        };
        let timetable = build_timetable(vec![connection], 2);
        let reverse = timetable.transfer_graph().reverse();
        let settings = Settings {
            waiting_costs: 0.0,
            transfer_costs: 0.0,
            max_delay: 0,
            ..Settings::default()
        };
        let loads = uncongested(1);
        let mut builder = PatBuilder::new(&timetable, &reverse, &settings, &loads);
        let pat_data = builder.run(VertexId::new(1));

        let label = &pat_data.connection_labels[0];
        assert_eq!(label.hop_on_pat, 200.0);
        assert!(is_unreachable(label.skip_pat));
        assert_eq!(label.best_pat(), 200.0);

        let entries = pat_data.profiles.entries(StopId::new(0));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].departure_time, 100);
        assert_eq!(entries[0].pat, 200.0);
        assert!(pat_data.profiles.entries(StopId::new(1)).is_empty());

        assert_eq!(pat_data.target_pat(VertexId::new(1), 50), 50.0);
        assert!(is_unreachable(pat_data.target_pat(VertexId::new(0), 50)));
    }

    #[test]
    fn overloaded_connection_carries_the_failure_branch() {
        let connection = Connection {
            departure_stop: StopId::new(0),
            arrival_stop: StopId::new(1),
            departure_time: 100,
            arrival_time: 200,
            trip: TripId::new(0),
        };
        let timetable = build_timetable(vec![connection], 2);
        let reverse = timetable.transfer_graph().reverse();
        let settings = Settings {
            waiting_costs: 0.0,
            transfer_costs: 0.0,
            max_delay: 0,
            ..Settings::default()
        };
        let mut loads = uncongested(1);
        loads[0] = ConnectionLoad {
            capacity: 100.0,
            load: 200.0,
        };
        let mut builder = PatBuilder::new(&timetable, &reverse, &settings, &loads);
        let pat_data = builder.run(VertexId::new(1));

        let label = &pat_data.connection_labels[0];
        // boarding succeeds half the time; the rest strands and pays the
        // failure penalty, so the expectation exceeds the plain arrival
        assert!(label.hop_on_pat > 200.0);
        assert!(!is_unreachable(label.hop_on_pat));
        assert!(label.load_factor > 0.0);
    }
}
