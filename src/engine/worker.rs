use log::trace;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::assignment::data::{DestinationAssignment, GroupData, GroupKind};
use crate::demand::DemandEntry;
use crate::engine::cycle_removal::{remove_cycles, CycleRemovalStats};
use crate::engine::decision::{split_units, DecisionModel};
use crate::engine::pat::{PatBuilder, PatData, ScanStatistics};
use crate::loads::ConnectionLoad;
use crate::settings::Settings;
use crate::time::{is_unreachable, PerceivedTime, Time, UNREACHABLE};
use crate::timetable::{ConnectionId, StopId, Timetable, TransferGraph, VertexId};

/// Everything one destination produced: the groups with their journeys plus
/// the counters of the backward scan and the cycle removal.
#[derive(Debug)]
pub struct WorkerOutput {
    pub assignment: DestinationAssignment,
    pub cycle_stats: CycleRemovalStats,
    pub scan_statistics: ScanStatistics,
}

/// Where a passenger group currently is during the forward walk.
#[derive(Debug, Clone, Copy)]
enum GroupState {
    /// Ready to board at `stop`, no earlier than `time`.
    AtStop { stop: StopId, time: Time },
    /// Onboard, about to traverse `connection`.
    OnTrip { connection: ConnectionId },
}

#[derive(Debug)]
struct ActiveGroup {
    units: u64,
    journey: Vec<ConnectionId>,
    state: GroupState,
}

/// What a group can do at a decision point.
#[derive(Debug, Clone, Copy)]
enum Move {
    /// Walk straight to the destination and end the journey.
    WalkToTarget,
    /// Board the given connection.
    Board(ConnectionId),
    /// Let the recommended connection go and wait at the stop.
    Wait { stop: StopId, time: Time },
    /// Stay onboard through the given connection.
    Stay(ConnectionId),
    /// Walk to a neighboring stop (or wait out this stop's buffer) and be
    /// ready to board there from `time` on.
    Transfer { stop: StopId, time: Time },
}

/// Assigns the demand of one destination at a time by walking passenger
/// groups forward through the profiles built by the backward scan.
///
/// The worker owns all its scratch state; the coordinator creates one per
/// rayon worker thread and feeds it destinations.
pub struct AssignmentWorker<'a> {
    timetable: &'a Timetable,
    settings: &'a Settings,
    decision_model: &'a dyn DecisionModel,
    pat_builder: PatBuilder<'a>,
}

impl<'a> AssignmentWorker<'a> {
    pub fn new(
        timetable: &'a Timetable,
        reverse_graph: &'a TransferGraph,
        settings: &'a Settings,
        loads: &'a [ConnectionLoad],
        decision_model: &'a dyn DecisionModel,
    ) -> Self {
        Self {
            timetable,
            settings,
            decision_model,
            pat_builder: PatBuilder::new(timetable, reverse_graph, settings, loads),
        }
    }

    /// Builds the destination's profiles and walks all its demand entries,
    /// which arrive sorted by earliest departure time.
    pub fn run(&mut self, destination: VertexId, entries: &[DemandEntry]) -> WorkerOutput {
        let mut pat_data = self.pat_builder.run(destination);
        // One generator per destination, so results do not depend on how
        // destinations are spread over threads.
        let mut rng = StdRng::seed_from_u64(
            self.settings
                .random_seed
                ^ (destination.idx() as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15),
        );
        let mut output = WorkerOutput {
            assignment: DestinationAssignment::default(),
            cycle_stats: CycleRemovalStats::default(),
            scan_statistics: self.pat_builder.statistics,
        };
        for entry in entries {
            debug_assert_eq!(entry.destination, destination);
            self.assign_entry(&mut pat_data, entry, &mut rng, &mut output);
        }
        trace!(
            "Destination {}: {} groups from {} demand entries",
            destination.idx(),
            output.assignment.groups.len(),
            entries.len()
        );
        output
    }

    fn assign_entry(
        &mut self,
        pat_data: &mut PatData,
        entry: &DemandEntry,
        rng: &mut StdRng,
        output: &mut WorkerOutput,
    ) {
        let units = entry.passenger_count * self.settings.passenger_multiplier;
        if units == 0 {
            return;
        }

        // The initial decision: walk all the way, start at the origin stop,
        // or walk to a neighboring stop first.
        let mut values: Vec<PerceivedTime> = Vec::new();
        let mut moves: Vec<Move> = Vec::new();
        values.push(pat_data.target_pat(entry.origin, entry.earliest_departure));
        moves.push(Move::WalkToTarget);
        if let Some(stop) = self.timetable.stop_at(entry.origin) {
            values.push(self.stop_value(pat_data, stop, entry.earliest_departure));
            moves.push(Move::Transfer {
                stop,
                time: entry.earliest_departure,
            });
        }
        for edge in self.timetable.transfer_graph().edges_from(entry.origin) {
            let stop = match self.timetable.stop_at(edge.to) {
                Some(stop) => stop,
                None => continue,
            };
            let ready = entry.earliest_departure + edge.travel_time;
            let value = self.stop_value(pat_data, stop, ready)
                + self.settings.walking_costs * edge.travel_time as f64;
            values.push(value);
            moves.push(Move::Transfer { stop, time: ready });
        }

        if values.iter().copied().all(is_unreachable) {
            output.assignment.push(
                GroupData {
                    demand_index: entry.demand_index,
                    size: units,
                },
                Vec::new(),
                GroupKind::Unassigned,
            );
            return;
        }

        let mut queue: Vec<ActiveGroup> = Vec::new();
        let decision = self
            .decision_model
            .decide(&values, entry.earliest_departure, rng);
        for (share, one_move) in split_units(units, &decision).into_iter().zip(&moves) {
            if share == 0 {
                continue;
            }
            self.enact(
                *one_move,
                share,
                Vec::new(),
                entry,
                &mut queue,
                output,
            );
        }

        while let Some(group) = queue.pop() {
            match group.state {
                GroupState::AtStop { stop, time } => {
                    self.decide_at_stop(pat_data, group, stop, time, entry, rng, &mut queue, output);
                }
                GroupState::OnTrip { connection } => {
                    self.decide_on_arrival(pat_data, group, connection, entry, rng, &mut queue, output);
                }
            }
        }
    }

    /// Envelope value of entering `stop` no earlier than `time`.
    fn stop_value(&self, pat_data: &mut PatData, stop: StopId, time: Time) -> PerceivedTime {
        pat_data
            .profiles
            .find_entry(stop, time)
            .map(|e| e.evaluate(time, self.settings.waiting_costs))
            .unwrap_or(UNREACHABLE)
    }

    /// Perceived arrival time of staying onboard through `connection`,
    /// reconstructed from the connection's label. Somebody already seated
    /// pays the congestion travel cost but not the boarding cost.
    fn stay_value(&self, pat_data: &PatData, connection: ConnectionId) -> PerceivedTime {
        let label = &pat_data.connection_labels[connection.idx()];
        let c = self.timetable.connection(connection);
        let settings = self.settings;
        let enter = label.load_factor * settings.congestion_enter_costs;
        let travel = label.load_factor
            * (c.arrival_time - c.departure_time) as f64
            * settings.congestion_travel_costs;
        let exit = label.load_factor * settings.congestion_exit_costs;
        let full = enter + travel + exit;
        let travel_pat = label.trip_pat + enter + travel;
        let walking_pat = pat_data.target_pat(c.arrival_stop.into(), c.arrival_time) + full;
        let transfer_pat = label.transfer_pat + full;
        let value = travel_pat.min(walking_pat).min(transfer_pat);
        if is_unreachable(value) {
            UNREACHABLE
        } else {
            value - enter
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn decide_at_stop(
        &mut self,
        pat_data: &mut PatData,
        group: ActiveGroup,
        stop: StopId,
        time: Time,
        entry: &DemandEntry,
        rng: &mut StdRng,
        queue: &mut Vec<ActiveGroup>,
        output: &mut WorkerOutput,
    ) {
        let settings = self.settings;
        let recommended = pat_data.profiles.find_entry(stop, time);

        let mut values: Vec<PerceivedTime> = Vec::new();
        let mut moves: Vec<Move> = Vec::new();
        values.push(pat_data.target_pat(stop.into(), time));
        moves.push(Move::WalkToTarget);
        if let Some(profile_entry) = recommended {
            values.push(profile_entry.evaluate(time, settings.waiting_costs));
            moves.push(Move::Board(profile_entry.connection));
            let wait_from = profile_entry.departure_time + 1;
            if let Some(next_entry) = pat_data.profiles.find_entry(stop, wait_from) {
                values.push(next_entry.evaluate(time, settings.waiting_costs));
                moves.push(Move::Wait {
                    stop,
                    time: wait_from,
                });
            }
        }

        if values.iter().copied().all(is_unreachable) {
            // Stranded: the snapshot offers nothing from here. The journey
            // so far keeps its loads, the group counts as unassigned.
            self.finish(group.units, group.journey, true, entry, output);
            return;
        }

        let decision = self.decision_model.decide(&values, time, rng);
        let shares = split_units(group.units, &decision);
        self.spread(shares, &moves, group.journey, entry, queue, output);
    }

    #[allow(clippy::too_many_arguments)]
    fn decide_on_arrival(
        &mut self,
        pat_data: &mut PatData,
        group: ActiveGroup,
        connection: ConnectionId,
        entry: &DemandEntry,
        rng: &mut StdRng,
        queue: &mut Vec<ActiveGroup>,
        output: &mut WorkerOutput,
    ) {
        let settings = self.settings;
        let c = *self.timetable.connection(connection);
        let stop = c.arrival_stop;
        let time = c.arrival_time;
        let buffer = self.timetable.min_transfer_time(stop);

        let mut values: Vec<PerceivedTime> = Vec::new();
        let mut moves: Vec<Move> = Vec::new();

        values.push(pat_data.target_pat(stop.into(), time));
        moves.push(Move::WalkToTarget);

        if let Some(next) = self.timetable.next_in_trip(connection) {
            values.push(self.stay_value(pat_data, next));
            moves.push(Move::Stay(next));
        }

        let reboard_ready = time + buffer;
        let reboard_value = self.stop_value(pat_data, stop, reboard_ready)
            + settings.waiting_costs * buffer as f64;
        values.push(reboard_value);
        moves.push(Move::Transfer {
            stop,
            time: reboard_ready,
        });

        for edge in self.timetable.transfer_graph().edges_from(stop.into()) {
            let neighbor = match self.timetable.stop_at(edge.to) {
                Some(neighbor) => neighbor,
                None => continue,
            };
            let neighbor_buffer = if settings.use_transfer_buffer_times {
                buffer
            } else {
                0
            };
            let ready = time + edge.travel_time + neighbor_buffer;
            let value = self.stop_value(pat_data, neighbor, ready)
                + settings.walking_costs * edge.travel_time as f64
                + settings.waiting_costs * neighbor_buffer as f64;
            values.push(value);
            moves.push(Move::Transfer {
                stop: neighbor,
                time: ready,
            });
        }

        if values.iter().copied().all(is_unreachable) {
            self.finish(group.units, group.journey, true, entry, output);
            return;
        }

        let decision = self.decision_model.decide(&values, time, rng);
        let shares = split_units(group.units, &decision);
        self.spread(shares, &moves, group.journey, entry, queue, output);
    }

    /// Hands each positive share its move. The journey is cloned for all
    /// but the last active branch.
    fn spread(
        &mut self,
        shares: Vec<u64>,
        moves: &[Move],
        journey: Vec<ConnectionId>,
        entry: &DemandEntry,
        queue: &mut Vec<ActiveGroup>,
        output: &mut WorkerOutput,
    ) {
        let Some(last_active) = shares.iter().rposition(|&share| share > 0) else {
            return;
        };
        let mut remaining = Some(journey);
        for (index, (&share, one_move)) in shares.iter().zip(moves).enumerate() {
            if share == 0 {
                continue;
            }
            let journey = if index == last_active {
                remaining.take().unwrap_or_default()
            } else {
                remaining.clone().unwrap_or_default()
            };
            self.enact(*one_move, share, journey, entry, queue, output);
        }
    }

    fn enact(
        &mut self,
        one_move: Move,
        units: u64,
        mut journey: Vec<ConnectionId>,
        entry: &DemandEntry,
        queue: &mut Vec<ActiveGroup>,
        output: &mut WorkerOutput,
    ) {
        match one_move {
            Move::WalkToTarget => {
                self.finish(units, journey, false, entry, output);
            }
            Move::Board(connection) | Move::Stay(connection) => {
                journey.push(connection);
                // A journey longer than the connection array must contain
                // loops (possible with zero-duration connections); end it
                // and let the cycle removal trim it.
                if journey.len() > self.timetable.num_connections() {
                    self.finish(units, journey, false, entry, output);
                    return;
                }
                queue.push(ActiveGroup {
                    units,
                    journey,
                    state: GroupState::OnTrip { connection },
                });
            }
            Move::Wait { stop, time } | Move::Transfer { stop, time } => {
                queue.push(ActiveGroup {
                    units,
                    journey,
                    state: GroupState::AtStop { stop, time },
                });
            }
        }
    }

    /// Ends a group's walk, removing loops from its journey first.
    fn finish(
        &mut self,
        units: u64,
        mut journey: Vec<ConnectionId>,
        stranded: bool,
        entry: &DemandEntry,
        output: &mut WorkerOutput,
    ) {
        let never_boarded = journey.is_empty();
        let stats = remove_cycles(&mut journey, self.timetable);
        output.cycle_stats.merge(&stats);
        let kind = if stranded {
            GroupKind::Unassigned
        } else if never_boarded {
            GroupKind::DirectWalking
        } else {
            GroupKind::Transit
        };
        output.assignment.push(
            GroupData {
                demand_index: entry.demand_index,
                size: units,
            },
            journey,
            kind,
        );
    }
}
