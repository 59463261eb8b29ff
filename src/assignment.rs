use log::{debug, info};
use rayon::prelude::*;

pub mod data;

use crate::demand::{Demand, SplitDemand};
use crate::engine::cycle_removal::CycleRemovalStats;
use crate::engine::decision::{self, DecisionModel};
use crate::engine::pat::ScanStatistics;
use crate::engine::worker::{AssignmentWorker, WorkerOutput};
use crate::loads::ConnectionLoad;
use crate::settings::{Settings, SettingsError};
use crate::timetable::{ConnectionId, Timetable, TransferGraph};
use data::AssignmentData;

/// Thread-pool shape for one run: how many workers and how they spread over
/// the machine's cores. With a `pin_multiplier` of 2 on a hyperthreaded
/// box, workers land on distinct physical cores.
#[derive(Debug, Clone, Copy)]
pub struct ThreadPinning {
    pub num_threads: usize,
    pub pin_multiplier: usize,
}

impl Default for ThreadPinning {
    fn default() -> Self {
        Self {
            num_threads: 1,
            pin_multiplier: 1,
        }
    }
}

impl ThreadPinning {
    pub fn new(num_threads: usize, pin_multiplier: usize) -> Self {
        Self {
            num_threads,
            pin_multiplier,
        }
    }

    #[cfg(target_os = "linux")]
    fn pin_current_thread(&self, thread_index: usize) {
        let num_cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let core = (thread_index * self.pin_multiplier) % num_cores;
        unsafe {
            let mut cpu_set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut cpu_set);
            libc::CPU_SET(core, &mut cpu_set);
            libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &cpu_set);
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn pin_current_thread(&self, _thread_index: usize) {}
}

/// Progress of one iteration, as reported after the loads were compared
/// against the previous iteration.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct IterationStats {
    pub iteration: usize,
    pub unfinished_connections: usize,
    pub overloaded_connections: usize,
    pub max_relative_diff: f64,
    pub max_relative_overload: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub converged: bool,
    pub iterations: usize,
    pub unfinished_connections: usize,
}

#[derive(Debug)]
pub enum AssignmentError {
    Settings(SettingsError),
    CapacityCount {
        expected: usize,
        got: usize,
    },
    NonPositiveCapacity {
        connection: usize,
        capacity: f64,
    },
    ThreadPool(String),
}

impl std::fmt::Display for AssignmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use AssignmentError::*;
        match self {
            Settings(err) => write!(f, "Invalid settings: {}", err),
            CapacityCount { expected, got } => write!(
                f,
                "Expected one capacity per connection ({}), got {}",
                expected, got
            ),
            NonPositiveCapacity {
                connection,
                capacity,
            } => write!(
                f,
                "Connection {} has non-positive capacity {}",
                connection, capacity
            ),
            ThreadPool(message) => write!(f, "Could not build the thread pool: {}", message),
        }
    }
}

impl std::error::Error for AssignmentError {}

impl From<SettingsError> for AssignmentError {
    fn from(err: SettingsError) -> Self {
        AssignmentError::Settings(err)
    }
}

/// The fixed-point iteration: build profiles and walk demand per
/// destination in parallel, merge the produced groups, smooth the loads
/// with the running average and repeat until every connection settles.
pub struct CapacityAssignment<'a> {
    timetable: &'a Timetable,
    reverse_graph: TransferGraph,
    settings: Settings,
    decision_model: Box<dyn DecisionModel>,
    loads: Vec<ConnectionLoad>,
    assignment_data: AssignmentData,
    iteration_stats: Vec<IterationStats>,
    cycle_stats: CycleRemovalStats,
    scan_statistics: ScanStatistics,
}

impl<'a> CapacityAssignment<'a> {
    pub fn new(
        timetable: &'a Timetable,
        capacities: &[f64],
        settings: Settings,
    ) -> Result<Self, AssignmentError> {
        settings.validate()?;
        if capacities.len() != timetable.num_connections() {
            return Err(AssignmentError::CapacityCount {
                expected: timetable.num_connections(),
                got: capacities.len(),
            });
        }
        for (connection, &capacity) in capacities.iter().enumerate() {
            if !(capacity > 0.0) {
                return Err(AssignmentError::NonPositiveCapacity {
                    connection,
                    capacity,
                });
            }
        }
        let decision_model = decision::from_settings(&settings);
        let loads = capacities
            .iter()
            .map(|&capacity| ConnectionLoad::new(capacity))
            .collect();
        Ok(Self {
            timetable,
            reverse_graph: timetable.transfer_graph().reverse(),
            settings,
            decision_model,
            loads,
            assignment_data: AssignmentData::new(timetable.num_connections()),
            iteration_stats: Vec::new(),
            cycle_stats: CycleRemovalStats::default(),
            scan_statistics: ScanStatistics::default(),
        })
    }

    pub fn run(&mut self, demand: &Demand, pinning: &ThreadPinning) -> Result<RunSummary, AssignmentError> {
        let split = SplitDemand::new(demand, self.timetable, self.settings.allow_departure_stops);
        info!(
            "Assigning {} demand entries towards {} destinations on {} threads",
            demand.entries.len(),
            split.num_destinations(),
            pinning.num_threads.max(1)
        );

        let pool = {
            let pinning = *pinning;
            rayon::ThreadPoolBuilder::new()
                .num_threads(pinning.num_threads.max(1))
                .start_handler(move |thread_index| pinning.pin_current_thread(thread_index))
                .build()
                .map_err(|err| AssignmentError::ThreadPool(err.to_string()))?
        };

        for load in &mut self.loads {
            load.load = 0.0;
        }
        self.iteration_stats.clear();
        self.scan_statistics = ScanStatistics::default();

        let mut converged = false;
        let mut iteration = 0;
        while iteration < self.settings.max_iterations {
            iteration += 1;
            info!("Iteration {}", iteration);

            let timetable = self.timetable;
            let reverse_graph = &self.reverse_graph;
            let settings = &self.settings;
            let loads = &self.loads;
            let decision_model = self.decision_model.as_ref();
            let split_ref = &split;
            // Guided dynamic scheduling over destinations: rayon steals
            // buckets one by one, outputs come back in destination order.
            let outputs: Vec<WorkerOutput> = pool.install(|| {
                (0..split_ref.num_destinations())
                    .into_par_iter()
                    .with_min_len(1)
                    .map_init(
                        || {
                            AssignmentWorker::new(
                                timetable,
                                reverse_graph,
                                settings,
                                loads,
                                decision_model,
                            )
                        },
                        |worker, bucket| {
                            worker.run(split_ref.destination(bucket), split_ref.entries(bucket))
                        },
                    )
                    .collect()
            });

            self.assignment_data.clear();
            self.cycle_stats = CycleRemovalStats::default();
            for output in outputs {
                self.assignment_data.absorb(output.assignment);
                self.cycle_stats.merge(&output.cycle_stats);
                self.scan_statistics.merge(&output.scan_statistics);
            }

            let stats = self.update_connection_load(iteration);
            self.iteration_stats.push(stats);
            if stats.unfinished_connections == 0 {
                converged = true;
                break;
            }
        }

        let unfinished_connections = self
            .iteration_stats
            .last()
            .map(|stats| stats.unfinished_connections)
            .unwrap_or(0);
        if !converged {
            info!(
                "Stopped after {} iterations with {} unfinished connections",
                iteration, unfinished_connections
            );
        }
        Ok(RunSummary {
            converged,
            iterations: iteration,
            unfinished_connections,
        })
    }

    /// Compares the fresh loads against the smoothed ones, then applies the
    /// running average `((k - 1) * old + new) / k` unless everything
    /// settled.
    fn update_connection_load(&mut self, iteration: usize) -> IterationStats {
        let multiplier = self.settings.passenger_multiplier as f64;
        let mut stats = IterationStats {
            iteration,
            unfinished_connections: 0,
            overloaded_connections: 0,
            max_relative_diff: 0.0,
            max_relative_overload: 0.0,
        };
        let mut new_loads = Vec::with_capacity(self.loads.len());
        for connection in self.timetable.connection_ids() {
            let new_load = self.assignment_data.connection_units(connection) as f64 / multiplier;
            let load = &self.loads[connection.idx()];
            let diff = (new_load - load.load).abs() / load.capacity;
            stats.max_relative_diff = stats.max_relative_diff.max(diff);
            if diff >= self.settings.convergence_limit {
                stats.unfinished_connections += 1;
            }
            if new_load > load.capacity {
                stats.overloaded_connections += 1;
                stats.max_relative_overload =
                    stats.max_relative_overload.max(new_load / load.capacity);
            }
            new_loads.push(new_load);
        }
        debug!(
            "Unfinished connections: {}/{}, max relative diff {:.4}, \
             overloaded {}, max relative overload {:.4}",
            stats.unfinished_connections,
            self.timetable.num_connections(),
            stats.max_relative_diff,
            stats.overloaded_connections,
            stats.max_relative_overload
        );
        if stats.unfinished_connections > 0 {
            for (load, new_load) in self.loads.iter_mut().zip(new_loads) {
                load.load = ((iteration - 1) as f64 * load.load + new_load) / iteration as f64;
            }
        }
        stats
    }

    pub fn timetable(&self) -> &Timetable {
        self.timetable
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn assignment_data(&self) -> &AssignmentData {
        &self.assignment_data
    }

    pub fn connection_loads(&self) -> &[ConnectionLoad] {
        &self.loads
    }

    /// Expected passengers on `connection`, i.e. assigned units scaled back
    /// by the passenger multiplier.
    pub fn passenger_count_for_connection(&self, connection: ConnectionId) -> f64 {
        self.assignment_data.connection_units(connection) as f64
            / self.settings.passenger_multiplier as f64
    }

    pub fn passenger_counts_per_connection(&self) -> Vec<f64> {
        self.timetable
            .connection_ids()
            .map(|connection| self.passenger_count_for_connection(connection))
            .collect()
    }

    pub fn removed_cycles(&self) -> u64 {
        self.cycle_stats.removed_cycles
    }

    pub fn removed_cycle_connections(&self) -> u64 {
        self.cycle_stats.removed_connections
    }

    pub fn iteration_stats(&self) -> &[IterationStats] {
        &self.iteration_stats
    }

    pub fn scan_statistics(&self) -> &ScanStatistics {
        &self.scan_statistics
    }
}
