pub mod assignment;
pub mod demand;
pub mod engine;
pub mod loads;
pub mod settings;
pub mod time;
pub mod timetable;
pub mod writer;

pub use assignment::data::{AssignmentData, GroupData, GroupId, GroupKind};
pub use assignment::{
    AssignmentError, CapacityAssignment, IterationStats, RunSummary, ThreadPinning,
};
pub use demand::{Demand, DemandEntry, SplitDemand};
pub use engine::decision::{Decision, DecisionModel};
pub use engine::pat::{ConnectionLabel, PatBuilder, PatData};
pub use loads::ConnectionLoad;
pub use settings::{DecisionModelType, DepartureTimeChoice, Settings};
pub use time::{PerceivedTime, Time, UNREACHABLE};
pub use timetable::{
    Connection, ConnectionId, StopData, StopId, Timetable, TransferGraph, TripData, TripId,
    VertexId,
};
pub use writer::WriteError;
