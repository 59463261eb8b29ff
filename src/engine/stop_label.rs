use crate::engine::profile::{Profile, ProfileEntry};
use crate::time::{PerceivedTime, Time};
use crate::timetable::ConnectionId;

/// Per-stop state of the backward profile computation.
///
/// The *waiting* profile covers connections boardable while already at the
/// stop. The *transfer* profile covers the same connections as seen from an
/// arriving vehicle or a walking neighbor: its entries are shifted earlier
/// by the walking time and the transfer buffer, and their perceived arrival
/// times carry the corresponding walking and waiting weights.
#[derive(Debug, Clone, Default)]
pub struct StopLabel {
    waiting: Profile,
    transfer: Profile,
}

impl StopLabel {
    pub fn new() -> Self {
        Self {
            waiting: Profile::new(),
            transfer: Profile::new(),
        }
    }

    pub fn clear(&mut self) {
        self.waiting.clear();
        self.transfer.clear();
    }

    pub fn waiting_profile(&self) -> &Profile {
        &self.waiting
    }

    /// Best waiting entry over the remaining scan range. During the backward
    /// scan every stored entry departs at or after the connection currently
    /// being processed.
    pub fn skip_entry(&self) -> Option<&ProfileEntry> {
        self.waiting.best_entry()
    }

    /// Best waiting alternative departing strictly after `time`, for the
    /// branch where boarding at `time` fails.
    pub fn failure_entry(&self, time: Time) -> Option<&ProfileEntry> {
        self.waiting.best_entry_after(time)
    }

    pub fn evaluate_with_delay(
        &self,
        time: Time,
        max_delay: Time,
        waiting_costs: f64,
    ) -> PerceivedTime {
        self.transfer.evaluate_with_delay(time, max_delay, waiting_costs)
    }

    pub fn add_waiting_entry(
        &mut self,
        departure_time: Time,
        connection: ConnectionId,
        pat: PerceivedTime,
        waiting_costs: f64,
    ) -> bool {
        self.waiting.insert(
            ProfileEntry {
                departure_time,
                connection,
                pat,
            },
            waiting_costs,
        )
    }

    /// Registers `connection` as reachable from this stop by walking
    /// `walk_time` seconds and then waiting out `buffer_time`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_transfer_entry(
        &mut self,
        departure_time: Time,
        connection: ConnectionId,
        pat: PerceivedTime,
        walk_time: Time,
        buffer_time: Time,
        walking_costs: f64,
        waiting_costs: f64,
    ) -> bool {
        let entry = ProfileEntry {
            departure_time: departure_time - walk_time - buffer_time,
            connection,
            pat: pat + walking_costs * walk_time as f64 + waiting_costs * buffer_time as f64,
        };
        self.transfer.insert(entry, waiting_costs)
    }
}
