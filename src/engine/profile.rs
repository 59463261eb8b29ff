use crate::time::{is_unreachable, PerceivedTime, Time, UNREACHABLE};
use crate::timetable::{ConnectionId, StopId};

/// One breakpoint of a stop's profile: boarding `connection` when leaving at
/// `departure_time` yields perceived arrival time `pat`.
///
/// Evaluating the entry at an earlier time charges the extra waiting at
/// `waiting_costs` perceived seconds per second; the actual arrival time of
/// the connection does not move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileEntry {
    pub departure_time: Time,
    pub connection: ConnectionId,
    pub pat: PerceivedTime,
}

impl ProfileEntry {
    pub fn evaluate(&self, time: Time, waiting_costs: f64) -> PerceivedTime {
        if self.departure_time < time {
            return UNREACHABLE;
        }
        self.pat + waiting_costs * (self.departure_time - time) as f64
    }

    /// Entries with the same waiting-cost slope compare independently of the
    /// evaluation time; this key orders them.
    fn key(&self, waiting_costs: f64) -> f64 {
        self.pat + waiting_costs * self.departure_time as f64
    }
}

/// The lower envelope of perceived arrival time as a function of departure
/// time at one stop.
///
/// Entries are kept sorted by strictly decreasing departure time and
/// strictly decreasing key from head to tail, so the best entry catchable at
/// time `t` is the last one departing at or after `t`. The backward scan
/// inserts entries with (mostly) decreasing departure times, which makes
/// every operation an amortized tail access.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    entries: Vec<ProfileEntry>,
}

impl Profile {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[ProfileEntry] {
        &self.entries
    }

    /// The best entry among those departing at or after every stored
    /// departure time, i.e. the envelope minimum over the whole remaining
    /// scan range.
    pub fn best_entry(&self) -> Option<&ProfileEntry> {
        self.entries.last()
    }

    /// The best entry departing strictly after `time`.
    pub fn best_entry_after(&self, time: Time) -> Option<&ProfileEntry> {
        self.entries.iter().rev().find(|e| e.departure_time > time)
    }

    /// Envelope value for a passenger ready to depart at `time`.
    pub fn evaluate(&self, time: Time, waiting_costs: f64) -> PerceivedTime {
        self.entries
            .iter()
            .rev()
            .find(|e| e.departure_time >= time)
            .map(|e| e.evaluate(time, waiting_costs))
            .unwrap_or(UNREACHABLE)
    }

    /// Averages the envelope over departure times in `[time, time + max_delay]`,
    /// modeling an uncertain arrival of the feeding vehicle. Unreachable on
    /// any sub-interval means unreachable overall.
    pub fn evaluate_with_delay(
        &self,
        time: Time,
        max_delay: Time,
        waiting_costs: f64,
    ) -> PerceivedTime {
        if max_delay <= 0 {
            return self.evaluate(time, waiting_costs);
        }
        let mut index = match self.entries.iter().rposition(|e| e.departure_time >= time) {
            Some(index) => index,
            None => return UNREACHABLE,
        };
        let end = (time + max_delay) as f64;
        let mut x = time as f64;
        let mut total = 0.0;
        loop {
            let entry = &self.entries[index];
            let departure = entry.departure_time as f64;
            let segment_end = departure.min(end);
            let width = segment_end - x;
            total += width * entry.pat
                + waiting_costs * 0.5 * ((departure - x) + (departure - segment_end)) * width;
            if segment_end >= end {
                break;
            }
            if index == 0 {
                return UNREACHABLE;
            }
            index -= 1;
            x = segment_end;
        }
        total / max_delay as f64
    }

    /// Adds `entry` if it improves the envelope at its departure time,
    /// dropping entries it dominates. Returns whether the entry was kept.
    pub fn insert(&mut self, entry: ProfileEntry, waiting_costs: f64) -> bool {
        debug_assert!(!is_unreachable(entry.pat));
        let key = entry.key(waiting_costs);
        let mut pos = self.entries.len();
        while pos > 0 && self.entries[pos - 1].departure_time < entry.departure_time {
            pos -= 1;
        }
        while pos > 0
            && self.entries[pos - 1].departure_time == entry.departure_time
            && self.entries[pos - 1].key(waiting_costs) > key
        {
            self.entries.remove(pos - 1);
            pos -= 1;
        }
        if pos > 0 && self.entries[pos - 1].key(waiting_costs) <= key {
            return false;
        }
        while pos < self.entries.len() && self.entries[pos].key(waiting_costs) >= key {
            self.entries.remove(pos);
        }
        self.entries.insert(pos, entry);
        true
    }
}

/// All finalized waiting profiles of one destination, flattened into a
/// single arena with per-stop `[begin, end)` offsets.
///
/// Each stop carries a scan index so that the forward passenger walk, whose
/// query times per stop mostly increase, finds its entry in amortized
/// constant time. The index recovers gracefully when a query goes back in
/// time.
#[derive(Debug, Clone, Default)]
pub struct ProfileContainer {
    first_entry: Vec<usize>,
    entries: Vec<ProfileEntry>,
    scan_index: Vec<usize>,
}

impl ProfileContainer {
    pub fn new() -> Self {
        Self {
            first_entry: vec![0],
            entries: Vec::new(),
            scan_index: Vec::new(),
        }
    }

    pub fn begin(&self, stop: StopId) -> usize {
        self.first_entry[stop.idx()]
    }

    pub fn end(&self, stop: StopId) -> usize {
        self.first_entry[stop.idx() + 1]
    }

    pub fn size(&self, stop: StopId) -> usize {
        self.end(stop) - self.begin(stop)
    }

    pub fn entries(&self, stop: StopId) -> &[ProfileEntry] {
        &self.entries[self.begin(stop)..self.end(stop)]
    }

    pub fn reserve(&mut self, num_entries: usize) {
        self.entries.reserve(num_entries);
    }

    /// Appends `profile` as the next stop's entry range.
    pub fn add_profile(&mut self, profile: &Profile) {
        self.entries.extend_from_slice(profile.entries());
        self.scan_index.push(self.entries.len().saturating_sub(1));
        self.first_entry.push(self.entries.len());
    }

    pub fn reset_scan_index(&mut self, stop: StopId) {
        self.scan_index[stop.idx()] = self.end(stop).saturating_sub(1);
    }

    pub fn reset_scan_indices(&mut self) {
        for stop_idx in 0..self.scan_index.len() {
            self.reset_scan_index(StopId::new(stop_idx));
        }
    }

    /// The best entry at `stop` departing at or after `time`, or `None` if
    /// every stored departure is too early.
    pub fn find_entry(&mut self, stop: StopId, time: Time) -> Option<ProfileEntry> {
        let begin = self.begin(stop);
        let end = self.end(stop);
        if begin == end {
            return None;
        }
        let mut index = self.scan_index[stop.idx()];
        debug_assert!(index >= begin && index < end);
        while index + 1 < end && self.entries[index + 1].departure_time >= time {
            index += 1;
        }
        while self.entries[index].departure_time < time {
            if index == begin {
                self.scan_index[stop.idx()] = index;
                return None;
            }
            index -= 1;
        }
        self.scan_index[stop.idx()] = index;
        Some(self.entries[index])
    }

    pub fn clear(&mut self) {
        self.first_entry.clear();
        self.first_entry.push(0);
        self.entries.clear();
        self.scan_index.clear();
    }
}
