use crate::timetable::{ConnectionId, Timetable};

#[derive(Debug, Clone, Copy, Default)]
pub struct CycleRemovalStats {
    pub removed_cycles: u64,
    pub removed_connections: u64,
}

impl CycleRemovalStats {
    pub fn merge(&mut self, other: &CycleRemovalStats) {
        self.removed_cycles += other.removed_cycles;
        self.removed_connections += other.removed_connections;
    }
}

/// Cuts loops out of a journey: whenever a connection arrives at a stop the
/// journey already departed from, everything from that departure up to and
/// including the arriving connection is dropped. The journey stays
/// connected because the passenger is back at the very stop the removed
/// part started from.
pub fn remove_cycles(journey: &mut Vec<ConnectionId>, timetable: &Timetable) -> CycleRemovalStats {
    let mut stats = CycleRemovalStats::default();
    let mut scan_from = 0;
    'scan: while scan_from < journey.len() {
        for j in scan_from..journey.len() {
            let arrival_stop = timetable.connection(journey[j]).arrival_stop;
            for i in 0..=j {
                if timetable.connection(journey[i]).departure_stop == arrival_stop {
                    stats.removed_cycles += 1;
                    stats.removed_connections += (j - i + 1) as u64;
                    journey.drain(i..=j);
                    scan_from = i;
                    continue 'scan;
                }
            }
        }
        break;
    }
    stats
}
