/// A point in time, in seconds since an arbitrary epoch (typically midnight
/// of the service day). Connections, demand and transfer durations all share
/// this unit.
pub type Time = i32;

/// A perceived arrival time: an arrival time inflated by per-second weights
/// on waiting, walking and transferring, plus fixed penalties. Stored as a
/// plain float so that the unreachable sentinel propagates through sums and
/// minima without special cases.
pub type PerceivedTime = f64;

/// Sentinel for "the destination cannot be reached from here".
pub const UNREACHABLE: PerceivedTime = f64::INFINITY;

pub fn is_unreachable(pat: PerceivedTime) -> bool {
    pat >= UNREACHABLE
}
