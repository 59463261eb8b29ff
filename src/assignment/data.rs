use crate::demand::{Demand, DemandEntry};
use crate::timetable::ConnectionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId {
    idx: usize,
}

impl GroupId {
    pub fn new(idx: usize) -> Self {
        Self { idx }
    }

    pub fn idx(self) -> usize {
        self.idx
    }
}

/// One group of passengers from the same demand entry who made identical
/// choices all the way. Group sizes are in passenger units, i.e. passengers
/// times the configured multiplier.
#[derive(Debug, Clone, Copy)]
pub struct GroupData {
    pub demand_index: usize,
    pub size: u64,
}

/// How a finished group reached its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// Rode at least one connection.
    Transit,
    /// Walked the whole way without entering a vehicle.
    DirectWalking,
    /// No finite perceived arrival time; carried through without loads.
    Unassigned,
}

/// The groups produced for a single destination, in a sparse form that a
/// worker can hand back cheaply. The coordinator folds these into the dense
/// [`AssignmentData`] in destination order, which keeps group ids
/// independent of thread scheduling.
#[derive(Debug, Clone, Default)]
pub struct DestinationAssignment {
    pub groups: Vec<GroupData>,
    pub journeys: Vec<Vec<ConnectionId>>,
    pub kinds: Vec<GroupKind>,
}

impl DestinationAssignment {
    pub fn push(&mut self, group: GroupData, journey: Vec<ConnectionId>, kind: GroupKind) {
        self.groups.push(group);
        self.journeys.push(journey);
        self.kinds.push(kind);
    }
}

/// Where every passenger unit ended up: the produced groups with their
/// journeys, the groups listed on every connection they traverse, and the
/// groups that never boarded anything.
#[derive(Debug, Clone, Default)]
pub struct AssignmentData {
    pub groups: Vec<GroupData>,
    /// The ordered connection sequence of each group, aligned with `groups`.
    pub journeys: Vec<Vec<ConnectionId>>,
    pub groups_per_connection: Vec<Vec<GroupId>>,
    pub unassigned_groups: Vec<GroupId>,
    pub direct_walking_groups: Vec<GroupId>,
}

impl AssignmentData {
    pub fn new(num_connections: usize) -> Self {
        Self {
            groups: Vec::new(),
            journeys: Vec::new(),
            groups_per_connection: vec![Vec::new(); num_connections],
            unassigned_groups: Vec::new(),
            direct_walking_groups: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.journeys.clear();
        for groups in &mut self.groups_per_connection {
            groups.clear();
        }
        self.unassigned_groups.clear();
        self.direct_walking_groups.clear();
    }

    /// Registers a finished group and links it onto every connection of its
    /// journey.
    pub fn add_group(
        &mut self,
        demand_index: usize,
        size: u64,
        journey: Vec<ConnectionId>,
    ) -> GroupId {
        let id = GroupId::new(self.groups.len());
        self.groups.push(GroupData { demand_index, size });
        for connection in &journey {
            self.groups_per_connection[connection.idx()].push(id);
        }
        self.journeys.push(journey);
        id
    }

    /// Passenger units traversing `connection`.
    pub fn connection_units(&self, connection: ConnectionId) -> u64 {
        self.groups_per_connection[connection.idx()]
            .iter()
            .map(|group| self.groups[group.idx()].size)
            .sum()
    }

    /// Folds one destination's groups into the dense assignment.
    pub fn absorb(&mut self, destination: DestinationAssignment) {
        let DestinationAssignment {
            groups,
            journeys,
            kinds,
        } = destination;
        for ((group, journey), kind) in groups.into_iter().zip(journeys).zip(kinds) {
            let id = self.add_group(group.demand_index, group.size, journey);
            match kind {
                GroupKind::Transit => {}
                GroupKind::DirectWalking => self.direct_walking_groups.push(id),
                GroupKind::Unassigned => self.unassigned_groups.push(id),
            }
        }
    }

    /// The kind of every group, reconstructed from the unassigned and
    /// direct-walking lists.
    pub fn group_kinds(&self) -> Vec<GroupKind> {
        let mut kinds = vec![GroupKind::Transit; self.groups.len()];
        for group in &self.direct_walking_groups {
            kinds[group.idx()] = GroupKind::DirectWalking;
        }
        for group in &self.unassigned_groups {
            kinds[group.idx()] = GroupKind::Unassigned;
        }
        kinds
    }

    /// The demand entries whose passengers could not be assigned at all,
    /// for re-running residual demand.
    pub fn filter_demand(&self, demand: &Demand) -> Vec<DemandEntry> {
        let mut unassigned_demand_indices: Vec<usize> = self
            .unassigned_groups
            .iter()
            .map(|group| self.groups[group.idx()].demand_index)
            .collect();
        unassigned_demand_indices.sort_unstable();
        unassigned_demand_indices.dedup();
        demand
            .entries
            .iter()
            .filter(|entry| unassigned_demand_indices.binary_search(&entry.demand_index).is_ok())
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn absorb_links_groups_and_keeps_classifications() {
        let mut data = AssignmentData::new(2);
        data.add_group(0, 100, vec![ConnectionId::new(0)]);

        let mut destination = DestinationAssignment::default();
        destination.push(
            GroupData {
                demand_index: 1,
                size: 50,
            },
            vec![ConnectionId::new(0), ConnectionId::new(1)],
            GroupKind::Unassigned,
        );
        destination.push(
            GroupData {
                demand_index: 2,
                size: 30,
            },
            Vec::new(),
            GroupKind::DirectWalking,
        );
        data.absorb(destination);

        assert_eq!(data.groups.len(), 3);
        assert_eq!(data.connection_units(ConnectionId::new(0)), 150);
        assert_eq!(data.connection_units(ConnectionId::new(1)), 50);
        assert_eq!(data.unassigned_groups, vec![GroupId::new(1)]);
        assert_eq!(data.direct_walking_groups, vec![GroupId::new(2)]);
        assert_eq!(data.journeys[1].len(), 2);
        assert_eq!(
            data.group_kinds(),
            vec![
                GroupKind::Transit,
                GroupKind::Unassigned,
                GroupKind::DirectWalking
            ]
        );
    }
}
