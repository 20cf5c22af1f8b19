//! Settings groups
//!
//! Zones bound to the same group share a policy. With
//! `only_enter_once_exited_all` set, an occupant may only be recorded
//! inside one zone of the group at a time: entering another zone is
//! held back until every other membership in the group has ended. The
//! held-back entry is not queued; the next evaluation simply tries again.

use crate::membership::Occupant;
use crate::registry::ZoneId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Tunable policy of a settings group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsGroupProperties {
    /// Hold back entries while the occupant is inside another zone of the
    /// group
    pub only_enter_once_exited_all: bool,
}

impl Default for SettingsGroupProperties {
    fn default() -> Self {
        Self {
            only_enter_once_exited_all: true,
        }
    }
}

/// A named policy and the occupancy of the zones bound to it
#[derive(Debug, Clone)]
pub struct SettingsGroup {
    name: String,
    properties: SettingsGroupProperties,
    occupancy: BTreeMap<Occupant, BTreeSet<ZoneId>>,
}

impl SettingsGroup {
    fn new(name: &str, properties: SettingsGroupProperties) -> Self {
        Self {
            name: name.to_string(),
            properties,
            occupancy: BTreeMap::new(),
        }
    }

    /// Unique group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current policy
    pub fn properties(&self) -> SettingsGroupProperties {
        self.properties
    }

    /// Zones of this group `occupant` is recorded inside
    pub fn zones_containing(&self, occupant: &Occupant) -> impl Iterator<Item = ZoneId> + '_ {
        self.occupancy.get(occupant).into_iter().flatten().copied()
    }
}

/// Registry-wide view of every settings group
#[derive(Debug, Clone, Default)]
pub struct GroupCoordinator {
    groups: BTreeMap<String, SettingsGroup>,
}

impl GroupCoordinator {
    /// Create a coordinator with no groups
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update a group
    pub fn set_group(&mut self, name: &str, properties: SettingsGroupProperties) {
        match self.groups.get_mut(name) {
            Some(group) => group.properties = properties,
            None => {
                self.groups
                    .insert(name.to_string(), SettingsGroup::new(name, properties));
            }
        }
    }

    /// Look up a group, creating it with default properties if needed
    pub fn group_or_default(&mut self, name: &str) -> &SettingsGroup {
        self.groups
            .entry(name.to_string())
            .or_insert_with(|| SettingsGroup::new(name, SettingsGroupProperties::default()))
    }

    /// Look up a group without creating it
    pub fn group(&self, name: &str) -> Option<&SettingsGroup> {
        self.groups.get(name)
    }

    /// Every group, in name order
    pub fn groups(&self) -> impl Iterator<Item = &SettingsGroup> + '_ {
        self.groups.values()
    }

    /// Ask to record `occupant` entering `zone`
    ///
    /// Returns false when the group's policy holds the entry back. A
    /// granted entry is recorded in the group's occupancy.
    pub fn try_enter(&mut self, name: &str, occupant: Occupant, zone: ZoneId) -> bool {
        let group = self
            .groups
            .entry(name.to_string())
            .or_insert_with(|| SettingsGroup::new(name, SettingsGroupProperties::default()));

        let zones = group.occupancy.entry(occupant).or_default();
        if group.properties.only_enter_once_exited_all && zones.iter().any(|&other| other != zone) {
            return false;
        }
        zones.insert(zone);
        true
    }

    /// Record `occupant` leaving `zone`
    pub fn exit(&mut self, name: &str, occupant: &Occupant, zone: ZoneId) {
        if let Some(group) = self.groups.get_mut(name) {
            if let Some(zones) = group.occupancy.get_mut(occupant) {
                zones.remove(&zone);
                if zones.is_empty() {
                    group.occupancy.remove(occupant);
                }
            }
        }
    }

    /// Forget all occupancy, keeping groups and their properties
    ///
    /// The registry rebuilds occupancy from every zone's membership before
    /// each evaluation pass, so untracking, destroying and rebinding never
    /// leave stale entries behind.
    pub fn clear_occupancy(&mut self) {
        for group in self.groups.values_mut() {
            group.occupancy.clear();
        }
    }

    /// Record an existing membership without applying the policy
    pub fn occupy(&mut self, name: &str, occupant: Occupant, zone: ZoneId) {
        if let Some(group) = self.groups.get_mut(name) {
            group.occupancy.entry(occupant).or_default().insert(zone);
        }
    }
}
