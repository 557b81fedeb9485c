//! Links between battles that share units.
//!
//! A battle depends on another when some of its units (usually cargo) are
//! also fighting in the other one. When those units die or withdraw, the
//! dependent battle is told through the graph at the moment it happens.

use std::collections::{BTreeMap, BTreeSet};

use super::context::BattleId;
use crate::board::UnitId;

pub trait DependencyGraph {
    /// Battles that rely on units fighting in `battle`.
    fn dependent_battles(&self, battle: BattleId) -> Vec<BattleId>;

    fn notify_units_lost(&mut self, dependent: BattleId, units: &[UnitId], withdrawn: bool);
}

/// Graph for a battle with no dependents.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDependencies;

impl DependencyGraph for NoDependencies {
    fn dependent_battles(&self, _battle: BattleId) -> Vec<BattleId> {
        Vec::new()
    }

    fn notify_units_lost(&mut self, _dependent: BattleId, _units: &[UnitId], _withdrawn: bool) {}
}

/// A notification delivered to a dependent battle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LostUnits {
    pub units: Vec<UnitId>,
    pub withdrawn: bool,
}

/// In-memory dependency graph that queues notifications per battle.
#[derive(Debug, Clone, Default)]
pub struct BattleTracker {
    dependents: BTreeMap<BattleId, BTreeSet<BattleId>>,
    pending: BTreeMap<BattleId, Vec<LostUnits>>,
}

impl BattleTracker {
    pub fn new() -> Self {
        BattleTracker::default()
    }

    /// Records that `dependent` cannot be fought until `blocking` resolves.
    pub fn add_dependency(&mut self, blocking: BattleId, dependent: BattleId) {
        self.dependents.entry(blocking).or_default().insert(dependent);
    }

    /// Forgets a finished battle.
    pub fn remove_battle(&mut self, battle: BattleId) {
        self.dependents.remove(&battle);
        for deps in self.dependents.values_mut() {
            deps.remove(&battle);
        }
    }

    /// Drains notifications addressed to `battle`.
    pub fn take_lost(&mut self, battle: BattleId) -> Vec<LostUnits> {
        self.pending.remove(&battle).unwrap_or_default()
    }
}

impl DependencyGraph for BattleTracker {
    fn dependent_battles(&self, battle: BattleId) -> Vec<BattleId> {
        self.dependents
            .get(&battle)
            .map(|d| d.iter().copied().collect())
            .unwrap_or_default()
    }

    fn notify_units_lost(&mut self, dependent: BattleId, units: &[UnitId], withdrawn: bool) {
        self.pending.entry(dependent).or_default().push(LostUnits {
            units: units.to_vec(),
            withdrawn,
        });
    }
}
