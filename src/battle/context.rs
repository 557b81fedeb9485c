//! Shared battle state.
//!
//! `BattleContext` is the single value every step reads and writes: the
//! battle's identity, the current round, each side's unit partitions and the
//! kill list. Every unit assigned to the battle sits in exactly one partition
//! at a time (live, waiting-to-die, retreated or sidelined on its side, the
//! global killed list, or the attacker's bombarding group) so the census
//! always matches the number of units assigned.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{BattleError, Result};
use crate::board::{Side, TerritoryId, Unit, UnitCatalog, UnitId, UnitType, BOTH_SIDES, INERT};

/// Unique identity of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BattleId(pub Uuid);

impl BattleId {
    pub fn new() -> Self {
        BattleId(Uuid::new_v4())
    }
}

impl Default for BattleId {
    fn default() -> Self {
        BattleId::new()
    }
}

impl fmt::Display for BattleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a battle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BattleStatus {
    #[default]
    InProgress,
    AttackerWon,
    DefenderWon,
    Draw,
    Cancelled,
    Aborted,
}

impl BattleStatus {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, BattleStatus::InProgress)
    }

    /// Status for the side that won.
    pub const fn won_by(side: Side) -> BattleStatus {
        match side {
            Side::Attacker => BattleStatus::AttackerWon,
            Side::Defender => BattleStatus::DefenderWon,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            BattleStatus::InProgress => "in-progress",
            BattleStatus::AttackerWon => "attacker-won",
            BattleStatus::DefenderWon => "defender-won",
            BattleStatus::Draw => "draw",
            BattleStatus::Cancelled => "cancelled",
            BattleStatus::Aborted => "aborted",
        }
    }
}

/// One side's unit partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideUnits {
    pub live: Vec<UnitId>,
    /// Hit this round, not yet removed; may still fire.
    pub waiting_to_die: Vec<UnitId>,
    /// Left the battle by retreating or submerging.
    pub retreated: Vec<UnitId>,
    /// Still at the site but unable to take part.
    pub sidelined: Vec<UnitId>,
    /// Total cost of this side's destroyed units.
    pub lost_value: u32,
}

impl SideUnits {
    /// Live units followed by those waiting to die.
    pub fn live_and_waiting(&self) -> Vec<UnitId> {
        let mut all = self.live.clone();
        all.extend_from_slice(&self.waiting_to_die);
        all
    }

    fn census(&self) -> usize {
        self.live.len() + self.waiting_to_die.len() + self.retreated.len() + self.sidelined.len()
    }

    fn detach(&mut self, id: UnitId) -> bool {
        let before = self.census();
        self.live.retain(|u| *u != id);
        self.waiting_to_die.retain(|u| *u != id);
        self.sidelined.retain(|u| *u != id);
        before != self.census()
    }
}

/// The state shared by every step of one battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleContext {
    pub id: BattleId,
    pub site: TerritoryId,
    pub site_is_water: bool,
    pub attacker: String,
    pub defender: String,
    pub round: u32,
    pub status: BattleStatus,
    pub catalog: UnitCatalog,
    pub units: BTreeMap<UnitId, Unit>,
    pub attacking: SideUnits,
    pub defending: SideUnits,
    /// Attacker sea units supporting from offshore; never targeted.
    pub bombarding: Vec<UnitId>,
    pub killed: Vec<UnitId>,
    pub killed_this_round: Vec<UnitId>,
    /// Territories the attack came from, with the units from each.
    pub attacking_from: BTreeMap<TerritoryId, Vec<UnitId>>,
    /// Attacking land units that landed from the sea.
    pub amphibious_land_attackers: Vec<UnitId>,
    /// Transport to cargo; cargo is lost with its transport.
    pub dependents: BTreeMap<UnitId, Vec<UnitId>>,
    /// Units assigned to the battle.
    pub assigned: usize,
}

impl BattleContext {
    pub fn new(
        site: TerritoryId,
        site_is_water: bool,
        attacker: impl Into<String>,
        defender: impl Into<String>,
        catalog: UnitCatalog,
    ) -> Self {
        BattleContext {
            id: BattleId::new(),
            site,
            site_is_water,
            attacker: attacker.into(),
            defender: defender.into(),
            round: 1,
            status: BattleStatus::InProgress,
            catalog,
            units: BTreeMap::new(),
            attacking: SideUnits::default(),
            defending: SideUnits::default(),
            bombarding: Vec::new(),
            killed: Vec::new(),
            killed_this_round: Vec::new(),
            attacking_from: BTreeMap::new(),
            amphibious_land_attackers: Vec::new(),
            dependents: BTreeMap::new(),
            assigned: 0,
        }
    }

    fn register(&mut self, unit: Unit) -> Result<UnitId> {
        if !self.catalog.contains(&unit.kind) {
            return Err(BattleError::UnknownUnitType(unit.kind));
        }
        if self.units.contains_key(&unit.id) {
            return Err(BattleError::DuplicateUnit(unit.id));
        }
        let id = unit.id;
        self.units.insert(id, unit);
        self.assigned += 1;
        Ok(id)
    }

    /// Assigns an attacking unit, optionally recording where it came from.
    pub fn add_attacker(&mut self, unit: Unit, from: Option<TerritoryId>) -> Result<UnitId> {
        let amphibious = unit.was_amphibious;
        let id = self.register(unit)?;
        self.attacking.live.push(id);
        if let Some(from) = from {
            self.attacking_from.entry(from).or_default().push(id);
        }
        if amphibious && self.profile(id).is_land() {
            self.amphibious_land_attackers.push(id);
        }
        Ok(id)
    }

    pub fn add_defender(&mut self, unit: Unit) -> Result<UnitId> {
        let id = self.register(unit)?;
        self.defending.live.push(id);
        Ok(id)
    }

    pub fn add_bombarding(&mut self, unit: Unit) -> Result<UnitId> {
        let id = self.register(unit)?;
        self.bombarding.push(id);
        Ok(id)
    }

    /// Records `cargo` as carried by `transport`.
    pub fn add_dependents(&mut self, transport: UnitId, cargo: &[UnitId]) {
        self.dependents
            .entry(transport)
            .or_default()
            .extend_from_slice(cargo);
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Profile of a unit; units that were never registered get an inert one.
    pub fn profile(&self, id: UnitId) -> &UnitType {
        self.units
            .get(&id)
            .and_then(|u| self.catalog.get(&u.kind))
            .unwrap_or(&INERT)
    }

    pub fn side(&self, side: Side) -> &SideUnits {
        match side {
            Side::Attacker => &self.attacking,
            Side::Defender => &self.defending,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut SideUnits {
        match side {
            Side::Attacker => &mut self.attacking,
            Side::Defender => &mut self.defending,
        }
    }

    pub fn player(&self, side: Side) -> &str {
        match side {
            Side::Attacker => &self.attacker,
            Side::Defender => &self.defender,
        }
    }

    pub fn is_over(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_amphibious(&self) -> bool {
        !self.amphibious_land_attackers.is_empty()
    }

    /// Units of `ids` whose profile satisfies `pred`.
    pub fn matching(&self, ids: &[UnitId], pred: impl Fn(&UnitType) -> bool) -> Vec<UnitId> {
        ids.iter()
            .copied()
            .filter(|id| pred(self.profile(*id)))
            .collect()
    }

    pub fn any(&self, ids: &[UnitId], pred: impl Fn(&UnitType) -> bool) -> bool {
        ids.iter().any(|id| pred(self.profile(*id)))
    }

    pub fn all(&self, ids: &[UnitId], pred: impl Fn(&UnitType) -> bool) -> bool {
        ids.iter().all(|id| pred(self.profile(*id)))
    }

    /// Live units of `side` that count toward winning.
    pub fn combatants(&self, side: Side) -> Vec<UnitId> {
        self.matching(&self.side(side).live, |t| !t.is_infrastructure)
    }

    /// Whether `side` has a destroyer among its live units, or also among
    /// those waiting to die.
    pub fn has_destroyer(&self, side: Side, include_waiting: bool) -> bool {
        let units = self.side(side);
        self.any(&units.live, |t| t.is_destroyer)
            || (include_waiting && self.any(&units.waiting_to_die, |t| t.is_destroyer))
    }

    /// Sum of strength times rolls over `side`'s live units.
    pub fn power(&self, side: Side) -> u32 {
        self.side(side)
            .live
            .iter()
            .map(|id| self.profile(*id).power(side))
            .sum()
    }

    pub fn remaining_hit_points(&self, id: UnitId) -> u32 {
        self.unit(id)
            .map(|u| u.remaining_hit_points(self.profile(id)))
            .unwrap_or(0)
    }

    /// Total hits `ids` can absorb before all are destroyed.
    pub fn max_hits(&self, ids: &[UnitId]) -> u32 {
        ids.iter().map(|id| self.remaining_hit_points(*id)).sum()
    }

    pub fn cost(&self, ids: &[UnitId]) -> u32 {
        ids.iter().map(|id| self.profile(*id).cost).sum()
    }

    /// Adds one hit to each unit.
    pub fn mark_damaged(&mut self, ids: &[UnitId]) {
        for id in ids {
            if let Some(unit) = self.units.get_mut(id) {
                unit.hits += 1;
            }
        }
    }

    /// Moves live units of `side` into its waiting-to-die set.
    pub fn move_to_waiting(&mut self, side: Side, ids: &[UnitId]) {
        let units = self.side_mut(side);
        for id in ids {
            if let Some(pos) = units.live.iter().position(|u| u == id) {
                units.live.remove(pos);
                units.waiting_to_die.push(*id);
            }
        }
    }

    /// Destroys `ids` together with any cargo they carry.
    ///
    /// Returns every unit newly added to the killed list.
    pub fn kill(&mut self, ids: &[UnitId]) -> Vec<UnitId> {
        let mut queue: Vec<UnitId> = ids.to_vec();
        let mut lost = Vec::new();
        while let Some(id) = queue.pop() {
            if lost.contains(&id) || self.killed.contains(&id) || !self.units.contains_key(&id) {
                continue;
            }
            let owner = BOTH_SIDES
                .into_iter()
                .find(|side| self.side_mut(*side).detach(id));
            let Some(side) = owner else {
                // Already retreated or bombarding.
                continue;
            };
            let cost = self.profile(id).cost;
            self.side_mut(side).lost_value += cost;
            lost.push(id);
            if let Some(cargo) = self.dependents.get(&id) {
                queue.extend(cargo.iter().copied());
            }
        }
        lost.sort();
        self.killed.extend_from_slice(&lost);
        self.killed_this_round.extend_from_slice(&lost);
        lost
    }

    /// Moves live units of `side` out of the battle.
    pub fn retreat(&mut self, side: Side, ids: &[UnitId], submerge: bool) {
        let units = self.side_mut(side);
        let mut moved = Vec::new();
        for id in ids {
            if let Some(pos) = units.live.iter().position(|u| u == id) {
                units.live.remove(pos);
                units.retreated.push(*id);
                moved.push(*id);
            }
        }
        if submerge {
            for id in moved {
                if let Some(unit) = self.units.get_mut(&id) {
                    unit.submerged = true;
                }
            }
        }
    }

    /// Moves live units of `side` to the sidelined set.
    pub fn sideline(&mut self, side: Side, ids: &[UnitId]) {
        let units = self.side_mut(side);
        for id in ids {
            if let Some(pos) = units.live.iter().position(|u| u == id) {
                units.live.remove(pos);
                units.sidelined.push(*id);
            }
        }
    }

    /// Moves units that left through another battle to their side's
    /// retreated set, wherever they currently are.
    pub fn withdraw(&mut self, ids: &[UnitId]) {
        for id in ids {
            for side in BOTH_SIDES {
                let units = self.side_mut(side);
                if units.detach(*id) {
                    units.retreated.push(*id);
                    break;
                }
            }
        }
    }

    /// Number of assigned units found across all partitions.
    pub fn census(&self) -> usize {
        self.attacking.census() + self.defending.census() + self.killed.len() + self.bombarding.len()
    }
}
