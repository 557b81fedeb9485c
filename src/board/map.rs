//! Territories and the map queries a battle needs.
//!
//! Battles never own the map. They ask a `MapView` which neighbouring
//! territories are water, blocked by enemies, or closed to a player when
//! working out where units may retreat. `GameMap` is a small serde-loadable
//! implementation used by the protocol binary and the tests.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of a territory or sea zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TerritoryId(pub String);

impl TerritoryId {
    pub fn new(name: impl Into<String>) -> Self {
        TerritoryId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TerritoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TerritoryId {
    fn from(name: &str) -> Self {
        TerritoryId::new(name)
    }
}

/// Read-only map queries consumed by retreat computation.
pub trait MapView {
    fn is_water(&self, territory: &TerritoryId) -> bool;

    fn neighbors(&self, territory: &TerritoryId) -> Vec<TerritoryId>;

    /// Enemy units in `territory` stop `player` from retreating into it.
    fn has_blocking_enemies(&self, territory: &TerritoryId, player: &str) -> bool;

    /// `territory` is enemy held, conquered this turn, or impassable for `player`.
    fn is_closed_to(&self, territory: &TerritoryId, player: &str) -> bool;
}

/// Per-territory facts stored by `GameMap`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerritoryInfo {
    pub water: bool,
    pub impassable: bool,
    pub neighbors: Vec<TerritoryId>,
    /// Players facing enemy units here.
    pub blocked_for: Vec<String>,
    /// Players that may not enter.
    pub closed_to: Vec<String>,
}

/// An explicit adjacency map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameMap {
    territories: BTreeMap<TerritoryId, TerritoryInfo>,
}

impl GameMap {
    pub fn new() -> Self {
        GameMap::default()
    }

    /// Adds a territory, keeping existing neighbours if it is already known.
    pub fn add_territory(&mut self, name: &str, water: bool) -> &mut Self {
        self.territories
            .entry(TerritoryId::new(name))
            .or_default()
            .water = water;
        self
    }

    /// Connects two territories in both directions.
    pub fn connect(&mut self, a: &str, b: &str) -> &mut Self {
        let (a, b) = (TerritoryId::new(a), TerritoryId::new(b));
        let entry = self.territories.entry(a.clone()).or_default();
        if !entry.neighbors.contains(&b) {
            entry.neighbors.push(b.clone());
        }
        let entry = self.territories.entry(b).or_default();
        if !entry.neighbors.contains(&a) {
            entry.neighbors.push(a);
        }
        self
    }

    pub fn block_for(&mut self, territory: &str, player: &str) -> &mut Self {
        self.territories
            .entry(TerritoryId::new(territory))
            .or_default()
            .blocked_for
            .push(player.to_string());
        self
    }

    pub fn close_to(&mut self, territory: &str, player: &str) -> &mut Self {
        self.territories
            .entry(TerritoryId::new(territory))
            .or_default()
            .closed_to
            .push(player.to_string());
        self
    }

    pub fn info(&self, territory: &TerritoryId) -> Option<&TerritoryInfo> {
        self.territories.get(territory)
    }

    pub fn len(&self) -> usize {
        self.territories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.territories.is_empty()
    }
}

impl MapView for GameMap {
    fn is_water(&self, territory: &TerritoryId) -> bool {
        self.info(territory).is_some_and(|t| t.water)
    }

    fn neighbors(&self, territory: &TerritoryId) -> Vec<TerritoryId> {
        self.info(territory)
            .map(|t| t.neighbors.clone())
            .unwrap_or_default()
    }

    fn has_blocking_enemies(&self, territory: &TerritoryId, player: &str) -> bool {
        self.info(territory)
            .is_some_and(|t| t.blocked_for.iter().any(|p| p == player))
    }

    fn is_closed_to(&self, territory: &TerritoryId, player: &str) -> bool {
        match self.info(territory) {
            Some(t) => t.impassable || t.closed_to.iter().any(|p| p == player),
            None => true,
        }
    }
}
