//! JSON battle scenarios.
//!
//! A scenario describes one battle declaratively: where it is fought, who
//! attacks whom, which units take part and the surrounding map used for
//! retreats. Unit ids may be given explicitly or left out, in which case
//! they are numbered after the highest explicit id in document order.
//!
//! ```json
//! {
//!   "site": "Ukraine",
//!   "attacker": "Germany",
//!   "defender": "Russia",
//!   "attackers": [{ "kind": "infantry", "count": 2, "from": "Poland" }],
//!   "defenders": [{ "id": 20, "kind": "infantry" }],
//!   "map": { "Ukraine": { "neighbors": ["Poland"] } }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::battle::{AirBattle, BattleContext, BattleError, MustFightBattle, SavedBattle};
use crate::board::{GameMap, TerritoryId, Unit, UnitCatalog, UnitId, UnitType};

/// Errors raised while reading or building a scenario.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("malformed scenario: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid unit in scenario: {0}")]
    Battle(#[from] BattleError),

    #[error("unit entry with id {0} has count {1}; explicit ids need count 1")]
    CountWithId(u32, u32),

    #[error("transport {0} is not part of the scenario")]
    UnknownTransport(u32),

    #[error("cargo unit {0} is not part of the scenario")]
    UnknownCargo(u32),

    #[error("scenario has no site")]
    MissingSite,
}

/// Which battle variant a scenario builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BattleKind {
    #[default]
    MustFight,
    Air,
}

/// One line of a unit list; expands to `count` units when no id is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitEntry {
    #[serde(default)]
    pub id: Option<u32>,
    pub kind: String,
    /// Defaults to the side's player.
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default = "one")]
    pub count: u32,
    #[serde(default)]
    pub hits: u32,
    #[serde(default)]
    pub amphibious: bool,
    /// Territory an attacking unit came from.
    #[serde(default)]
    pub from: Option<String>,
}

fn one() -> u32 {
    1
}

/// Cargo carried by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cargo {
    pub transport: u32,
    pub units: Vec<u32>,
}

/// A declarative battle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub kind: BattleKind,
    pub site: String,
    pub water: bool,
    pub attacker: String,
    pub defender: String,
    /// Extra or replacement unit kinds on top of the standard catalog.
    pub catalog: Vec<UnitType>,
    pub attackers: Vec<UnitEntry>,
    pub defenders: Vec<UnitEntry>,
    pub bombarding: Vec<UnitEntry>,
    pub cargo: Vec<Cargo>,
    pub map: GameMap,
}

impl Scenario {
    pub fn from_json(text: &str) -> Result<Scenario, ScenarioError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn catalog(&self) -> UnitCatalog {
        let mut catalog = UnitCatalog::standard();
        for unit_type in &self.catalog {
            catalog.insert(unit_type.clone());
        }
        catalog
    }

    /// Builds a fresh, unstarted battle.
    pub fn build(&self) -> Result<SavedBattle, ScenarioError> {
        let ctx = self.context()?;
        Ok(match self.kind {
            BattleKind::MustFight => SavedBattle::MustFight(MustFightBattle::new(ctx)),
            BattleKind::Air => SavedBattle::Air(AirBattle::new(ctx)),
        })
    }

    /// Builds the battle context with every unit assigned.
    pub fn context(&self) -> Result<BattleContext, ScenarioError> {
        if self.site.is_empty() {
            return Err(ScenarioError::MissingSite);
        }
        let mut ctx = BattleContext::new(
            TerritoryId::new(self.site.as_str()),
            self.water,
            self.attacker.as_str(),
            self.defender.as_str(),
            self.catalog(),
        );

        let mut next_id = [&self.attackers, &self.defenders, &self.bombarding]
            .into_iter()
            .flatten()
            .filter_map(|e| e.id)
            .max()
            .map_or(1, |max| max + 1);

        for entry in &self.attackers {
            for unit in expand(entry, &self.attacker, &mut next_id)? {
                let from = entry.from.as_deref().map(TerritoryId::new);
                ctx.add_attacker(unit, from)?;
            }
        }
        for entry in &self.defenders {
            for unit in expand(entry, &self.defender, &mut next_id)? {
                ctx.add_defender(unit)?;
            }
        }
        for entry in &self.bombarding {
            for unit in expand(entry, &self.attacker, &mut next_id)? {
                ctx.add_bombarding(unit)?;
            }
        }

        for cargo in &self.cargo {
            if !ctx.units.contains_key(&UnitId(cargo.transport)) {
                return Err(ScenarioError::UnknownTransport(cargo.transport));
            }
            if let Some(missing) = cargo.units.iter().find(|u| !ctx.units.contains_key(&UnitId(**u))) {
                return Err(ScenarioError::UnknownCargo(*missing));
            }
            let units: Vec<UnitId> = cargo.units.iter().copied().map(UnitId).collect();
            ctx.add_dependents(UnitId(cargo.transport), &units);
        }

        tracing::debug!(site = %ctx.site, units = ctx.assigned, "scenario built");
        Ok(ctx)
    }
}

fn expand(entry: &UnitEntry, player: &str, next_id: &mut u32) -> Result<Vec<Unit>, ScenarioError> {
    let owner = entry.owner.as_deref().unwrap_or(player);
    let make = |id: u32| {
        let mut unit = Unit::new(UnitId(id), entry.kind.as_str(), owner);
        unit.hits = entry.hits;
        unit.was_amphibious = entry.amphibious;
        unit
    };
    match entry.id {
        Some(id) if entry.count != 1 => Err(ScenarioError::CountWithId(id, entry.count)),
        Some(id) => Ok(vec![make(id)]),
        None => Ok((0..entry.count)
            .map(|_| {
                let unit = make(*next_id);
                *next_id += 1;
                unit
            })
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::Battle;
    use crate::board::MapView;

    const LAND: &str = r#"{
        "site": "Ukraine",
        "attacker": "Germany",
        "defender": "Russia",
        "attackers": [
            { "kind": "infantry", "count": 2, "from": "Poland" },
            { "id": 7, "kind": "armour" }
        ],
        "defenders": [{ "kind": "infantry" }],
        "map": {
            "Ukraine": { "neighbors": ["Poland"] },
            "Poland": { "neighbors": ["Ukraine"] }
        }
    }"#;

    #[test]
    fn ids_follow_the_highest_explicit_id() {
        let scenario = Scenario::from_json(LAND).unwrap();
        let ctx = scenario.context().unwrap();
        assert_eq!(ctx.attacking.live, vec![UnitId(8), UnitId(9), UnitId(7)]);
        assert_eq!(ctx.defending.live, vec![UnitId(10)]);
        assert_eq!(
            ctx.attacking_from.get(&TerritoryId::new("Poland")),
            Some(&vec![UnitId(8), UnitId(9)])
        );
        assert_eq!(ctx.unit(UnitId(10)).map(|u| u.owner.as_str()), Some("Russia"));
    }

    #[test]
    fn map_is_read_with_the_scenario() {
        let scenario = Scenario::from_json(LAND).unwrap();
        assert_eq!(
            scenario.map.neighbors(&TerritoryId::new("Ukraine")),
            vec![TerritoryId::new("Poland")]
        );
    }

    #[test]
    fn air_kind_builds_an_air_battle() {
        let text = r#"{
            "kind": "air",
            "site": "Germany",
            "attacker": "Britain",
            "defender": "Germany",
            "attackers": [{ "kind": "bomber" }],
            "defenders": [{ "kind": "fighter" }]
        }"#;
        let battle = Scenario::from_json(text).unwrap().build().unwrap();
        assert!(matches!(battle, SavedBattle::Air(_)));
        assert_eq!(battle.battle().context().assigned, 2);
    }

    #[test]
    fn custom_kinds_extend_the_catalog() {
        let text = r#"{
            "site": "Burma",
            "attacker": "Japan",
            "defender": "China",
            "catalog": [{ "name": "elephant", "attack": 3, "defense": 2, "cost": 6 }],
            "attackers": [{ "kind": "elephant" }],
            "defenders": [{ "kind": "infantry" }]
        }"#;
        let ctx = Scenario::from_json(text).unwrap().context().unwrap();
        assert_eq!(ctx.profile(UnitId(1)).attack, 3);
    }

    #[test]
    fn bad_scenarios_are_rejected() {
        let unknown = r#"{ "site": "x", "attackers": [{ "kind": "dragon" }] }"#;
        assert!(matches!(
            Scenario::from_json(unknown).unwrap().context(),
            Err(ScenarioError::Battle(BattleError::UnknownUnitType(_)))
        ));

        let counted = r#"{ "site": "x", "attackers": [{ "id": 3, "kind": "infantry", "count": 2 }] }"#;
        assert!(matches!(
            Scenario::from_json(counted).unwrap().context(),
            Err(ScenarioError::CountWithId(3, 2))
        ));

        let cargo = r#"{ "site": "x", "attackers": [{ "id": 1, "kind": "transport" }],
                         "cargo": [{ "transport": 1, "units": [9] }] }"#;
        assert!(matches!(
            Scenario::from_json(cargo).unwrap().context(),
            Err(ScenarioError::UnknownCargo(9))
        ));

        assert!(matches!(Scenario::from_json("{}").unwrap().context(), Err(ScenarioError::MissingSite)));
        assert!(matches!(Scenario::from_json("[1, 2"), Err(ScenarioError::Json(_))));
    }
}
