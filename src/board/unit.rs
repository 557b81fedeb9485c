//! Unit types, the unit catalog, and individual units.
//!
//! A `UnitType` is the static combat profile shared by every unit of one
//! kind. A `Unit` is a single piece with its owner and the mutable flags a
//! battle tracks on it (damage taken, submerged, arrived amphibiously).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::side::Side;

/// Stable identifier of a unit within a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// Where a unit type moves and fights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    #[default]
    Land,
    Sea,
    Air,
}

impl Domain {
    /// Returns the single-character abbreviation used in protocol output.
    pub const fn short_char(self) -> char {
        match self {
            Domain::Land => 'l',
            Domain::Sea => 's',
            Domain::Air => 'a',
        }
    }
}

/// Anti-air capability of a unit type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AaProfile {
    /// Label grouping AA units that fire together.
    pub aa_type: String,
    pub attack: u32,
    pub defense: u32,
    /// Shots per AA unit each round of AA fire; zero or less is one per target.
    pub max_attacks: i32,
    /// Battle rounds in which this AA may fire; negative is unlimited.
    pub max_rounds: i32,
    /// Unit kinds this AA may hit.
    pub targets: Vec<String>,
    /// Whether the AA also fires when its owner is attacking.
    pub offensive: bool,
}

impl Default for AaProfile {
    fn default() -> Self {
        AaProfile {
            aa_type: "AA".to_string(),
            attack: 0,
            defense: 1,
            max_attacks: 0,
            max_rounds: 1,
            targets: Vec::new(),
            offensive: false,
        }
    }
}

impl AaProfile {
    /// Strength of this AA when its owner fights on `side`.
    pub fn strength(&self, side: Side) -> u32 {
        match side {
            Side::Attacker if self.offensive => self.attack,
            Side::Attacker => 0,
            Side::Defender => self.defense,
        }
    }

    /// Returns true if this AA may still fire in `round`.
    pub fn fires_in_round(&self, round: u32) -> bool {
        self.max_rounds < 0 || round as i64 <= self.max_rounds as i64
    }
}

/// Static combat profile of a unit kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitType {
    pub name: String,
    pub domain: Domain,
    pub attack: u32,
    pub defense: u32,
    pub attack_rolls: u32,
    pub defense_rolls: u32,
    pub hit_points: u32,
    pub cost: u32,
    pub is_sub: bool,
    pub is_destroyer: bool,
    pub is_transport: bool,
    pub is_combat_transport: bool,
    pub is_infrastructure: bool,
    pub is_suicide: bool,
    pub is_suicide_on_hit: bool,
    pub is_air_transport: bool,
    pub air_attack: u32,
    pub air_defense: u32,
    /// Last battle round this kind may take part in; zero or less is unlimited.
    pub max_battle_rounds: i32,
    pub aa: Option<AaProfile>,
}

impl Default for UnitType {
    fn default() -> Self {
        UnitType::inert()
    }
}

/// Profile handed out for kinds that are not in a catalog.
pub(crate) static INERT: UnitType = UnitType::inert();

impl UnitType {
    /// A profile with no combat value at all.
    pub const fn inert() -> Self {
        UnitType {
            name: String::new(),
            domain: Domain::Land,
            attack: 0,
            defense: 0,
            attack_rolls: 1,
            defense_rolls: 1,
            hit_points: 1,
            cost: 0,
            is_sub: false,
            is_destroyer: false,
            is_transport: false,
            is_combat_transport: false,
            is_infrastructure: false,
            is_suicide: false,
            is_suicide_on_hit: false,
            is_air_transport: false,
            air_attack: 0,
            air_defense: 0,
            max_battle_rounds: 0,
            aa: None,
        }
    }

    fn with(name: &str, domain: Domain, attack: u32, defense: u32, cost: u32) -> Self {
        UnitType {
            name: name.to_string(),
            domain,
            attack,
            defense,
            cost,
            ..UnitType::inert()
        }
    }

    pub fn is_air(&self) -> bool {
        self.domain == Domain::Air
    }

    pub fn is_sea(&self) -> bool {
        self.domain == Domain::Sea
    }

    pub fn is_land(&self) -> bool {
        self.domain == Domain::Land
    }

    /// Sea transport without combat value of its own.
    pub fn is_non_combat_transport(&self) -> bool {
        self.is_transport && !self.is_combat_transport && self.is_sea()
    }

    /// Per-die strength when fighting on `side`.
    pub fn strength(&self, side: Side) -> u32 {
        match side {
            Side::Attacker => self.attack,
            Side::Defender => self.defense,
        }
    }

    /// Dice rolled per unit when fighting on `side`.
    pub fn rolls(&self, side: Side) -> u32 {
        match side {
            Side::Attacker => self.attack_rolls,
            Side::Defender => self.defense_rolls,
        }
    }

    /// Effective power: strength times rolls.
    pub fn power(&self, side: Side) -> u32 {
        self.strength(side) * self.rolls(side)
    }

    /// Returns true if this kind rolls any dice in regular combat on `side`.
    pub fn can_roll(&self, side: Side) -> bool {
        self.power(side) > 0
    }

    /// Strength used in an air battle.
    pub fn air_strength(&self, side: Side) -> u32 {
        match side {
            Side::Attacker => self.air_attack,
            Side::Defender => self.air_defense,
        }
    }

    /// Returns true if a unit of this kind may still fight in `round`.
    pub fn fights_in_round(&self, round: u32) -> bool {
        self.max_battle_rounds <= 0 || round as i64 <= self.max_battle_rounds as i64
    }
}

/// The set of unit kinds a battle knows about, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitCatalog {
    types: BTreeMap<String, UnitType>,
}

impl UnitCatalog {
    pub fn new() -> Self {
        UnitCatalog::default()
    }

    /// The built-in catalog of common unit kinds.
    pub fn standard() -> Self {
        let mut catalog = UnitCatalog::new();

        catalog.insert(UnitType::with("infantry", Domain::Land, 1, 2, 3));
        catalog.insert(UnitType::with("artillery", Domain::Land, 2, 2, 4));
        catalog.insert(UnitType::with("armour", Domain::Land, 3, 3, 5));
        catalog.insert(UnitType {
            air_attack: 1,
            air_defense: 1,
            ..UnitType::with("fighter", Domain::Air, 3, 4, 10)
        });
        catalog.insert(UnitType {
            air_attack: 1,
            is_air_transport: true,
            ..UnitType::with("bomber", Domain::Air, 4, 1, 12)
        });
        catalog.insert(UnitType {
            is_transport: true,
            ..UnitType::with("transport", Domain::Sea, 0, 0, 7)
        });
        catalog.insert(UnitType {
            is_sub: true,
            ..UnitType::with("submarine", Domain::Sea, 2, 1, 6)
        });
        catalog.insert(UnitType {
            is_destroyer: true,
            ..UnitType::with("destroyer", Domain::Sea, 2, 2, 8)
        });
        catalog.insert(UnitType::with("cruiser", Domain::Sea, 3, 3, 12));
        catalog.insert(UnitType::with("carrier", Domain::Sea, 1, 2, 14));
        catalog.insert(UnitType {
            hit_points: 2,
            ..UnitType::with("battleship", Domain::Sea, 4, 4, 20)
        });
        catalog.insert(UnitType {
            is_infrastructure: true,
            aa: Some(AaProfile {
                aa_type: "AA".to_string(),
                defense: 1,
                max_attacks: 3,
                max_rounds: 1,
                targets: vec!["fighter".to_string(), "bomber".to_string()],
                ..AaProfile::default()
            }),
            ..UnitType::with("aaGun", Domain::Land, 0, 0, 5)
        });
        catalog.insert(UnitType {
            is_infrastructure: true,
            ..UnitType::with("factory", Domain::Land, 0, 0, 15)
        });
        catalog.insert(UnitType {
            is_suicide: true,
            is_suicide_on_hit: true,
            ..UnitType::with("kamikazeBoat", Domain::Sea, 2, 0, 4)
        });

        catalog
    }

    pub fn insert(&mut self, unit_type: UnitType) {
        self.types.insert(unit_type.name.clone(), unit_type);
    }

    pub fn get(&self, name: &str) -> Option<&UnitType> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// A single unit assigned to a battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub kind: String,
    pub owner: String,
    /// Hits already absorbed.
    #[serde(default)]
    pub hits: u32,
    #[serde(default)]
    pub submerged: bool,
    #[serde(default)]
    pub was_amphibious: bool,
    #[serde(default)]
    pub no_movement_left: bool,
}

impl Unit {
    pub fn new(id: UnitId, kind: impl Into<String>, owner: impl Into<String>) -> Self {
        Unit {
            id,
            kind: kind.into(),
            owner: owner.into(),
            hits: 0,
            submerged: false,
            was_amphibious: false,
            no_movement_left: false,
        }
    }

    /// Marks the unit as having landed from the sea this turn.
    pub fn amphibious(mut self) -> Self {
        self.was_amphibious = true;
        self
    }

    /// Hit points left given the unit's profile.
    pub fn remaining_hit_points(&self, profile: &UnitType) -> u32 {
        profile.hit_points.max(1).saturating_sub(self.hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_has_expected_kinds() {
        let catalog = UnitCatalog::standard();
        for name in ["infantry", "submarine", "destroyer", "battleship", "aaGun", "kamikazeBoat"] {
            assert!(catalog.contains(name), "missing {}", name);
        }
        assert!(catalog.get("submarine").unwrap().is_sub);
        assert!(catalog.get("destroyer").unwrap().is_destroyer);
        assert_eq!(catalog.get("battleship").unwrap().hit_points, 2);
    }

    #[test]
    fn strength_follows_side() {
        let catalog = UnitCatalog::standard();
        let inf = catalog.get("infantry").unwrap();
        assert_eq!(inf.strength(Side::Attacker), 1);
        assert_eq!(inf.strength(Side::Defender), 2);
        assert!(inf.can_roll(Side::Attacker));
        let factory = catalog.get("factory").unwrap();
        assert!(!factory.can_roll(Side::Defender));
    }

    #[test]
    fn non_combat_transport_detection() {
        let catalog = UnitCatalog::standard();
        assert!(catalog.get("transport").unwrap().is_non_combat_transport());
        assert!(!catalog.get("destroyer").unwrap().is_non_combat_transport());
    }

    #[test]
    fn aa_round_limits() {
        let unlimited = AaProfile {
            max_rounds: -1,
            ..AaProfile::default()
        };
        assert!(unlimited.fires_in_round(40));
        let once = AaProfile::default();
        assert!(once.fires_in_round(1));
        assert!(!once.fires_in_round(2));
    }

    #[test]
    fn offensive_flag_gates_attacker_strength() {
        let mut aa = AaProfile {
            attack: 1,
            ..AaProfile::default()
        };
        assert_eq!(aa.strength(Side::Attacker), 0);
        aa.offensive = true;
        assert_eq!(aa.strength(Side::Attacker), 1);
    }

    #[test]
    fn remaining_hit_points_counts_damage() {
        let catalog = UnitCatalog::standard();
        let bb = catalog.get("battleship").unwrap();
        let mut unit = Unit::new(UnitId(1), "battleship", "Japan");
        assert_eq!(unit.remaining_hit_points(bb), 2);
        unit.hits = 1;
        assert_eq!(unit.remaining_hit_points(bb), 1);
    }

    #[test]
    fn partial_json_profile_uses_defaults() {
        let ty: UnitType = serde_json::from_str(r#"{"name":"marine","attack":2}"#).unwrap();
        assert_eq!(ty.attack, 2);
        assert_eq!(ty.attack_rolls, 1);
        assert_eq!(ty.hit_points, 1);
        assert_eq!(ty.domain, Domain::Land);
    }
}
