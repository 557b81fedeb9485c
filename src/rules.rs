//! Rule-variant flags consumed by battles.
//!
//! A `RuleSet` is read-only while a battle runs. It is loaded from JSON (any
//! missing field takes its default) or adjusted one flag at a time through
//! the protocol's `setoption` command.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Errors raised while loading or editing rule flags.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("unknown rule option: '{0}'")]
    UnknownOption(String),

    #[error("invalid value '{value}' for rule option '{name}'")]
    InvalidValue { name: String, value: String },

    #[error("malformed rules document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rule-variant toggles for battle resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub ww2v2: bool,
    pub ww2v3: bool,
    pub defending_subs_sneak_attack: bool,
    pub submersible_subs: bool,
    pub sub_retreat_before_battle: bool,
    pub submarines_defending_may_submerge_or_retreat: bool,
    pub transport_casualties_restricted: bool,
    pub partial_amphibious_retreat: bool,
    pub attacker_retreat_planes: bool,
    pub air_attack_sub_restricted: bool,
    pub allied_air_independent: bool,
    pub naval_bombard_casualties_return_fire: bool,
    pub suicide_and_munition_casualties_restricted: bool,
    pub defending_suicide_and_munition_units_do_not_fire: bool,
    pub retreating_units_remain_in_place: bool,
    pub paratroopers: bool,
    /// Rounds per land/sea battle; zero or less is unlimited.
    pub max_battle_rounds: i32,
    /// Rounds per air battle; zero or less fights until one side is gone.
    pub air_battle_rounds: i32,
    pub air_battle_attackers_can_retreat: bool,
    pub air_battle_defenders_can_retreat: bool,
    pub dice_sides: u32,
    /// AA type to airborne unit kinds a defending AA of that type may also hit.
    pub airborne_targeted_by_aa: BTreeMap<String, Vec<String>>,
}

impl Default for RuleSet {
    fn default() -> Self {
        RuleSet {
            ww2v2: false,
            ww2v3: false,
            defending_subs_sneak_attack: false,
            submersible_subs: false,
            sub_retreat_before_battle: false,
            submarines_defending_may_submerge_or_retreat: false,
            transport_casualties_restricted: false,
            partial_amphibious_retreat: false,
            attacker_retreat_planes: false,
            air_attack_sub_restricted: false,
            allied_air_independent: true,
            naval_bombard_casualties_return_fire: true,
            suicide_and_munition_casualties_restricted: false,
            defending_suicide_and_munition_units_do_not_fire: false,
            retreating_units_remain_in_place: false,
            paratroopers: false,
            max_battle_rounds: 0,
            air_battle_rounds: 1,
            air_battle_attackers_can_retreat: false,
            air_battle_defenders_can_retreat: false,
            dice_sides: 6,
            airborne_targeted_by_aa: BTreeMap::new(),
        }
    }
}

impl RuleSet {
    /// Parses a JSON rules document.
    pub fn from_json(text: &str) -> Result<RuleSet, RuleError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Updates one flag by its snake_case name.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), RuleError> {
        let flag = match name {
            "ww2v2" => &mut self.ww2v2,
            "ww2v3" => &mut self.ww2v3,
            "defending_subs_sneak_attack" => &mut self.defending_subs_sneak_attack,
            "submersible_subs" => &mut self.submersible_subs,
            "sub_retreat_before_battle" => &mut self.sub_retreat_before_battle,
            "submarines_defending_may_submerge_or_retreat" => {
                &mut self.submarines_defending_may_submerge_or_retreat
            }
            "transport_casualties_restricted" => &mut self.transport_casualties_restricted,
            "partial_amphibious_retreat" => &mut self.partial_amphibious_retreat,
            "attacker_retreat_planes" => &mut self.attacker_retreat_planes,
            "air_attack_sub_restricted" => &mut self.air_attack_sub_restricted,
            "allied_air_independent" => &mut self.allied_air_independent,
            "naval_bombard_casualties_return_fire" => {
                &mut self.naval_bombard_casualties_return_fire
            }
            "suicide_and_munition_casualties_restricted" => {
                &mut self.suicide_and_munition_casualties_restricted
            }
            "defending_suicide_and_munition_units_do_not_fire" => {
                &mut self.defending_suicide_and_munition_units_do_not_fire
            }
            "retreating_units_remain_in_place" => &mut self.retreating_units_remain_in_place,
            "paratroopers" => &mut self.paratroopers,
            "air_battle_attackers_can_retreat" => &mut self.air_battle_attackers_can_retreat,
            "air_battle_defenders_can_retreat" => &mut self.air_battle_defenders_can_retreat,
            "max_battle_rounds" => {
                self.max_battle_rounds = parse_number(name, value)?;
                return Ok(());
            }
            "air_battle_rounds" => {
                self.air_battle_rounds = parse_number(name, value)?;
                return Ok(());
            }
            "dice_sides" => {
                let sides: u32 = parse_number(name, value)?;
                if sides == 0 {
                    return Err(invalid(name, value));
                }
                self.dice_sides = sides;
                return Ok(());
            }
            other => return Err(RuleError::UnknownOption(other.to_string())),
        };
        *flag = parse_bool(name, value)?;
        Ok(())
    }

    /// Returns true if a land/sea battle must stop once `round` completes.
    pub fn max_rounds_reached(&self, round: u32) -> bool {
        self.max_battle_rounds > 0 && round as i64 >= self.max_battle_rounds as i64
    }

    /// Sneak attacks by defending submarines are in play.
    pub fn defending_subs_sneak(&self) -> bool {
        self.ww2v2 || self.defending_subs_sneak_attack
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, RuleError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Ok(true),
        "false" | "off" | "0" | "no" => Ok(false),
        _ => Err(invalid(name, value)),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, RuleError> {
    value.parse().map_err(|_| invalid(name, value))
}

fn invalid(name: &str, value: &str) -> RuleError {
    RuleError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    }
}
