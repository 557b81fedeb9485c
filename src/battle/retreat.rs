//! Retreat and submerge.
//!
//! Each retreat mode works out which units may leave and where they may go,
//! asks the owning side, checks the answer against what was offered and
//! applies it. Eligibility is decided when the retreat step runs, against
//! the units still in the battle at that moment.

use serde::{Deserialize, Serialize};

use super::context::BattleContext;
use super::decision::{Decision, RetreatChoice, RetreatRequest};
use super::error::{BattleError, Result};
use super::stack::Flow;
use super::{finish, Bridge};
use crate::battle::context::BattleStatus;
use crate::board::{MapView, Side, TerritoryId, UnitId};
use crate::rules::RuleSet;

/// How many answers a side may give before a bad retreat answer is fatal.
pub const MAX_DECISION_ATTEMPTS: u32 = 3;

/// Which units a retreat offer covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetreatMode {
    /// Every unit of the side.
    Default,
    Subs,
    /// Air units of an amphibious assault, retreating in place.
    Planes,
    /// Units that did not land from the sea.
    PartialAmphibious,
}

/// Territories the attacker may fall back to.
pub fn attacker_retreat_territories(ctx: &BattleContext, rules: &RuleSet, map: &dyn MapView) -> Vec<TerritoryId> {
    let attackers = &ctx.attacking.live;
    if rules.retreating_units_remain_in_place || (!attackers.is_empty() && ctx.all(attackers, |t| t.is_air())) {
        return vec![ctx.site.clone()];
    }

    let mut possible: Vec<TerritoryId> = ctx
        .attacking_from
        .iter()
        .filter(|(from, units)| {
            if map.has_blocking_enemies(from, &ctx.attacker) || map.is_closed_to(from, &ctx.attacker) {
                return false;
            }
            // Air cannot open a path for the rest.
            !((rules.ww2v2 || rules.ww2v3) && ctx.all(units, |t| t.is_air()))
        })
        .map(|(from, _)| from.clone())
        .filter(|from| *from != ctx.site)
        .collect();

    if !ctx.site_is_water && ctx.any(attackers, |t| t.is_land()) {
        possible.retain(|t| !map.is_water(t));
    }
    if ctx.any(attackers, |t| t.is_sea()) {
        possible.retain(|t| map.is_water(t));
    }
    possible
}

/// The defender has nothing left but transports that cannot fight.
pub fn only_defenseless_transports_left(ctx: &BattleContext, rules: &RuleSet) -> bool {
    let live = &ctx.defending.live;
    rules.transport_casualties_restricted && !live.is_empty() && ctx.all(live, |t| t.is_non_combat_transport())
}

pub fn can_attacker_retreat(ctx: &BattleContext, rules: &RuleSet, map: &dyn MapView) -> bool {
    !only_defenseless_transports_left(ctx, rules)
        && !ctx.is_amphibious()
        && !attacker_retreat_territories(ctx, rules, map).is_empty()
}

pub fn can_attacker_retreat_subs(ctx: &BattleContext, rules: &RuleSet, map: &dyn MapView) -> bool {
    !ctx.has_destroyer(Side::Defender, true)
        && (can_attacker_retreat(ctx, rules, map) || rules.submersible_subs)
}

/// Neighbouring sea zones open to defending submarines.
pub fn defender_sub_destinations(ctx: &BattleContext, map: &dyn MapView) -> Vec<TerritoryId> {
    map.neighbors(&ctx.site)
        .into_iter()
        .filter(|t| {
            map.is_water(t)
                && !map.has_blocking_enemies(t, &ctx.defender)
                && !map.is_closed_to(t, &ctx.defender)
        })
        .collect()
}

pub fn can_defender_retreat_subs(ctx: &BattleContext, rules: &RuleSet, map: &dyn MapView) -> bool {
    !ctx.has_destroyer(Side::Attacker, true)
        && (!defender_sub_destinations(ctx, map).is_empty() || rules.submersible_subs)
}

pub fn can_attacker_retreat_planes(ctx: &BattleContext, rules: &RuleSet) -> bool {
    (rules.ww2v2 || rules.attacker_retreat_planes || rules.partial_amphibious_retreat)
        && ctx.is_amphibious()
        && ctx.any(&ctx.attacking.live, |t| t.is_air())
}

pub fn can_attacker_retreat_partial_amphibious(ctx: &BattleContext, rules: &RuleSet) -> bool {
    if !ctx.is_amphibious() || !rules.partial_amphibious_retreat {
        return false;
    }
    ctx.attacking.live.iter().any(|id| {
        ctx.profile(*id).is_land() && ctx.unit(*id).is_some_and(|u| !u.was_amphibious)
    })
}

/// Units of `side` a retreat in `mode` would offer to move.
fn eligible_units(ctx: &BattleContext, side: Side, mode: RetreatMode) -> Vec<UnitId> {
    let live = &ctx.side(side).live;
    match mode {
        RetreatMode::Default => live.clone(),
        RetreatMode::Subs => ctx.matching(live, |t| t.is_sub),
        RetreatMode::Planes => ctx.matching(live, |t| t.is_air()),
        RetreatMode::PartialAmphibious => live
            .iter()
            .copied()
            .filter(|id| ctx.unit(*id).is_some_and(|u| !u.was_amphibious))
            .collect(),
    }
}

/// Asks `side` whether to retreat in `mode` and applies a valid answer.
///
/// An answer outside the offer is logged and the question asked again; after
/// `MAX_DECISION_ATTEMPTS` bad answers the battle cannot continue.
pub fn query_retreat(
    ctx: &mut BattleContext,
    side: Side,
    mode: RetreatMode,
    destinations: Vec<TerritoryId>,
    bridge: &mut Bridge<'_>,
) -> Result<Flow> {
    let rules = bridge.rules;
    let can_submerge = mode == RetreatMode::Subs && rules.submersible_subs;
    let defending_both = mode == RetreatMode::Subs
        && side == Side::Defender
        && rules.submarines_defending_may_submerge_or_retreat;
    if destinations.is_empty() && !can_submerge {
        return Ok(Flow::Continue);
    }

    let units = eligible_units(ctx, side, mode);
    if units.is_empty() {
        return Ok(Flow::Continue);
    }
    let destinations = match mode {
        RetreatMode::Planes => vec![ctx.site.clone()],
        _ if can_submerge && !defending_both => Vec::new(),
        _ => destinations,
    };
    let message = match mode {
        RetreatMode::Subs if can_submerge && destinations.is_empty() => {
            format!("{} submerge subs?", ctx.player(side))
        }
        RetreatMode::Subs => format!("{} retreat subs?", ctx.player(side)),
        RetreatMode::Planes => format!("{} retreat planes?", ctx.player(side)),
        RetreatMode::PartialAmphibious => {
            format!("{} retreat non-amphibious units?", ctx.player(side))
        }
        RetreatMode::Default => format!("{} retreat?", ctx.player(side)),
    };

    for attempt in 1..=MAX_DECISION_ATTEMPTS {
        let request = RetreatRequest {
            battle: ctx,
            player: ctx.player(side),
            side,
            units: &units,
            destinations: &destinations,
            can_submerge,
            message: &message,
        };
        let choice = match bridge.player(side).retreat_query(&request) {
            Decision::Pending => return Ok(Flow::Suspend),
            Decision::Ready(None) => return Ok(Flow::Continue),
            Decision::Ready(Some(choice)) if request.allows(&choice) => choice,
            Decision::Ready(Some(choice)) => {
                tracing::warn!(
                    battle = %ctx.id,
                    attempt,
                    "{} gave a retreat answer outside the offer: {:?}",
                    ctx.player(side),
                    choice
                );
                continue;
            }
        };
        apply_retreat(ctx, side, mode, &units, &choice, bridge);
        return Ok(Flow::Continue);
    }
    Err(BattleError::InvalidRetreat(MAX_DECISION_ATTEMPTS))
}

/// Moves retreating units out of the battle and ends it when the side is
/// left with nothing.
pub fn apply_retreat(
    ctx: &mut BattleContext,
    side: Side,
    mode: RetreatMode,
    units: &[UnitId],
    choice: &RetreatChoice,
    bridge: &mut Bridge<'_>,
) {
    let (moved, message, over) = match (choice, mode) {
        (RetreatChoice::Submerge, _) => {
            ctx.retreat(side, units, true);
            (units.to_vec(), "submerges".to_string(), false)
        }
        (RetreatChoice::To(_), RetreatMode::Planes) => {
            let air = ctx.matching(units, |t| t.is_air());
            ctx.retreat(side, &air, false);
            (air, "air retreats".to_string(), false)
        }
        (RetreatChoice::To(to), RetreatMode::PartialAmphibious) => {
            let mut moving = ctx.matching(&ctx.side(side).live, |t| t.is_air());
            for id in with_dependents(ctx, side, units) {
                if !moving.contains(&id) {
                    moving.push(id);
                }
            }
            ctx.retreat(side, &moving, false);
            (moving, format!("retreats non-amphibious units to {}", to), false)
        }
        (RetreatChoice::To(to), _) => {
            let moving = with_dependents(ctx, side, units);
            ctx.retreat(side, &moving, false);
            let over = mode == RetreatMode::Default && side == Side::Attacker;
            (moving, format!("retreats to {}", to), over)
        }
    };
    tracing::info!(battle = %ctx.id, units = moved.len(), "{} {}", ctx.player(side), message);
    bridge
        .display
        .notify_retreat(ctx.id, ctx.player(side), &moved, &message);

    if over || ctx.combatants(side).is_empty() {
        finish(ctx, BattleStatus::won_by(side.opponent()), bridge);
        for dependent in bridge.dependencies.dependent_battles(ctx.id) {
            bridge.dependencies.notify_units_lost(dependent, &moved, true);
        }
    }
}

/// `units` plus the live cargo they carry.
fn with_dependents(ctx: &BattleContext, side: Side, units: &[UnitId]) -> Vec<UnitId> {
    let live = &ctx.side(side).live;
    let mut all = units.to_vec();
    for id in units {
        if let Some(cargo) = ctx.dependents.get(id) {
            for c in cargo {
                if live.contains(c) && !all.contains(c) {
                    all.push(*c);
                }
            }
        }
    }
    all
}
