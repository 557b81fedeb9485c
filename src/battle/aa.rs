//! Anti-aircraft fire.
//!
//! AA units fire before regular combat, grouped by AA type, at the enemy
//! kinds their profile names. Targets are worked out when the dice are
//! rolled so units that left the battle in the meantime are never hit.

use std::collections::BTreeSet;

use super::context::BattleContext;
use super::dice::DicePool;
use super::fire::{firing_groups, FireFrame, FireKind, FireState, ReturnFire};
use crate::board::{Side, UnitId};
use crate::rules::RuleSet;

/// Units of `side` able to fire AA this round at something. Units already
/// waiting to die still fire.
pub fn aa_units(ctx: &BattleContext, side: Side, rules: &RuleSet) -> Vec<UnitId> {
    ctx.side(side)
        .live_and_waiting()
        .into_iter()
        .filter(|id| match &ctx.profile(*id).aa {
            Some(aa) => {
                aa.strength(side) > 0
                    && aa.fires_in_round(ctx.round)
                    && !targets(ctx, side, &aa.aa_type, rules).is_empty()
            }
            None => false,
        })
        .collect()
}

/// Distinct AA types among `side`'s firing AA units, sorted.
pub fn aa_types(ctx: &BattleContext, side: Side, rules: &RuleSet) -> Vec<String> {
    let types: BTreeSet<String> = aa_units(ctx, side, rules)
        .into_iter()
        .filter_map(|id| ctx.profile(id).aa.as_ref().map(|aa| aa.aa_type.clone()))
        .collect();
    types.into_iter().collect()
}

/// Enemy live units that `side`'s AA of `aa_type` may shoot at.
pub fn targets(ctx: &BattleContext, side: Side, aa_type: &str, rules: &RuleSet) -> Vec<UnitId> {
    let mut kinds: BTreeSet<&str> = BTreeSet::new();
    for id in ctx.side(side).live_and_waiting() {
        if let Some(aa) = &ctx.profile(id).aa {
            if aa.aa_type == aa_type {
                kinds.extend(aa.targets.iter().map(String::as_str));
            }
        }
    }
    let airborne: &[String] = match side {
        Side::Defender => rules
            .airborne_targeted_by_aa
            .get(aa_type)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        Side::Attacker => &[],
    };

    ctx.side(side.opponent())
        .live
        .iter()
        .copied()
        .filter(|id| {
            let Some(unit) = ctx.unit(*id) else {
                return false;
            };
            kinds.contains(unit.kind.as_str())
                || (ctx.profile(*id).is_air() && airborne.iter().any(|k| *k == unit.kind))
        })
        .collect()
}

/// Dice for AA units shooting at `target_count` targets.
///
/// Units with no attack limit roll once per target. The total never exceeds
/// the number of targets.
pub fn dice_pools(ctx: &BattleContext, side: Side, firing: &[UnitId], target_count: usize) -> Vec<DicePool> {
    let mut left = target_count as u32;
    let mut pools = Vec::new();
    for id in firing {
        if left == 0 {
            break;
        }
        let Some(aa) = &ctx.profile(*id).aa else {
            continue;
        };
        let shots = if aa.max_attacks <= 0 {
            target_count as u32
        } else {
            aa.max_attacks as u32
        };
        let count = shots.min(left);
        left -= count;
        pools.push(DicePool {
            strength: aa.strength(side),
            count,
        });
    }
    pools
}

/// Roll frames for `side`'s AA fire, one set per AA type.
pub fn frames(ctx: &BattleContext, side: Side, step: &str, rules: &RuleSet) -> Vec<FireFrame> {
    let firing = aa_units(ctx, side, rules);
    let mut frames = Vec::new();
    for aa_type in aa_types(ctx, side, rules) {
        let of_type: Vec<UnitId> = firing
            .iter()
            .copied()
            .filter(|id| {
                ctx.profile(*id)
                    .aa
                    .as_ref()
                    .is_some_and(|aa| aa.aa_type == aa_type)
            })
            .collect();
        for group in firing_groups(ctx, &of_type) {
            frames.push(FireFrame::Roll(FireState::new(
                format!("{} {}", step, aa_type),
                side,
                group,
                Vec::new(),
                ReturnFire::All,
                FireKind::Aa {
                    aa_type: aa_type.clone(),
                },
            )));
        }
    }
    frames
}
