//! Default casualty choice and validation of chosen casualties.

use std::collections::{BTreeMap, BTreeSet};

use super::context::BattleContext;
use super::decision::CasualtyDetails;
use super::error::{BattleError, Result};
use crate::board::{Side, UnitId};

/// The usual loss order for `hits` against `candidates` owned by `side`.
///
/// Units with spare hit points soak hits first, down to their last hit
/// point, then the weakest and cheapest units are destroyed. A unit listed
/// `n` times in `damaged` takes `n` points of damage.
pub fn default_casualties(
    ctx: &BattleContext,
    candidates: &[UnitId],
    hits: u32,
    side: Side,
) -> CasualtyDetails {
    let mut remaining = hits.min(ctx.max_hits(candidates));
    let mut details = CasualtyDetails::default();

    for id in candidates {
        if remaining == 0 {
            break;
        }
        let spare = ctx.remaining_hit_points(*id).saturating_sub(1).min(remaining);
        details.damaged.extend(std::iter::repeat(*id).take(spare as usize));
        remaining -= spare;
    }

    let mut order = candidates.to_vec();
    order.sort_by_key(|id| {
        let profile = ctx.profile(*id);
        (profile.power(side), profile.cost, *id)
    });
    for id in order {
        if remaining == 0 {
            break;
        }
        let taken = details.damaged.iter().filter(|d| **d == id).count() as u32;
        let left = ctx.remaining_hit_points(id).saturating_sub(taken);
        if left == 0 || left > remaining {
            continue;
        }
        details.damaged.retain(|d| *d != id);
        details.killed.push(id);
        remaining -= left;
    }

    details
}

/// Checks a chosen casualty list against the candidates and hit count.
///
/// Killed units appear once. A damaged unit may repeat, but must keep at
/// least one hit point and may not also be killed.
pub fn validate_casualties(
    ctx: &BattleContext,
    candidates: &[UnitId],
    hits: u32,
    details: &CasualtyDetails,
) -> Result<()> {
    let mut killed = BTreeSet::new();
    for id in &details.killed {
        if !candidates.contains(id) {
            return Err(BattleError::CasualtyNotCandidate(*id));
        }
        if !killed.insert(*id) {
            return Err(BattleError::DuplicateCasualty(*id));
        }
    }

    let mut damage: BTreeMap<UnitId, u32> = BTreeMap::new();
    for id in &details.damaged {
        if !candidates.contains(id) {
            return Err(BattleError::CasualtyNotCandidate(*id));
        }
        if killed.contains(id) {
            return Err(BattleError::DuplicateCasualty(*id));
        }
        *damage.entry(*id).or_default() += 1;
    }
    for (id, taken) in &damage {
        if *taken >= ctx.remaining_hit_points(*id) {
            return Err(BattleError::CannotDamage(*id));
        }
    }

    let absorbed = ctx.max_hits(&details.killed) + details.damaged.len() as u32;
    let expected = hits.min(ctx.max_hits(candidates));
    if absorbed != expected {
        return Err(BattleError::HitMismatch { absorbed, expected });
    }
    Ok(())
}
