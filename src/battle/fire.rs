//! Firing steps.
//!
//! One volley is three frames. `Roll` rolls the group's dice and hands the
//! result to a `Select` frame, which settles casualties (forced or chosen by
//! the side that was hit) and hands them to a `Notify` frame, which reports
//! and applies them. Each frame carries everything it needs, so a battle
//! saved between frames resumes with the same dice and the same choice.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::aa;
use super::casualty::{default_casualties, validate_casualties};
use super::context::BattleContext;
use super::decision::{CasualtyDetails, CasualtyRequest, Decision};
use super::dice::{DicePool, DiceRoll};
use super::error::{BattleError, Result};
use super::Bridge;
use crate::board::{Side, UnitId};

/// What happens to units destroyed by a volley.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReturnFire {
    /// Casualties wait and may still fire this round.
    All,
    /// Only submarine casualties wait; the rest are removed at once.
    Subs,
    /// Casualties are removed at once.
    None,
}

/// Which strengths a volley rolls at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FireKind {
    Regular,
    Bombard,
    Aa { aa_type: String },
    Air,
}

/// A volley in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireState {
    pub step: String,
    pub firing_side: Side,
    pub firing: Vec<UnitId>,
    pub targets: Vec<UnitId>,
    pub return_fire: ReturnFire,
    pub kind: FireKind,
    pub dice: Option<DiceRoll>,
    pub casualties: Option<CasualtyDetails>,
}

impl FireState {
    pub fn new(
        step: impl Into<String>,
        firing_side: Side,
        firing: Vec<UnitId>,
        targets: Vec<UnitId>,
        return_fire: ReturnFire,
        kind: FireKind,
    ) -> Self {
        FireState {
            step: step.into(),
            firing_side,
            firing,
            targets,
            return_fire,
            kind,
            dice: None,
            casualties: None,
        }
    }

    pub fn hit_side(&self) -> Side {
        self.firing_side.opponent()
    }
}

/// One frame of a volley.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FireFrame {
    Roll(FireState),
    Select(FireState),
    Notify(FireState),
}

impl FireFrame {
    pub fn state(&self) -> &FireState {
        match self {
            FireFrame::Roll(s) | FireFrame::Select(s) | FireFrame::Notify(s) => s,
        }
    }
}

/// Result of running one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Next(FireFrame),
    Done,
    Suspend,
}

/// Splits firing units into one group per suicide-on-hit kind, then the rest.
pub fn firing_groups(ctx: &BattleContext, units: &[UnitId]) -> Vec<Vec<UnitId>> {
    let mut suicide: BTreeMap<&str, Vec<UnitId>> = BTreeMap::new();
    let mut rest = Vec::new();
    for id in units {
        match ctx.unit(*id) {
            Some(unit) if ctx.profile(*id).is_suicide_on_hit => {
                suicide.entry(unit.kind.as_str()).or_default().push(*id)
            }
            _ => rest.push(*id),
        }
    }
    let mut groups: Vec<Vec<UnitId>> = suicide.into_values().collect();
    if !rest.is_empty() {
        groups.push(rest);
    }
    groups
}

/// Roll frames for `firing` shooting at `targets`, in execution order.
///
/// Infrastructure is never a target. Nothing is produced when either side
/// of the exchange is empty.
pub fn volley(
    ctx: &BattleContext,
    step: &str,
    side: Side,
    firing: &[UnitId],
    targets: &[UnitId],
    return_fire: ReturnFire,
    kind: FireKind,
) -> Vec<FireFrame> {
    let targets = ctx.matching(targets, |t| !t.is_infrastructure);
    if firing.is_empty() || targets.is_empty() {
        return Vec::new();
    }
    firing_groups(ctx, firing)
        .into_iter()
        .map(|group| {
            FireFrame::Roll(FireState::new(
                step,
                side,
                group,
                targets.clone(),
                return_fire,
                kind.clone(),
            ))
        })
        .collect()
}

/// Runs one frame against the battle.
pub fn execute(ctx: &mut BattleContext, frame: &FireFrame, bridge: &mut Bridge<'_>) -> Result<FrameOutcome> {
    match frame {
        FireFrame::Roll(state) => roll(ctx, state.clone(), bridge),
        FireFrame::Select(state) => select(ctx, state, bridge),
        FireFrame::Notify(state) => {
            notify(ctx, state, bridge);
            Ok(FrameOutcome::Done)
        }
    }
}

fn roll(ctx: &BattleContext, mut state: FireState, bridge: &mut Bridge<'_>) -> Result<FrameOutcome> {
    if state.dice.is_some() {
        return Err(BattleError::AlreadyRolled(state.step));
    }
    let side = state.firing_side;

    let armed = match state.kind {
        FireKind::Bombard => ctx.bombarding.clone(),
        _ => ctx.side(side).live_and_waiting(),
    };
    state.firing.retain(|id| armed.contains(id));
    state.targets = match &state.kind {
        FireKind::Aa { aa_type } => aa::targets(ctx, side, aa_type, bridge.rules),
        _ => {
            let live = &ctx.side(side.opponent()).live;
            std::mem::take(&mut state.targets)
                .into_iter()
                .filter(|id| live.contains(id))
                .collect()
        }
    };
    if state.firing.is_empty() || state.targets.is_empty() {
        return Ok(FrameOutcome::Done);
    }

    let pools = dice_pools(ctx, &state);
    let annotation = format!("{} {}", ctx.player(side), state.step);
    let dice = DiceRoll::roll(&mut *bridge.dice, &pools, bridge.rules.dice_sides, &annotation)?;
    tracing::debug!(
        battle = %ctx.id,
        round = ctx.round,
        dice = dice.dice_count(),
        hits = dice.hits,
        "{}",
        annotation
    );
    bridge.display.notify_dice(ctx.id, &dice, &state.step);
    state.dice = Some(dice);
    Ok(FrameOutcome::Next(FireFrame::Select(state)))
}

fn dice_pools(ctx: &BattleContext, state: &FireState) -> Vec<DicePool> {
    let side = state.firing_side;
    match &state.kind {
        FireKind::Regular => state
            .firing
            .iter()
            .map(|id| {
                let p = ctx.profile(*id);
                DicePool {
                    strength: p.strength(side),
                    count: p.rolls(side),
                }
            })
            .collect(),
        FireKind::Bombard => state
            .firing
            .iter()
            .map(|id| {
                let p = ctx.profile(*id);
                DicePool {
                    strength: p.attack,
                    count: p.attack_rolls,
                }
            })
            .collect(),
        FireKind::Air => state
            .firing
            .iter()
            .map(|id| DicePool {
                strength: ctx.profile(*id).air_strength(side),
                count: 1,
            })
            .collect(),
        FireKind::Aa { .. } => aa::dice_pools(ctx, side, &state.firing, state.targets.len()),
    }
}

fn select(ctx: &BattleContext, state: &FireState, bridge: &mut Bridge<'_>) -> Result<FrameOutcome> {
    let Some(dice) = &state.dice else {
        return Err(BattleError::MissingDice(state.step.clone()));
    };
    match choose_casualties(ctx, state, dice, bridge)? {
        Decision::Pending => Ok(FrameOutcome::Suspend),
        Decision::Ready(casualties) => {
            let mut next = state.clone();
            next.casualties = Some(casualties);
            Ok(FrameOutcome::Next(FireFrame::Notify(next)))
        }
    }
}

fn choose_casualties(
    ctx: &BattleContext,
    state: &FireState,
    dice: &DiceRoll,
    bridge: &mut Bridge<'_>,
) -> Result<Decision<CasualtyDetails>> {
    let hits = dice.hits;
    let targets = &state.targets;
    let restricted = bridge.rules.transport_casualties_restricted
        && matches!(state.kind, FireKind::Regular | FireKind::Bombard);

    let transports = ctx.matching(targets, |t| t.is_non_combat_transport());
    if !restricted || transports.is_empty() {
        return ask(ctx, state, dice, targets, hits, bridge);
    }

    let others: Vec<UnitId> = targets
        .iter()
        .copied()
        .filter(|id| !transports.contains(id))
        .collect();
    let capacity = ctx.max_hits(&others);
    if hits == capacity {
        return Ok(Decision::Ready(CasualtyDetails::forced(others)));
    }
    if hits < capacity {
        return ask(ctx, state, dice, &others, hits, bridge);
    }

    // Overflow lands on transports; each owner keeps a choice among as many
    // transports as there are extra hits.
    let extra = hits - capacity;
    let mut by_owner: BTreeMap<&str, Vec<UnitId>> = BTreeMap::new();
    for id in &transports {
        if let Some(unit) = ctx.unit(*id) {
            by_owner.entry(unit.owner.as_str()).or_default().push(*id);
        }
    }
    let pool: Vec<UnitId> = by_owner
        .into_values()
        .flat_map(|list| list.into_iter().take(extra as usize))
        .collect();
    Ok(match ask(ctx, state, dice, &pool, extra, bridge)? {
        Decision::Pending => Decision::Pending,
        Decision::Ready(mut chosen) => {
            let mut killed = others;
            killed.append(&mut chosen.killed);
            chosen.killed = killed;
            Decision::Ready(chosen)
        }
    })
}

/// Forces casualties when the hits cover the pool, otherwise asks the side
/// that was hit.
fn ask(
    ctx: &BattleContext,
    state: &FireState,
    dice: &DiceRoll,
    pool: &[UnitId],
    hits: u32,
    bridge: &mut Bridge<'_>,
) -> Result<Decision<CasualtyDetails>> {
    if hits == 0 {
        return Ok(Decision::Ready(CasualtyDetails::forced(Vec::new())));
    }
    if hits >= ctx.max_hits(pool) {
        return Ok(Decision::Ready(CasualtyDetails::forced(pool.to_vec())));
    }

    let side = state.hit_side();
    let suggested = default_casualties(ctx, pool, hits, side);
    let request = CasualtyRequest {
        battle: ctx,
        step: &state.step,
        player: ctx.player(side),
        side,
        candidates: pool,
        hits,
        dice,
        suggested: &suggested,
    };
    match bridge.player(side).select_casualties(&request) {
        Decision::Pending => Ok(Decision::Pending),
        Decision::Ready(mut details) => {
            validate_casualties(ctx, pool, hits, &details)?;
            details.auto_calculated = false;
            Ok(Decision::Ready(details))
        }
    }
}

fn notify(ctx: &mut BattleContext, state: &FireState, bridge: &mut Bridge<'_>) {
    let empty = CasualtyDetails::default();
    let casualties = state.casualties.as_ref().unwrap_or(&empty);
    let side = state.firing_side;
    let hit_side = state.hit_side();

    bridge.display.casualty_notification(
        ctx.id,
        &state.step,
        ctx.player(hit_side),
        &casualties.killed,
        &casualties.damaged,
    );
    let message = format!(
        "{}: {} killed, {} damaged",
        state.step,
        casualties.killed.len(),
        casualties.damaged.len()
    );
    bridge.player(hit_side).confirm_own_casualties(ctx.id, &message);
    bridge.player(side).confirm_enemy_casualties(ctx.id, &message);

    ctx.mark_damaged(&casualties.damaged);
    remove_casualties(ctx, &casualties.killed, state.return_fire, hit_side, bridge);

    let hits = state.dice.as_ref().map_or(0, |d| d.hits) as usize;
    if hits > 0 && ctx.all(&state.firing, |t| t.is_suicide_on_hit) {
        let spent: Vec<UnitId> = state.firing.iter().copied().take(hits).collect();
        destroy(ctx, &spent, bridge);
    }
}

/// Applies a return-fire policy to freshly chosen casualties of `side`.
pub fn remove_casualties(
    ctx: &mut BattleContext,
    killed: &[UnitId],
    policy: ReturnFire,
    side: Side,
    bridge: &mut Bridge<'_>,
) {
    match policy {
        ReturnFire::All => ctx.move_to_waiting(side, killed),
        ReturnFire::Subs => {
            let subs = ctx.matching(killed, |t| t.is_sub);
            let rest: Vec<UnitId> = killed
                .iter()
                .copied()
                .filter(|id| !subs.contains(id))
                .collect();
            ctx.move_to_waiting(side, &subs);
            destroy(ctx, &rest, bridge);
        }
        ReturnFire::None => {
            destroy(ctx, killed, bridge);
        }
    }
}

/// Removes units from play for good and tells dependent battles.
pub fn destroy(ctx: &mut BattleContext, ids: &[UnitId], bridge: &mut Bridge<'_>) -> Vec<UnitId> {
    if ids.is_empty() {
        return Vec::new();
    }
    let lost = ctx.kill(ids);
    if lost.is_empty() {
        return lost;
    }
    tracing::debug!(battle = %ctx.id, lost = lost.len(), "units destroyed");
    let mut by_owner: BTreeMap<String, Vec<UnitId>> = BTreeMap::new();
    for id in &lost {
        if let Some(unit) = ctx.unit(*id) {
            by_owner.entry(unit.owner.clone()).or_default().push(*id);
        }
    }
    for (owner, dead) in &by_owner {
        bridge.display.dead_unit_notification(ctx.id, owner, dead);
    }
    for dependent in bridge.dependencies.dependent_battles(ctx.id) {
        bridge.dependencies.notify_units_lost(dependent, &lost, false);
    }
    lost
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::dependency::NoDependencies;
    use crate::battle::dice::ScriptedDice;
    use crate::battle::display::NullDisplay;
    use crate::battle::decision::{PlayerDecisions, RetreatChoice, RetreatRequest};
    use crate::board::{GameMap, TerritoryId, Unit, UnitCatalog};
    use crate::rules::RuleSet;

    /// Answers every casualty request with the suggestion, counting calls.
    #[derive(Default)]
    struct Counting {
        calls: u32,
        pending: bool,
    }

    impl PlayerDecisions for Counting {
        fn select_casualties(&mut self, request: &CasualtyRequest<'_>) -> Decision<CasualtyDetails> {
            self.calls += 1;
            if self.pending {
                return Decision::Pending;
            }
            Decision::Ready(request.suggested.clone())
        }

        fn retreat_query(&mut self, _request: &RetreatRequest<'_>) -> Decision<Option<RetreatChoice>> {
            Decision::Ready(None)
        }
    }

    fn sea_battle() -> BattleContext {
        let mut ctx = BattleContext::new(
            TerritoryId::new("sz1"),
            true,
            "Japan",
            "USA",
            UnitCatalog::standard(),
        );
        ctx.add_attacker(Unit::new(UnitId(1), "destroyer", "Japan"), None).unwrap();
        ctx.add_attacker(Unit::new(UnitId(2), "kamikazeBoat", "Japan"), None).unwrap();
        ctx.add_attacker(Unit::new(UnitId(3), "kamikazeBoat", "Japan"), None).unwrap();
        ctx.add_defender(Unit::new(UnitId(10), "transport", "USA")).unwrap();
        ctx.add_defender(Unit::new(UnitId(11), "destroyer", "USA")).unwrap();
        ctx.add_defender(Unit::new(UnitId(12), "cruiser", "USA")).unwrap();
        ctx
    }

    /// Runs a volley to completion, returning the number of decisions asked.
    fn run_volley(
        ctx: &mut BattleContext,
        frames: Vec<FireFrame>,
        rules: &RuleSet,
        faces: Vec<u32>,
    ) -> u32 {
        let map = GameMap::new();
        let mut dice = ScriptedDice::new(faces);
        let mut attacker = Counting::default();
        let mut defender = Counting::default();
        let mut display = NullDisplay;
        let mut deps = NoDependencies;
        let mut bridge = Bridge {
            rules,
            map: &map,
            dice: &mut dice,
            attacker: &mut attacker,
            defender: &mut defender,
            display: &mut display,
            dependencies: &mut deps,
        };
        for frame in frames {
            let mut next = Some(frame);
            while let Some(frame) = next.take() {
                match execute(ctx, &frame, &mut bridge).unwrap() {
                    FrameOutcome::Next(f) => next = Some(f),
                    FrameOutcome::Done => {}
                    FrameOutcome::Suspend => panic!("unexpected suspend"),
                }
            }
        }
        attacker.calls + defender.calls
    }

    #[test]
    fn suicide_on_hit_kinds_fire_apart() {
        let ctx = sea_battle();
        let groups = firing_groups(&ctx, &[UnitId(1), UnitId(2), UnitId(3)]);
        assert_eq!(groups, vec![vec![UnitId(2), UnitId(3)], vec![UnitId(1)]]);
    }

    #[test]
    fn volley_skips_infrastructure_and_empty_sides() {
        let mut ctx = sea_battle();
        ctx.add_defender(Unit::new(UnitId(13), "factory", "USA")).unwrap();
        let frames = volley(
            &ctx,
            "fire",
            Side::Attacker,
            &[UnitId(1)],
            &[UnitId(13)],
            ReturnFire::All,
            FireKind::Regular,
        );
        assert!(frames.is_empty());
        let frames = volley(&ctx, "fire", Side::Attacker, &[], &[UnitId(10)], ReturnFire::All, FireKind::Regular);
        assert!(frames.is_empty());
    }

    #[test]
    fn hits_covering_targets_need_no_decision() {
        let mut ctx = sea_battle();
        let frames = volley(
            &ctx,
            "fire",
            Side::Attacker,
            &[UnitId(1)],
            &[UnitId(11)],
            ReturnFire::None,
            FireKind::Regular,
        );
        let asked = run_volley(&mut ctx, frames, &RuleSet::default(), vec![1]);
        assert_eq!(asked, 0);
        assert_eq!(ctx.killed, vec![UnitId(11)]);
    }

    #[test]
    fn partial_hits_ask_the_defender() {
        let mut ctx = sea_battle();
        let targets = ctx.defending.live.clone();
        let frames = volley(&ctx, "fire", Side::Attacker, &[UnitId(1)], &targets, ReturnFire::All, FireKind::Regular);
        let asked = run_volley(&mut ctx, frames, &RuleSet::default(), vec![2]);
        assert_eq!(asked, 1);
        assert_eq!(ctx.defending.waiting_to_die, vec![UnitId(10)]);
        assert!(ctx.killed.is_empty());
    }

    #[test]
    fn subs_policy_keeps_only_submarines_waiting() {
        let mut ctx = sea_battle();
        ctx.add_defender(Unit::new(UnitId(14), "submarine", "USA")).unwrap();
        let casualties = [UnitId(11), UnitId(14)];
        let map = GameMap::new();
        let rules = RuleSet::default();
        let mut dice = ScriptedDice::new([]);
        let (mut a, mut d) = (Counting::default(), Counting::default());
        let (mut display, mut deps) = (NullDisplay, NoDependencies);
        let mut bridge = Bridge {
            rules: &rules,
            map: &map,
            dice: &mut dice,
            attacker: &mut a,
            defender: &mut d,
            display: &mut display,
            dependencies: &mut deps,
        };
        remove_casualties(&mut ctx, &casualties, ReturnFire::Subs, Side::Defender, &mut bridge);
        assert_eq!(ctx.defending.waiting_to_die, vec![UnitId(14)]);
        assert_eq!(ctx.killed, vec![UnitId(11)]);
        assert_eq!(ctx.census(), ctx.assigned);
    }

    #[test]
    fn restricted_transports_absorb_overflow_last() {
        let mut ctx = sea_battle();
        let rules = RuleSet {
            transport_casualties_restricted: true,
            ..RuleSet::default()
        };
        let targets = ctx.defending.live.clone();
        // Two hits against destroyer + cruiser: forced, transport survives.
        let frames = volley(
            &ctx,
            "fire",
            Side::Attacker,
            &[UnitId(1), UnitId(2), UnitId(3)],
            &targets,
            ReturnFire::None,
            FireKind::Regular,
        );
        // Kamikaze group rolls first (two dice), then the destroyer.
        let asked = run_volley(&mut ctx, frames, &rules, vec![1, 1, 6]);
        assert_eq!(asked, 0);
        assert_eq!(ctx.defending.live, vec![UnitId(10)]);
        // Both kamikaze boats die on their hits.
        assert!(ctx.killed.contains(&UnitId(2)) && ctx.killed.contains(&UnitId(3)));
        assert_eq!(ctx.census(), ctx.assigned);
    }

    #[test]
    fn rolling_twice_is_rejected() {
        let mut ctx = sea_battle();
        let mut state = FireState::new(
            "fire",
            Side::Attacker,
            vec![UnitId(1)],
            vec![UnitId(11)],
            ReturnFire::All,
            FireKind::Regular,
        );
        state.dice = Some(DiceRoll::evaluate(vec![1], vec![2], 6, "old"));
        let map = GameMap::new();
        let rules = RuleSet::default();
        let mut dice = ScriptedDice::new([1]);
        let (mut a, mut d) = (Counting::default(), Counting::default());
        let (mut display, mut deps) = (NullDisplay, NoDependencies);
        let mut bridge = Bridge {
            rules: &rules,
            map: &map,
            dice: &mut dice,
            attacker: &mut a,
            defender: &mut d,
            display: &mut display,
            dependencies: &mut deps,
        };
        let err = execute(&mut ctx, &FireFrame::Roll(state), &mut bridge);
        assert!(matches!(err, Err(BattleError::AlreadyRolled(_))));
    }
}
