//! The full multi-round battle.
//!
//! Each round is planned as a list of `Step`s and pushed on the execution
//! stack in one go. The last step of a round pushes `NextRound`, which plans
//! the following round, so the stack is never empty while the battle goes
//! on. Every step is plain data; a battle saved while waiting on a decision
//! resumes exactly where it stopped.

use serde::{Deserialize, Serialize};

use super::context::{BattleContext, BattleStatus};
use super::error::{BattleError, Result};
use super::fire::{self, FireFrame, FireKind, FrameOutcome, ReturnFire};
use super::retreat::{self, RetreatMode};
use super::stack::{ExecutionStack, Flow, StackState};
use super::{aa, abort, finish, remove_lost_units, Battle, Bridge, Progress};
use crate::board::{Side, UnitId, BOTH_SIDES};
use crate::rules::RuleSet;

/// One unit of work in a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    OffensiveAa,
    DefensiveAa,
    RemoveNonCombatants,
    NavalBombardment,
    SuicideAttack,
    SuicideDefend,
    LandParatroopers,
    MarkNoMovementLeft,
    AttackerSubsRetreatBeforeBattle,
    DefenderSubsRetreatBeforeBattle,
    RemoveSuicideUnits,
    CheckUndefendedTransports,
    CheckUnitsThatCanRollLeft,
    SubmergeSubsVsOnlyAir,
    DefendingSubsFire { return_fire: ReturnFire },
    AttackingSubsFire { return_fire: ReturnFire },
    AttackingAirFire,
    AttackingNonSubsFire,
    DefendingAirFire,
    DefendingNonSubsFire,
    ClearWaitingToDie,
    CheckBattleEnd,
    AttackerSubsRetreat,
    AttackerPlanesRetreat,
    AttackerPartialAmphibiousRetreat,
    AttackerRetreat,
    DefenderSubsRetreat,
    EndRound,
    NextRound,
    Fire(FireFrame),
}

impl Step {
    /// Name shown to players, or `None` for bookkeeping steps.
    pub fn label(&self, ctx: &BattleContext) -> Option<String> {
        let (a, d) = (&ctx.attacker, &ctx.defender);
        let label = match self {
            Step::OffensiveAa => format!("{} fire offensive AA", a),
            Step::DefensiveAa => format!("{} fire AA", d),
            Step::NavalBombardment => format!("{} naval bombardment", a),
            Step::SuicideAttack => format!("{} suicide attack", a),
            Step::SuicideDefend => format!("{} suicide defend", d),
            Step::LandParatroopers => format!("{} land paratroopers", a),
            Step::AttackerSubsRetreatBeforeBattle => format!("{} subs withdraw before battle?", a),
            Step::DefenderSubsRetreatBeforeBattle => format!("{} subs withdraw before battle?", d),
            Step::CheckUndefendedTransports => "remove undefended transports".to_string(),
            Step::SubmergeSubsVsOnlyAir => "submerge subs facing only air".to_string(),
            Step::DefendingSubsFire { .. } => format!("{} subs fire", d),
            Step::AttackingSubsFire { .. } => format!("{} subs fire", a),
            Step::AttackingAirFire => format!("{} air fire", a),
            Step::AttackingNonSubsFire => format!("{} fire", a),
            Step::DefendingAirFire => format!("{} air fire", d),
            Step::DefendingNonSubsFire => format!("{} fire", d),
            Step::AttackerSubsRetreat => format!("{} subs withdraw?", a),
            Step::AttackerPlanesRetreat => format!("{} planes withdraw?", a),
            Step::AttackerPartialAmphibiousRetreat => {
                format!("{} non-amphibious units withdraw?", a)
            }
            Step::AttackerRetreat => format!("{} withdraw?", a),
            Step::DefenderSubsRetreat => format!("{} subs withdraw?", d),
            Step::RemoveNonCombatants
            | Step::MarkNoMovementLeft
            | Step::RemoveSuicideUnits
            | Step::CheckUnitsThatCanRollLeft
            | Step::ClearWaitingToDie
            | Step::CheckBattleEnd
            | Step::EndRound
            | Step::NextRound
            | Step::Fire(_) => return None,
        };
        Some(label)
    }
}

/// A full battle over one territory or sea zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MustFightBattle {
    pub ctx: BattleContext,
    pub stack: ExecutionStack<Step>,
    #[serde(default)]
    started: bool,
}

impl MustFightBattle {
    pub fn new(ctx: BattleContext) -> Self {
        MustFightBattle {
            ctx,
            stack: ExecutionStack::new(),
            started: false,
        }
    }

    /// Steps of the current round as shown to players.
    pub fn step_names(&self, rules: &RuleSet) -> Vec<String> {
        step_names(&self.ctx, rules, !self.started || self.ctx.round == 1)
    }

    fn start(&mut self, bridge: &mut Bridge<'_>) {
        self.started = true;
        let names = step_names(&self.ctx, bridge.rules, true);
        bridge.display.list_battle_steps(self.ctx.id, &names);
        tracing::info!(
            battle = %self.ctx.id,
            site = %self.ctx.site,
            attackers = self.ctx.attacking.live.len(),
            defenders = self.ctx.defending.live.len(),
            "battle starts"
        );

        if self.ctx.combatants(Side::Attacker).is_empty() {
            finish(&mut self.ctx, BattleStatus::DefenderWon, bridge);
        } else if self.ctx.combatants(Side::Defender).is_empty() {
            finish(&mut self.ctx, BattleStatus::AttackerWon, bridge);
        } else {
            let plan = round_plan(&self.ctx, bridge.rules, true);
            self.stack.push_plan(plan);
        }
    }
}

impl Battle for MustFightBattle {
    fn context(&self) -> &BattleContext {
        &self.ctx
    }

    fn advance(&mut self, bridge: &mut Bridge<'_>) -> Result<Progress> {
        if !self.started {
            self.start(bridge);
        }
        let ctx = &mut self.ctx;
        match self.stack.run(|step, stack| execute(ctx, step, stack, bridge)) {
            Ok(StackState::Suspended) => Ok(Progress::Suspended),
            Ok(StackState::Exhausted) => Ok(Progress::Finished(self.ctx.status)),
            Err(e) => {
                abort(&mut self.ctx, &e);
                Err(e)
            }
        }
    }

    fn cancel(&mut self, bridge: &mut Bridge<'_>) {
        self.stack.clear();
        finish(&mut self.ctx, BattleStatus::Cancelled, bridge);
    }

    fn units_lost_elsewhere(&mut self, units: &[UnitId], withdrawn: bool) {
        remove_lost_units(&mut self.ctx, units, withdrawn);
    }
}

/// Names of the listed steps of a round.
pub fn step_names(ctx: &BattleContext, rules: &RuleSet, first: bool) -> Vec<String> {
    round_plan(ctx, rules, first)
        .iter()
        .filter_map(|s| s.label(ctx))
        .collect()
}

/// Plans one round of combat.
pub fn round_plan(ctx: &BattleContext, rules: &RuleSet, first: bool) -> Vec<Step> {
    let mut plan = Vec::new();

    let offensive_aa = !aa::aa_units(ctx, Side::Attacker, rules).is_empty();
    let defensive_aa = !aa::aa_units(ctx, Side::Defender, rules).is_empty();
    if offensive_aa {
        plan.push(Step::OffensiveAa);
    }
    if defensive_aa {
        plan.push(Step::DefensiveAa);
    }
    if offensive_aa || defensive_aa {
        plan.push(Step::ClearWaitingToDie);
    }

    if first {
        plan.extend([
            Step::NavalBombardment,
            Step::SuicideAttack,
            Step::SuicideDefend,
            Step::RemoveNonCombatants,
            Step::LandParatroopers,
            Step::MarkNoMovementLeft,
        ]);
    } else {
        plan.push(Step::RemoveNonCombatants);
    }

    if rules.sub_retreat_before_battle {
        plan.push(Step::AttackerSubsRetreatBeforeBattle);
        plan.push(Step::DefenderSubsRetreatBeforeBattle);
    }
    plan.push(Step::RemoveSuicideUnits);
    if rules.transport_casualties_restricted {
        plan.push(Step::CheckUndefendedTransports);
        plan.push(Step::CheckUnitsThatCanRollLeft);
    }
    if rules.air_attack_sub_restricted {
        plan.push(Step::SubmergeSubsVsOnlyAir);
    }

    plan.extend(fire_order(ctx, rules));

    plan.extend([
        Step::ClearWaitingToDie,
        Step::RemoveSuicideUnits,
        Step::CheckBattleEnd,
        Step::AttackerSubsRetreat,
        Step::AttackerPlanesRetreat,
        Step::AttackerPartialAmphibiousRetreat,
        Step::AttackerRetreat,
        Step::DefenderSubsRetreat,
        Step::EndRound,
    ]);
    plan
}

/// Firing steps in order, with sneak attacks resolved.
///
/// Submarines fire first when the enemy has no destroyer. Defending subs
/// may fire before everything else when only they get a surprise shot.
pub fn fire_order(ctx: &BattleContext, rules: &RuleSet) -> Vec<Step> {
    let ww2v2 = rules.ww2v2;
    let sneak3 = rules.defending_subs_sneak();
    let attackers_sneak = !ctx.has_destroyer(Side::Defender, false);
    let defenders_sneak = !ctx.has_destroyer(Side::Attacker, false) && sneak3;

    // Fate of units hit by attacking subs.
    let against_attacking_subs = if !attackers_sneak {
        ReturnFire::All
    } else if defenders_sneak || ww2v2 {
        ReturnFire::Subs
    } else {
        ReturnFire::None
    };
    // Fate of units hit by defending subs.
    let against_defending_subs = if !defenders_sneak {
        ReturnFire::All
    } else if attackers_sneak || ww2v2 {
        ReturnFire::Subs
    } else {
        ReturnFire::None
    };

    let defender_subs_first =
        against_attacking_subs == ReturnFire::All && against_defending_subs == ReturnFire::None;
    let fire_with_all = !defender_subs_first && !ww2v2 && against_defending_subs == ReturnFire::All;
    let air_restricted = rules.air_attack_sub_restricted;
    let defending_subs = Step::DefendingSubsFire {
        return_fire: against_defending_subs,
    };

    let mut order = Vec::new();
    if defender_subs_first {
        order.push(defending_subs.clone());
    }
    order.push(Step::AttackingSubsFire {
        return_fire: against_attacking_subs,
    });
    if sneak3 && !defender_subs_first && !fire_with_all {
        order.push(defending_subs.clone());
    }
    if air_restricted {
        order.push(Step::AttackingAirFire);
    }
    order.push(Step::AttackingNonSubsFire);
    if !defender_subs_first && (!sneak3 || fire_with_all) {
        order.push(defending_subs);
    }
    if air_restricted {
        order.push(Step::DefendingAirFire);
    }
    order.push(Step::DefendingNonSubsFire);
    order
}

/// Runs one step against the battle.
pub fn execute(
    ctx: &mut BattleContext,
    step: &Step,
    stack: &mut ExecutionStack<Step>,
    bridge: &mut Bridge<'_>,
) -> Result<Flow> {
    if ctx.is_over() {
        return Ok(Flow::Continue);
    }
    if let Some(label) = step.label(ctx) {
        bridge.display.goto_battle_step(ctx.id, &label);
    }
    let rules = bridge.rules;

    match step {
        Step::OffensiveAa => push_frames(stack, aa::frames(ctx, Side::Attacker, "offensive AA", rules)),
        Step::DefensiveAa => push_frames(stack, aa::frames(ctx, Side::Defender, "AA", rules)),
        Step::ClearWaitingToDie => {
            for side in BOTH_SIDES {
                let waiting = ctx.side(side).waiting_to_die.clone();
                fire::destroy(ctx, &waiting, bridge);
            }
        }
        Step::RemoveNonCombatants => remove_non_combatants(ctx),
        Step::NavalBombardment => {
            let firing = ctx.bombarding.clone();
            let targets = ctx.defending.live.clone();
            let return_fire = if rules.naval_bombard_casualties_return_fire {
                ReturnFire::All
            } else {
                ReturnFire::None
            };
            let label = step.label(ctx).unwrap_or_default();
            push_frames(
                stack,
                fire::volley(ctx, &label, Side::Attacker, &firing, &targets, return_fire, FireKind::Bombard),
            );
        }
        Step::SuicideAttack => suicide_fire(ctx, step, Side::Attacker, stack, rules),
        Step::SuicideDefend => {
            if !rules.defending_suicide_and_munition_units_do_not_fire {
                suicide_fire(ctx, step, Side::Defender, stack, rules);
            }
        }
        Step::LandParatroopers => {
            if rules.paratroopers {
                let carriers = ctx.matching(&ctx.attacking.live, |t| t.is_air_transport);
                for id in carriers {
                    ctx.dependents.remove(&id);
                }
            }
        }
        Step::MarkNoMovementLeft => {
            for id in ctx.matching(&ctx.attacking.live, |t| !t.is_air()) {
                if let Some(unit) = ctx.units.get_mut(&id) {
                    unit.no_movement_left = true;
                }
            }
        }
        Step::AttackerSubsRetreatBeforeBattle => {
            if retreat::can_attacker_retreat_subs(ctx, rules, bridge.map) {
                let to = retreat::attacker_retreat_territories(ctx, rules, bridge.map);
                return retreat::query_retreat(ctx, Side::Attacker, RetreatMode::Subs, to, bridge);
            }
        }
        Step::DefenderSubsRetreatBeforeBattle | Step::DefenderSubsRetreat => {
            if retreat::can_defender_retreat_subs(ctx, rules, bridge.map) {
                let to = retreat::defender_sub_destinations(ctx, bridge.map);
                return retreat::query_retreat(ctx, Side::Defender, RetreatMode::Subs, to, bridge);
            }
        }
        Step::RemoveSuicideUnits => {
            let sides: &[Side] = if rules.defending_suicide_and_munition_units_do_not_fire {
                &[Side::Attacker]
            } else {
                &BOTH_SIDES
            };
            for side in sides {
                let spent = ctx.matching(&ctx.side(*side).live_and_waiting(), |t| t.is_suicide);
                fire::destroy(ctx, &spent, bridge);
            }
        }
        Step::CheckUndefendedTransports => {
            check_undefended_transports(ctx, Side::Defender, bridge);
            check_undefended_transports(ctx, Side::Attacker, bridge);
        }
        Step::CheckUnitsThatCanRollLeft => {
            check_units_that_can_roll_left(ctx, Side::Attacker, bridge);
            check_units_that_can_roll_left(ctx, Side::Defender, bridge);
        }
        Step::SubmergeSubsVsOnlyAir => submerge_subs_vs_only_air(ctx, bridge),
        Step::AttackingSubsFire { return_fire } => {
            let firing = ctx.matching(&ctx.attacking.live, |t| t.is_sub);
            let targets = ctx.matching(&ctx.defending.live, |t| !t.is_air());
            push_volley(ctx, step, Side::Attacker, &firing, &targets, *return_fire, stack);
        }
        Step::DefendingSubsFire { return_fire } => {
            if !ctx.attacking.live.is_empty() {
                let firing = ctx.matching(&ctx.defending.live_and_waiting(), |t| t.is_sub);
                let targets = ctx.matching(&ctx.attacking.live, |t| !t.is_air());
                push_volley(ctx, step, Side::Defender, &firing, &targets, *return_fire, stack);
            }
        }
        Step::AttackingNonSubsFire => non_sub_fire(ctx, step, Side::Attacker, stack, rules),
        Step::DefendingNonSubsFire => non_sub_fire(ctx, step, Side::Defender, stack, rules),
        Step::AttackingAirFire => air_on_non_subs_fire(ctx, step, Side::Attacker, stack),
        Step::DefendingAirFire => air_on_non_subs_fire(ctx, step, Side::Defender, stack),
        Step::CheckBattleEnd => check_battle_end(ctx, bridge),
        Step::AttackerSubsRetreat => {
            if !rules.sub_retreat_before_battle && retreat::can_attacker_retreat_subs(ctx, rules, bridge.map) {
                let to = retreat::attacker_retreat_territories(ctx, rules, bridge.map);
                return retreat::query_retreat(ctx, Side::Attacker, RetreatMode::Subs, to, bridge);
            }
        }
        Step::AttackerPlanesRetreat => {
            if retreat::can_attacker_retreat_planes(ctx, rules)
                && !retreat::can_attacker_retreat_partial_amphibious(ctx, rules)
            {
                let to = vec![ctx.site.clone()];
                return retreat::query_retreat(ctx, Side::Attacker, RetreatMode::Planes, to, bridge);
            }
        }
        Step::AttackerPartialAmphibiousRetreat => {
            if retreat::can_attacker_retreat_partial_amphibious(ctx, rules) {
                let to = retreat::attacker_retreat_territories(ctx, rules, bridge.map);
                return retreat::query_retreat(ctx, Side::Attacker, RetreatMode::PartialAmphibious, to, bridge);
            }
        }
        Step::AttackerRetreat => {
            if retreat::can_attacker_retreat(ctx, rules, bridge.map) {
                let to = retreat::attacker_retreat_territories(ctx, rules, bridge.map);
                return retreat::query_retreat(ctx, Side::Attacker, RetreatMode::Default, to, bridge);
            }
        }
        Step::EndRound => {
            if !stack.is_empty() {
                return Err(BattleError::StackNotEmpty(stack.len()));
            }
            ctx.round += 1;
            ctx.killed_this_round.clear();
            tracing::debug!(battle = %ctx.id, round = ctx.round, "next round");
            stack.push(Step::NextRound);
        }
        Step::NextRound => {
            let names = step_names(ctx, rules, false);
            bridge.display.list_battle_steps(ctx.id, &names);
            stack.push_plan(round_plan(ctx, rules, false));
        }
        Step::Fire(frame) => {
            if matches!(frame.state().kind, FireKind::Air) {
                return Err(BattleError::ForeignStep(frame.state().step.clone()));
            }
            return match fire::execute(ctx, frame, bridge)? {
                FrameOutcome::Next(next) => {
                    stack.push(Step::Fire(next));
                    Ok(Flow::Continue)
                }
                FrameOutcome::Done => Ok(Flow::Continue),
                FrameOutcome::Suspend => Ok(Flow::Suspend),
            };
        }
    }
    Ok(Flow::Continue)
}

fn push_frames(stack: &mut ExecutionStack<Step>, frames: Vec<FireFrame>) {
    stack.push_plan(frames.into_iter().map(Step::Fire).collect());
}

fn push_volley(
    ctx: &BattleContext,
    step: &Step,
    side: Side,
    firing: &[UnitId],
    targets: &[UnitId],
    return_fire: ReturnFire,
    stack: &mut ExecutionStack<Step>,
) {
    let label = step.label(ctx).unwrap_or_default();
    push_frames(
        stack,
        fire::volley(ctx, &label, side, firing, targets, return_fire, FireKind::Regular),
    );
}

/// Air may hit submarines only when no subs are among the targets or a
/// destroyer fires alongside it.
fn can_air_attack_subs(ctx: &BattleContext, fired_at: &[UnitId], firing: &[UnitId]) -> bool {
    !ctx.any(fired_at, |t| t.is_sub) || ctx.any(firing, |t| t.is_destroyer)
}

fn non_sub_fire(ctx: &BattleContext, step: &Step, side: Side, stack: &mut ExecutionStack<Step>, rules: &RuleSet) {
    let enemy = &ctx.side(side.opponent()).live;
    if enemy.is_empty() {
        return;
    }
    let mut firing = ctx.matching(&ctx.side(side).live_and_waiting(), |t| !t.is_sub);
    if side == Side::Attacker && !rules.allied_air_independent {
        firing.retain(|id| ctx.unit(*id).is_some_and(|u| u.owner == ctx.attacker));
    }
    if rules.air_attack_sub_restricted && !can_air_attack_subs(ctx, enemy, &firing) {
        firing = ctx.matching(&firing, |t| !t.is_air());
    }
    let targets = enemy.clone();
    push_volley(ctx, step, side, &firing, &targets, ReturnFire::All, stack);
}

fn air_on_non_subs_fire(ctx: &BattleContext, step: &Step, side: Side, stack: &mut ExecutionStack<Step>) {
    let enemy = &ctx.side(side.opponent()).live;
    let own = ctx.side(side).live_and_waiting();
    if can_air_attack_subs(ctx, enemy, &own) {
        return;
    }
    let firing = ctx.matching(&own, |t| t.is_air());
    let targets = ctx.matching(enemy, |t| !t.is_sub);
    push_volley(ctx, step, side, &firing, &targets, ReturnFire::All, stack);
}

fn suicide_fire(ctx: &BattleContext, step: &Step, side: Side, stack: &mut ExecutionStack<Step>, rules: &RuleSet) {
    let firing = ctx.matching(&ctx.side(side).live, |t| t.is_suicide);
    if firing.is_empty() {
        return;
    }
    let mut targets = ctx.side(side.opponent()).live.clone();
    if rules.air_attack_sub_restricted && !ctx.has_destroyer(side, false) {
        targets = ctx.matching(&targets, |t| !t.is_sub);
    }
    if ctx.all(&firing, |t| t.is_sub) {
        targets = ctx.matching(&targets, |t| !t.is_air());
    }
    let return_fire = if rules.suicide_and_munition_casualties_restricted {
        ReturnFire::None
    } else {
        ReturnFire::All
    };
    push_volley(ctx, step, side, &firing, &targets, return_fire, stack);
}

/// Sidelines units that cannot fight at this site or in this round.
fn remove_non_combatants(ctx: &mut BattleContext) {
    let water = ctx.site_is_water;
    let round = ctx.round;
    for side in BOTH_SIDES {
        let idle = ctx.matching(&ctx.side(side).live, |t| {
            (water && t.is_land()) || (!water && t.is_sea()) || !t.fights_in_round(round)
        });
        if !idle.is_empty() {
            tracing::debug!(battle = %ctx.id, side = side.label(), units = idle.len(), "units sidelined");
            ctx.sideline(side, &idle);
        }
    }
}

/// Transports left without escort against armed enemy ships are lost.
fn check_undefended_transports(ctx: &mut BattleContext, side: Side, bridge: &mut Bridge<'_>) {
    if side == Side::Attacker && attacker_can_leave(ctx, bridge) {
        return;
    }
    let live = ctx.side(side).live.clone();
    let transports = ctx.matching(&live, |t| t.is_non_combat_transport());
    if transports.is_empty() {
        return;
    }
    let allied = ctx.matching(&live, |t| !t.is_land());
    if transports.len() != allied.len() {
        return;
    }
    let enemy = side.opponent();
    let armed = ctx.any(&ctx.side(enemy).live, |t| !t.is_land() && t.can_roll(enemy));
    if armed {
        tracing::info!(battle = %ctx.id, transports = transports.len(), "undefended transports lost");
        fire::destroy(ctx, &transports, bridge);
    }
}

/// A side that can no longer roll any dice against an enemy that still can
/// loses its remaining units.
fn check_units_that_can_roll_left(ctx: &mut BattleContext, side: Side, bridge: &mut Bridge<'_>) {
    if side == Side::Attacker && attacker_can_leave(ctx, bridge) {
        return;
    }
    if ctx.attacking.live.is_empty() || ctx.defending.live.is_empty() {
        return;
    }
    let water = ctx.site_is_water;
    let in_place = |ctx: &BattleContext, ids: &[UnitId]| -> Vec<UnitId> {
        ids.iter()
            .copied()
            .filter(|id| {
                let t = ctx.profile(*id);
                let submerged = ctx.unit(*id).is_some_and(|u| u.submerged);
                !submerged && !(t.is_sea() && !water) && !(t.is_land() && water)
            })
            .collect()
    };
    let own = in_place(ctx, &ctx.side(side).live);
    let enemy_side = side.opponent();
    let enemy = in_place(ctx, &ctx.side(enemy_side).live);
    if !ctx.any(&own, |t| t.can_roll(side)) && ctx.any(&enemy, |t| t.can_roll(enemy_side)) {
        let doomed = ctx.matching(&own, |t| !t.is_infrastructure);
        fire::destroy(ctx, &doomed, bridge);
    }
}

fn attacker_can_leave(ctx: &BattleContext, bridge: &Bridge<'_>) -> bool {
    !retreat::attacker_retreat_territories(ctx, bridge.rules, bridge.map).is_empty()
        || ctx.any(&ctx.attacking.live, |t| t.is_air())
}

/// Submarines facing nothing but aircraft slip away.
fn submerge_subs_vs_only_air(ctx: &mut BattleContext, bridge: &mut Bridge<'_>) {
    for side in [Side::Defender, Side::Attacker] {
        let enemy = &ctx.side(side.opponent()).live;
        if enemy.is_empty() || !ctx.all(enemy, |t| t.is_air()) {
            continue;
        }
        let subs = ctx.matching(&ctx.side(side).live, |t| t.is_sub);
        if subs.is_empty() {
            continue;
        }
        ctx.retreat(side, &subs, true);
        bridge
            .display
            .notify_retreat(ctx.id, ctx.player(side), &subs, "subs submerge facing only air");
        return;
    }
}

fn check_battle_end(ctx: &mut BattleContext, bridge: &mut Bridge<'_>) {
    let status = if ctx.combatants(Side::Attacker).is_empty() {
        BattleStatus::DefenderWon
    } else if ctx.combatants(Side::Defender).is_empty() {
        BattleStatus::AttackerWon
    } else if bridge.rules.max_rounds_reached(ctx.round) {
        BattleStatus::Draw
    } else if ctx.power(Side::Attacker) == 0 && ctx.power(Side::Defender) == 0 {
        BattleStatus::Draw
    } else {
        return;
    };
    finish(ctx, status, bridge);
}
