//! Air-superiority battles.
//!
//! A short exchange between attacking aircraft and defending interceptors,
//! fought before the battle or raid the attackers are heading for. Each round
//! both sides fire once at their air strength, then either side may withdraw
//! in place. The battle stops after the configured number of rounds or as
//! soon as one side has no aircraft left.

use serde::{Deserialize, Serialize};

use super::context::{BattleContext, BattleStatus};
use super::decision::{Decision, InterceptRequest};
use super::error::{BattleError, Result};
use super::fire::{self, FireFrame, FireKind, FrameOutcome, ReturnFire};
use super::retreat::{self, RetreatMode};
use super::stack::{ExecutionStack, Flow, StackState};
use super::{abort, finish, remove_lost_units, Battle, Bridge, Progress};
use crate::board::{Side, UnitId, BOTH_SIDES};
use crate::rules::RuleSet;

/// One unit of work in an air battle round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AirStep {
    InterceptorsLaunch,
    AttackersFire,
    DefendersFire,
    Cleanup,
    CheckEnd,
    AttackerRetreat,
    DefenderRetreat,
    EndRound,
    NextRound,
    Fire(FireFrame),
}

impl AirStep {
    pub fn label(&self, ctx: &BattleContext) -> Option<String> {
        let label = match self {
            AirStep::InterceptorsLaunch => format!("{} launch interceptors", ctx.defender),
            AirStep::AttackersFire => format!("{} air fire", ctx.attacker),
            AirStep::DefendersFire => format!("{} interceptors fire", ctx.defender),
            AirStep::AttackerRetreat => format!("{} attackers withdraw?", ctx.attacker),
            AirStep::DefenderRetreat => format!("{} interceptors withdraw?", ctx.defender),
            AirStep::Cleanup | AirStep::CheckEnd | AirStep::EndRound | AirStep::NextRound | AirStep::Fire(_) => {
                return None
            }
        };
        Some(label)
    }
}

/// An interception fought over one territory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirBattle {
    pub ctx: BattleContext,
    pub stack: ExecutionStack<AirStep>,
    #[serde(default)]
    started: bool,
}

impl AirBattle {
    pub fn new(ctx: BattleContext) -> Self {
        AirBattle {
            ctx,
            stack: ExecutionStack::new(),
            started: false,
        }
    }
}

impl Battle for AirBattle {
    fn context(&self) -> &BattleContext {
        &self.ctx
    }

    fn advance(&mut self, bridge: &mut Bridge<'_>) -> Result<Progress> {
        if !self.started {
            self.started = true;
            let names = step_names(&self.ctx, bridge.rules, true);
            bridge.display.list_battle_steps(self.ctx.id, &names);
            tracing::info!(battle = %self.ctx.id, site = %self.ctx.site, "air battle starts");
            self.stack.push_plan(round_plan(true));
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

pub fn round_plan(first: bool) -> Vec<AirStep> {
    let mut plan = Vec::new();
    if first {
        plan.push(AirStep::InterceptorsLaunch);
    }
    plan.extend([
        AirStep::AttackersFire,
        AirStep::DefendersFire,
        AirStep::Cleanup,
        AirStep::CheckEnd,
        AirStep::AttackerRetreat,
        AirStep::DefenderRetreat,
        AirStep::EndRound,
    ]);
    plan
}

pub fn step_names(ctx: &BattleContext, rules: &RuleSet, first: bool) -> Vec<String> {
    round_plan(first)
        .iter()
        .filter(|s| match s {
            AirStep::AttackerRetreat => can_retreat(ctx, Side::Attacker, rules),
            AirStep::DefenderRetreat => can_retreat(ctx, Side::Defender, rules),
            _ => true,
        })
        .filter_map(|s| s.label(ctx))
        .collect()
}

fn both_present(ctx: &BattleContext) -> bool {
    !ctx.attacking.live.is_empty() && !ctx.defending.live.is_empty()
}

fn max_rounds_reached(ctx: &BattleContext, rules: &RuleSet) -> bool {
    rules.air_battle_rounds > 0 && ctx.round as i64 >= rules.air_battle_rounds as i64
}

fn can_retreat(ctx: &BattleContext, side: Side, rules: &RuleSet) -> bool {
    let allowed = match side {
        Side::Attacker => rules.air_battle_attackers_can_retreat,
        Side::Defender => rules.air_battle_defenders_can_retreat,
    };
    allowed && both_present(ctx) && !max_rounds_reached(ctx, rules)
}

pub fn execute(
    ctx: &mut BattleContext,
    step: &AirStep,
    stack: &mut ExecutionStack<AirStep>,
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
        AirStep::InterceptorsLaunch => {
            if rules.air_battle_defenders_can_retreat {
                let candidates = ctx.defending.live.clone();
                let request = InterceptRequest {
                    battle: ctx,
                    player: &ctx.defender,
                    candidates: &candidates,
                };
                let chosen = match bridge.player(Side::Defender).select_interceptors(&request) {
                    Decision::Pending => return Ok(Flow::Suspend),
                    Decision::Ready(chosen) => chosen,
                };
                let grounded: Vec<UnitId> = candidates
                    .iter()
                    .copied()
                    .filter(|id| !chosen.contains(id))
                    .collect();
                if !grounded.is_empty() {
                    tracing::debug!(battle = %ctx.id, grounded = grounded.len(), "interceptors stay grounded");
                    ctx.retreat(Side::Defender, &grounded, false);
                }
            }
        }
        AirStep::AttackersFire => push_fire(ctx, step, Side::Attacker, stack),
        AirStep::DefendersFire => push_fire(ctx, step, Side::Defender, stack),
        AirStep::Cleanup => {
            for side in BOTH_SIDES {
                let mut gone = ctx.side(side).waiting_to_die.clone();
                gone.extend(ctx.matching(&ctx.side(side).live, |t| t.is_suicide));
                fire::destroy(ctx, &gone, bridge);
            }
        }
        AirStep::CheckEnd => {
            if !both_present(ctx) || max_rounds_reached(ctx, rules) {
                let status = if ctx.attacking.live.is_empty() {
                    BattleStatus::DefenderWon
                } else if ctx.defending.live.is_empty() {
                    BattleStatus::AttackerWon
                } else {
                    BattleStatus::Draw
                };
                finish(ctx, status, bridge);
            }
        }
        AirStep::AttackerRetreat => {
            if can_retreat(ctx, Side::Attacker, rules) {
                let site = vec![ctx.site.clone()];
                return retreat::query_retreat(ctx, Side::Attacker, RetreatMode::Planes, site, bridge);
            }
        }
        AirStep::DefenderRetreat => {
            if can_retreat(ctx, Side::Defender, rules) {
                let site = vec![ctx.site.clone()];
                return retreat::query_retreat(ctx, Side::Defender, RetreatMode::Planes, site, bridge);
            }
        }
        AirStep::EndRound => {
            if !stack.is_empty() {
                return Err(BattleError::StackNotEmpty(stack.len()));
            }
            ctx.round += 1;
            ctx.killed_this_round.clear();
            stack.push(AirStep::NextRound);
        }
        AirStep::NextRound => {
            let names = step_names(ctx, rules, false);
            bridge.display.list_battle_steps(ctx.id, &names);
            stack.push_plan(round_plan(false));
        }
        AirStep::Fire(frame) => {
            if !matches!(frame.state().kind, FireKind::Air) {
                return Err(BattleError::ForeignStep(frame.state().step.clone()));
            }
            return match fire::execute(ctx, frame, bridge)? {
                FrameOutcome::Next(next) => {
                    stack.push(AirStep::Fire(next));
                    Ok(Flow::Continue)
                }
                FrameOutcome::Done => Ok(Flow::Continue),
                FrameOutcome::Suspend => Ok(Flow::Suspend),
            };
        }
    }
    Ok(Flow::Continue)
}

fn push_fire(ctx: &BattleContext, step: &AirStep, side: Side, stack: &mut ExecutionStack<AirStep>) {
    let firing = ctx.side(side).live_and_waiting();
    let targets = ctx.side(side.opponent()).live.clone();
    let label = step.label(ctx).unwrap_or_default();
    let frames = fire::volley(ctx, &label, side, &firing, &targets, ReturnFire::All, FireKind::Air);
    stack.push_plan(frames.into_iter().map(AirStep::Fire).collect());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::decision::{CasualtyDetails, CasualtyRequest, PlayerDecisions, RetreatChoice, RetreatRequest};
    use crate::battle::dependency::NoDependencies;
    use crate::battle::dice::ScriptedDice;
    use crate::battle::display::RecordingDisplay;
    use crate::board::{GameMap, TerritoryId, Unit, UnitCatalog};

    #[derive(Default)]
    struct Pilot {
        launch: Option<Vec<UnitId>>,
        withdraw: bool,
    }

    impl PlayerDecisions for Pilot {
        fn select_casualties(&mut self, request: &CasualtyRequest<'_>) -> Decision<CasualtyDetails> {
            Decision::Ready(request.suggested.clone())
        }

        fn retreat_query(&mut self, request: &RetreatRequest<'_>) -> Decision<Option<RetreatChoice>> {
            if self.withdraw {
                Decision::Ready(request.destinations.first().cloned().map(RetreatChoice::To))
            } else {
                Decision::Ready(None)
            }
        }

        fn select_interceptors(&mut self, request: &InterceptRequest<'_>) -> Decision<Vec<UnitId>> {
            match &self.launch {
                Some(ids) => Decision::Ready(ids.clone()),
                None => Decision::Ready(request.candidates.to_vec()),
            }
        }
    }

    fn dogfight() -> BattleContext {
        let mut ctx = BattleContext::new(TerritoryId::new("Ruhr"), false, "USA", "Germany", UnitCatalog::standard());
        ctx.add_attacker(Unit::new(UnitId(1), "bomber", "USA"), None).unwrap();
        ctx.add_attacker(Unit::new(UnitId(2), "fighter", "USA"), None).unwrap();
        ctx.add_defender(Unit::new(UnitId(10), "fighter", "Germany")).unwrap();
        ctx.add_defender(Unit::new(UnitId(11), "fighter", "Germany")).unwrap();
        ctx
    }

    fn run(battle: &mut AirBattle, rules: &RuleSet, faces: Vec<u32>, attacker: Pilot, defender: Pilot) -> Progress {
        let map = GameMap::new();
        let mut dice = ScriptedDice::new(faces);
        let (mut a, mut d) = (attacker, defender);
        let (mut display, mut deps) = (RecordingDisplay::default(), NoDependencies);
        let mut bridge = Bridge {
            rules,
            map: &map,
            dice: &mut dice,
            attacker: &mut a,
            defender: &mut d,
            display: &mut display,
            dependencies: &mut deps,
        };
        battle.advance(&mut bridge).unwrap()
    }

    #[test]
    fn single_round_exchange_ends_in_a_draw() {
        let mut battle = AirBattle::new(dogfight());
        let progress = run(&mut battle, &RuleSet::default(), vec![1, 6, 6, 6], Pilot::default(), Pilot::default());
        assert_eq!(progress, Progress::Finished(BattleStatus::Draw));
        assert_eq!(battle.ctx.killed.len(), 1);
        assert_eq!(battle.ctx.round, 1);
        assert_eq!(battle.ctx.census(), battle.ctx.assigned);
    }

    #[test]
    fn wiping_out_interceptors_wins() {
        let mut battle = AirBattle::new(dogfight());
        let progress = run(&mut battle, &RuleSet::default(), vec![1, 1, 6, 6], Pilot::default(), Pilot::default());
        assert_eq!(progress, Progress::Finished(BattleStatus::AttackerWon));
    }

    #[test]
    fn grounded_interceptors_sit_out() {
        let mut battle = AirBattle::new(dogfight());
        let rules = RuleSet {
            air_battle_defenders_can_retreat: true,
            ..RuleSet::default()
        };
        let defender = Pilot {
            launch: Some(vec![UnitId(10)]),
            ..Pilot::default()
        };
        let progress = run(&mut battle, &rules, vec![6, 6, 6], Pilot::default(), defender);
        assert_eq!(progress, Progress::Finished(BattleStatus::Draw));
        assert_eq!(battle.ctx.defending.retreated, vec![UnitId(11)]);
    }

    #[test]
    fn attackers_may_break_off() {
        let mut battle = AirBattle::new(dogfight());
        let rules = RuleSet {
            air_battle_rounds: 3,
            air_battle_attackers_can_retreat: true,
            ..RuleSet::default()
        };
        let attacker = Pilot {
            withdraw: true,
            ..Pilot::default()
        };
        let progress = run(&mut battle, &rules, vec![6, 6, 6, 6], attacker, Pilot::default());
        assert_eq!(progress, Progress::Finished(BattleStatus::DefenderWon));
        assert_eq!(battle.ctx.attacking.retreated.len(), 2);
    }

    #[test]
    fn regular_frames_are_rejected() {
        let mut battle = AirBattle::new(dogfight());
        battle.started = true;
        battle.stack.push(AirStep::Fire(FireFrame::Roll(crate::battle::FireState::new(
            "guns",
            Side::Attacker,
            vec![UnitId(1)],
            vec![UnitId(10)],
            ReturnFire::All,
            FireKind::Regular,
        ))));
        let map = GameMap::new();
        let rules = RuleSet::default();
        let mut dice = ScriptedDice::new([]);
        let (mut a, mut d) = (Pilot::default(), Pilot::default());
        let (mut display, mut deps) = (RecordingDisplay::default(), NoDependencies);
        let mut bridge = Bridge {
            rules: &rules,
            map: &map,
            dice: &mut dice,
            attacker: &mut a,
            defender: &mut d,
            display: &mut display,
            dependencies: &mut deps,
        };
        assert!(matches!(battle.advance(&mut bridge), Err(BattleError::ForeignStep(_))));
    }
}
