//! Non-interactive decision policy.
//!
//! `AutoPlayer` answers every question a battle asks straight away, so a
//! battle driven only by auto players never suspends. It is what the odds
//! calculator fights with and what the protocol uses when no one is asked.

use serde::{Deserialize, Serialize};

use crate::battle::casualty::default_casualties;
use crate::battle::{
    BattleContext, CasualtyDetails, CasualtyRequest, Decision, PlayerDecisions, RetreatChoice,
    RetreatRequest,
};
use crate::board::{Side, UnitId};

/// When an auto player withdraws.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetreatPolicy {
    /// Withdraw once this round is reached; zero or less never.
    pub retreat_after_round: i32,
    /// Withdraw when this many units or fewer are left; zero or less never.
    pub retreat_when_units_left: i32,
    /// Withdraw once only aircraft are left.
    pub retreat_when_only_air_left: bool,
    /// Spare the last land unit when other casualties can take the hits.
    pub keep_one_land_unit: bool,
    /// Submerge submarines that face nothing but aircraft.
    pub submerge_subs_vs_only_air: bool,
}

impl Default for RetreatPolicy {
    fn default() -> Self {
        RetreatPolicy {
            retreat_after_round: 0,
            retreat_when_units_left: 0,
            retreat_when_only_air_left: false,
            keep_one_land_unit: false,
            submerge_subs_vs_only_air: true,
        }
    }
}

impl RetreatPolicy {
    /// Returns true if `side` should leave the battle now.
    pub fn wants_out(&self, ctx: &BattleContext, side: Side) -> bool {
        let live = &ctx.side(side).live;
        if self.retreat_after_round > 0 && ctx.round as i64 >= self.retreat_after_round as i64 {
            return true;
        }
        if self.retreat_when_units_left > 0 && live.len() as i64 <= self.retreat_when_units_left as i64 {
            return true;
        }
        self.retreat_when_only_air_left && !live.is_empty() && ctx.all(live, |t| t.is_air())
    }
}

/// Decision source that follows a `RetreatPolicy`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoPlayer {
    pub policy: RetreatPolicy,
}

impl AutoPlayer {
    pub fn new(policy: RetreatPolicy) -> Self {
        AutoPlayer { policy }
    }

    /// Default casualties, keeping one land unit alive when possible.
    fn casualties(&self, request: &CasualtyRequest<'_>) -> CasualtyDetails {
        let ctx = request.battle;
        if !self.policy.keep_one_land_unit || ctx.site_is_water {
            return request.suggested.clone();
        }
        let land = ctx.matching(request.candidates, |t| t.is_land() && !t.is_infrastructure);
        let Some(keeper) = land
            .iter()
            .copied()
            .max_by_key(|id| (ctx.profile(*id).power(request.side), std::cmp::Reverse(*id)))
        else {
            return request.suggested.clone();
        };
        let rest: Vec<UnitId> = request
            .candidates
            .iter()
            .copied()
            .filter(|id| *id != keeper)
            .collect();
        if ctx.max_hits(&rest) < request.hits {
            return request.suggested.clone();
        }
        let mut details = default_casualties(ctx, &rest, request.hits, request.side);
        details.auto_calculated = false;
        details
    }
}

impl PlayerDecisions for AutoPlayer {
    fn select_casualties(&mut self, request: &CasualtyRequest<'_>) -> Decision<CasualtyDetails> {
        Decision::Ready(self.casualties(request))
    }

    fn retreat_query(&mut self, request: &RetreatRequest<'_>) -> Decision<Option<RetreatChoice>> {
        let ctx = request.battle;
        if self.policy.wants_out(ctx, request.side) {
            if let Some(to) = request.destinations.first() {
                return Decision::Ready(Some(RetreatChoice::To(to.clone())));
            }
            if request.can_submerge {
                return Decision::Ready(Some(RetreatChoice::Submerge));
            }
        }
        let enemy = &ctx.side(request.side.opponent()).live;
        let only_air = !enemy.is_empty() && ctx.all(enemy, |t| t.is_air());
        if request.can_submerge && self.policy.submerge_subs_vs_only_air && only_air {
            return Decision::Ready(Some(RetreatChoice::Submerge));
        }
        Decision::Ready(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::dice::DiceRoll;
    use crate::board::{TerritoryId, Unit, UnitCatalog};

    fn land_battle() -> BattleContext {
        let mut ctx = BattleContext::new(TerritoryId::new("Ukraine"), false, "Germany", "Russia", UnitCatalog::standard());
        ctx.add_attacker(Unit::new(UnitId(1), "infantry", "Germany"), None).unwrap();
        ctx.add_attacker(Unit::new(UnitId(2), "armour", "Germany"), None).unwrap();
        ctx.add_attacker(Unit::new(UnitId(3), "fighter", "Germany"), None).unwrap();
        ctx.add_defender(Unit::new(UnitId(10), "infantry", "Russia")).unwrap();
        ctx
    }

    fn casualty_request<'a>(
        ctx: &'a BattleContext,
        candidates: &'a [UnitId],
        dice: &'a DiceRoll,
        suggested: &'a CasualtyDetails,
        hits: u32,
    ) -> CasualtyRequest<'a> {
        CasualtyRequest {
            battle: ctx,
            step: "Russia fire",
            player: "Germany",
            side: Side::Attacker,
            candidates,
            hits,
            dice,
            suggested,
        }
    }

    #[test]
    fn keeps_the_strongest_land_unit() {
        let ctx = land_battle();
        let candidates = ctx.attacking.live.clone();
        let dice = DiceRoll::evaluate(vec![1, 1], vec![2, 2], 6, "test");
        let suggested = default_casualties(&ctx, &candidates, 2, Side::Attacker);
        assert_eq!(suggested.killed, vec![UnitId(1), UnitId(2)]);

        let mut player = AutoPlayer::new(RetreatPolicy {
            keep_one_land_unit: true,
            ..RetreatPolicy::default()
        });
        let request = casualty_request(&ctx, &candidates, &dice, &suggested, 2);
        let Decision::Ready(details) = player.select_casualties(&request) else {
            panic!("auto player never waits");
        };
        assert_eq!(details.killed, vec![UnitId(1), UnitId(3)]);
    }

    #[test]
    fn retreats_after_the_configured_round() {
        let mut ctx = land_battle();
        let destinations = vec![TerritoryId::new("Poland")];
        let mut player = AutoPlayer::new(RetreatPolicy {
            retreat_after_round: 2,
            ..RetreatPolicy::default()
        });
        let units = ctx.attacking.live.clone();
        let ask = |ctx: &BattleContext, player: &mut AutoPlayer| {
            player.retreat_query(&RetreatRequest {
                battle: ctx,
                player: "Germany",
                side: Side::Attacker,
                units: &units,
                destinations: &destinations,
                can_submerge: false,
                message: "retreat?",
            })
        };
        assert_eq!(ask(&ctx, &mut player), Decision::Ready(None));
        ctx.round = 2;
        assert_eq!(
            ask(&ctx, &mut player),
            Decision::Ready(Some(RetreatChoice::To(TerritoryId::new("Poland"))))
        );
    }

    #[test]
    fn subs_dive_when_only_planes_hunt_them() {
        let mut ctx = BattleContext::new(TerritoryId::new("sz7"), true, "Britain", "Germany", UnitCatalog::standard());
        ctx.add_attacker(Unit::new(UnitId(1), "fighter", "Britain"), None).unwrap();
        ctx.add_defender(Unit::new(UnitId(2), "submarine", "Germany")).unwrap();
        let units = vec![UnitId(2)];
        let mut player = AutoPlayer::default();
        let answer = player.retreat_query(&RetreatRequest {
            battle: &ctx,
            player: "Germany",
            side: Side::Defender,
            units: &units,
            destinations: &[],
            can_submerge: true,
            message: "submerge?",
        });
        assert_eq!(answer, Decision::Ready(Some(RetreatChoice::Submerge)));
    }

    #[test]
    fn unit_threshold_counts_live_units() {
        let ctx = land_battle();
        let policy = RetreatPolicy {
            retreat_when_units_left: 3,
            ..RetreatPolicy::default()
        };
        assert!(policy.wants_out(&ctx, Side::Attacker));
        assert!(policy.wants_out(&ctx, Side::Defender));
        let strict = RetreatPolicy {
            retreat_when_units_left: 2,
            ..RetreatPolicy::default()
        };
        assert!(!strict.wants_out(&ctx, Side::Attacker));
    }
}
