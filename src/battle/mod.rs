//! Battle resolution.
//!
//! A battle is a resumable state machine: its pending work is a stack of
//! serializable steps driven against a shared `BattleContext`. Two variants
//! exist, the full multi-round `MustFightBattle` and the single-purpose
//! `AirBattle` interception. Both talk to the outside world only through the
//! collaborators bundled in a `Bridge`.

pub mod aa;
pub mod air;
pub mod casualty;
pub mod context;
pub mod decision;
pub mod dependency;
pub mod dice;
pub mod display;
pub mod error;
pub mod fire;
pub mod must_fight;
pub mod retreat;
pub mod stack;

pub use air::{AirBattle, AirStep};
pub use context::{BattleContext, BattleId, BattleStatus, SideUnits};
pub use decision::{
    CasualtyDetails, CasualtyRequest, Decision, InterceptRequest, PlayerDecisions, RetreatChoice,
    RetreatRequest,
};
pub use dependency::{BattleTracker, DependencyGraph, NoDependencies};
pub use dice::{DiceRoll, DiceSource, RandomDice, RecordingDice, ScriptedDice};
pub use display::{BattleDisplay, NullDisplay, RecordingDisplay, TracingDisplay};
pub use error::{BattleError, Result};
pub use fire::{FireFrame, FireKind, FireState, ReturnFire};
pub use must_fight::{MustFightBattle, Step};
pub use retreat::RetreatMode;
pub use stack::{ExecutionStack, Flow, StackState};

use serde::{Deserialize, Serialize};

use crate::board::{MapView, Side, UnitId};
use crate::rules::RuleSet;

/// The collaborators a battle needs while it runs.
pub struct Bridge<'a> {
    pub rules: &'a RuleSet,
    pub map: &'a dyn MapView,
    pub dice: &'a mut dyn DiceSource,
    pub attacker: &'a mut dyn PlayerDecisions,
    pub defender: &'a mut dyn PlayerDecisions,
    pub display: &'a mut dyn BattleDisplay,
    pub dependencies: &'a mut dyn DependencyGraph,
}

impl<'a> Bridge<'a> {
    /// Decision source for `side`.
    pub fn player(&mut self, side: Side) -> &mut (dyn PlayerDecisions + 'a) {
        match side {
            Side::Attacker => &mut *self.attacker,
            Side::Defender => &mut *self.defender,
        }
    }
}

/// How far a call to `Battle::advance` got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Waiting on a player decision; call `advance` again to resume.
    Suspended,
    Finished(BattleStatus),
}

/// Behaviour shared by both battle variants.
pub trait Battle {
    fn context(&self) -> &BattleContext;

    /// Runs pending steps until the battle ends or waits on a decision.
    fn advance(&mut self, bridge: &mut Bridge<'_>) -> Result<Progress>;

    /// Ends the battle without a winner. Applied unit changes stay.
    fn cancel(&mut self, bridge: &mut Bridge<'_>);

    /// Removes units that were destroyed or withdrew in another battle.
    fn units_lost_elsewhere(&mut self, units: &[UnitId], withdrawn: bool);

    fn is_over(&self) -> bool {
        self.context().is_over()
    }

    fn current_result(&self) -> BattleStatus {
        self.context().status
    }
}

/// Either battle variant in a form that can be saved and restored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SavedBattle {
    MustFight(MustFightBattle),
    Air(AirBattle),
}

impl SavedBattle {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<SavedBattle> {
        serde_json::from_str(text)
    }

    pub fn battle(&self) -> &dyn Battle {
        match self {
            SavedBattle::MustFight(b) => b,
            SavedBattle::Air(b) => b,
        }
    }

    pub fn battle_mut(&mut self) -> &mut dyn Battle {
        match self {
            SavedBattle::MustFight(b) => b,
            SavedBattle::Air(b) => b,
        }
    }
}

/// Records a terminal status and tells the display.
pub(crate) fn finish(ctx: &mut BattleContext, status: BattleStatus, bridge: &mut Bridge<'_>) {
    if ctx.is_over() {
        return;
    }
    ctx.status = status;
    let message = match status {
        BattleStatus::AttackerWon => format!("{} wins at {}", ctx.attacker, ctx.site),
        BattleStatus::DefenderWon => format!("{} wins at {}", ctx.defender, ctx.site),
        BattleStatus::Draw => format!("stalemate at {}", ctx.site),
        other => format!("battle at {} {}", ctx.site, other.label()),
    };
    tracing::info!(battle = %ctx.id, round = ctx.round, "{}", message);
    bridge.display.battle_end(ctx.id, &message);
}

/// Takes units lost or withdrawn in another battle out of this one.
pub(crate) fn remove_lost_units(ctx: &mut BattleContext, units: &[UnitId], withdrawn: bool) {
    let present: Vec<UnitId> = units
        .iter()
        .copied()
        .filter(|id| ctx.units.contains_key(id))
        .collect();
    if present.is_empty() {
        return;
    }
    tracing::debug!(battle = %ctx.id, units = present.len(), withdrawn, "units lost elsewhere");
    if withdrawn {
        ctx.withdraw(&present);
    } else {
        ctx.kill(&present);
    }
}

/// Marks a battle aborted after a fatal error.
pub(crate) fn abort(ctx: &mut BattleContext, error: &BattleError) {
    tracing::error!(battle = %ctx.id, round = ctx.round, "battle aborted: {}", error);
    ctx.status = BattleStatus::Aborted;
}
