//! Player decisions requested by a battle.
//!
//! Decisions come back as `Decision::Ready` or `Decision::Pending`. A pending
//! answer suspends the battle with the asking step still on the stack; the
//! same question is asked again when the battle is resumed.

use serde::{Deserialize, Serialize};

use super::context::{BattleContext, BattleId};
use super::dice::DiceRoll;
use crate::board::{Side, TerritoryId, UnitId};

/// An answer that may not be available yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision<T> {
    Ready(T),
    Pending,
}

/// Which targets a roll destroyed or damaged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasualtyDetails {
    pub killed: Vec<UnitId>,
    pub damaged: Vec<UnitId>,
    /// Forced by the rules rather than chosen by a player.
    pub auto_calculated: bool,
}

impl CasualtyDetails {
    pub fn forced(killed: Vec<UnitId>) -> Self {
        CasualtyDetails {
            killed,
            damaged: Vec::new(),
            auto_calculated: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.killed.is_empty() && self.damaged.is_empty()
    }
}

/// A casualty choice owed by the side that was hit.
pub struct CasualtyRequest<'a> {
    pub battle: &'a BattleContext,
    pub step: &'a str,
    pub player: &'a str,
    /// The side taking the hits.
    pub side: Side,
    pub candidates: &'a [UnitId],
    pub hits: u32,
    pub dice: &'a DiceRoll,
    /// Default choice, valid as an answer.
    pub suggested: &'a CasualtyDetails,
}

/// Answer to a retreat query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetreatChoice {
    To(TerritoryId),
    Submerge,
}

/// A retreat or submerge offer.
pub struct RetreatRequest<'a> {
    pub battle: &'a BattleContext,
    pub player: &'a str,
    pub side: Side,
    pub units: &'a [UnitId],
    pub destinations: &'a [TerritoryId],
    pub can_submerge: bool,
    pub message: &'a str,
}

impl RetreatRequest<'_> {
    /// Returns true if `choice` is one of the options offered.
    pub fn allows(&self, choice: &RetreatChoice) -> bool {
        match choice {
            RetreatChoice::Submerge => self.can_submerge,
            RetreatChoice::To(t) => self.destinations.contains(t),
        }
    }
}

/// Interceptor selection in an air battle.
pub struct InterceptRequest<'a> {
    pub battle: &'a BattleContext,
    pub player: &'a str,
    pub candidates: &'a [UnitId],
}

/// Source of one player's decisions during a battle.
pub trait PlayerDecisions {
    fn select_casualties(&mut self, request: &CasualtyRequest<'_>) -> Decision<CasualtyDetails>;

    /// `Ready(None)` declines to retreat.
    fn retreat_query(&mut self, request: &RetreatRequest<'_>) -> Decision<Option<RetreatChoice>>;

    /// Interceptors to launch; every candidate by default.
    fn select_interceptors(&mut self, request: &InterceptRequest<'_>) -> Decision<Vec<UnitId>> {
        Decision::Ready(request.candidates.to_vec())
    }

    fn confirm_own_casualties(&mut self, _battle: BattleId, _message: &str) {}

    fn confirm_enemy_casualties(&mut self, _battle: BattleId, _message: &str) {}
}
