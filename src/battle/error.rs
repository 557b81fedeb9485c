//! Fatal battle errors.
//!
//! Every variant is an invariant violation or an exhausted collaborator.
//! The battle cannot safely continue after one of these; it is marked
//! aborted and the error is handed back with its diagnostic.

use crate::board::UnitId;

#[derive(Debug, thiserror::Error)]
pub enum BattleError {
    #[error("unknown unit type '{0}'")]
    UnknownUnitType(String),

    #[error("unit {0} is already assigned to this battle")]
    DuplicateUnit(UnitId),

    #[error("casualty selection names unit {0} outside the candidate set")]
    CasualtyNotCandidate(UnitId),

    #[error("casualty selection lists unit {0} more than once")]
    DuplicateCasualty(UnitId),

    #[error("unit {0} cannot take damage without being destroyed")]
    CannotDamage(UnitId),

    #[error("casualty selection absorbs {absorbed} hits, expected {expected}")]
    HitMismatch { absorbed: u32, expected: u32 },

    #[error("retreat answer rejected {0} times in a row")]
    InvalidRetreat(u32),

    #[error("execution stack holds {0} frames at round rollover")]
    StackNotEmpty(usize),

    #[error("step '{0}' does not belong to this battle")]
    ForeignStep(String),

    #[error("dice already rolled for '{0}'")]
    AlreadyRolled(String),

    #[error("no dice result recorded for '{0}'")]
    MissingDice(String),

    #[error("dice replay exhausted: needed {needed}, {remaining} left")]
    DiceExhausted { needed: usize, remaining: usize },
}

pub type Result<T> = std::result::Result<T, BattleError>;
