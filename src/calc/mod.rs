//! Automated play: a rule-following decision policy and the odds
//! calculator built on it.

pub mod odds;
pub mod policy;

pub use odds::{AggregateResults, OddsCalculator, OddsConfig, OddsError, OddsSummary, Outcome};
pub use policy::{AutoPlayer, RetreatPolicy};
