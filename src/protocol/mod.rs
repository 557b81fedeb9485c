//! Line protocol handling.
//!
//! The command parser for the main loop and the JSON scenario format that
//! describes a battle to resolve.

pub mod parser;
pub mod scenario;

pub use parser::{parse_command, CalcParams, Command, GoParams};
pub use scenario::{BattleKind, Scenario, ScenarioError, UnitEntry};
