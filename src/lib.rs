//! Skirmish battle engine library.
//!
//! Exposes the board representation, rule flags, the resumable battle
//! state machines, automated play and the protocol modules for use by
//! integration tests and the binary entry points.

pub mod battle;
pub mod board;
pub mod calc;
pub mod engine;
pub mod protocol;
pub mod rules;
