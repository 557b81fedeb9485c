//! Notification sinks.
//!
//! A display hears about everything a battle does but can never change it.
//! Every method has an empty default so sinks only implement what they show.

use super::context::BattleId;
use super::dice::DiceRoll;
use crate::board::UnitId;

pub trait BattleDisplay {
    fn list_battle_steps(&mut self, _battle: BattleId, _steps: &[String]) {}

    fn goto_battle_step(&mut self, _battle: BattleId, _step: &str) {}

    fn notify_dice(&mut self, _battle: BattleId, _dice: &DiceRoll, _step: &str) {}

    fn casualty_notification(
        &mut self,
        _battle: BattleId,
        _step: &str,
        _player: &str,
        _killed: &[UnitId],
        _damaged: &[UnitId],
    ) {
    }

    fn dead_unit_notification(&mut self, _battle: BattleId, _player: &str, _dead: &[UnitId]) {}

    fn notify_retreat(&mut self, _battle: BattleId, _player: &str, _units: &[UnitId], _message: &str) {}

    fn battle_end(&mut self, _battle: BattleId, _message: &str) {}
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDisplay;

impl BattleDisplay for NullDisplay {}

/// Forwards notifications to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDisplay;

impl BattleDisplay for TracingDisplay {
    fn list_battle_steps(&mut self, battle: BattleId, steps: &[String]) {
        tracing::debug!(%battle, steps = steps.len(), "battle steps: {}", steps.join(", "));
    }

    fn goto_battle_step(&mut self, battle: BattleId, step: &str) {
        tracing::debug!(%battle, "step {}", step);
    }

    fn notify_dice(&mut self, battle: BattleId, dice: &DiceRoll, step: &str) {
        tracing::debug!(%battle, hits = dice.hits, "{} rolled {:?}", step, dice.faces);
    }

    fn casualty_notification(
        &mut self,
        battle: BattleId,
        step: &str,
        player: &str,
        killed: &[UnitId],
        damaged: &[UnitId],
    ) {
        tracing::info!(
            %battle,
            "{}: {} loses {} and has {} damaged",
            step,
            player,
            killed.len(),
            damaged.len()
        );
    }

    fn notify_retreat(&mut self, battle: BattleId, player: &str, units: &[UnitId], message: &str) {
        tracing::info!(%battle, units = units.len(), "{}: {}", player, message);
    }

    fn battle_end(&mut self, battle: BattleId, message: &str) {
        tracing::info!(%battle, "{}", message);
    }
}

/// One recorded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    Steps(Vec<String>),
    Step(String),
    Dice { step: String, hits: u32, dice: usize },
    Casualties { step: String, player: String, killed: Vec<UnitId>, damaged: Vec<UnitId> },
    Dead { player: String, units: Vec<UnitId> },
    Retreat { player: String, units: Vec<UnitId>, message: String },
    End(String),
}

/// Keeps notifications in order for later inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay {
    pub events: Vec<DisplayEvent>,
}

impl RecordingDisplay {
    /// Names of the steps entered, in order.
    pub fn steps(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DisplayEvent::Step(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Steps whose dice were rolled, in order.
    pub fn rolls(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DisplayEvent::Dice { step, .. } => Some(step.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl BattleDisplay for RecordingDisplay {
    fn list_battle_steps(&mut self, _battle: BattleId, steps: &[String]) {
        self.events.push(DisplayEvent::Steps(steps.to_vec()));
    }

    fn goto_battle_step(&mut self, _battle: BattleId, step: &str) {
        self.events.push(DisplayEvent::Step(step.to_string()));
    }

    fn notify_dice(&mut self, _battle: BattleId, dice: &DiceRoll, step: &str) {
        self.events.push(DisplayEvent::Dice {
            step: step.to_string(),
            hits: dice.hits,
            dice: dice.dice_count(),
        });
    }

    fn casualty_notification(
        &mut self,
        _battle: BattleId,
        step: &str,
        player: &str,
        killed: &[UnitId],
        damaged: &[UnitId],
    ) {
        self.events.push(DisplayEvent::Casualties {
            step: step.to_string(),
            player: player.to_string(),
            killed: killed.to_vec(),
            damaged: damaged.to_vec(),
        });
    }

    fn dead_unit_notification(&mut self, _battle: BattleId, player: &str, dead: &[UnitId]) {
        self.events.push(DisplayEvent::Dead {
            player: player.to_string(),
            units: dead.to_vec(),
        });
    }

    fn notify_retreat(&mut self, _battle: BattleId, player: &str, units: &[UnitId], message: &str) {
        self.events.push(DisplayEvent::Retreat {
            player: player.to_string(),
            units: units.to_vec(),
            message: message.to_string(),
        });
    }

    fn battle_end(&mut self, _battle: BattleId, message: &str) {
        self.events.push(DisplayEvent::End(message.to_string()));
    }
}
