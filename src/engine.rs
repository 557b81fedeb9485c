//! Session engine.
//!
//! Holds the rule flags, engine options, the loaded scenario and the battle
//! being resolved between protocol commands. Battles are resolved with
//! automatic decisions for both players.

use std::collections::HashMap;
use std::io::{self, Write};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::battle::{
    BattleError, Bridge, NoDependencies, Progress, RandomDice, RecordingDisplay, SavedBattle,
    TracingDisplay,
};
use crate::board::GameMap;
use crate::calc::{AutoPlayer, OddsCalculator, OddsConfig, OddsError, RetreatPolicy};
use crate::protocol::{CalcParams, GoParams, Scenario, ScenarioError};
use crate::rules::{RuleError, RuleSet};

/// Simulations per `calc` when neither the command nor `Runs` says otherwise.
const DEFAULT_RUNS: usize = 1000;

/// Engine-level options; every other `setoption` name is a rule flag.
const ENGINE_OPTIONS: [&str; 4] = ["Seed", "Runs", "Threads", "RetreatAfterRound"];

/// Errors reported back to the protocol loop.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no scenario loaded")]
    NoScenario,

    #[error("no battle loaded")]
    NoBattle,

    #[error("invalid value '{value}' for option '{name}'")]
    InvalidOption { name: String, value: String },

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error("battle aborted: {0}")]
    Battle(#[from] BattleError),

    #[error(transparent)]
    Odds(#[from] OddsError),

    #[error("invalid saved battle: {0}")]
    State(#[from] serde_json::Error),

    #[error("output failed: {0}")]
    Io(#[from] io::Error),
}

/// Holds the mutable state of the engine between commands.
pub struct Engine {
    pub rules: RuleSet,
    pub options: HashMap<String, String>,
    pub scenario: Option<Scenario>,
    pub battle: Option<SavedBattle>,
    map: GameMap,
    rng: SmallRng,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

impl Engine {
    /// Creates an engine with classic rules and nothing loaded.
    pub fn new() -> Self {
        Engine {
            rules: RuleSet::default(),
            options: HashMap::new(),
            scenario: None,
            battle: None,
            map: GameMap::new(),
            rng: SmallRng::from_entropy(),
        }
    }

    /// Drops the scenario and battle; rule flags and options stay.
    pub fn new_battle(&mut self) {
        self.scenario = None;
        self.battle = None;
        self.map = GameMap::new();
    }

    /// Sets an engine option or a rule flag. A flag without a value is set.
    pub fn set_option(&mut self, name: String, value: Option<String>) -> Result<(), EngineError> {
        if ENGINE_OPTIONS.contains(&name.as_str()) {
            let value = value.unwrap_or_default();
            if value.parse::<i64>().is_err() {
                return Err(EngineError::InvalidOption { name, value });
            }
            self.options.insert(name, value);
            return Ok(());
        }
        self.rules
            .set_option(&name, value.as_deref().unwrap_or("true"))?;
        Ok(())
    }

    fn option<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.options.get(name).and_then(|v| v.parse().ok())
    }

    /// Loads a scenario and builds a fresh battle from it.
    pub fn set_scenario(&mut self, json: &str) -> Result<(), EngineError> {
        let scenario = Scenario::from_json(json)?;
        let battle = scenario.build()?;
        tracing::info!(site = %scenario.site, "scenario loaded");
        self.map = scenario.map.clone();
        self.battle = Some(battle);
        self.scenario = Some(scenario);
        Ok(())
    }

    /// Restores a battle printed by `save`. The map of the last scenario stays.
    pub fn load(&mut self, json: &str) -> Result<(), EngineError> {
        let battle = SavedBattle::from_json(json)?;
        self.battle = Some(battle);
        Ok(())
    }

    fn attacker_policy(&self) -> RetreatPolicy {
        RetreatPolicy {
            retreat_after_round: self.option("RetreatAfterRound").unwrap_or(0),
            ..RetreatPolicy::default()
        }
    }

    fn dice_seed(&mut self, requested: Option<u64>) -> u64 {
        match requested.or_else(|| self.option::<u64>("Seed").filter(|s| *s != 0)) {
            Some(seed) => seed,
            None => self.rng.gen(),
        }
    }

    /// Handles the handshake: writes id lines, options and `skirmishok`.
    pub fn handle_skirmish<W: Write>(&self, out: &mut W) -> Result<(), EngineError> {
        writeln!(out, "id name skirmish")?;
        writeln!(out, "id author skirmish")?;
        writeln!(out, "option name Seed type spin default 0 min 0")?;
        writeln!(out, "option name Runs type spin default {} min 1", DEFAULT_RUNS)?;
        writeln!(out, "option name Threads type spin default 4 min 1 max 64")?;
        writeln!(out, "option name RetreatAfterRound type spin default 0")?;
        if let Ok(serde_json::Value::Object(flags)) = serde_json::to_value(&self.rules) {
            for (name, value) in flags {
                match value {
                    serde_json::Value::Bool(b) => {
                        writeln!(out, "option name {} type check default {}", name, b)?
                    }
                    serde_json::Value::Number(n) => {
                        writeln!(out, "option name {} type spin default {}", name, n)?
                    }
                    _ => {}
                }
            }
        }
        writeln!(out, "skirmishok")?;
        out.flush()?;
        Ok(())
    }

    /// Handles the `isready` command.
    pub fn handle_isready<W: Write>(&self, out: &mut W) -> Result<(), EngineError> {
        writeln!(out, "readyok")?;
        out.flush()?;
        Ok(())
    }

    /// Resolves the current battle, writing each step entered and the result.
    pub fn handle_go<W: Write>(&mut self, params: &GoParams, out: &mut W) -> Result<(), EngineError> {
        let seed = self.dice_seed(params.seed);
        let policy = self.attacker_policy();
        let saved = self.battle.as_mut().ok_or(EngineError::NoBattle)?;

        let mut dice = RandomDice::seeded(seed);
        let mut attacker = AutoPlayer::new(policy);
        let mut defender = AutoPlayer::default();
        let mut display = RecordingDisplay::default();
        let mut dependencies = NoDependencies;
        let mut bridge = Bridge {
            rules: &self.rules,
            map: &self.map,
            dice: &mut dice,
            attacker: &mut attacker,
            defender: &mut defender,
            display: &mut display,
            dependencies: &mut dependencies,
        };

        tracing::debug!(seed, "resolving battle");
        let battle = saved.battle_mut();
        let outcome = if battle.is_over() {
            Ok(Progress::Finished(battle.current_result()))
        } else {
            battle.advance(&mut bridge)
        };

        for step in display.steps() {
            writeln!(out, "step {}", step)?;
        }
        match outcome {
            Ok(Progress::Suspended) => writeln!(out, "suspended round {}", saved.battle().context().round)?,
            _ => write_result(saved, out)?,
        }
        out.flush()?;
        outcome?;
        Ok(())
    }

    /// Estimates the scenario's odds from fresh copies of its battle.
    pub fn handle_calc<W: Write>(&mut self, params: &CalcParams, out: &mut W) -> Result<(), EngineError> {
        let scenario = self.scenario.as_ref().ok_or(EngineError::NoScenario)?;
        let template = scenario.build()?;
        let config = OddsConfig {
            runs: params.runs.or_else(|| self.option("Runs")).unwrap_or(DEFAULT_RUNS),
            threads: params.threads.or_else(|| self.option("Threads")).unwrap_or(4),
            seed: params.seed.or_else(|| self.option("Seed")).unwrap_or(0),
            attacker: self.attacker_policy(),
            defender: RetreatPolicy::default(),
        };
        let results = OddsCalculator::new(&self.rules, &self.map, &template, config).calculate()?;
        let summary = results.summary();
        writeln!(
            out,
            "odds runs {} attacker_win {:.4} defender_win {:.4} draw {:.4} rounds {:.2} attackers_left {:.2} defenders_left {:.2} tuv_swing {:.2}",
            summary.runs,
            summary.attacker_win,
            summary.defender_win,
            summary.draw,
            summary.average_rounds,
            summary.attackers_left,
            summary.defenders_left,
            summary.tuv_swing,
        )?;
        out.flush()?;
        Ok(())
    }

    /// Cancels the current battle and writes its result.
    pub fn handle_cancel<W: Write>(&mut self, out: &mut W) -> Result<(), EngineError> {
        let saved = self.battle.as_mut().ok_or(EngineError::NoBattle)?;
        let mut dice = RandomDice::seeded(0);
        let mut attacker = AutoPlayer::default();
        let mut defender = AutoPlayer::default();
        let mut display = TracingDisplay;
        let mut dependencies = NoDependencies;
        let mut bridge = Bridge {
            rules: &self.rules,
            map: &self.map,
            dice: &mut dice,
            attacker: &mut attacker,
            defender: &mut defender,
            display: &mut display,
            dependencies: &mut dependencies,
        };
        saved.battle_mut().cancel(&mut bridge);
        write_result(saved, out)?;
        out.flush()?;
        Ok(())
    }

    /// Writes the current battle as `state <json>`.
    pub fn handle_save<W: Write>(&self, out: &mut W) -> Result<(), EngineError> {
        let saved = self.battle.as_ref().ok_or(EngineError::NoBattle)?;
        writeln!(out, "state {}", saved.to_json()?)?;
        out.flush()?;
        Ok(())
    }
}

fn write_result<W: Write>(saved: &SavedBattle, out: &mut W) -> io::Result<()> {
    let ctx = saved.battle().context();
    writeln!(
        out,
        "result {} rounds {} attacker_lost {} defender_lost {}",
        ctx.status.label(),
        ctx.round,
        ctx.attacking.lost_value,
        ctx.defending.lost_value
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"{"site":"Ukraine","attacker":"Germany","defender":"Russia","attackers":[{"kind":"armour","count":6}],"defenders":[{"kind":"infantry"}]}"#;

    fn output(buf: Vec<u8>) -> Vec<String> {
        String::from_utf8(buf)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn new_engine_has_no_state() {
        let engine = Engine::new();
        assert!(engine.scenario.is_none());
        assert!(engine.battle.is_none());
        assert!(engine.options.is_empty());
        assert_eq!(engine.rules, RuleSet::default());
    }

    #[test]
    fn new_battle_resets_state() {
        let mut engine = Engine::new();
        engine.set_scenario(SCENARIO).unwrap();
        assert!(engine.battle.is_some());
        engine.new_battle();
        assert!(engine.scenario.is_none());
        assert!(engine.battle.is_none());
    }

    #[test]
    fn set_option_routes_rule_flags_and_engine_options() {
        let mut engine = Engine::new();
        engine.set_option("Seed".into(), Some("9".into())).unwrap();
        engine.set_option("submersible_subs".into(), None).unwrap();
        engine.set_option("max_battle_rounds".into(), Some("2".into())).unwrap();
        assert_eq!(engine.options.get("Seed").map(String::as_str), Some("9"));
        assert!(engine.rules.submersible_subs);
        assert_eq!(engine.rules.max_battle_rounds, 2);
        assert!(matches!(
            engine.set_option("Runs".into(), Some("lots".into())),
            Err(EngineError::InvalidOption { .. })
        ));
        assert!(matches!(
            engine.set_option("warp".into(), Some("1".into())),
            Err(EngineError::Rule(_))
        ));
    }

    #[test]
    fn handshake_lists_rule_flags() {
        let engine = Engine::new();
        let mut buf = Vec::new();
        engine.handle_skirmish(&mut buf).unwrap();
        let lines = output(buf);
        assert_eq!(lines.first().map(String::as_str), Some("id name skirmish"));
        assert_eq!(lines.last().map(String::as_str), Some("skirmishok"));
        assert!(lines.contains(&"option name ww2v2 type check default false".to_string()));
        assert!(lines.contains(&"option name dice_sides type spin default 6".to_string()));
    }

    #[test]
    fn go_writes_steps_then_result() {
        let mut engine = Engine::new();
        engine.set_scenario(SCENARIO).unwrap();
        let mut buf = Vec::new();
        engine.handle_go(&GoParams { seed: Some(5) }, &mut buf).unwrap();
        let lines = output(buf);
        assert!(lines.iter().any(|l| l.starts_with("step ")));
        let last = lines.last().unwrap();
        assert!(last.starts_with("result "), "{}", last);
        assert!(engine.battle.as_ref().unwrap().battle().is_over());
    }

    #[test]
    fn go_is_reproducible_with_a_seed() {
        let run = || {
            let mut engine = Engine::new();
            engine.set_scenario(SCENARIO).unwrap();
            let mut buf = Vec::new();
            engine.handle_go(&GoParams { seed: Some(11) }, &mut buf).unwrap();
            output(buf)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn go_without_battle_is_an_error() {
        let mut engine = Engine::new();
        let mut buf = Vec::new();
        assert!(matches!(
            engine.handle_go(&GoParams::default(), &mut buf),
            Err(EngineError::NoBattle)
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn save_then_load_restores_the_battle() {
        let mut engine = Engine::new();
        engine.set_scenario(SCENARIO).unwrap();
        let mut buf = Vec::new();
        engine.handle_save(&mut buf).unwrap();
        let line = output(buf).remove(0);
        let json = line.strip_prefix("state ").unwrap();

        let mut other = Engine::new();
        other.load(json).unwrap();
        assert_eq!(other.battle, engine.battle);
    }

    #[test]
    fn cancel_reports_cancelled() {
        let mut engine = Engine::new();
        engine.set_scenario(SCENARIO).unwrap();
        let mut buf = Vec::new();
        engine.handle_cancel(&mut buf).unwrap();
        assert_eq!(
            output(buf),
            vec!["result cancelled rounds 1 attacker_lost 0 defender_lost 0".to_string()]
        );
    }

    #[test]
    fn calc_prints_one_odds_line() {
        let mut engine = Engine::new();
        engine.set_scenario(SCENARIO).unwrap();
        let mut buf = Vec::new();
        let params = CalcParams {
            runs: Some(50),
            seed: Some(3),
            threads: Some(1),
        };
        engine.handle_calc(&params, &mut buf).unwrap();
        let lines = output(buf);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("odds runs 50 attacker_win "));
    }
}
