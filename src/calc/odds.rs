//! Monte Carlo battle odds.
//!
//! Fights many copies of one battle to completion with auto players and
//! independently seeded dice, in parallel on a rayon pool, and folds the
//! outcomes into win/draw/loss probabilities and average losses.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::policy::{AutoPlayer, RetreatPolicy};
use crate::battle::{
    BattleError, BattleStatus, Bridge, NoDependencies, NullDisplay, Progress, RandomDice,
    SavedBattle,
};
use crate::board::{MapView, Side};
use crate::rules::RuleSet;

/// Odds run parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OddsConfig {
    /// Number of simulated battles.
    pub runs: usize,
    /// Worker threads; 1 runs on the calling thread.
    pub threads: usize,
    /// Base seed. 0 draws one from entropy.
    pub seed: u64,
    pub attacker: RetreatPolicy,
    pub defender: RetreatPolicy,
}

impl Default for OddsConfig {
    fn default() -> Self {
        OddsConfig {
            runs: 1000,
            threads: 4,
            seed: 0,
            attacker: RetreatPolicy::default(),
            defender: RetreatPolicy::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OddsError {
    #[error("simulated battle failed: {0}")]
    Battle(#[from] BattleError),

    #[error("simulated battle stopped for a decision in round {0}")]
    Suspended(u32),

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("odds need at least one run")]
    NoRuns,
}

/// How one simulated battle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: BattleStatus,
    pub rounds: u32,
    pub attackers_left: usize,
    pub defenders_left: usize,
    pub attacker_lost_value: u32,
    pub defender_lost_value: u32,
}

/// Totals over a set of outcomes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResults {
    pub runs: usize,
    pub attacker_wins: usize,
    pub defender_wins: usize,
    pub draws: usize,
    pub total_rounds: u64,
    pub total_attackers_left: u64,
    pub total_defenders_left: u64,
    pub total_attacker_lost_value: u64,
    pub total_defender_lost_value: u64,
}

impl AggregateResults {
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        let mut agg = AggregateResults::default();
        for o in outcomes {
            agg.add(o);
        }
        agg
    }

    pub fn add(&mut self, outcome: &Outcome) {
        self.runs += 1;
        match outcome.status {
            BattleStatus::AttackerWon => self.attacker_wins += 1,
            BattleStatus::DefenderWon => self.defender_wins += 1,
            _ => self.draws += 1,
        }
        self.total_rounds += u64::from(outcome.rounds);
        self.total_attackers_left += outcome.attackers_left as u64;
        self.total_defenders_left += outcome.defenders_left as u64;
        self.total_attacker_lost_value += u64::from(outcome.attacker_lost_value);
        self.total_defender_lost_value += u64::from(outcome.defender_lost_value);
    }

    fn ratio(&self, n: u64) -> f64 {
        if self.runs == 0 {
            0.0
        } else {
            n as f64 / self.runs as f64
        }
    }

    pub fn attacker_win_probability(&self) -> f64 {
        self.ratio(self.attacker_wins as u64)
    }

    pub fn defender_win_probability(&self) -> f64 {
        self.ratio(self.defender_wins as u64)
    }

    pub fn draw_probability(&self) -> f64 {
        self.ratio(self.draws as u64)
    }

    pub fn average_rounds(&self) -> f64 {
        self.ratio(self.total_rounds)
    }

    pub fn average_attackers_left(&self) -> f64 {
        self.ratio(self.total_attackers_left)
    }

    pub fn average_defenders_left(&self) -> f64 {
        self.ratio(self.total_defenders_left)
    }

    /// Mean of defender losses minus attacker losses; positive favours the attacker.
    pub fn average_tuv_swing(&self) -> f64 {
        let swing = self.total_defender_lost_value as f64 - self.total_attacker_lost_value as f64;
        if self.runs == 0 {
            0.0
        } else {
            swing / self.runs as f64
        }
    }

    pub fn summary(&self) -> OddsSummary {
        OddsSummary {
            runs: self.runs,
            attacker_win: self.attacker_win_probability(),
            defender_win: self.defender_win_probability(),
            draw: self.draw_probability(),
            average_rounds: self.average_rounds(),
            attackers_left: self.average_attackers_left(),
            defenders_left: self.average_defenders_left(),
            tuv_swing: self.average_tuv_swing(),
        }
    }
}

/// Flat, printable view of `AggregateResults`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsSummary {
    pub runs: usize,
    pub attacker_win: f64,
    pub defender_win: f64,
    pub draw: f64,
    pub average_rounds: f64,
    pub attackers_left: f64,
    pub defenders_left: f64,
    pub tuv_swing: f64,
}

/// Simulates a battle template many times.
pub struct OddsCalculator<'a> {
    rules: &'a RuleSet,
    map: &'a (dyn MapView + Sync),
    template: &'a SavedBattle,
    config: OddsConfig,
}

impl<'a> OddsCalculator<'a> {
    pub fn new(
        rules: &'a RuleSet,
        map: &'a (dyn MapView + Sync),
        template: &'a SavedBattle,
        config: OddsConfig,
    ) -> Self {
        OddsCalculator {
            rules,
            map,
            template,
            config,
        }
    }

    /// Runs every simulation and aggregates the outcomes.
    pub fn calculate(&self) -> Result<AggregateResults, OddsError> {
        if self.config.runs == 0 {
            return Err(OddsError::NoRuns);
        }
        let base = if self.config.seed == 0 {
            rand::thread_rng().gen()
        } else {
            self.config.seed
        };
        tracing::info!(
            runs = self.config.runs,
            threads = self.config.threads,
            seed = base,
            "odds calculation starts"
        );

        let outcomes: Vec<Outcome> = if self.config.threads <= 1 {
            (0..self.config.runs)
                .map(|i| self.simulate(base.wrapping_add(i as u64)))
                .collect::<Result<_, _>>()?
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.threads)
                .build()?;
            pool.install(|| {
                (0..self.config.runs)
                    .into_par_iter()
                    .map(|i| self.simulate(base.wrapping_add(i as u64)))
                    .collect::<Result<_, _>>()
            })?
        };

        let results = AggregateResults::from_outcomes(&outcomes);
        tracing::info!(
            attacker_win = results.attacker_win_probability(),
            draw = results.draw_probability(),
            "odds calculation done"
        );
        Ok(results)
    }

    /// Fights one copy of the template to the end.
    pub fn simulate(&self, seed: u64) -> Result<Outcome, OddsError> {
        let mut saved = self.template.clone();
        let mut dice = RandomDice::seeded(seed);
        let mut attacker = AutoPlayer::new(self.config.attacker.clone());
        let mut defender = AutoPlayer::new(self.config.defender.clone());
        let mut display = NullDisplay;
        let mut dependencies = NoDependencies;
        let mut bridge = Bridge {
            rules: self.rules,
            map: self.map,
            dice: &mut dice,
            attacker: &mut attacker,
            defender: &mut defender,
            display: &mut display,
            dependencies: &mut dependencies,
        };

        let battle = saved.battle_mut();
        let status = match battle.advance(&mut bridge)? {
            Progress::Finished(status) => status,
            Progress::Suspended => return Err(OddsError::Suspended(battle.context().round)),
        };
        let ctx = battle.context();
        Ok(Outcome {
            status,
            rounds: ctx.round,
            attackers_left: ctx.combatants(Side::Attacker).len(),
            defenders_left: ctx.combatants(Side::Defender).len(),
            attacker_lost_value: ctx.attacking.lost_value,
            defender_lost_value: ctx.defending.lost_value,
        })
    }
}
