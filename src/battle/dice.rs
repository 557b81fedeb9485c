//! Dice sources and dice results.
//!
//! Faces are 1-based. A die hits when its face is at most the strength it
//! was rolled at, so a strength of 2 on a six-sided die hits on 1 or 2.

use std::collections::VecDeque;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::error::{BattleError, Result};

/// Supplies raw die faces.
pub trait DiceSource {
    /// Rolls `count` dice with `sides` faces each.
    fn roll(&mut self, count: usize, sides: u32, annotation: &str) -> Result<Vec<u32>>;
}

/// Dice backed by a small, fast rng.
#[derive(Debug, Clone)]
pub struct RandomDice {
    rng: SmallRng,
}

impl RandomDice {
    pub fn seeded(seed: u64) -> Self {
        RandomDice {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        RandomDice {
            rng: SmallRng::from_entropy(),
        }
    }
}

impl DiceSource for RandomDice {
    fn roll(&mut self, count: usize, sides: u32, _annotation: &str) -> Result<Vec<u32>> {
        let sides = sides.max(1);
        Ok((0..count).map(|_| self.rng.gen_range(1..=sides)).collect())
    }
}

/// Replays a fixed sequence of faces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedDice {
    faces: VecDeque<u32>,
}

impl ScriptedDice {
    pub fn new(faces: impl IntoIterator<Item = u32>) -> Self {
        ScriptedDice {
            faces: faces.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.faces.len()
    }
}

impl DiceSource for ScriptedDice {
    fn roll(&mut self, count: usize, _sides: u32, _annotation: &str) -> Result<Vec<u32>> {
        if self.faces.len() < count {
            return Err(BattleError::DiceExhausted {
                needed: count,
                remaining: self.faces.len(),
            });
        }
        Ok(self.faces.drain(..count).collect())
    }
}

/// Wraps another source and keeps every face it hands out.
#[derive(Debug, Clone)]
pub struct RecordingDice<D> {
    inner: D,
    recorded: Vec<u32>,
}

impl<D: DiceSource> RecordingDice<D> {
    pub fn new(inner: D) -> Self {
        RecordingDice {
            inner,
            recorded: Vec::new(),
        }
    }

    pub fn recorded(&self) -> &[u32] {
        &self.recorded
    }

    /// A replay source producing the same faces in the same order.
    pub fn to_script(&self) -> ScriptedDice {
        ScriptedDice::new(self.recorded.iter().copied())
    }
}

impl<D: DiceSource> DiceSource for RecordingDice<D> {
    fn roll(&mut self, count: usize, sides: u32, annotation: &str) -> Result<Vec<u32>> {
        let faces = self.inner.roll(count, sides, annotation)?;
        self.recorded.extend_from_slice(&faces);
        Ok(faces)
    }
}

/// A batch of dice rolled at one strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DicePool {
    pub strength: u32,
    pub count: u32,
}

/// The outcome of one firing group's roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    pub faces: Vec<u32>,
    /// Strength each face was rolled at.
    pub strengths: Vec<u32>,
    pub hits: u32,
    pub sides: u32,
    pub annotation: String,
}

impl DiceRoll {
    /// Rolls every pool in one request to `source`.
    pub fn roll(
        source: &mut dyn DiceSource,
        pools: &[DicePool],
        sides: u32,
        annotation: &str,
    ) -> Result<DiceRoll> {
        let strengths: Vec<u32> = pools
            .iter()
            .filter(|p| p.strength > 0)
            .flat_map(|p| std::iter::repeat(p.strength.min(sides)).take(p.count as usize))
            .collect();
        let faces = if strengths.is_empty() {
            Vec::new()
        } else {
            source.roll(strengths.len(), sides, annotation)?
        };
        Ok(DiceRoll::evaluate(faces, strengths, sides, annotation))
    }

    /// Counts hits for already rolled faces.
    pub fn evaluate(faces: Vec<u32>, strengths: Vec<u32>, sides: u32, annotation: &str) -> DiceRoll {
        let hits = faces
            .iter()
            .zip(&strengths)
            .filter(|(face, strength)| **face <= **strength)
            .count() as u32;
        DiceRoll {
            faces,
            strengths,
            hits,
            sides,
            annotation: annotation.to_string(),
        }
    }

    pub fn dice_count(&self) -> usize {
        self.faces.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_count_faces_at_or_below_strength() {
        let roll = DiceRoll::evaluate(vec![1, 2, 3, 6], vec![2, 2, 2, 6], 6, "test");
        assert_eq!(roll.hits, 3);
    }

    #[test]
    fn scripted_dice_replay_in_order() {
        let mut dice = ScriptedDice::new([1, 6, 3]);
        assert_eq!(dice.roll(2, 6, "a").unwrap(), vec![1, 6]);
        assert_eq!(dice.remaining(), 1);
        assert!(matches!(
            dice.roll(2, 6, "b"),
            Err(BattleError::DiceExhausted { needed: 2, remaining: 1 })
        ));
    }

    #[test]
    fn zero_strength_pools_roll_nothing() {
        let mut dice = ScriptedDice::new([]);
        let roll = DiceRoll::roll(
            &mut dice,
            &[DicePool { strength: 0, count: 4 }],
            6,
            "transports",
        )
        .unwrap();
        assert_eq!(roll.dice_count(), 0);
        assert_eq!(roll.hits, 0);
    }

    #[test]
    fn hits_never_exceed_dice() {
        let mut dice = RandomDice::seeded(7);
        for strength in 0..=8 {
            let roll = DiceRoll::roll(
                &mut dice,
                &[DicePool { strength, count: 5 }, DicePool { strength: 1, count: 2 }],
                6,
                "bound",
            )
            .unwrap();
            assert!(roll.hits as usize <= roll.dice_count());
            assert!(roll.faces.iter().all(|f| (1..=6).contains(f)));
        }
    }

    #[test]
    fn recording_replays_identically() {
        let mut recording = RecordingDice::new(RandomDice::seeded(42));
        let first = recording.roll(10, 6, "r").unwrap();
        let mut replay = recording.to_script();
        assert_eq!(replay.roll(10, 6, "r").unwrap(), first);
        assert_eq!(recording.recorded().len(), 10);
    }
}
