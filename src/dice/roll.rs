//! Dice rolling utilities

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::error::{GameError, Result};
use crate::dice::source::RandomSource;

/// A validated die with at least one side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Die {
    sides: u32,
}

impl Die {
    pub fn new(sides: u32) -> Result<Self> {
        if sides == 0 {
            return Err(GameError::InvalidDieSides(sides));
        }
        Ok(Self { sides })
    }

    pub fn sides(&self) -> u32 {
        self.sides
    }

    /// Roll once, rerolling and adding whenever the die shows less than
    /// `reroll_threshold` (0 disables rerolls).
    ///
    /// The reroll fires on LOW results, not on the maximum. A threshold above
    /// the die size is capped at the die size so the roll always terminates.
    pub fn roll(&self, rng: &mut dyn RandomSource, reroll_threshold: u32) -> u32 {
        let threshold = reroll_threshold.min(self.sides);
        let mut total = 0;
        loop {
            let result = rng.uniform_int(1, self.sides as i32) as u32;
            total += result;
            if threshold == 0 || result >= threshold {
                return total;
            }
        }
    }
}

/// Roll one `sides`-sided die with open-ended rerolls below the threshold
pub fn roll_die(rng: &mut dyn RandomSource, sides: u32, reroll_threshold: u32) -> Result<u32> {
    let die = Die::new(sides)?;
    if reroll_threshold > sides {
        return Err(GameError::InvalidRerollThreshold {
            sides,
            threshold: reroll_threshold,
        });
    }
    Ok(die.roll(rng, reroll_threshold))
}

/// Count successes among `number_of_dice` coin-flip dice (p = 0.5 each)
pub fn roll_successes(rng: &mut dyn RandomSource, number_of_dice: u32) -> u32 {
    (0..number_of_dice)
        .filter(|_| rng.uniform_int(0, 1) == 1)
        .count() as u32
}

/// A list of `(multiplier, die)` terms; a negative multiplier subtracts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DicePool {
    terms: Vec<(i32, Die)>,
}

impl DicePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, multiplier: i32, die: Die) {
        self.terms.push((multiplier, die));
    }

    pub fn terms(&self) -> &[(i32, Die)] {
        &self.terms
    }

    /// Build from a `sides -> count` map where a negative key means
    /// "roll the positive pool and negate the sum"
    pub fn from_sides_map(pool: &BTreeMap<i32, u32>) -> Result<Self> {
        let mut dice = DicePool::new();
        for (&sides, &count) in pool {
            let die = Die::new(sides.unsigned_abs())?;
            let multiplier = if sides < 0 { -(count as i32) } else { count as i32 };
            dice.push(multiplier, die);
        }
        Ok(dice)
    }

    /// Smallest possible sum
    pub fn min(&self) -> i32 {
        self.terms
            .iter()
            .map(|&(multiplier, die)| {
                if multiplier < 0 {
                    multiplier * die.sides() as i32
                } else {
                    multiplier
                }
            })
            .sum()
    }

    /// Largest possible sum
    pub fn max(&self) -> i32 {
        self.terms
            .iter()
            .map(|&(multiplier, die)| {
                if multiplier < 0 {
                    multiplier
                } else {
                    multiplier * die.sides() as i32
                }
            })
            .sum()
    }

    pub fn roll(&self, rng: &mut dyn RandomSource, reroll_threshold: u32) -> i32 {
        let mut total = 0i32;
        for &(multiplier, die) in &self.terms {
            let sum: i32 = (0..multiplier.unsigned_abs())
                .map(|_| die.roll(rng, reroll_threshold) as i32)
                .sum();
            if multiplier < 0 {
                total -= sum;
            } else {
                total += sum;
            }
        }
        total
    }

    /// Exact distribution of the pool sum as `(value, probability)` pairs,
    /// ignoring rerolls
    pub fn distribution(&self) -> Vec<(i32, f64)> {
        let mut dist: BTreeMap<i32, f64> = BTreeMap::new();
        dist.insert(0, 1.0);
        for &(multiplier, die) in &self.terms {
            let sign = if multiplier < 0 { -1 } else { 1 };
            let face = 1.0 / die.sides() as f64;
            for _ in 0..multiplier.unsigned_abs() {
                let mut next: BTreeMap<i32, f64> = BTreeMap::new();
                for (&value, &p) in &dist {
                    for side in 1..=die.sides() as i32 {
                        *next.entry(value + sign * side).or_insert(0.0) += p * face;
                    }
                }
                dist = next;
            }
        }
        dist.into_iter().collect()
    }
}

/// Roll a `sides -> count` pool and sum it
pub fn roll_pool(
    rng: &mut dyn RandomSource,
    pool: &BTreeMap<i32, u32>,
    reroll_threshold: u32,
) -> Result<i32> {
    Ok(DicePool::from_sides_map(pool)?.roll(rng, reroll_threshold))
}

const FOUR_D6_OUTCOMES: f64 = 1296.0;
const FOUR_D6_FREQUENCIES: [u32; 21] = four_d6_frequencies();

const fn four_d6_frequencies() -> [u32; 21] {
    let mut table = [0u32; 21];
    let mut a = 1;
    while a <= 6 {
        let mut b = 1;
        while b <= 6 {
            let mut c = 1;
            while c <= 6 {
                let mut d = 1;
                while d <= 6 {
                    table[a + b + c + d - 4] += 1;
                    d += 1;
                }
                c += 1;
            }
            b += 1;
        }
        a += 1;
    }
    table
}

/// Probability that 4d6 sums to exactly `outcome`
pub fn probability_4d6(outcome: i32) -> Result<f64> {
    if !(4..=24).contains(&outcome) {
        return Err(GameError::OutcomeOutOfRange(outcome));
    }
    Ok(FOUR_D6_FREQUENCIES[(outcome - 4) as usize] as f64 / FOUR_D6_OUTCOMES)
}
