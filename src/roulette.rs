use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::models::RoulettePrize;

/// Picks the prize for a spin, or `None` when the spin loses.
///
/// Prizes must be ordered by position. A prize with `guaranteed_every = n`
/// always wins every n-th spin; the first matching one takes precedence.
/// Any other spin is a weighted draw over the prizes with a positive weight.
pub fn select_prize<'a, R: Rng + ?Sized>(
    spin_number: i64,
    prizes: &'a [RoulettePrize],
    rng: &mut R,
) -> Option<&'a RoulettePrize> {
    if spin_number > 0 {
        let guaranteed = prizes.iter().find(|prize| {
            prize
                .guaranteed_every
                .is_some_and(|every| every > 0 && spin_number % i64::from(every) == 0)
        });
        if guaranteed.is_some() {
            return guaranteed;
        }
    }

    let weights: Vec<f64> = prizes
        .iter()
        .map(|prize| if prize.weight.is_finite() { prize.weight.max(0.0) } else { 0.0 })
        .collect();

    // WeightedIndex rejects empty lists and all-zero weights; both mean no prize.
    let index = WeightedIndex::new(&weights).ok()?;
    prizes.get(index.sample(rng))
}

/// Validates a prize table before storing it.
pub fn validate_prize_table(weights: &[(f64, Option<i32>)]) -> Result<(), String> {
    if weights.is_empty() {
        return Err("A roulette needs at least one prize".into());
    }
    for (weight, guaranteed_every) in weights {
        if !weight.is_finite() || *weight < 0.0 {
            return Err("Prize weights must be zero or positive".into());
        }
        if matches!(guaranteed_every, Some(every) if *every < 1) {
            return Err("guaranteed_every must be at least 1".into());
        }
    }
    let has_chance = weights
        .iter()
        .any(|(weight, guaranteed_every)| *weight > 0.0 || guaranteed_every.is_some());
    if !has_chance {
        return Err("At least one prize must be winnable".into());
    }
    Ok(())
}
