//! Position simulation
//!
//! Every entrant gets its own random stream seeded from its attributes and
//! the race id, so re-running a race reproduces every timeline exactly.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use shared::constants::{FINISH_LINE, MAX_RACE_STEPS};

use crate::snail::{Snail, SnailStats};

/// Positions of one entrant, starting at 0 and one entry per step
pub type Timeline = Vec<f64>;

/// Simulate one entrant against one race
pub fn simulate_timeline(stats: &SnailStats, race_id: &str) -> Timeline {
    let mut rng = ChaCha8Rng::seed_from_u64(stats.race_seed(race_id));

    let mut positions = Vec::with_capacity(MAX_RACE_STEPS as usize + 1);
    positions.push(0.0);

    let mut position = 0.0_f64;
    let mut speed = 0.0_f64;
    let mut elapsed = 0_u32;

    while position < FINISH_LINE && elapsed < MAX_RACE_STEPS {
        if speed < stats.speed {
            let cap = if elapsed > stats.stamina {
                stats.stamina as f64 / stats.weight
            } else {
                stats.speed
            };
            speed += stats.acceleration.min(cap - speed);
        }

        speed += (rng.gen::<f64>() * 2.0 - 1.0) + stats.luck * 0.1;
        speed = speed.max(0.0);

        position = (position + speed).min(FINISH_LINE);
        positions.push(position);
        elapsed += 1;
    }

    positions
}

/// Final finishing order of a race
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placings {
    /// Entrant indices, winner first
    order: Vec<usize>,
}

impl Placings {
    /// Rank timelines: fewer steps first, then further final position, then
    /// entrant index
    pub fn rank(timelines: &[Timeline]) -> Self {
        let mut order: Vec<usize> = (0..timelines.len()).collect();
        order.sort_by(|&a, &b| {
            let (ta, tb) = (&timelines[a], &timelines[b]);
            ta.len().cmp(&tb.len()).then_with(|| {
                let last_a = ta.last().copied().unwrap_or(0.0);
                let last_b = tb.last().copied().unwrap_or(0.0);
                last_b.total_cmp(&last_a)
            })
        });
        Self { order }
    }

    pub fn from_order(order: Vec<usize>) -> Self {
        Self { order }
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// 1-based place of an entrant
    pub fn place_of(&self, entrant: usize) -> Option<u32> {
        self.order
            .iter()
            .position(|&idx| idx == entrant)
            .map(|pos| pos as u32 + 1)
    }

    /// Entrant index that finished at a 1-based place
    pub fn at(&self, place: u32) -> Option<usize> {
        let idx = (place as usize).checked_sub(1)?;
        self.order.get(idx).copied()
    }

    pub fn winner(&self) -> Option<usize> {
        self.at(1)
    }
}

/// Timelines and ranking for a whole field
#[derive(Debug, Clone)]
pub struct SimulatedRace {
    pub timelines: Vec<Timeline>,
    pub placings: Placings,
    /// Length of the longest timeline
    pub required_steps: usize,
}

pub fn simulate_race(entrants: &[Snail], race_id: &str) -> SimulatedRace {
    let timelines: Vec<Timeline> = entrants
        .iter()
        .map(|snail| simulate_timeline(&snail.stats, race_id))
        .collect();
    let required_steps = timelines.iter().map(Vec::len).max().unwrap_or(0);
    let placings = Placings::rank(&timelines);

    SimulatedRace {
        timelines,
        placings,
        required_steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snail::SnailType;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn fast() -> SnailStats {
        SnailStats {
            speed: 10.0,
            acceleration: 1.0,
            weight: 1.0,
            stamina: 100,
            luck: 0.5,
        }
    }

    fn slow() -> SnailStats {
        SnailStats {
            speed: 1.0,
            acceleration: 0.1,
            weight: 10.0,
            stamina: 10,
            luck: -0.5,
        }
    }

    #[test]
    fn test_timeline_is_reproducible() {
        let stats = fast();
        let a = simulate_timeline(&stats, "0123456789ab");
        let b = simulate_timeline(&stats, "0123456789ab");
        assert_eq!(a, b);
        assert_ne!(a, simulate_timeline(&stats, "ba9876543210"));
    }

    #[test]
    fn test_timeline_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..100 {
            let stats = SnailStats::random(&mut rng);
            let timeline = simulate_timeline(&stats, "0123456789ab");
            assert_eq!(timeline[0], 0.0);
            assert!(timeline.len() >= 2);
            assert!(timeline.len() <= MAX_RACE_STEPS as usize + 1);
            assert!(timeline.windows(2).all(|w| w[1] >= w[0]));
            assert!(timeline.iter().all(|p| *p <= FINISH_LINE));

            let finished = *timeline.last().unwrap() >= FINISH_LINE;
            assert!(finished || timeline.len() == MAX_RACE_STEPS as usize + 1);
        }
    }

    #[test]
    fn test_fast_snail_finishes_early() {
        let fast_line = simulate_timeline(&fast(), "0123456789ab");
        assert_eq!(*fast_line.last().unwrap(), FINISH_LINE);
        assert!(fast_line.len() < 40);
    }

    #[test]
    fn test_rank_orders_by_length_then_distance() {
        let timelines = vec![
            vec![0.0, 50.0, 80.0],
            vec![0.0, 100.0],
            vec![0.0, 60.0, 90.0],
            vec![0.0, 70.0, 100.0],
        ];
        let placings = Placings::rank(&timelines);
        assert_eq!(placings.order(), &[1, 3, 2, 0]);
        assert_eq!(placings.place_of(1), Some(1));
        assert_eq!(placings.place_of(0), Some(4));
        assert_eq!(placings.at(2), Some(3));
        assert_eq!(placings.at(0), None);
        assert_eq!(placings.at(5), None);
    }

    #[test]
    fn test_exact_ties_keep_entrant_order() {
        let timelines = vec![vec![0.0, 100.0], vec![0.0, 100.0], vec![0.0, 100.0]];
        assert_eq!(Placings::rank(&timelines).order(), &[0, 1, 2]);
    }

    #[test]
    fn test_simulate_race_reports_longest_timeline() {
        let field = vec![
            Snail::new("u1", "Fast", SnailType::Thunderhorn, fast(), None),
            Snail::new("u2", "Slow", SnailType::Stoneclad, slow(), None),
        ];
        let race = simulate_race(&field, "0123456789ab");
        assert_eq!(race.timelines.len(), 2);
        let longest = race.timelines.iter().map(Vec::len).max().unwrap();
        assert_eq!(race.required_steps, longest);
        assert_eq!(race.placings.winner(), Some(0));
    }
}
