//! Autonomous bettors that seed race pools
//!
//! Punters are persisted so the same crowd bets across restarts. Each race
//! draws a random subset of them, and every drawn punter stakes its whole
//! budget on a single Win wager.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use shared::constants::{PUNTER_MAX_BUDGET, PUNTER_MIN_BUDGET};
use tracing::info;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::repository::Store;
use crate::snail::{Snail, SnailStats, SnailType};

/// 16-bit preference mask
///
/// Bits 0-7 select shell types, bits 8-12 the best entrant by speed,
/// acceleration, weight, stamina and luck, bits 13-14 recent podium finishers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences(pub u16);

impl Preferences {
    pub const BEST_SPEED: u16 = 1 << 8;
    pub const BEST_ACCELERATION: u16 = 1 << 9;
    pub const BEST_WEIGHT: u16 = 1 << 10;
    pub const BEST_STAMINA: u16 = 1 << 11;
    pub const BEST_LUCK: u16 = 1 << 12;
    pub const RECENT_PODIUM: u16 = (1 << 13) | (1 << 14);

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen_range(0..u16::MAX))
    }

    pub fn prefers_type(&self, snail_type: SnailType) -> bool {
        self.0 & (1 << snail_type.index()) != 0
    }

    /// `attribute` counts from 0 (speed) to 4 (luck)
    pub fn prefers_best(&self, attribute: usize) -> bool {
        self.0 & (Self::BEST_SPEED << attribute) != 0
    }

    pub fn prefers_recent_podium(&self) -> bool {
        self.0 & Self::RECENT_PODIUM != 0
    }
}

fn speed(stats: &SnailStats) -> f64 {
    stats.speed
}

fn acceleration(stats: &SnailStats) -> f64 {
    stats.acceleration
}

fn weight(stats: &SnailStats) -> f64 {
    stats.weight
}

fn stamina(stats: &SnailStats) -> f64 {
    stats.stamina as f64
}

fn luck(stats: &SnailStats) -> f64 {
    stats.luck
}

/// Attribute accessors in preference bit order
const ATTRIBUTES: [fn(&SnailStats) -> f64; 5] = [speed, acceleration, weight, stamina, luck];

/// Index of the first entrant holding the highest value of an attribute
fn best_by(entrants: &[Snail], attribute: fn(&SnailStats) -> f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, snail) in entrants.iter().enumerate() {
        let value = attribute(&snail.stats);
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Punter {
    pub id: Uuid,
    pub budget: i64,
    pub preferences: Preferences,
}

impl Punter {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            id: Uuid::new_v4(),
            budget: rng.gen_range(PUNTER_MIN_BUDGET..PUNTER_MAX_BUDGET),
            preferences: Preferences::random(rng),
        }
    }

    /// Choose an entrant index and the amount to stake on it
    ///
    /// Every preference match adds the entrant to the candidate list, so an
    /// entrant matching several preferences is proportionally more likely.
    /// With no matches the choice is uniform over the whole field. Returns
    /// None for an empty field.
    pub fn pick<R: Rng + ?Sized>(&self, entrants: &[Snail], rng: &mut R) -> Option<(usize, i64)> {
        if entrants.is_empty() {
            return None;
        }

        let best: Vec<Option<usize>> = ATTRIBUTES
            .iter()
            .map(|attribute| best_by(entrants, *attribute))
            .collect();

        let mut candidates = Vec::new();
        for (idx, snail) in entrants.iter().enumerate() {
            if self.preferences.prefers_type(snail.snail_type) {
                candidates.push(idx);
            }
            for (attribute, best_idx) in best.iter().enumerate() {
                if *best_idx == Some(idx) && self.preferences.prefers_best(attribute) {
                    candidates.push(idx);
                }
            }
            if snail.has_recent_podium() && self.preferences.prefers_recent_podium() {
                candidates.push(idx);
            }
        }

        let choice = candidates
            .choose(rng)
            .copied()
            .unwrap_or_else(|| rng.gen_range(0..entrants.len()));
        Some((choice, self.budget))
    }
}

/// The persisted crowd of punters
#[derive(Debug, Clone, Default)]
pub struct PunterPool {
    punters: Vec<Punter>,
}

impl PunterPool {
    pub fn new(punters: Vec<Punter>) -> Self {
        Self { punters }
    }

    /// Load the stored punters, generating and storing more until there are
    /// at least `target`
    pub async fn load(store: &dyn Store, target: usize) -> Result<Self, StoreError> {
        let mut punters = store.find_punters().await?;
        let missing = target.saturating_sub(punters.len());

        if missing > 0 {
            let fresh: Vec<Punter> = {
                let mut rng = rand::thread_rng();
                (0..missing).map(|_| Punter::generate(&mut rng)).collect()
            };
            for punter in &fresh {
                store.create_punter(punter).await?;
            }
            punters.extend(fresh);
        }

        info!(
            punters = punters.len(),
            generated = missing,
            "Punter pool loaded"
        );
        Ok(Self { punters })
    }

    /// Random subset of at most `max` distinct punters
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R, max: usize) -> Vec<&Punter> {
        self.punters.choose_multiple(rng, max).collect()
    }

    pub fn len(&self) -> usize {
        self.punters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.punters.is_empty()
    }
}
