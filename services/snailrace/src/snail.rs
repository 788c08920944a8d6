//! Snail generation and identity
//!
//! A snail's attributes never change after generation. Its id is derived
//! from a content hash of the name and attributes, so the same generation
//! inputs always produce the same id.

use rand::Rng;
use serde::{Deserialize, Serialize};
use shared::constants::*;
use shared::SnailId;

use crate::names::generate_snail_name;

/// Cosmetic shell type, also used by punter type preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnailType {
    Prisimshell,
    Thunderhorn,
    Royalcrest,
    Circuitshell,
    Infernoshell,
    Obsidianshell,
    Chillshell,
    Stoneclad,
}

impl SnailType {
    pub const ALL: [SnailType; SNAIL_TYPE_COUNT as usize] = [
        SnailType::Prisimshell,
        SnailType::Thunderhorn,
        SnailType::Royalcrest,
        SnailType::Circuitshell,
        SnailType::Infernoshell,
        SnailType::Obsidianshell,
        SnailType::Chillshell,
        SnailType::Stoneclad,
    ];

    pub fn index(&self) -> u8 {
        *self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            SnailType::Prisimshell => "Prisimshell",
            SnailType::Thunderhorn => "Thunderhorn",
            SnailType::Royalcrest => "Royalcrest",
            SnailType::Circuitshell => "Circuitshell",
            SnailType::Infernoshell => "Infernoshell",
            SnailType::Obsidianshell => "Obsidianshell",
            SnailType::Chillshell => "Chillshell",
            SnailType::Stoneclad => "Stoneclad",
        }
    }
}

impl std::fmt::Display for SnailType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Racing attributes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnailStats {
    /// Top speed, 1.0 to 10.0
    pub speed: f64,
    /// Speed gained per step, 0.1 to 1.0
    pub acceleration: f64,
    /// 1.0 to 10.0, divides the post-stamina speed cap
    pub weight: f64,
    /// Steps before the speed cap drops, 10 to 100
    pub stamina: u32,
    /// -0.5 to 0.5
    pub luck: f64,
}

impl SnailStats {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let (speed_min, speed_max) = SNAIL_SPEED_RANGE;
        let (accel_min, accel_max) = SNAIL_ACCELERATION_RANGE;
        let (weight_min, weight_max) = SNAIL_WEIGHT_RANGE;
        let (stamina_min, stamina_max) = SNAIL_STAMINA_RANGE;
        let (luck_min, luck_max) = SNAIL_LUCK_RANGE;

        Self {
            speed: rng.gen::<f64>() * (speed_max - speed_min) + speed_min,
            acceleration: rng.gen::<f64>() * (accel_max - accel_min) + accel_min,
            weight: rng.gen::<f64>() * (weight_max - weight_min) + weight_min,
            stamina: rng.gen_range(stamina_min..=stamina_max),
            luck: rng.gen::<f64>() * (luck_max - luck_min) + luck_min,
        }
    }

    /// blake3 digest of `tag` followed by every attribute
    pub(crate) fn digest(&self, tag: &str) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(tag.as_bytes());
        hasher.update(format!("{:.6}", self.speed).as_bytes());
        hasher.update(format!("{:.6}", self.acceleration).as_bytes());
        hasher.update(format!("{:.6}", self.weight).as_bytes());
        hasher.update(self.stamina.to_string().as_bytes());
        hasher.update(format!("{:.6}", self.luck).as_bytes());
        hasher.finalize()
    }

    /// Seed for the per-race random stream of a snail with these stats
    pub fn race_seed(&self, race_id: &str) -> u64 {
        let digest = self.digest(race_id);
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest.as_bytes()[..8]);
        u64::from_be_bytes(prefix)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snail {
    pub id: SnailId,
    pub owner_id: String,
    pub name: String,
    pub snail_type: SnailType,
    pub stats: SnailStats,
    /// Most recent placement first, 0 when there is no result
    pub recent_places: [u32; 3],
    /// Races left before the snail is retired, None for unlimited
    pub races_remaining: Option<u32>,
}

impl Snail {
    /// Assemble a snail and derive its id from the name and stats
    pub fn new(
        owner_id: impl Into<String>,
        name: impl Into<String>,
        snail_type: SnailType,
        stats: SnailStats,
        races_remaining: Option<u32>,
    ) -> Self {
        let name = name.into();
        let digest = stats.digest(&name).to_hex();
        Self {
            id: SnailId::from_parts(snail_type.index(), &digest[..32]),
            owner_id: owner_id.into(),
            name,
            snail_type,
            stats,
            recent_places: [0; 3],
            races_remaining,
        }
    }

    /// Generate a random snail for `owner_id`
    pub fn generate<R: Rng + ?Sized>(
        rng: &mut R,
        owner_id: impl Into<String>,
        races_remaining: Option<u32>,
    ) -> Self {
        let name = generate_snail_name(rng);
        let snail_type = SnailType::ALL[rng.gen_range(0..SnailType::ALL.len())];
        let stats = SnailStats::random(rng);
        Self::new(owner_id, name, snail_type, stats, races_remaining)
    }

    pub fn is_house_owned(&self) -> bool {
        self.owner_id == HOUSE_OWNER_ID
    }

    /// Shift the placement history and consume one race of usage
    ///
    /// Returns true when the snail has no races left and should be removed.
    pub fn record_result(&mut self, place: u32) -> bool {
        self.recent_places = [place, self.recent_places[0], self.recent_places[1]];
        match self.races_remaining.as_mut() {
            Some(remaining) => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            None => false,
        }
    }

    /// Finished in the top three in either of the last two races
    pub fn has_recent_podium(&self) -> bool {
        self.recent_places[..2]
            .iter()
            .any(|place| (1..=3).contains(place))
    }
}
