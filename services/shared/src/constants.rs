/// Shared constants for the snail racing services
///
/// This module centralizes the game's magic numbers so the engine, the
/// hosting daemon and any presentation layer agree on them.

/// Minimum number of entrants a race needs to leave the join phase
pub const MIN_RACERS: usize = 2;

/// Position of the finish line on the track
pub const FINISH_LINE: f64 = 100.0;

/// Maximum number of simulated steps per entrant
///
/// An entrant that has not crossed the line by then keeps its last position.
pub const MAX_RACE_STEPS: u32 = 100;

/// Owner id used for snails generated by the house for scheduled races
pub const HOUSE_OWNER_ID: &str = "house";

/// Punter budget bounds (min inclusive, max exclusive)
pub const PUNTER_MIN_BUDGET: i64 = 15;
pub const PUNTER_MAX_BUDGET: i64 = 150;

/// Number of shell types a snail can have
pub const SNAIL_TYPE_COUNT: u8 = 8;

/// Stat ranges for generated snails
pub const SNAIL_SPEED_RANGE: (f64, f64) = (1.0, 10.0);
pub const SNAIL_ACCELERATION_RANGE: (f64, f64) = (0.1, 1.0);
pub const SNAIL_WEIGHT_RANGE: (f64, f64) = (1.0, 10.0);
pub const SNAIL_STAMINA_RANGE: (u32, u32) = (10, 100);
pub const SNAIL_LUCK_RANGE: (f64, f64) = (-0.5, 0.5);

/// Length of a race id (hex characters taken from the tail of a v4 UUID)
pub const RACE_ID_LENGTH: usize = 12;

/// Wallet memo and source tag used by settlement
pub const WAGER_MEMO: &str = "snailrace wager";
pub const PAYOUT_MEMO: &str = "snailrace payout";
pub const REFUND_MEMO: &str = "snailrace refund";
pub const WALLET_SOURCE: &str = "snailrace";

/// Achievement keys emitted by the engine
pub const ACHIEVEMENT_FIRST_PLACE: &str = "snailrace.first_place";
pub const ACHIEVEMENT_BIG_PAYOUT: &str = "snailrace.big_payout";

/// Payout multiple of the stake that earns the big payout achievement
pub const BIG_PAYOUT_MULTIPLE: i64 = 10;
