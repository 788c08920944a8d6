//! Redis key generation functions
//!
//! Centralizes all Redis key patterns used for snail, race and punter
//! storage and indexing.

use chrono::NaiveDate;
use shared::{RaceId, SnailId};
use uuid::Uuid;

/// Redis key prefix for snail records
const SNAIL_KEY_PREFIX: &str = "snailrace:snail:";

/// Redis key prefix for the owner-snail index
const OWNER_INDEX_PREFIX: &str = "snailrace:snails:owner:";

/// Redis key prefix for race records
const RACE_KEY_PREFIX: &str = "snailrace:race:";

/// Redis key prefix for the per-day race index, scored by start time
const DATE_INDEX_PREFIX: &str = "snailrace:races:date:";

/// Redis key prefix for punter records
const PUNTER_KEY_PREFIX: &str = "snailrace:punter:";

/// Redis key for the set of all punter ids
const PUNTER_INDEX: &str = "snailrace:punters";

pub fn snail_key(id: &SnailId) -> String {
    format!("{}{}", SNAIL_KEY_PREFIX, id)
}

pub fn owner_index_key(owner_id: &str) -> String {
    format!("{}{}", OWNER_INDEX_PREFIX, owner_id)
}

pub fn race_key(id: &RaceId) -> String {
    format!("{}{}", RACE_KEY_PREFIX, id)
}

pub fn date_index_key(date: NaiveDate) -> String {
    format!("{}{}", DATE_INDEX_PREFIX, date.format("%Y-%m-%d"))
}

pub fn punter_key(id: Uuid) -> String {
    format!("{}{}", PUNTER_KEY_PREFIX, id)
}

pub fn punter_index_key() -> &'static str {
    PUNTER_INDEX
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snail_keys() {
        let id = SnailId::try_from("snail_4abc123").unwrap();
        assert_eq!(snail_key(&id), "snailrace:snail:snail_4abc123");
        assert_eq!(owner_index_key("user42"), "snailrace:snails:owner:user42");
    }

    #[test]
    fn test_race_keys() {
        let id = RaceId::try_from("0123456789ab").unwrap();
        assert_eq!(race_key(&id), "snailrace:race:0123456789ab");

        let date = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        assert_eq!(date_index_key(date), "snailrace:races:date:2024-01-07");
    }

    #[test]
    fn test_punter_keys() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(
            punter_key(id),
            "snailrace:punter:550e8400-e29b-41d4-a716-446655440000"
        );
        assert_eq!(punter_index_key(), "snailrace:punters");
    }
}
