/// Type-safe wrappers for domain primitives
///
/// These types enforce validation at construction time so ids and amounts
/// that reach the engine are already well formed.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::constants::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid race ID format: {0}")]
    InvalidRaceIdFormat(String),

    #[error("Invalid snail ID format: {0}")]
    InvalidSnailIdFormat(String),

    #[error("Stake must be positive, got {0}")]
    NonPositiveStake(i64),

    #[error("Stake overflow in operation")]
    StakeOverflow,
}

/// Race identifier
///
/// Twelve lowercase hex characters taken from the tail of a v4 UUID. Short
/// enough to embed in chat component ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RaceId(String);

impl RaceId {
    /// Generate a fresh random race id
    pub fn generate() -> Self {
        let simple = Uuid::new_v4().simple().to_string();
        Self(simple[simple.len() - RACE_ID_LENGTH..].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RaceId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let valid = value.len() == RACE_ID_LENGTH
            && value.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase());
        if !valid {
            return Err(ValidationError::InvalidRaceIdFormat(value));
        }
        Ok(Self(value))
    }
}

impl TryFrom<&str> for RaceId {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}

impl From<RaceId> for String {
    fn from(id: RaceId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snail identifier: `snail_` followed by the type digit and a content hash
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnailId(String);

impl SnailId {
    pub const PREFIX: &'static str = "snail_";

    /// Build an id from a shell type index and a hex content digest
    pub fn from_parts(type_index: u8, digest_hex: &str) -> Self {
        Self(format!("{}{}{}", Self::PREFIX, type_index, digest_hex))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SnailId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let valid = value
            .strip_prefix(Self::PREFIX)
            .map(|rest| rest.len() > 1 && rest.chars().all(|c| c.is_ascii_hexdigit()))
            .unwrap_or(false);
        if !valid {
            return Err(ValidationError::InvalidSnailIdFormat(value));
        }
        Ok(Self(value))
    }
}

impl TryFrom<&str> for SnailId {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}

impl From<SnailId> for String {
    fn from(id: SnailId) -> Self {
        id.0
    }
}

impl std::fmt::Display for SnailId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wager stake in whole currency units, always positive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Stake(i64);

impl Stake {
    pub fn new(amount: i64) -> Result<Self, ValidationError> {
        if amount <= 0 {
            return Err(ValidationError::NonPositiveStake(amount));
        }
        Ok(Self(amount))
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Checked addition
    pub fn checked_add(&self, other: Stake) -> Result<Self, ValidationError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(ValidationError::StakeOverflow)
    }
}

impl TryFrom<i64> for Stake {
    type Error = ValidationError;

    fn try_from(amount: i64) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Stake> for i64 {
    fn from(stake: Stake) -> Self {
        stake.0
    }
}

impl std::fmt::Display for Stake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_race_id_is_valid() {
        let id = RaceId::generate();
        assert_eq!(id.as_str().len(), RACE_ID_LENGTH);
        assert_eq!(RaceId::try_from(id.as_str()).unwrap(), id);
    }

    #[test]
    fn test_race_id_rejects_bad_input() {
        assert!(RaceId::try_from("short").is_err());
        assert!(RaceId::try_from("ABCDEF123456").is_err());
        assert!(RaceId::try_from("zzzzzzzzzzzz").is_err());
    }

    #[test]
    fn test_snail_id_format() {
        let id = SnailId::from_parts(3, "00ff");
        assert_eq!(id.as_str(), "snail_300ff");
        assert!(SnailId::try_from("snail_300ff").is_ok());
        assert!(SnailId::try_from("slug_300ff").is_err());
        assert!(SnailId::try_from("snail_").is_err());
    }

    #[test]
    fn test_stake_validation() {
        assert!(Stake::new(0).is_err());
        assert!(Stake::new(-5).is_err());
        assert_eq!(Stake::new(25).unwrap().as_i64(), 25);
        assert_eq!(
            Stake::new(i64::MAX).unwrap().checked_add(Stake::new(1).unwrap()),
            Err(ValidationError::StakeOverflow)
        );
    }

    #[test]
    fn test_stake_deserialization_validates() {
        assert!(serde_json::from_str::<Stake>("10").is_ok());
        assert!(serde_json::from_str::<Stake>("0").is_err());
    }
}
