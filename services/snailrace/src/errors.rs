use shared::errors::{ErrorCategory, ErrorCode, ServiceError};
use shared::{RaceId, SnailId};

use crate::state::RacePhase;
use crate::wallet::WalletError;

/// Failures raised by the record store implementations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    Missing(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{wager_type} wagers take {expected} entrant(s), got {actual}")]
    WrongArity {
        wager_type: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Entrant index {index} is out of range for {entrants} entrants")]
    InvalidEntrant { index: usize, entrants: usize },

    #[error("Entrant index {0} appears more than once in the wager")]
    DuplicateEntrant(usize),

    #[error("Invalid stake {amount}: {reason}")]
    InvalidStake { amount: i64, reason: String },

    #[error("Race not found: {0}")]
    RaceNotFound(RaceId),

    #[error("Race is {actual}, expected {expected}")]
    InvalidRaceState {
        expected: RacePhase,
        actual: RacePhase,
    },

    #[error("Snail {0} already joined the race")]
    AlreadyJoined(SnailId),

    #[error("User {0} already has a snail in the race")]
    UserAlreadyJoined(String),

    #[error("Snail not found: {0}")]
    SnailNotFound(SnailId),

    #[error("Not the owner of snail {0}")]
    NotSnailOwner(SnailId),

    #[error("Race {0} is already registered")]
    DuplicateRace(RaceId),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),
}

impl EngineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::RaceNotFound(_) | EngineError::SnailNotFound(_) => ErrorCategory::NotFound,
            EngineError::NotSnailOwner(_) => ErrorCategory::Unauthorized,
            EngineError::Store(StoreError::Serialization(_)) => ErrorCategory::Internal,
            EngineError::Store(_) | EngineError::Wallet(WalletError::Unavailable(_)) => {
                ErrorCategory::Network
            }
            _ => ErrorCategory::Validation,
        }
    }

    fn code(&self) -> ErrorCode {
        match self {
            EngineError::WrongArity { .. } => ErrorCode::VALIDATION_WAGER_ARITY,
            EngineError::InvalidEntrant { .. } | EngineError::DuplicateEntrant(_) => {
                ErrorCode::VALIDATION_INVALID_ENTRANT
            }
            EngineError::InvalidStake { .. } => ErrorCode::VALIDATION_INVALID_STAKE,
            EngineError::InvalidRaceState { .. } => ErrorCode::VALIDATION_RACE_STATE,
            EngineError::AlreadyJoined(_) | EngineError::UserAlreadyJoined(_) => {
                ErrorCode::VALIDATION_ALREADY_JOINED
            }
            EngineError::DuplicateRace(_) => ErrorCode::VALIDATION_DUPLICATE_RACE,
            EngineError::RaceNotFound(_) => ErrorCode::NOT_FOUND_RACE,
            EngineError::SnailNotFound(_) => ErrorCode::NOT_FOUND_SNAIL,
            EngineError::NotSnailOwner(_) => ErrorCode::UNAUTHORIZED_NOT_OWNER,
            EngineError::Store(StoreError::Serialization(_)) => ErrorCode::INTERNAL_SERIALIZATION,
            EngineError::Store(_) => ErrorCode::NETWORK_STORE_UNAVAILABLE,
            EngineError::Wallet(WalletError::InsufficientBalance { .. }) => {
                ErrorCode::VALIDATION_INSUFFICIENT_BALANCE
            }
            EngineError::Wallet(_) => ErrorCode::NETWORK_WALLET_UNAVAILABLE,
        }
    }
}

impl From<EngineError> for ServiceError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::RaceNotFound(race_id) => ServiceError::race_not_found(race_id),
            EngineError::SnailNotFound(snail_id) => ServiceError::snail_not_found(snail_id),
            EngineError::NotSnailOwner(snail_id) => ServiceError::not_owner(snail_id),
            EngineError::Store(StoreError::Serialization(e)) => ServiceError::serialization_error(e),
            EngineError::Store(e) => ServiceError::store_error(e),
            EngineError::Wallet(e @ WalletError::Unavailable(_)) => ServiceError::wallet_error(e),
            other => ServiceError::new(other.category(), other.code(), other.to_string()),
        }
    }
}

impl From<redis::RedisError> for EngineError {
    fn from(error: redis::RedisError) -> Self {
        EngineError::Store(StoreError::Redis(error))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(error: serde_json::Error) -> Self {
        EngineError::Store(StoreError::Serialization(error))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_map_to_validation_category() {
        let error = EngineError::WrongArity {
            wager_type: "quinella",
            expected: 2,
            actual: 1,
        };
        assert_eq!(error.category(), ErrorCategory::Validation);

        let service: ServiceError = error.into();
        assert_eq!(service.code, "VALIDATION_WAGER_ARITY");
        assert!(service.message.contains("quinella"));
    }

    #[test]
    fn test_lookup_errors_map_to_not_found() {
        let race_id = RaceId::try_from("0123456789ab").unwrap();
        let service: ServiceError = EngineError::RaceNotFound(race_id).into();
        assert_eq!(service.category, ErrorCategory::NotFound);
        assert_eq!(service.code, "NOT_FOUND_RACE");
    }

    #[test]
    fn test_backend_errors_keep_their_cause_as_context() {
        let service: ServiceError = EngineError::Store(StoreError::Missing("snail x".into())).into();
        assert_eq!(service.category, ErrorCategory::Network);
        assert_eq!(service.code, "NETWORK_STORE_UNAVAILABLE");
        assert!(service.context.unwrap().contains("snail x"));

        let service: ServiceError =
            EngineError::Wallet(WalletError::Unavailable("timeout".into())).into();
        assert_eq!(service.code, "NETWORK_WALLET_UNAVAILABLE");
        assert_eq!(service.context.as_deref(), Some("Wallet unavailable: timeout"));
    }

    #[test]
    fn test_not_owner_carries_snail_id() {
        let snail_id = SnailId::try_from("snail_3abc").unwrap();
        let service: ServiceError = EngineError::NotSnailOwner(snail_id).into();
        assert_eq!(service.category, ErrorCategory::Unauthorized);
        assert_eq!(service.context.as_deref(), Some("snail_3abc"));
    }

    #[test]
    fn test_phase_error_message() {
        let error = EngineError::InvalidRaceState {
            expected: RacePhase::Betting,
            actual: RacePhase::Joining,
        };
        assert_eq!(error.to_string(), "Race is joining, expected betting");
    }

    #[test]
    fn test_insufficient_balance_is_validation() {
        let error = EngineError::Wallet(WalletError::InsufficientBalance {
            required: 50,
            available: 10,
        });
        assert_eq!(error.category(), ErrorCategory::Validation);
        let service: ServiceError = error.into();
        assert_eq!(service.code, "VALIDATION_INSUFFICIENT_BALANCE");
    }
}
