//! User wallet collaborator
//!
//! The engine never owns balances. Stakes are debited before a wager is
//! applied and payouts are credited after settlement.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("Wallet unavailable: {0}")]
    Unavailable(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },
}

#[async_trait]
pub trait Wallet: Send + Sync {
    async fn credit(
        &self,
        user_id: &str,
        amount: i64,
        memo: &str,
        source: &str,
    ) -> Result<(), WalletError>;

    async fn debit(
        &self,
        user_id: &str,
        amount: i64,
        memo: &str,
        source: &str,
    ) -> Result<(), WalletError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit,
}

/// One entry of the in-memory transaction log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub user_id: String,
    pub direction: Direction,
    pub amount: i64,
    pub memo: String,
    pub source: String,
}

#[derive(Debug, Default)]
struct Accounts {
    balances: HashMap<String, i64>,
    log: Vec<Transaction>,
}

/// Wallet kept in process memory
///
/// Unknown users start with `opening_balance`.
#[derive(Debug)]
pub struct MemoryWallet {
    opening_balance: i64,
    accounts: Mutex<Accounts>,
}

impl MemoryWallet {
    pub const DEFAULT_OPENING_BALANCE: i64 = 500;

    pub fn new() -> Self {
        Self::with_opening_balance(Self::DEFAULT_OPENING_BALANCE)
    }

    pub fn with_opening_balance(opening_balance: i64) -> Self {
        Self {
            opening_balance,
            accounts: Mutex::new(Accounts::default()),
        }
    }

    pub async fn balance(&self, user_id: &str) -> i64 {
        let accounts = self.accounts.lock().await;
        accounts
            .balances
            .get(user_id)
            .copied()
            .unwrap_or(self.opening_balance)
    }

    pub async fn transactions(&self) -> Vec<Transaction> {
        self.accounts.lock().await.log.clone()
    }
}

impl Default for MemoryWallet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Wallet for MemoryWallet {
    async fn credit(
        &self,
        user_id: &str,
        amount: i64,
        memo: &str,
        source: &str,
    ) -> Result<(), WalletError> {
        let mut accounts = self.accounts.lock().await;
        let balance = accounts
            .balances
            .entry(user_id.to_string())
            .or_insert(self.opening_balance);
        *balance = balance.saturating_add(amount);
        accounts.log.push(Transaction {
            user_id: user_id.to_string(),
            direction: Direction::Credit,
            amount,
            memo: memo.to_string(),
            source: source.to_string(),
        });
        Ok(())
    }

    async fn debit(
        &self,
        user_id: &str,
        amount: i64,
        memo: &str,
        source: &str,
    ) -> Result<(), WalletError> {
        let mut accounts = self.accounts.lock().await;
        let balance = accounts
            .balances
            .entry(user_id.to_string())
            .or_insert(self.opening_balance);
        if *balance < amount {
            return Err(WalletError::InsufficientBalance {
                required: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        accounts.log.push(Transaction {
            user_id: user_id.to_string(),
            direction: Direction::Debit,
            amount,
            memo: memo.to_string(),
            source: source.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_opening_balance_and_debit() {
        let wallet = MemoryWallet::new();
        assert_eq!(wallet.balance("alice").await, 500);

        wallet.debit("alice", 120, "bet", "snailrace").await.unwrap();
        assert_eq!(wallet.balance("alice").await, 380);

        wallet.credit("alice", 20, "payout", "snailrace").await.unwrap();
        assert_eq!(wallet.balance("alice").await, 400);
        assert_eq!(wallet.transactions().await.len(), 2);
    }

    #[tokio::test]
    async fn test_debit_rejects_overdraft() {
        let wallet = MemoryWallet::with_opening_balance(10);
        let result = wallet.debit("bob", 11, "bet", "snailrace").await;
        assert_eq!(
            result,
            Err(WalletError::InsufficientBalance {
                required: 11,
                available: 10
            })
        );
        assert_eq!(wallet.balance("bob").await, 10);
        assert!(wallet.transactions().await.is_empty());
    }
}
