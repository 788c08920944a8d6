//! Race aggregate: entrants, sub-pools and wagers
//!
//! Every change to a race's money goes through [`Ledger`], which keeps
//! `pool == sum(sub-pools) == sum(stakes)` after each applied wager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::constants::BIG_PAYOUT_MULTIPLE;
use shared::{RaceId, SnailId};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::errors::{EngineError, Result};
use crate::odds::{place_odds, win_odds, WagerKind};
use crate::simulator::Placings;
use crate::snail::Snail;
use crate::state::RacePhase;

/// Who placed a wager
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Bettor {
    User(String),
    Punter(Uuid),
}

impl Bettor {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Bettor::User(id) => Some(id),
            Bettor::Punter(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wager {
    pub id: Uuid,
    pub race_id: RaceId,
    pub bettor: Bettor,
    pub stake: i64,
    pub kind: WagerKind,
    pub placed_at: DateTime<Utc>,
}

impl Wager {
    pub fn new(race_id: RaceId, bettor: Bettor, stake: i64, kind: WagerKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            race_id,
            bettor,
            stake,
            kind,
            placed_at: Utc::now(),
        }
    }
}

/// A snail in the field and the money riding on it
#[derive(Debug, Clone, PartialEq)]
pub struct Entrant {
    pub snail: Snail,
    pub pool: i64,
}

/// Amount owed to a user bettor after settlement or cancellation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub wager_id: Uuid,
    pub user_id: String,
    pub stake: i64,
    pub amount: i64,
}

impl Settlement {
    pub fn is_big_payout(&self) -> bool {
        self.amount >= self.stake.saturating_mul(BIG_PAYOUT_MULTIPLE)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entrants: Vec<Entrant>,
    pool: i64,
    wagers: Vec<Wager>,
    settled: bool,
}

impl Ledger {
    pub fn entrants(&self) -> &[Entrant] {
        &self.entrants
    }

    pub fn snails(&self) -> Vec<Snail> {
        self.entrants.iter().map(|e| e.snail.clone()).collect()
    }

    pub fn pool(&self) -> i64 {
        self.pool
    }

    pub fn pools(&self) -> Vec<i64> {
        self.entrants.iter().map(|e| e.pool).collect()
    }

    pub fn wagers(&self) -> &[Wager] {
        &self.wagers
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    pub fn odds(&self, entrant: usize) -> (Option<f64>, Option<f64>) {
        let sub = self.entrants.get(entrant).map(|e| e.pool).unwrap_or(0);
        (win_odds(self.pool, sub), place_odds(self.pool, sub))
    }

    pub fn has_owner(&self, owner_id: &str) -> bool {
        self.entrants.iter().any(|e| e.snail.owner_id == owner_id)
    }

    /// Append an entrant with an empty sub-pool
    pub fn join(&mut self, snail: Snail) -> Result<usize> {
        if self.entrants.iter().any(|e| e.snail.id == snail.id) {
            return Err(EngineError::AlreadyJoined(snail.id));
        }
        self.entrants.push(Entrant { snail, pool: 0 });
        Ok(self.entrants.len() - 1)
    }

    /// Check a stake against a wager kind without applying it
    pub fn validate_stake(&self, stake: i64, kind: &WagerKind) -> Result<()> {
        if stake <= 0 {
            return Err(EngineError::InvalidStake {
                amount: stake,
                reason: "stake must be positive".to_string(),
            });
        }
        let legs = kind.legs();
        if stake < legs.len() as i64 {
            return Err(EngineError::InvalidStake {
                amount: stake,
                reason: format!("stake must cover {} legs", legs.len()),
            });
        }
        if let Some(&index) = legs.iter().find(|&&idx| idx >= self.entrants.len()) {
            return Err(EngineError::InvalidEntrant {
                index,
                entrants: self.entrants.len(),
            });
        }
        if self.pool.checked_add(stake).is_none() {
            return Err(EngineError::InvalidStake {
                amount: stake,
                reason: "race pool would overflow".to_string(),
            });
        }
        Ok(())
    }

    /// Add a wager's stake to the race pool and its legs' sub-pools
    pub fn apply_wager(&mut self, wager: Wager) -> Result<()> {
        self.validate_stake(wager.stake, &wager.kind)?;
        for (entrant, share) in wager.kind.split_stake(wager.stake) {
            self.entrants[entrant].pool += share;
        }
        self.pool += wager.stake;
        self.wagers.push(wager);
        Ok(())
    }

    /// Compute what every winning user wager is owed
    ///
    /// Returns an empty list when the ledger was already settled or refunded.
    pub fn settle(&mut self, placings: &Placings) -> Vec<Settlement> {
        if self.settled {
            return Vec::new();
        }
        self.settled = true;

        let pools = self.pools();
        self.wagers
            .iter()
            .filter_map(|wager| {
                let user_id = wager.bettor.user_id()?;
                let amount = wager.kind.payout(wager.stake, self.pool, &pools, placings);
                (amount > 0).then(|| Settlement {
                    wager_id: wager.id,
                    user_id: user_id.to_string(),
                    stake: wager.stake,
                    amount,
                })
            })
            .collect()
    }

    /// Return every user stake, once
    pub fn refunds(&mut self) -> Vec<Settlement> {
        if self.settled {
            return Vec::new();
        }
        self.settled = true;

        self.wagers
            .iter()
            .filter_map(|wager| {
                let user_id = wager.bettor.user_id()?;
                Some(Settlement {
                    wager_id: wager.id,
                    user_id: user_id.to_string(),
                    stake: wager.stake,
                    amount: wager.stake,
                })
            })
            .collect()
    }
}

/// Persisted entrant link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrantRecord {
    pub snail_id: SnailId,
    pub pool: i64,
}

/// Stored form of a race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceRecord {
    pub id: RaceId,
    pub start_at: DateTime<Utc>,
    pub user_hosted: bool,
    pub status: RacePhase,
    pub pool: i64,
    pub entrants: Vec<EntrantRecord>,
    pub wagers: Vec<Wager>,
}

#[derive(Debug)]
pub struct Race {
    pub id: RaceId,
    pub user_hosted: bool,
    pub start_at: DateTime<Utc>,
    ledger: Mutex<Ledger>,
}

impl Race {
    pub fn new(id: RaceId, user_hosted: bool, start_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_hosted,
            start_at,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Rebuild a race from its record and the stored snails, in entrant order
    ///
    /// Wagers are replayed so the pools are recomputed rather than trusted.
    pub fn restore(record: &RaceRecord, snails: Vec<Snail>) -> Result<Self> {
        let mut ledger = Ledger::default();
        for snail in snails {
            ledger.join(snail)?;
        }
        for wager in &record.wagers {
            ledger.apply_wager(wager.clone())?;
        }
        ledger.settled = record.status.is_terminal();
        Ok(Self {
            id: record.id.clone(),
            user_hosted: record.user_hosted,
            start_at: record.start_at,
            ledger: Mutex::new(ledger),
        })
    }

    pub async fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().await
    }

    pub fn record(&self, ledger: &Ledger, status: RacePhase) -> RaceRecord {
        RaceRecord {
            id: self.id.clone(),
            start_at: self.start_at,
            user_hosted: self.user_hosted,
            status,
            pool: ledger.pool,
            entrants: ledger
                .entrants
                .iter()
                .map(|e| EntrantRecord {
                    snail_id: e.snail.id.clone(),
                    pool: e.pool,
                })
                .collect(),
            wagers: ledger.wagers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snail::{SnailStats, SnailType};

    fn race_id() -> RaceId {
        RaceId::try_from("00000000abcd").unwrap()
    }

    fn snail(owner: &str, name: &str) -> Snail {
        Snail::new(
            owner,
            name,
            SnailType::Circuitshell,
            SnailStats {
                speed: 5.0,
                acceleration: 0.5,
                weight: 5.0,
                stamina: 50,
                luck: 0.0,
            },
            None,
        )
    }

    fn field(count: usize) -> Ledger {
        let mut ledger = Ledger::default();
        for i in 0..count {
            ledger.join(snail("house", &format!("Snail {}", i))).unwrap();
        }
        ledger
    }

    fn user_wager(user: &str, stake: i64, kind: WagerKind) -> Wager {
        Wager::new(race_id(), Bettor::User(user.to_string()), stake, kind)
    }

    fn assert_balanced(ledger: &Ledger) {
        let subs: i64 = ledger.pools().iter().sum();
        let stakes: i64 = ledger.wagers().iter().map(|w| w.stake).sum();
        assert_eq!(ledger.pool(), subs);
        assert_eq!(ledger.pool(), stakes);
    }

    #[test]
    fn test_join_rejects_same_snail() {
        let mut ledger = Ledger::default();
        let snail = snail("u1", "Twin");
        assert_eq!(ledger.join(snail.clone()).unwrap(), 0);
        assert!(matches!(ledger.join(snail), Err(EngineError::AlreadyJoined(_))));
        assert_eq!(ledger.entrants().len(), 1);
        assert_eq!(ledger.entrants()[0].pool, 0);
        assert!(ledger.has_owner("u1"));
    }

    #[test]
    fn test_pool_invariant_holds_after_each_wager() {
        let mut ledger = field(5);
        let wagers = [
            (7, WagerKind::Win(0)),
            (100, WagerKind::Trifecta(4, 0, 2)),
            (11, WagerKind::Quinella(1, 3)),
            (3, WagerKind::Trifecta(0, 1, 2)),
            (50, WagerKind::EachWay(4)),
        ];
        for (stake, kind) in wagers {
            ledger.apply_wager(user_wager("u1", stake, kind)).unwrap();
            assert_balanced(&ledger);
        }
        let punter = Wager::new(race_id(), Bettor::Punter(Uuid::new_v4()), 60, WagerKind::Win(2));
        ledger.apply_wager(punter).unwrap();
        assert_balanced(&ledger);
    }

    #[test]
    fn test_rejected_wagers_leave_ledger_untouched() {
        let mut ledger = field(3);
        assert!(matches!(
            ledger.apply_wager(user_wager("u1", 2, WagerKind::Trifecta(0, 1, 2))),
            Err(EngineError::InvalidStake { amount: 2, .. })
        ));
        assert!(matches!(
            ledger.apply_wager(user_wager("u1", 0, WagerKind::Win(0))),
            Err(EngineError::InvalidStake { .. })
        ));
        assert!(matches!(
            ledger.apply_wager(user_wager("u1", 10, WagerKind::Win(3))),
            Err(EngineError::InvalidEntrant { index: 3, entrants: 3 })
        ));
        assert_eq!(ledger.pool(), 0);
        assert!(ledger.wagers().is_empty());
    }

    #[test]
    fn test_settle_pays_users_once() {
        let mut ledger = field(3);
        ledger.apply_wager(user_wager("alice", 100, WagerKind::Win(0))).unwrap();
        ledger.apply_wager(user_wager("bob", 100, WagerKind::Win(1))).unwrap();
        let punter = Wager::new(race_id(), Bettor::Punter(Uuid::new_v4()), 200, WagerKind::Win(0));
        ledger.apply_wager(punter).unwrap();

        let placings = Placings::from_order(vec![0, 1, 2]);
        let settlements = ledger.settle(&placings);
        // pool 400, entrant 0 holds 300
        assert_eq!(settlements.len(), 1);
        assert_eq!(settlements[0].user_id, "alice");
        assert_eq!(settlements[0].amount, 133);
        assert!(!settlements[0].is_big_payout());

        assert!(ledger.settle(&placings).is_empty());
        assert!(ledger.refunds().is_empty());
    }

    #[test]
    fn test_refunds_return_user_stakes() {
        let mut ledger = field(2);
        ledger.apply_wager(user_wager("alice", 40, WagerKind::Place(1))).unwrap();
        let punter = Wager::new(race_id(), Bettor::Punter(Uuid::new_v4()), 20, WagerKind::Win(0));
        ledger.apply_wager(punter).unwrap();

        let refunds = ledger.refunds();
        assert_eq!(refunds.len(), 1);
        assert_eq!(refunds[0].amount, 40);
        assert!(ledger.is_settled());
    }

    #[test]
    fn test_big_payout_threshold() {
        let settlement = Settlement {
            wager_id: Uuid::new_v4(),
            user_id: "u".to_string(),
            stake: 10,
            amount: 100,
        };
        assert!(settlement.is_big_payout());
    }

    #[test]
    fn test_restore_replays_wagers() {
        let snails = vec![snail("house", "A"), snail("house", "B")];
        let race = Race::new(race_id(), false, Utc::now());
        let mut ledger = Ledger::default();
        for s in &snails {
            ledger.join(s.clone()).unwrap();
        }
        ledger.apply_wager(user_wager("alice", 31, WagerKind::Quinella(0, 1))).unwrap();
        let record = race.record(&ledger, RacePhase::Betting);
        assert_eq!(record.entrants[0].pool, 16);

        let restored = Race::restore(&record, snails).unwrap();
        let restored_ledger = restored.ledger.try_lock().unwrap();
        assert_eq!(restored_ledger.pool(), 31);
        assert_eq!(restored_ledger.pools(), vec![16, 15]);
        assert!(!restored_ledger.is_settled());
    }
}
