//! Record store seams
//!
//! The engine persists snails, races (with their wagers) and punters through
//! these traits. `MemoryStore` backs tests and local runs, `RedisStore`
//! backs the hosted daemon.

pub mod memory;
pub mod redis_store;

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{RaceId, SnailId};

use crate::errors::StoreError;
use crate::punter::Punter;
use crate::race::RaceRecord;
use crate::snail::Snail;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

#[async_trait]
pub trait SnailRepository: Send + Sync {
    /// Store a new snail and index it by owner
    async fn create_snail(&self, snail: &Snail) -> Result<(), StoreError>;
    async fn find_snail(&self, id: &SnailId) -> Result<Option<Snail>, StoreError>;
    async fn find_snails_by_owner(&self, owner_id: &str) -> Result<Vec<Snail>, StoreError>;
    /// Overwrite an existing snail's record
    async fn save_snail(&self, snail: &Snail) -> Result<(), StoreError>;
    async fn delete_snail(&self, id: &SnailId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait RaceRepository: Send + Sync {
    /// Insert or replace a race and index it by its start date
    async fn save_race(&self, race: &RaceRecord) -> Result<(), StoreError>;
    async fn find_race(&self, id: &RaceId) -> Result<Option<RaceRecord>, StoreError>;
    /// Races starting on a UTC date, earliest first
    async fn find_races_on(&self, date: NaiveDate) -> Result<Vec<RaceRecord>, StoreError>;
}

#[async_trait]
pub trait PunterRepository: Send + Sync {
    async fn create_punter(&self, punter: &Punter) -> Result<(), StoreError>;
    async fn find_punters(&self) -> Result<Vec<Punter>, StoreError>;
}

/// Everything the engine needs from persistence
pub trait Store: SnailRepository + RaceRepository + PunterRepository {}

impl<T> Store for T where T: SnailRepository + RaceRepository + PunterRepository {}

/// Load the snails of a race record in entrant order
pub async fn load_entrants(
    store: &dyn Store,
    record: &RaceRecord,
) -> Result<Vec<Snail>, StoreError> {
    let mut snails = Vec::with_capacity(record.entrants.len());
    for entrant in &record.entrants {
        let snail = store
            .find_snail(&entrant.snail_id)
            .await?
            .ok_or_else(|| StoreError::Missing(format!("snail {}", entrant.snail_id)))?;
        snails.push(snail);
    }
    Ok(snails)
}
