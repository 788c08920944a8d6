//! In-process store

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{RaceId, SnailId};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{PunterRepository, RaceRepository, SnailRepository};
use crate::errors::StoreError;
use crate::punter::Punter;
use crate::race::RaceRecord;
use crate::snail::Snail;

#[derive(Debug, Default)]
pub struct MemoryStore {
    snails: RwLock<HashMap<SnailId, Snail>>,
    races: RwLock<HashMap<RaceId, RaceRecord>>,
    punters: RwLock<HashMap<Uuid, Punter>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnailRepository for MemoryStore {
    async fn create_snail(&self, snail: &Snail) -> Result<(), StoreError> {
        self.snails
            .write()
            .await
            .insert(snail.id.clone(), snail.clone());
        Ok(())
    }

    async fn find_snail(&self, id: &SnailId) -> Result<Option<Snail>, StoreError> {
        Ok(self.snails.read().await.get(id).cloned())
    }

    async fn find_snails_by_owner(&self, owner_id: &str) -> Result<Vec<Snail>, StoreError> {
        let snails = self.snails.read().await;
        let mut owned: Vec<Snail> = snails
            .values()
            .filter(|snail| snail.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(owned)
    }

    async fn save_snail(&self, snail: &Snail) -> Result<(), StoreError> {
        let mut snails = self.snails.write().await;
        match snails.get_mut(&snail.id) {
            Some(existing) => {
                *existing = snail.clone();
                Ok(())
            }
            None => Err(StoreError::Missing(format!("snail {}", snail.id))),
        }
    }

    async fn delete_snail(&self, id: &SnailId) -> Result<(), StoreError> {
        self.snails.write().await.remove(id);
        Ok(())
    }
}

#[async_trait]
impl RaceRepository for MemoryStore {
    async fn save_race(&self, race: &RaceRecord) -> Result<(), StoreError> {
        self.races
            .write()
            .await
            .insert(race.id.clone(), race.clone());
        Ok(())
    }

    async fn find_race(&self, id: &RaceId) -> Result<Option<RaceRecord>, StoreError> {
        Ok(self.races.read().await.get(id).cloned())
    }

    async fn find_races_on(&self, date: NaiveDate) -> Result<Vec<RaceRecord>, StoreError> {
        let races = self.races.read().await;
        let mut found: Vec<RaceRecord> = races
            .values()
            .filter(|race| race.start_at.date_naive() == date)
            .cloned()
            .collect();
        found.sort_by_key(|race| race.start_at);
        Ok(found)
    }
}

#[async_trait]
impl PunterRepository for MemoryStore {
    async fn create_punter(&self, punter: &Punter) -> Result<(), StoreError> {
        self.punters.write().await.insert(punter.id, punter.clone());
        Ok(())
    }

    async fn find_punters(&self) -> Result<Vec<Punter>, StoreError> {
        Ok(self.punters.read().await.values().cloned().collect())
    }
}
