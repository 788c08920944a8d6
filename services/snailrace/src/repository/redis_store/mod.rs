//! Redis-backed store
//!
//! Records are stored as JSON strings. Owner and punter indexes are plain
//! sets, the per-day race index is a sorted set scored by start time in
//! milliseconds.

mod keys;

use async_trait::async_trait;
use chrono::NaiveDate;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use shared::{RaceId, SnailId};

pub use keys::*;

use super::{PunterRepository, RaceRepository, SnailRepository};
use crate::errors::StoreError;
use crate::punter::Punter;
use crate::race::RaceRecord;
use crate::snail::Snail;

pub struct RedisStore {
    redis: ConnectionManager,
}

impl RedisStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Open a managed connection to `url`
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self::new(redis))
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let mut redis_conn = self.redis.clone();
        let raw: Option<String> = redis_conn.get(key).await?;
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn load_many<T: DeserializeOwned>(&self, keys: Vec<String>) -> Result<Vec<T>, StoreError> {
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self.load(&key).await? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl SnailRepository for RedisStore {
    async fn create_snail(&self, snail: &Snail) -> Result<(), StoreError> {
        let json = serde_json::to_string(snail)?;
        let mut redis_conn = self.redis.clone();

        let mut pipe = redis::pipe();
        pipe.atomic();
        let _: () = pipe
            .set(snail_key(&snail.id), json)
            .ignore()
            .sadd(owner_index_key(&snail.owner_id), snail.id.as_str())
            .ignore()
            .query_async(&mut redis_conn)
            .await?;
        Ok(())
    }

    async fn find_snail(&self, id: &SnailId) -> Result<Option<Snail>, StoreError> {
        self.load(&snail_key(id)).await
    }

    async fn find_snails_by_owner(&self, owner_id: &str) -> Result<Vec<Snail>, StoreError> {
        let mut redis_conn = self.redis.clone();
        let mut ids: Vec<String> = redis_conn.smembers(owner_index_key(owner_id)).await?;
        ids.sort();

        let keys = ids
            .into_iter()
            .filter_map(|id| SnailId::try_from(id).ok())
            .map(|id| snail_key(&id))
            .collect();
        self.load_many(keys).await
    }

    async fn save_snail(&self, snail: &Snail) -> Result<(), StoreError> {
        let json = serde_json::to_string(snail)?;
        let mut redis_conn = self.redis.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(snail_key(&snail.id))
            .arg(json)
            .arg("XX")
            .query_async(&mut redis_conn)
            .await?;
        if reply.is_none() {
            return Err(StoreError::Missing(format!("snail {}", snail.id)));
        }
        Ok(())
    }

    async fn delete_snail(&self, id: &SnailId) -> Result<(), StoreError> {
        let Some(snail) = self.find_snail(id).await? else {
            return Ok(());
        };
        let mut redis_conn = self.redis.clone();

        let mut pipe = redis::pipe();
        pipe.atomic();
        let _: () = pipe
            .del(snail_key(id))
            .ignore()
            .srem(owner_index_key(&snail.owner_id), id.as_str())
            .ignore()
            .query_async(&mut redis_conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RaceRepository for RedisStore {
    async fn save_race(&self, race: &RaceRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(race)?;
        let mut redis_conn = self.redis.clone();

        let mut pipe = redis::pipe();
        pipe.atomic();
        let _: () = pipe
            .set(race_key(&race.id), json)
            .ignore()
            .zadd(
                date_index_key(race.start_at.date_naive()),
                race.id.as_str(),
                race.start_at.timestamp_millis(),
            )
            .ignore()
            .query_async(&mut redis_conn)
            .await?;
        Ok(())
    }

    async fn find_race(&self, id: &RaceId) -> Result<Option<RaceRecord>, StoreError> {
        self.load(&race_key(id)).await
    }

    async fn find_races_on(&self, date: NaiveDate) -> Result<Vec<RaceRecord>, StoreError> {
        let mut redis_conn = self.redis.clone();
        let ids: Vec<String> = redis_conn.zrange(date_index_key(date), 0, -1).await?;

        let keys = ids
            .into_iter()
            .filter_map(|id| RaceId::try_from(id).ok())
            .map(|id| race_key(&id))
            .collect();
        self.load_many(keys).await
    }
}

#[async_trait]
impl PunterRepository for RedisStore {
    async fn create_punter(&self, punter: &Punter) -> Result<(), StoreError> {
        let json = serde_json::to_string(punter)?;
        let mut redis_conn = self.redis.clone();

        let mut pipe = redis::pipe();
        pipe.atomic();
        let _: () = pipe
            .set(punter_key(punter.id), json)
            .ignore()
            .sadd(punter_index_key(), punter.id.to_string())
            .ignore()
            .query_async(&mut redis_conn)
            .await?;
        Ok(())
    }

    async fn find_punters(&self) -> Result<Vec<Punter>, StoreError> {
        let mut redis_conn = self.redis.clone();
        let ids: Vec<String> = redis_conn.smembers(punter_index_key()).await?;

        let keys = ids
            .into_iter()
            .filter_map(|id| uuid::Uuid::parse_str(&id).ok())
            .map(punter_key)
            .collect();
        self.load_many(keys).await
    }
}
