//! Common test utilities and fixtures for integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use shared::{RaceId, SnailId};
use tokio::sync::Mutex;

use snailrace::config::EngineConfig;
use snailrace::observer::{RaceBroadcaster, RaceObserver, RaceSnapshot, RenderTarget};
use snailrace::punter::{Punter, PunterPool};
use snailrace::race::RaceRecord;
use snailrace::repository::{MemoryStore, PunterRepository, RaceRepository, SnailRepository};
use snailrace::snail::{Snail, SnailStats, SnailType};
use snailrace::state::RaceContext;
use snailrace::wallet::MemoryWallet;
use snailrace::{SnailRace, StoreError};

/// Observer that keeps every snapshot and can refuse achievements
#[derive(Default)]
pub struct RecordingObserver {
    pub snapshots: Mutex<Vec<RaceSnapshot>>,
    pub unlocked: Mutex<Vec<(String, String)>>,
    pub unlock_attempts: AtomicUsize,
    refusals: AtomicUsize,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Refuse the first `count` achievement attempts
    pub fn refusing(count: usize) -> Arc<Self> {
        let observer = Self::default();
        observer.refusals.store(count, Ordering::SeqCst);
        Arc::new(observer)
    }

    pub async fn last(&self) -> Option<RaceSnapshot> {
        self.snapshots.lock().await.last().cloned()
    }

    pub async fn unlocked_keys(&self) -> Vec<String> {
        self.unlocked
            .lock()
            .await
            .iter()
            .map(|(_, key)| key.clone())
            .collect()
    }
}

#[async_trait]
impl RaceObserver for RecordingObserver {
    async fn render(&self, snapshot: &RaceSnapshot, _target: &RenderTarget) {
        self.snapshots.lock().await.push(snapshot.clone());
    }

    async fn unlock_achievement(&self, user_id: &str, key: &str) -> bool {
        self.unlock_attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if refused {
            return false;
        }
        self.unlocked
            .lock()
            .await
            .push((user_id.to_string(), key.to_string()));
        true
    }
}

/// Broadcaster that hands out one shared recording observer
#[derive(Default)]
pub struct RecordingBroadcaster {
    pub observer: Arc<RecordingObserver>,
    pub ready: Mutex<Vec<RaceId>>,
}

#[async_trait]
impl RaceBroadcaster for RecordingBroadcaster {
    async fn on_race_ready(&self, race_id: &RaceId) -> (Arc<dyn RaceObserver>, RenderTarget) {
        self.ready.lock().await.push(race_id.clone());
        (
            Arc::clone(&self.observer) as Arc<dyn RaceObserver>,
            RenderTarget::channel("race-tv"),
        )
    }
}

/// Memory store whose snail writes can be made to fail
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_snail_saves: AtomicBool,
}

#[async_trait]
impl SnailRepository for FlakyStore {
    async fn create_snail(&self, snail: &Snail) -> Result<(), StoreError> {
        self.inner.create_snail(snail).await
    }

    async fn find_snail(&self, id: &SnailId) -> Result<Option<Snail>, StoreError> {
        self.inner.find_snail(id).await
    }

    async fn find_snails_by_owner(&self, owner_id: &str) -> Result<Vec<Snail>, StoreError> {
        self.inner.find_snails_by_owner(owner_id).await
    }

    async fn save_snail(&self, snail: &Snail) -> Result<(), StoreError> {
        if self.fail_snail_saves.load(Ordering::SeqCst) {
            let broken = serde_json::from_str::<u8>("not json").unwrap_err();
            return Err(StoreError::Serialization(broken));
        }
        self.inner.save_snail(snail).await
    }

    async fn delete_snail(&self, id: &SnailId) -> Result<(), StoreError> {
        self.inner.delete_snail(id).await
    }
}

#[async_trait]
impl RaceRepository for FlakyStore {
    async fn save_race(&self, race: &RaceRecord) -> Result<(), StoreError> {
        self.inner.save_race(race).await
    }

    async fn find_race(&self, id: &RaceId) -> Result<Option<RaceRecord>, StoreError> {
        self.inner.find_race(id).await
    }

    async fn find_races_on(&self, date: NaiveDate) -> Result<Vec<RaceRecord>, StoreError> {
        self.inner.find_races_on(date).await
    }
}

#[async_trait]
impl PunterRepository for FlakyStore {
    async fn create_punter(&self, punter: &Punter) -> Result<(), StoreError> {
        self.inner.create_punter(punter).await
    }

    async fn find_punters(&self) -> Result<Vec<Punter>, StoreError> {
        self.inner.find_punters().await
    }
}

/// Config with a millisecond tick and short windows
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        tick_ms: 5,
        join_seconds: 1,
        betting_seconds: 1,
        ..EngineConfig::default()
    }
}

pub fn seeded_punters(count: usize, seed: u64) -> PunterPool {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    PunterPool::new((0..count).map(|_| Punter::generate(&mut rng)).collect())
}

pub fn stats(speed: f64) -> SnailStats {
    SnailStats {
        speed,
        acceleration: 0.6,
        weight: 3.0,
        stamina: 60,
        luck: 0.1,
    }
}

/// Create and store a snail for `owner`
pub async fn stored_snail<S: SnailRepository + ?Sized>(
    store: &S,
    owner: &str,
    name: &str,
    races_remaining: Option<u32>,
) -> Snail {
    let snail = Snail::new(owner, name, SnailType::Thunderhorn, stats(6.0), races_remaining);
    store.create_snail(&snail).await.unwrap();
    snail
}

/// Race context over the given store with a fresh wallet and seeded punters
pub fn context_with(
    store: Arc<dyn snailrace::Store>,
    wallet: Arc<MemoryWallet>,
    config: EngineConfig,
) -> RaceContext {
    RaceContext {
        store,
        wallet,
        punters: Arc::new(seeded_punters(64, 7)),
        config,
    }
}

pub struct TestEngine {
    pub store: Arc<MemoryStore>,
    pub wallet: Arc<MemoryWallet>,
    pub engine: SnailRace,
}

impl TestEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), config)
    }

    pub fn with_store(store: Arc<MemoryStore>, config: EngineConfig) -> Self {
        let wallet = Arc::new(MemoryWallet::new());
        let engine = SnailRace::new(
            Arc::clone(&store) as Arc<dyn snailrace::Store>,
            Arc::clone(&wallet) as Arc<dyn snailrace::Wallet>,
            seeded_punters(128, 42),
            config,
        );
        Self {
            store,
            wallet,
            engine,
        }
    }
}
