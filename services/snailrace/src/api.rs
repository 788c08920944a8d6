//! Public entry point used by the command layer

use std::sync::Arc;

use chrono::Utc;
use shared::{RaceId, SnailId, Stake};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::errors::{EngineError, Result};
use crate::manager::RaceManager;
use crate::observer::{RaceBroadcaster, RaceObserver, RaceSnapshot, RenderTarget};
use crate::odds::{WagerKind, WagerType};
use crate::punter::PunterPool;
use crate::race::{Bettor, Race, Wager};
use crate::repository::Store;
use crate::scheduler::Scheduler;
use crate::snail::Snail;
use crate::state::{RaceContext, RaceSession};
use crate::wallet::Wallet;

/// Attempts at finding an unused race id before giving up
const HOST_ID_ATTEMPTS: usize = 8;

/// One self-contained racing engine
///
/// Engines share nothing, so tests can run several side by side.
#[derive(Clone)]
pub struct SnailRace {
    context: RaceContext,
    manager: Arc<RaceManager>,
    shutdown: CancellationToken,
}

impl SnailRace {
    pub fn new(
        store: Arc<dyn Store>,
        wallet: Arc<dyn Wallet>,
        punters: PunterPool,
        config: EngineConfig,
    ) -> Self {
        Self {
            context: RaceContext {
                store,
                wallet,
                punters: Arc::new(punters),
                config,
            },
            manager: Arc::new(RaceManager::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Build an engine, loading the punter pool from the store
    pub async fn load(
        store: Arc<dyn Store>,
        wallet: Arc<dyn Wallet>,
        config: EngineConfig,
    ) -> Result<Self> {
        let punters = PunterPool::load(store.as_ref(), config.punters.pool_size).await?;
        Ok(Self::new(store, wallet, punters, config))
    }

    pub fn manager(&self) -> &Arc<RaceManager> {
        &self.manager
    }

    pub fn config(&self) -> &EngineConfig {
        &self.context.config
    }

    /// Token whose cancellation stops every race this engine hosts
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Open a user-hosted race for joining and start its lifecycle
    pub async fn host_race(
        &self,
        observer: Arc<dyn RaceObserver>,
        target: RenderTarget,
    ) -> Result<RaceId> {
        let now = Utc::now();
        let join_closes_at = now + self.context.config.join_window();
        let start_at = join_closes_at + self.context.config.betting_window();

        let mut last_error = None;
        for _ in 0..HOST_ID_ATTEMPTS {
            let race = Race::new(RaceId::generate(), true, start_at);
            let session = Arc::new(RaceSession::hosted(
                race,
                join_closes_at,
                self.context.clone(),
                Arc::clone(&observer),
                target.clone(),
            ));

            match self.manager.register(Arc::clone(&session)).await {
                Ok(()) => {
                    metrics::counter!("snailrace_races_hosted_total").increment(1);
                    info!(
                        race_id = %session.id(),
                        join_closes_at = %join_closes_at,
                        start_at = %start_at,
                        "Race hosted"
                    );
                    session.spawn(self.shutdown.child_token());
                    return Ok(session.id().clone());
                }
                Err(e @ EngineError::DuplicateRace(_)) => {
                    warn!(error = %e, "Race id collision, regenerating");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| EngineError::DuplicateRace(RaceId::generate())))
    }

    /// Enter one of the user's snails into a joining race
    pub async fn join_race(&self, user_id: &str, race_id: &RaceId, snail_id: &SnailId) -> Result<usize> {
        let session = self.manager.get(race_id).await?;
        let snail = self
            .context
            .store
            .find_snail(snail_id)
            .await?
            .ok_or_else(|| EngineError::SnailNotFound(snail_id.clone()))?;
        if snail.owner_id != user_id {
            return Err(EngineError::NotSnailOwner(snail_id.clone()));
        }

        session.join(snail).await
    }

    /// Place a user wager on a race that is open for betting
    pub async fn place_bet(
        &self,
        user_id: &str,
        race_id: &RaceId,
        amount: i64,
        wager_type: WagerType,
        indices: &[usize],
    ) -> Result<Wager> {
        let stake = Stake::new(amount).map_err(|e| EngineError::InvalidStake {
            amount,
            reason: e.to_string(),
        })?;
        let session = self.manager.get(race_id).await?;
        let entrants = session.entrant_count().await;
        let kind = WagerKind::new(wager_type, indices, entrants)?;

        session
            .place_wager(Bettor::User(user_id.to_string()), stake.as_i64(), kind)
            .await
    }

    /// The user's snails, generating a first one if they have none
    pub async fn get_entrants_for_user(&self, user_id: &str) -> Result<Vec<Snail>> {
        let owned = self.context.store.find_snails_by_owner(user_id).await?;
        if !owned.is_empty() {
            return Ok(owned);
        }

        let snail = Snail::generate(&mut rand::thread_rng(), user_id, None);
        self.context.store.create_snail(&snail).await?;
        info!(user_id, snail_id = %snail.id, name = %snail.name, "Generated snail for new racer");
        Ok(vec![snail])
    }

    pub async fn snapshot(&self, race_id: &RaceId) -> Result<RaceSnapshot> {
        Ok(self.manager.get(race_id).await?.snapshot().await)
    }

    /// A scheduler bound to this engine's races and collaborators
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.context.clone(), Arc::clone(&self.manager))
    }

    /// Spawn the daily scheduler
    ///
    /// Must be started at most once per engine.
    pub fn start_scheduler(
        &self,
        broadcaster: Arc<dyn RaceBroadcaster>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let scheduler = self.scheduler();
        tokio::spawn(async move { scheduler.run(broadcaster, cancel).await })
    }

    /// Spawn the periodic sweep of finished races
    pub fn start_sweeper(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let manager = Arc::clone(&self.manager);
        let interval = self.context.config.sweep_interval();
        tokio::spawn(async move { manager.run_sweeper(interval, cancel).await })
    }
}
