//! Race lifecycle state machine
//!
//! Joining -> Betting -> InProgress -> Finished, with Cancelled reachable
//! from any non-terminal phase. The phase is published on a watch channel and
//! only changes while the race ledger lock is held, so a wager or join that
//! observed the right phase under that lock can never land after the
//! transition.
//!
//! Lock order is session state, then ledger. Observer callbacks are awaited
//! with neither held.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::constants::*;
use shared::{RaceId, SnailId};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::errors::{EngineError, Result, StoreError};
use crate::observer::{EntrantView, NoopObserver, RaceObserver, RaceSnapshot, RenderTarget};
use crate::odds::WagerKind;
use crate::punter::PunterPool;
use crate::race::{Bettor, Ledger, Race, Settlement, Wager};
use crate::repository::Store;
use crate::simulator::{simulate_race, Placings, SimulatedRace};
use crate::snail::Snail;
use crate::wallet::Wallet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RacePhase {
    Joining,
    Betting,
    InProgress,
    Finished,
    Cancelled,
}

impl RacePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RacePhase::Finished | RacePhase::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RacePhase::Joining => "joining",
            RacePhase::Betting => "betting",
            RacePhase::InProgress => "in_progress",
            RacePhase::Finished => "finished",
            RacePhase::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RacePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborators shared by every race of one engine
#[derive(Clone)]
pub struct RaceContext {
    pub store: Arc<dyn Store>,
    pub wallet: Arc<dyn Wallet>,
    pub punters: Arc<PunterPool>,
    pub config: EngineConfig,
}

/// Unlock attempts before a refused achievement is dropped
const MAX_ACHIEVEMENT_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone)]
struct PendingAchievement {
    user_id: String,
    key: &'static str,
    attempts: u32,
}

impl PendingAchievement {
    fn new(user_id: impl Into<String>, key: &'static str) -> Self {
        Self {
            user_id: user_id.into(),
            key,
            attempts: 0,
        }
    }
}

struct SessionState {
    step: usize,
    simulation: Option<SimulatedRace>,
    observer: Arc<dyn RaceObserver>,
    target: RenderTarget,
    achievements: Vec<PendingAchievement>,
    retired: Vec<SnailId>,
}

/// Place punter Win wagers on a ledger
///
/// Returns the number of wagers applied.
pub(crate) fn seed_punter_wagers(
    race_id: &RaceId,
    ledger: &mut Ledger,
    punters: &PunterPool,
    per_race: usize,
) -> usize {
    let snails = ledger.snails();
    let mut rng = rand::thread_rng();
    let mut placed = 0;

    for punter in punters.draw(&mut rng, per_race) {
        let Some((index, amount)) = punter.pick(&snails, &mut rng) else {
            continue;
        };
        let wager = Wager::new(
            race_id.clone(),
            Bettor::Punter(punter.id),
            amount,
            WagerKind::Win(index),
        );
        match ledger.apply_wager(wager) {
            Ok(()) => placed += 1,
            Err(e) => warn!(race_id = %race_id, punter_id = %punter.id, error = %e, "Punter wager rejected"),
        }
    }

    placed
}

/// Execution context of one live race
pub struct RaceSession {
    race: Race,
    context: RaceContext,
    join_closes_at: DateTime<Utc>,
    phase: watch::Sender<RacePhase>,
    state: Mutex<SessionState>,
    render_lock: Mutex<()>,
}

impl RaceSession {
    /// A user-hosted race, open for joining until `join_closes_at`
    pub fn hosted(
        race: Race,
        join_closes_at: DateTime<Utc>,
        context: RaceContext,
        observer: Arc<dyn RaceObserver>,
        target: RenderTarget,
    ) -> Self {
        Self::with_phase(race, join_closes_at, context, RacePhase::Joining, observer, target)
    }

    /// A scheduled race whose field is already set and whose pool is seeded
    ///
    /// Renders go nowhere until [`RaceSession::attach`] supplies an observer.
    pub fn scheduled(race: Race, context: RaceContext) -> Self {
        let start_at = race.start_at;
        Self::with_phase(
            race,
            start_at,
            context,
            RacePhase::Betting,
            Arc::new(NoopObserver),
            RenderTarget::default(),
        )
    }

    fn with_phase(
        race: Race,
        join_closes_at: DateTime<Utc>,
        context: RaceContext,
        phase: RacePhase,
        observer: Arc<dyn RaceObserver>,
        target: RenderTarget,
    ) -> Self {
        let (phase, _) = watch::channel(phase);
        Self {
            race,
            context,
            join_closes_at,
            phase,
            state: Mutex::new(SessionState {
                step: 0,
                simulation: None,
                observer,
                target,
                achievements: Vec::new(),
                retired: Vec::new(),
            }),
            render_lock: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &RaceId {
        &self.race.id
    }

    pub fn race(&self) -> &Race {
        &self.race
    }

    pub fn phase(&self) -> RacePhase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RacePhase> {
        self.phase.subscribe()
    }

    pub async fn attach(&self, observer: Arc<dyn RaceObserver>, target: RenderTarget) {
        let mut state = self.state.lock().await;
        state.observer = observer;
        state.target = target;
    }

    fn expect_phase(&self, expected: RacePhase) -> Result<()> {
        let actual = self.phase();
        if actual != expected {
            return Err(EngineError::InvalidRaceState { expected, actual });
        }
        Ok(())
    }

    /// Add a snail to the field while the race is joining
    pub async fn join(&self, snail: Snail) -> Result<usize> {
        let snail_id = snail.id.clone();
        let (index, entrants) = {
            let mut ledger = self.race.ledger().await;
            self.expect_phase(RacePhase::Joining)?;
            if ledger.entrants().iter().any(|e| e.snail.id == snail.id) {
                return Err(EngineError::AlreadyJoined(snail.id));
            }
            if ledger.has_owner(&snail.owner_id) {
                return Err(EngineError::UserAlreadyJoined(snail.owner_id));
            }
            let index = ledger.join(snail)?;
            self.persist_quietly(&ledger, RacePhase::Joining).await;
            (index, ledger.entrants().len())
        };

        info!(
            race_id = %self.race.id,
            snail_id = %snail_id,
            entrants,
            "Snail joined race"
        );
        self.render().await;
        Ok(index)
    }

    /// Accept a wager while the race is open for betting
    ///
    /// User stakes are debited from the wallet before the wager is applied.
    pub async fn place_wager(&self, bettor: Bettor, stake: i64, kind: WagerKind) -> Result<Wager> {
        let wager = {
            let mut ledger = self.race.ledger().await;
            self.expect_phase(RacePhase::Betting)?;
            ledger.validate_stake(stake, &kind)?;

            if let Some(user_id) = bettor.user_id() {
                self.context
                    .wallet
                    .debit(user_id, stake, WAGER_MEMO, WALLET_SOURCE)
                    .await?;
            }

            let wager = Wager::new(self.race.id.clone(), bettor, stake, kind);
            ledger.apply_wager(wager.clone())?;
            self.persist_quietly(&ledger, RacePhase::Betting).await;
            wager
        };

        metrics::counter!("snailrace_wagers_placed_total").increment(1);
        info!(
            race_id = %self.race.id,
            wager_id = %wager.id,
            wager_type = wager.kind.wager_type().name(),
            stake = wager.stake,
            "Wager placed"
        );
        self.render().await;
        Ok(wager)
    }

    pub async fn entrant_count(&self) -> usize {
        self.race.ledger().await.entrants().len()
    }

    pub async fn snapshot(&self) -> RaceSnapshot {
        let state = self.state.lock().await;
        let ledger = self.race.ledger().await;
        self.build_snapshot(&state, &ledger)
    }

    fn build_snapshot(&self, state: &SessionState, ledger: &Ledger) -> RaceSnapshot {
        let simulation = state.simulation.as_ref();

        let entrants = ledger
            .entrants()
            .iter()
            .enumerate()
            .map(|(index, entrant)| {
                let (win_odds, place_odds) = ledger.odds(index);
                let position = simulation
                    .and_then(|sim| sim.timelines.get(index))
                    .and_then(|timeline| timeline.get(state.step).or_else(|| timeline.last()))
                    .copied()
                    .unwrap_or(0.0);
                EntrantView {
                    index,
                    snail_id: entrant.snail.id.clone(),
                    name: entrant.snail.name.clone(),
                    owner_id: entrant.snail.owner_id.clone(),
                    snail_type: entrant.snail.snail_type,
                    pool: entrant.pool,
                    win_odds,
                    place_odds,
                    position,
                    place: simulation.and_then(|sim| sim.placings.place_of(index)),
                }
            })
            .collect();

        RaceSnapshot {
            race_id: self.race.id.clone(),
            phase: self.phase(),
            user_hosted: self.race.user_hosted,
            start_at: self.race.start_at,
            step: state.step,
            required_steps: simulation.map(|sim| sim.required_steps).unwrap_or(0),
            pool: ledger.pool(),
            wagers: ledger.wagers().len(),
            entrants,
            placings: simulation.map(|sim| sim.placings.order().to_vec()),
        }
    }

    /// Run one lifecycle step at `now`, cancelling the race on failure
    ///
    /// Returns false once the race is terminal and no achievement is waiting
    /// for a retry.
    pub async fn tick(&self, now: DateTime<Utc>) -> bool {
        if let Err(e) = self.advance(now).await {
            error!(
                race_id = %self.race.id,
                phase = %self.phase(),
                error = %e,
                "Race failed to advance"
            );
            self.cancel(&e.to_string()).await;
        }
        !self.phase().is_terminal() || !self.state.lock().await.achievements.is_empty()
    }

    /// Apply whatever transition is due at `now` and render it
    pub async fn advance(&self, now: DateTime<Utc>) -> Result<()> {
        let changed = match self.phase() {
            RacePhase::Joining => self.close_joining(now).await?,
            RacePhase::Betting => self.start_race(now).await?,
            RacePhase::InProgress => {
                self.step_race().await?;
                true
            }
            RacePhase::Finished | RacePhase::Cancelled => {
                let _rendering = self.render_lock.lock().await;
                self.retry_achievements().await;
                false
            }
        };

        if changed {
            self.render().await;
        }
        Ok(())
    }

    async fn close_joining(&self, now: DateTime<Utc>) -> Result<bool> {
        if now < self.join_closes_at {
            return Ok(false);
        }

        let mut ledger = self.race.ledger().await;
        let entrants = ledger.entrants().len();
        if entrants < MIN_RACERS {
            self.phase.send_replace(RacePhase::Cancelled);
            self.persist_quietly(&ledger, RacePhase::Cancelled).await;
            drop(ledger);

            metrics::counter!("snailrace_races_cancelled_total").increment(1);
            info!(race_id = %self.race.id, entrants, "Not enough entrants, race cancelled");
            self.purge_retired().await;
            return Ok(true);
        }

        let punter_wagers = seed_punter_wagers(
            &self.race.id,
            &mut ledger,
            &self.context.punters,
            self.context.config.punters.per_race,
        );
        self.phase.send_replace(RacePhase::Betting);
        self.persist(&ledger, RacePhase::Betting).await?;

        info!(
            race_id = %self.race.id,
            entrants,
            punter_wagers,
            pool = ledger.pool(),
            "Joining closed, betting open"
        );
        Ok(true)
    }

    async fn start_race(&self, now: DateTime<Utc>) -> Result<bool> {
        if now < self.race.start_at {
            return Ok(false);
        }

        let mut state = self.state.lock().await;
        let ledger = self.race.ledger().await;
        let snails = ledger.snails();
        let simulation = simulate_race(&snails, self.race.id.as_str());

        info!(
            race_id = %self.race.id,
            entrants = snails.len(),
            required_steps = simulation.required_steps,
            pool = ledger.pool(),
            "Race started"
        );
        state.step = 0;
        state.simulation = Some(simulation);
        self.phase.send_replace(RacePhase::InProgress);
        self.persist(&ledger, RacePhase::InProgress).await?;
        Ok(true)
    }

    async fn step_race(&self) -> Result<()> {
        let settlements = {
            let mut state = self.state.lock().await;
            let required_steps = state
                .simulation
                .as_ref()
                .map(|sim| sim.required_steps)
                .unwrap_or(0);
            // the final step gets its own frame, the race finishes on the next tick
            if state.step < required_steps {
                state.step += 1;
                debug!(race_id = %self.race.id, step = state.step, required_steps, "Race step");
                return Ok(());
            }
            self.finish(&mut state).await?
        };

        self.credit_all(settlements, PAYOUT_MEMO).await;
        self.purge_retired().await;
        Ok(())
    }

    /// Persist results, settle the ledger and mark the race finished
    async fn finish(&self, state: &mut SessionState) -> Result<Vec<Settlement>> {
        let placings = state
            .simulation
            .as_ref()
            .map(|sim| sim.placings.clone())
            .unwrap_or_else(|| Placings::from_order(Vec::new()));

        let mut ledger = self.race.ledger().await;
        for (index, entrant) in ledger.entrants().iter().enumerate() {
            // the stored record may already carry results from another race
            let Some(mut snail) = self.context.store.find_snail(&entrant.snail.id).await? else {
                warn!(race_id = %self.race.id, snail_id = %entrant.snail.id, "Snail no longer stored, result dropped");
                continue;
            };
            let place = placings.place_of(index).unwrap_or(0);
            if snail.record_result(place) {
                state.retired.push(snail.id.clone());
            }
            match self.context.store.save_snail(&snail).await {
                Ok(()) => {}
                Err(StoreError::Missing(_)) => {
                    warn!(race_id = %self.race.id, snail_id = %snail.id, "Snail no longer stored, result dropped");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let settlements = ledger.settle(&placings);
        if let Some(winner) = placings.winner().and_then(|idx| ledger.entrants().get(idx)) {
            if !winner.snail.is_house_owned() {
                state.achievements.push(PendingAchievement::new(
                    winner.snail.owner_id.clone(),
                    ACHIEVEMENT_FIRST_PLACE,
                ));
            }
        }
        self.phase.send_replace(RacePhase::Finished);
        self.persist_quietly(&ledger, RacePhase::Finished).await;

        metrics::counter!("snailrace_races_finished_total").increment(1);
        info!(
            race_id = %self.race.id,
            winner = ?placings.winner(),
            pool = ledger.pool(),
            payouts = settlements.len(),
            "Race finished"
        );
        Ok(settlements)
    }

    /// Move a live race to Cancelled and refund user wagers
    ///
    /// Does nothing if the race is already terminal.
    pub async fn cancel(&self, reason: &str) {
        let refunds = {
            let mut ledger = self.race.ledger().await;
            if self.phase().is_terminal() {
                return;
            }
            let refunds = ledger.refunds();
            self.phase.send_replace(RacePhase::Cancelled);
            self.persist_quietly(&ledger, RacePhase::Cancelled).await;
            refunds
        };

        metrics::counter!("snailrace_races_cancelled_total").increment(1);
        warn!(
            race_id = %self.race.id,
            reason,
            refunds = refunds.len(),
            "Race cancelled"
        );
        self.credit_all(refunds, REFUND_MEMO).await;
        self.purge_retired().await;
        self.render().await;
    }

    async fn credit_all(&self, settlements: Vec<Settlement>, memo: &str) {
        let mut big_payouts = Vec::new();

        for settlement in settlements {
            let credited = self
                .context
                .wallet
                .credit(&settlement.user_id, settlement.amount, memo, WALLET_SOURCE)
                .await;
            match credited {
                Ok(()) => {
                    metrics::counter!("snailrace_payouts_total").increment(1);
                    info!(
                        race_id = %self.race.id,
                        user_id = %settlement.user_id,
                        amount = settlement.amount,
                        memo,
                        "Wallet credited"
                    );
                    if memo == PAYOUT_MEMO && settlement.is_big_payout() {
                        big_payouts.push(PendingAchievement::new(
                            settlement.user_id,
                            ACHIEVEMENT_BIG_PAYOUT,
                        ));
                    }
                }
                Err(e) => {
                    metrics::counter!("snailrace_payout_failures_total").increment(1);
                    error!(
                        race_id = %self.race.id,
                        user_id = %settlement.user_id,
                        wager_id = %settlement.wager_id,
                        amount = settlement.amount,
                        error = %e,
                        "Wallet credit failed"
                    );
                }
            }
        }

        if !big_payouts.is_empty() {
            self.state.lock().await.achievements.extend(big_payouts);
        }
    }

    async fn purge_retired(&self) {
        let retired = std::mem::take(&mut self.state.lock().await.retired);
        for snail_id in retired {
            match self.context.store.delete_snail(&snail_id).await {
                Ok(()) => info!(race_id = %self.race.id, snail_id = %snail_id, "Retired snail removed"),
                Err(e) => error!(
                    race_id = %self.race.id,
                    snail_id = %snail_id,
                    error = %e,
                    "Failed to remove retired snail"
                ),
            }
        }
    }

    /// Render the current snapshot, then retry queued achievements
    pub async fn render(&self) {
        let _rendering = self.render_lock.lock().await;

        let (snapshot, observer, target) = {
            let state = self.state.lock().await;
            let ledger = self.race.ledger().await;
            (
                self.build_snapshot(&state, &ledger),
                Arc::clone(&state.observer),
                state.target.clone(),
            )
        };

        observer.render(&snapshot, &target).await;
        self.retry_achievements().await;
    }

    /// Offer every queued achievement to the observer once
    ///
    /// Callers hold the render lock. Refused achievements stay queued until
    /// they run out of attempts.
    async fn retry_achievements(&self) {
        let (observer, pending) = {
            let mut state = self.state.lock().await;
            (Arc::clone(&state.observer), std::mem::take(&mut state.achievements))
        };
        if pending.is_empty() {
            return;
        }

        let mut refused = Vec::new();
        for mut achievement in pending {
            if observer
                .unlock_achievement(&achievement.user_id, achievement.key)
                .await
            {
                info!(
                    race_id = %self.race.id,
                    user_id = %achievement.user_id,
                    achievement = achievement.key,
                    "Achievement unlocked"
                );
                continue;
            }

            achievement.attempts += 1;
            if achievement.attempts >= MAX_ACHIEVEMENT_ATTEMPTS {
                error!(
                    race_id = %self.race.id,
                    user_id = %achievement.user_id,
                    achievement = achievement.key,
                    attempts = achievement.attempts,
                    "Achievement dropped after repeated refusals"
                );
            } else {
                warn!(
                    race_id = %self.race.id,
                    user_id = %achievement.user_id,
                    achievement = achievement.key,
                    attempts = achievement.attempts,
                    "Achievement not granted, will retry"
                );
                refused.push(achievement);
            }
        }

        if !refused.is_empty() {
            self.state.lock().await.achievements.extend(refused);
        }
    }

    async fn persist(&self, ledger: &Ledger, status: RacePhase) -> Result<()> {
        self.context
            .store
            .save_race(&self.race.record(ledger, status))
            .await?;
        Ok(())
    }

    async fn persist_quietly(&self, ledger: &Ledger, status: RacePhase) {
        if let Err(e) = self.persist(ledger, status).await {
            error!(race_id = %self.race.id, status = %status, error = %e, "Failed to persist race");
        }
    }

    /// Drive the race on the configured tick until it is terminal or
    /// `cancel` fires
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.context.config.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(race_id = %self.race.id, phase = %self.phase(), "Race lifecycle started");
        self.render().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(race_id = %self.race.id, phase = %self.phase(), "Race lifecycle stopped by shutdown");
                    return;
                }
                _ = interval.tick() => {
                    if !self.tick(Utc::now()).await {
                        break;
                    }
                }
            }
        }

        info!(race_id = %self.race.id, phase = %self.phase(), "Race lifecycle ended");
    }

    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run(cancel))
    }
}
