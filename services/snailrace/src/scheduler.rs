//! Daily race schedule
//!
//! Once per UTC day the scheduler restores today's unfinished races from the
//! store, or generates a fresh card of house races. It then launches each race
//! as its start time comes within the ready lead window.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use rand::seq::SliceRandom;
use rand::Rng;
use shared::constants::HOUSE_OWNER_ID;
use shared::RaceId;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::Result;
use crate::manager::RaceManager;
use crate::observer::RaceBroadcaster;
use crate::race::Race;
use crate::repository::load_entrants;
use crate::snail::Snail;
use crate::state::{seed_punter_wagers, RaceContext, RacePhase, RaceSession};

/// Wait before retrying a day whose schedule could not be built
const SCHEDULE_RETRY_DELAY: StdDuration = StdDuration::from_secs(30);

/// Racing hours of one day in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Opening and closing hour for a weekday
fn week_hours(weekday: Weekday) -> (u32, u32) {
    match weekday {
        Weekday::Mon | Weekday::Tue | Weekday::Wed | Weekday::Thu => (11, 20),
        Weekday::Fri => (10, 22),
        Weekday::Sat => (10, 24),
        Weekday::Sun => (9, 21),
    }
}

pub fn day_window(date: NaiveDate) -> DayWindow {
    let (open, close) = week_hours(date.weekday());
    let midnight = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    DayWindow {
        start: midnight + Duration::hours(open as i64),
        end: midnight + Duration::hours(close as i64),
    }
}

/// Evenly spread start times, each in the middle of its slot
pub fn race_start_times(window: &DayWindow, count: usize) -> Vec<DateTime<Utc>> {
    if count == 0 {
        return Vec::new();
    }
    let spread = (window.end - window.start) / count as i32;
    (0..count)
        .map(|i| window.start + spread * i as i32 + spread / 2)
        .collect()
}

pub struct Scheduler {
    context: RaceContext,
    manager: Arc<RaceManager>,
}

impl Scheduler {
    pub fn new(context: RaceContext, manager: Arc<RaceManager>) -> Self {
        Self { context, manager }
    }

    /// Today's scheduled races, earliest first
    ///
    /// Restores unfinished stored races when any race exists for the date,
    /// otherwise generates a new card.
    pub async fn races_for(&self, date: NaiveDate) -> Result<Vec<Arc<RaceSession>>> {
        let records: Vec<_> = self
            .context
            .store
            .find_races_on(date)
            .await?
            .into_iter()
            .filter(|record| !record.user_hosted)
            .collect();

        if records.is_empty() {
            return self.generate(date).await;
        }

        let mut sessions = Vec::new();
        for record in records.iter().filter(|r| !r.status.is_terminal()) {
            if let Ok(existing) = self.manager.get(&record.id).await {
                sessions.push(existing);
                continue;
            }
            let snails = load_entrants(self.context.store.as_ref(), record).await?;
            let race = Race::restore(record, snails)?;
            let session = Arc::new(RaceSession::scheduled(race, self.context.clone()));
            self.manager.register(Arc::clone(&session)).await?;
            sessions.push(session);
        }

        info!(
            date = %date,
            stored = records.len(),
            restored = sessions.len(),
            "Restored scheduled races"
        );
        Ok(sessions)
    }

    /// Generate, seed, persist and register a day of house races
    pub async fn generate(&self, date: NaiveDate) -> Result<Vec<Arc<RaceSession>>> {
        let schedule = &self.context.config.schedule;
        let window = day_window(date);

        let (count, field_sizes) = {
            let mut rng = rand::thread_rng();
            let count = rng.gen_range(schedule.min_races_per_day..=schedule.max_races_per_day);
            let sizes: Vec<usize> = (0..count)
                .map(|_| rng.gen_range(schedule.min_snails_per_race..=schedule.max_snails_per_race))
                .collect();
            (count, sizes)
        };

        let mut stable = self.house_stable(field_sizes.iter().sum()).await?;
        let mut sessions = Vec::with_capacity(count);

        for (start_at, size) in race_start_times(&window, count).into_iter().zip(field_sizes) {
            let race = Race::new(self.unused_race_id().await, false, start_at);
            {
                let mut ledger = race.ledger().await;
                for snail in stable.drain(..size) {
                    ledger.join(snail)?;
                }
                seed_punter_wagers(
                    &race.id,
                    &mut ledger,
                    &self.context.punters,
                    self.context.config.punters.per_race,
                );
                self.context
                    .store
                    .save_race(&race.record(&ledger, RacePhase::Betting))
                    .await?;
            }

            let session = Arc::new(RaceSession::scheduled(race, self.context.clone()));
            self.manager.register(Arc::clone(&session)).await?;
            metrics::counter!("snailrace_races_scheduled_total").increment(1);
            debug!(race_id = %session.id(), start_at = %start_at, entrants = size, "Race scheduled");
            sessions.push(session);
        }

        info!(
            date = %date,
            races = sessions.len(),
            window_start = %window.start,
            window_end = %window.end,
            "Generated daily schedule"
        );
        Ok(sessions)
    }

    /// Shuffled house snails, topped up with new ones until there are `needed`
    async fn house_stable(&self, needed: usize) -> Result<Vec<Snail>> {
        let mut stable = self
            .context
            .store
            .find_snails_by_owner(HOUSE_OWNER_ID)
            .await?;
        stable.shuffle(&mut rand::thread_rng());

        let missing = needed.saturating_sub(stable.len());
        if missing > 0 {
            let fresh: Vec<Snail> = {
                let mut rng = rand::thread_rng();
                (0..missing)
                    .map(|_| Snail::generate(&mut rng, HOUSE_OWNER_ID, Some(self.context.config.snail_usage)))
                    .collect()
            };
            for snail in &fresh {
                self.context.store.create_snail(snail).await?;
            }
            info!(generated = missing, "Topped up house stable");
            stable.extend(fresh);
        }

        Ok(stable)
    }

    async fn unused_race_id(&self) -> RaceId {
        loop {
            let id = RaceId::generate();
            if !self.manager.contains(&id).await {
                return id;
            }
        }
    }

    /// Launch every race whose ready time has passed, starting at `next`
    ///
    /// Returns the index of the first race not yet launched. Races that are
    /// already more than the lead window past their start are cancelled.
    pub async fn launch_due(
        &self,
        races: &[Arc<RaceSession>],
        mut next: usize,
        now: DateTime<Utc>,
        broadcaster: &dyn RaceBroadcaster,
        cancel: &CancellationToken,
    ) -> usize {
        let lead = self.context.config.ready_lead();

        while let Some(session) = races.get(next) {
            let start_at = session.race().start_at;
            if now < start_at - lead {
                break;
            }

            if now - start_at > lead {
                warn!(race_id = %session.id(), start_at = %start_at, "Race start missed, cancelling");
                session.cancel("start time passed before launch").await;
            } else if !session.phase().is_terminal() {
                let (observer, target) = broadcaster.on_race_ready(session.id()).await;
                session.attach(observer, target).await;
                session.spawn(cancel.child_token());
                info!(race_id = %session.id(), start_at = %start_at, "Scheduled race launched");
            }
            next += 1;
        }

        next
    }

    /// Schedule and launch races day after day until `cancel` fires
    pub async fn run(&self, broadcaster: Arc<dyn RaceBroadcaster>, cancel: CancellationToken) {
        self.run_with_clock(broadcaster, cancel, Utc::now).await
    }

    /// [`Scheduler::run`] reading the wall clock from `clock`
    pub async fn run_with_clock<C>(
        &self,
        broadcaster: Arc<dyn RaceBroadcaster>,
        cancel: CancellationToken,
        clock: C,
    ) where
        C: Fn() -> DateTime<Utc> + Send + Sync,
    {
        info!("Race scheduler started");

        loop {
            let today = clock().date_naive();
            let races = match self.races_for(today).await {
                Ok(races) => races,
                Err(e) => {
                    error!(date = %today, error = %e, "Failed to build daily schedule");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(SCHEDULE_RETRY_DELAY) => continue,
                    }
                }
            };

            let mut ticker = tokio::time::interval(self.context.config.tick_interval());
            let mut next = 0;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Race scheduler stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        let now = clock();
                        if now.date_naive() != today {
                            info!(date = %today, launched = next, "Day over, rebuilding schedule");
                            break;
                        }
                        next = self.launch_due(&races, next, now, broadcaster.as_ref(), &cancel).await;
                    }
                }
            }
        }

        info!("Race scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_windows() {
        // 2024-03-04 is a Monday
        let monday = day_window(date(2024, 3, 4));
        assert_eq!(monday.start.to_rfc3339(), "2024-03-04T11:00:00+00:00");
        assert_eq!(monday.end.to_rfc3339(), "2024-03-04T20:00:00+00:00");

        let friday = day_window(date(2024, 3, 8));
        assert_eq!((friday.end - friday.start).num_hours(), 12);

        let saturday = day_window(date(2024, 3, 9));
        assert_eq!(saturday.end.to_rfc3339(), "2024-03-10T00:00:00+00:00");

        let sunday = day_window(date(2024, 3, 10));
        assert_eq!(sunday.start.to_rfc3339(), "2024-03-10T09:00:00+00:00");
    }

    #[test]
    fn test_start_times_are_strictly_inside_window() {
        for day in 4..=10 {
            let window = day_window(date(2024, 3, day));
            for count in 7..=12 {
                let starts = race_start_times(&window, count);
                assert_eq!(starts.len(), count);
                assert!(starts.windows(2).all(|w| w[0] < w[1]));
                assert!(starts.iter().all(|s| *s > window.start && *s < window.end));
            }
        }
    }

    #[test]
    fn test_start_times_sit_mid_slot() {
        let window = day_window(date(2024, 3, 4));
        let starts = race_start_times(&window, 9);
        // nine one-hour slots from 11:00
        assert_eq!(starts[0].to_rfc3339(), "2024-03-04T11:30:00+00:00");
        assert_eq!(starts[8].to_rfc3339(), "2024-03-04T19:30:00+00:00");
        assert!(race_start_times(&window, 0).is_empty());
    }
}
