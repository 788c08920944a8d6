//! Registry of live races
//!
//! One async mutex guards the whole map. Sweeping reads each session's phase
//! from its watch channel without awaiting, so check and removal happen under
//! the same lock acquisition as registration and lookup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use shared::RaceId;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::{EngineError, Result};
use crate::state::RaceSession;

#[derive(Default)]
pub struct RaceManager {
    races: Mutex<HashMap<RaceId, Arc<RaceSession>>>,
}

impl RaceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, session: Arc<RaceSession>) -> Result<()> {
        let mut races = self.races.lock().await;
        if races.contains_key(session.id()) {
            return Err(EngineError::DuplicateRace(session.id().clone()));
        }
        races.insert(session.id().clone(), session);
        Ok(())
    }

    pub async fn get(&self, race_id: &RaceId) -> Result<Arc<RaceSession>> {
        self.races
            .lock()
            .await
            .get(race_id)
            .cloned()
            .ok_or_else(|| EngineError::RaceNotFound(race_id.clone()))
    }

    pub async fn contains(&self, race_id: &RaceId) -> bool {
        self.races.lock().await.contains_key(race_id)
    }

    pub async fn len(&self) -> usize {
        self.races.lock().await.len()
    }

    /// Drop every Finished or Cancelled race, returning how many were removed
    pub async fn sweep(&self) -> usize {
        let mut races = self.races.lock().await;
        let before = races.len();
        races.retain(|_, session| !session.phase().is_terminal());
        before - races.len()
    }

    /// Sweep on `interval` until `cancel` fires
    pub async fn run_sweeper(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        info!(interval_secs = interval.as_secs(), "Race sweeper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Race sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let removed = self.sweep().await;
                    if removed > 0 {
                        info!(removed, "Swept terminal races");
                    } else {
                        debug!("No terminal races to sweep");
                    }
                }
            }
        }
    }
}
