//! Log-only race output for running the engine without a chat front end

use std::sync::Arc;

use async_trait::async_trait;
use shared::RaceId;
use snailrace::{RaceBroadcaster, RaceObserver, RaceSnapshot, RenderTarget};
use tracing::info;

pub struct LogObserver;

#[async_trait]
impl RaceObserver for LogObserver {
    async fn render(&self, snapshot: &RaceSnapshot, target: &RenderTarget) {
        let leader = snapshot
            .entrants
            .iter()
            .max_by(|a, b| a.position.total_cmp(&b.position))
            .map(|e| e.name.as_str())
            .unwrap_or("-");

        info!(
            race_id = %snapshot.race_id,
            channel = %target.channel_id,
            phase = %snapshot.phase,
            step = snapshot.step,
            required_steps = snapshot.required_steps,
            pool = snapshot.pool,
            wagers = snapshot.wagers,
            entrants = snapshot.entrants.len(),
            leader,
            "Race update"
        );
    }

    async fn unlock_achievement(&self, user_id: &str, key: &str) -> bool {
        info!(user_id, achievement = key, "Achievement granted");
        true
    }
}

/// Hands every scheduled race the log observer on the house channel
pub struct LogBroadcaster {
    observer: Arc<LogObserver>,
    channel: String,
}

impl LogBroadcaster {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            observer: Arc::new(LogObserver),
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl RaceBroadcaster for LogBroadcaster {
    async fn on_race_ready(&self, race_id: &RaceId) -> (Arc<dyn RaceObserver>, RenderTarget) {
        info!(race_id = %race_id, channel = %self.channel, "Scheduled race ready");
        (
            Arc::clone(&self.observer) as Arc<dyn RaceObserver>,
            RenderTarget::channel(self.channel.clone()),
        )
    }
}
