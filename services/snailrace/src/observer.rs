//! Presentation collaborators and the snapshot they receive

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{RaceId, SnailId};

use crate::snail::SnailType;
use crate::state::RacePhase;

/// Opaque handle of the place a race is rendered into, such as a chat
/// channel and message id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderTarget {
    pub channel_id: String,
    pub message_id: Option<String>,
}

impl RenderTarget {
    pub fn channel(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            message_id: None,
        }
    }
}

/// One entrant as shown to players
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrantView {
    pub index: usize,
    pub snail_id: SnailId,
    pub name: String,
    pub owner_id: String,
    pub snail_type: SnailType,
    pub pool: i64,
    pub win_odds: Option<f64>,
    pub place_odds: Option<f64>,
    /// Track position at the current step, 0 before the race starts
    pub position: f64,
    pub place: Option<u32>,
}

/// Everything needed to render a race from scratch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub race_id: RaceId,
    pub phase: RacePhase,
    pub user_hosted: bool,
    pub start_at: DateTime<Utc>,
    pub step: usize,
    pub required_steps: usize,
    pub pool: i64,
    pub wagers: usize,
    pub entrants: Vec<EntrantView>,
    /// Entrant indices, winner first, once the race has been simulated
    pub placings: Option<Vec<usize>>,
}

#[async_trait]
pub trait RaceObserver: Send + Sync {
    async fn render(&self, snapshot: &RaceSnapshot, target: &RenderTarget);

    /// Grant an achievement. Returning false keeps it queued for retry.
    async fn unlock_achievement(&self, user_id: &str, key: &str) -> bool;
}

/// Supplies live callbacks to scheduled races as they become ready
#[async_trait]
pub trait RaceBroadcaster: Send + Sync {
    async fn on_race_ready(&self, race_id: &RaceId) -> (Arc<dyn RaceObserver>, RenderTarget);
}

/// Observer that drops every render and accepts every achievement
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

#[async_trait]
impl RaceObserver for NoopObserver {
    async fn render(&self, _snapshot: &RaceSnapshot, _target: &RenderTarget) {}

    async fn unlock_achievement(&self, _user_id: &str, _key: &str) -> bool {
        true
    }
}
