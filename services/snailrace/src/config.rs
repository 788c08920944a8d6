use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Tunables for the race engine
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub tick_ms: u64,
    pub join_seconds: i64,
    pub betting_seconds: i64,
    pub sweep_seconds: u64,
    pub punters: PunterConfig,
    pub schedule: ScheduleConfig,
    /// Races a freshly generated snail may run before it is retired
    pub snail_usage: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PunterConfig {
    pub pool_size: usize,
    pub per_race: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    pub min_races_per_day: usize,
    pub max_races_per_day: usize,
    pub min_snails_per_race: usize,
    pub max_snails_per_race: usize,
    pub ready_lead_seconds: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1_000,
            join_seconds: 60,
            betting_seconds: 120,
            sweep_seconds: 60,
            punters: PunterConfig {
                pool_size: 256,
                per_race: 64,
            },
            schedule: ScheduleConfig {
                min_races_per_day: 7,
                max_races_per_day: 12,
                min_snails_per_race: 7,
                max_snails_per_race: 12,
                ready_lead_seconds: 300,
            },
            snail_usage: 10,
        }
    }
}

impl EngineConfig {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = EngineConfig {
            tick_ms: env::var("SNAILRACE_TICK_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,
            join_seconds: env::var("SNAILRACE_JOIN_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            betting_seconds: env::var("SNAILRACE_BETTING_SECONDS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()?,
            sweep_seconds: env::var("SNAILRACE_SWEEP_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            punters: PunterConfig {
                pool_size: env::var("SNAILRACE_PUNTER_POOL_SIZE")
                    .unwrap_or_else(|_| "256".to_string())
                    .parse()?,
                per_race: env::var("SNAILRACE_PUNTERS_PER_RACE")
                    .unwrap_or_else(|_| "64".to_string())
                    .parse()?,
            },
            schedule: ScheduleConfig {
                min_races_per_day: env::var("SNAILRACE_MIN_RACES_PER_DAY")
                    .unwrap_or_else(|_| "7".to_string())
                    .parse()?,
                max_races_per_day: env::var("SNAILRACE_MAX_RACES_PER_DAY")
                    .unwrap_or_else(|_| "12".to_string())
                    .parse()?,
                min_snails_per_race: env::var("SNAILRACE_MIN_SNAILS_PER_RACE")
                    .unwrap_or_else(|_| "7".to_string())
                    .parse()?,
                max_snails_per_race: env::var("SNAILRACE_MAX_SNAILS_PER_RACE")
                    .unwrap_or_else(|_| "12".to_string())
                    .parse()?,
                ready_lead_seconds: env::var("SNAILRACE_READY_LEAD_SECONDS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()?,
            },
            snail_usage: env::var("SNAILRACE_SNAIL_USAGE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scheduler and lifecycle cannot work with
    pub fn validate(&self) -> anyhow::Result<()> {
        let schedule = &self.schedule;
        anyhow::ensure!(self.tick_ms > 0, "SNAILRACE_TICK_MS must be positive");
        anyhow::ensure!(self.sweep_seconds > 0, "SNAILRACE_SWEEP_SECONDS must be positive");
        anyhow::ensure!(
            schedule.min_races_per_day > 0
                && schedule.min_races_per_day <= schedule.max_races_per_day,
            "races per day range is empty"
        );
        anyhow::ensure!(
            schedule.min_snails_per_race >= shared::MIN_RACERS
                && schedule.min_snails_per_race <= schedule.max_snails_per_race,
            "snails per race range must start at the race quorum"
        );
        anyhow::ensure!(self.snail_usage > 0, "SNAILRACE_SNAIL_USAGE must be positive");
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_seconds)
    }

    pub fn join_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.join_seconds)
    }

    pub fn betting_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.betting_seconds)
    }

    pub fn ready_lead(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.schedule.ready_lead_seconds)
    }
}
