use serde::Deserialize;
use snailrace::EngineConfig;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub redis: RedisConfig,
    pub metrics_port: u16,
    pub house_channel: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Unset runs the engine on the in-memory store
    pub url: Option<String>,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            engine: EngineConfig::load()?,
            redis: RedisConfig {
                url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            },
            metrics_port: env::var("METRICS_PORT")
                .unwrap_or_else(|_| "9092".to_string())
                .parse()?,
            house_channel: env::var("RACETRACK_HOUSE_CHANNEL")
                .unwrap_or_else(|_| "racetrack".to_string()),
        })
    }
}
