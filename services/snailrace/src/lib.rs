//! Snail racing engine
//!
//! Hosts timed races inside a chat application: snails join, punters and
//! users bet into a parimutuel pool, the race is simulated step by step and
//! winning wagers are paid out. Rendering, storage and wallets are reached
//! through the traits in [`observer`], [`repository`] and [`wallet`].

pub mod api;
pub mod config;
pub mod errors;
pub mod manager;
pub mod names;
pub mod observer;
pub mod odds;
pub mod punter;
pub mod race;
pub mod repository;
pub mod scheduler;
pub mod simulator;
pub mod snail;
pub mod state;
pub mod wallet;

pub use api::SnailRace;
pub use config::EngineConfig;
pub use errors::{EngineError, Result, StoreError};
pub use observer::{RaceBroadcaster, RaceObserver, RaceSnapshot, RenderTarget};
pub use odds::{WagerKind, WagerType};
pub use race::{Bettor, Wager};
pub use repository::{MemoryStore, RedisStore, Store};
pub use snail::{Snail, SnailStats, SnailType};
pub use state::{RacePhase, RaceSession};
pub use wallet::{MemoryWallet, Wallet, WalletError};
