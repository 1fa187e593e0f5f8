//! Configuration Module
//!
//! Configuration loading for the stock feed service.

mod settings;

pub use settings::{
    ApiKey, BroadcastSettings, ConfigError, FeedConfig, OriginSettings, ServerSettings,
    StoreSettings, UpdateSettings,
};
