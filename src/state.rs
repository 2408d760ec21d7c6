use crate::config::Config;
use crate::persist::SendLogStore;
use crate::services::rate_limiter::RateLimiter;
use crate::smtp::Dispatcher;
use std::sync::Arc;

pub const APP_NAME: &str = "Send Mail";

#[derive(Debug, Clone)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub environment: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            name: APP_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SendLogStore>,
    pub limiter: RateLimiter,
    pub dispatcher: Arc<Dispatcher>,
    pub info: Arc<AppInfo>,
}

impl AppState {
    pub fn new(store: SendLogStore, limiter: RateLimiter, dispatcher: Dispatcher, info: AppInfo) -> Self {
        Self {
            store: Arc::new(store),
            limiter,
            dispatcher: Arc::new(dispatcher),
            info: Arc::new(info),
        }
    }

    /// Loads the send log and builds the relays named in `config`.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let dispatcher =
            Dispatcher::from_credentials(&config.relays, &config.from_name, config.relay_max_attempts)?;
        let store = SendLogStore::load(&config.log_file).await;
        let info = AppInfo {
            environment: config.environment.clone(),
            ..AppInfo::default()
        };
        Ok(Self::new(
            store,
            RateLimiter::new(config.daily_limit, config.cooldown_secs),
            dispatcher,
            info,
        ))
    }
}
