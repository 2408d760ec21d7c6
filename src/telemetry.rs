use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

pub const DEFAULT_FILTER: &str = "info,sendmail_relay=debug,tower_http=info";

/// Installs the global fmt subscriber. `RUST_LOG` overrides [`DEFAULT_FILTER`].
/// Calling it twice is harmless.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let fmt_layer = fmt::layer().with_target(true);

    if Registry::default().with(env_filter).with(fmt_layer).try_init().is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
