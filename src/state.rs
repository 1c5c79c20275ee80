//! Shared application state owned by the bootstrap sequence (§3).
//!
//! `AppState` is the single object a module's request handlers close
//! over: the negotiated channels, the secret client, the internal
//! messaging client, and the module's own identity/config. It is built
//! once during bootstrap and handed out as an `Arc`.

use std::sync::Arc;

use crate::channel::ChannelSet;
use crate::config::ModuleConfig;
use crate::messaging::InternalMessagingClient;
use crate::metrics::MetricsTracker;
use crate::secret::SecretClient;

pub struct AppState {
    pub config: ModuleConfig,
    pub channels: ChannelSet,
    pub secrets: Arc<SecretClient>,
    pub messaging: Arc<InternalMessagingClient>,
    pub metrics: MetricsTracker,
}

impl AppState {
    pub fn new(
        config: ModuleConfig,
        channels: ChannelSet,
        secrets: Arc<SecretClient>,
        messaging: Arc<InternalMessagingClient>,
    ) -> Arc<Self> {
        Arc::new(Self { config, channels, secrets, messaging, metrics: MetricsTracker::new() })
    }
}
