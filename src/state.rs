use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::analysis::{advisor, FeedAdvisor};
use crate::auth::CredentialService;
use crate::config::AppConfig;
use crate::storage;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub credentials: CredentialService,
    pub advisor: Arc<dyn FeedAdvisor>,
}

impl AppState {
    /// Fails when the configured credential store cannot be opened.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = storage::connect(&config.store)
            .await
            .with_context(|| format!("opening {} credential store", config.store.kind()))?;
        let advisor = advisor::from_config(&config.advisor);
        info!(
            advisor = if config.advisor.url.is_some() { "http" } else { "none" },
            sample_size = config.feed.sample_size,
            strict = config.feed.strict,
            "application state ready"
        );

        Ok(Self {
            config,
            credentials: CredentialService::new(store),
            advisor,
        })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::analysis::NoopAdvisor;
        use crate::config::{AdvisorConfig, FeedConfig, JwtConfig, StoreConfig};
        use crate::storage::MemoryStore;

        let config = Arc::new(AppConfig {
            store: StoreConfig::Memory,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test".into(),
                audience: "test".into(),
                ttl_minutes: 5,
            },
            feed: FeedConfig::default(),
            advisor: AdvisorConfig::default(),
        });

        Self {
            config,
            credentials: CredentialService::new(Arc::new(MemoryStore::default())),
            advisor: Arc::new(NoopAdvisor),
        }
    }
}
