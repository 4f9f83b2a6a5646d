use std::sync::Arc;

use tracing::info;

use super::{
    auth::JwtKeys,
    config::{Config, StoreKind},
    database::{RedisStore, Store, StoreError},
    memory::MemoryStore,
    notify::{HttpMailer, LogMailer, Mailer, Notifier},
};

pub struct State {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub notifier: Notifier,
    pub keys: JwtKeys,
}

impl State {
    pub async fn new(config: Config) -> Result<Arc<Self>, StoreError> {
        let store: Arc<dyn Store> = match config.store {
            StoreKind::Redis => {
                info!("Connecting to Redis at {}", config.redis_url);
                Arc::new(RedisStore::connect(&config.redis_url).await?)
            }
            StoreKind::Memory => {
                info!("Using in-memory store, data is lost on shutdown");
                Arc::new(MemoryStore::new())
            }
        };

        let mailer: Arc<dyn Mailer> = match &config.mail_api_url {
            Some(url) => Arc::new(HttpMailer::new(url.clone(), config.mail_api_key.clone())),
            None => Arc::new(LogMailer),
        };

        Ok(Self::with_parts(config, store, mailer))
    }

    pub fn with_parts(config: Config, store: Arc<dyn Store>, mailer: Arc<dyn Mailer>) -> Arc<Self> {
        let notifier = Notifier::spawn(mailer, config.mail_from.clone());
        let keys = JwtKeys::new(&config.jwt_secret, config.token_ttl_days);

        Arc::new(Self {
            config,
            store,
            notifier,
            keys,
        })
    }
}
