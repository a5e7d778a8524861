use std::sync::Arc;

use tracing::info;

use crate::auth::JwtKeys;
use crate::config::{AppConfig, JwtConfig};
use crate::store::{MemoryStore, PgStore, Store};

/// `DATABASE_URL` value that selects the in-process store.
pub const MEMORY_DATABASE_URL: &str = "memory://";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub keys: Arc<JwtKeys>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = if config.database_url == MEMORY_DATABASE_URL {
            info!("using in-memory store");
            Arc::new(MemoryStore::new()) as Arc<dyn Store>
        } else {
            let pg = PgStore::connect(&config.database_url).await?;
            pg.migrate().await?;
            info!("database ready");
            Arc::new(pg) as Arc<dyn Store>
        };

        Ok(Self::from_parts(store, Arc::new(config)))
    }

    pub fn from_parts(store: Arc<dyn Store>, config: Arc<AppConfig>) -> Self {
        let keys = Arc::new(JwtKeys::new(&config.jwt));
        Self {
            store,
            keys,
            config,
        }
    }

    /// In-memory state with a fixed test secret.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: MEMORY_DATABASE_URL.into(),
            jwt: JwtConfig {
                secret: "test-secret-test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            host: "127.0.0.1".into(),
            port: 0,
            cors_allow_origins: Vec::new(),
            seed_user: None,
        });

        Self::from_parts(Arc::new(MemoryStore::new()), config)
    }
}
