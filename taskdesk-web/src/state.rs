//! Application state shared by every handler

use crate::{
    auth::{CookiePolicy, JwtService, UserService},
    cache::{connect_cache, CacheStore},
    config::WebConfig,
    WebError, WebResult,
};
use std::sync::Arc;
use std::time::Instant;
use taskdesk_applications::storage::{MemoryTaskStorage, MemoryUserStorage};
use taskdesk_applications::{TaskService, TaskStorage, UserDirectory, UserStorage};
use tracing::info;

/// `DATABASE_URL` value selecting the in-process store
pub const MEMORY_DATABASE: &str = "memory";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<WebConfig>,
    /// Sessions, the identity cache and user administration
    pub users: UserService,
    pub tasks: TaskService,
    pub cookies: CookiePolicy,
    pub cache: CacheStore,
    pub started_at: Instant,
}

impl AppState {
    /// Open storage and cache for `config` and seed the first admin if asked
    ///
    /// A fresh user store also clears identities a shared cache still holds.
    pub async fn new(config: WebConfig) -> WebResult<Self> {
        let (users, tasks) = open_storage(&config.database_url).await?;
        let cache = connect_cache(config.redis_url.as_deref()).await;
        info!(cache = cache.backend_name(), "Cache ready");

        let state = Self::with_parts(config, users, tasks, cache);
        state
            .users
            .purge_orphaned_identities()
            .await
            .map_err(|e| WebError::Config(format!("Failed to inspect user store: {}", e)))?;
        if let Some(seed) = &state.config.seed_admin {
            state
                .users
                .seed_admin(seed)
                .await
                .map_err(|e| WebError::Config(format!("Failed to seed admin: {}", e)))?;
        }
        Ok(state)
    }

    /// Assemble state from already opened backends
    pub fn with_parts(
        config: WebConfig,
        users: Arc<dyn UserStorage>,
        tasks: Arc<dyn TaskStorage>,
        cache: CacheStore,
    ) -> Self {
        let jwt = JwtService::new(&config.jwt_secret, config.token_lifetime());
        let cookies = CookiePolicy::for_environment(config.environment, config.cookie_lifetime());
        let directory = UserDirectory::new(users.clone());

        Self {
            users: UserService::new(directory, cache.clone(), jwt),
            tasks: TaskService::new(users, tasks),
            cookies,
            cache,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    /// Fresh in-memory state, used by tests
    pub fn in_memory(config: WebConfig) -> Self {
        let (users, tasks) = memory_stores();
        Self::with_parts(config, users, tasks, CacheStore::memory())
    }
}

type Stores = (Arc<dyn UserStorage>, Arc<dyn TaskStorage>);

fn memory_stores() -> Stores {
    (
        Arc::new(MemoryUserStorage::new()),
        Arc::new(MemoryTaskStorage::new()),
    )
}

#[cfg(feature = "sqlite")]
async fn open_storage(database_url: &str) -> WebResult<Stores> {
    use taskdesk_applications::storage::sqlite::{connect, SqliteTaskStorage, SqliteUserStorage};

    if database_url == MEMORY_DATABASE {
        info!("Using in-memory storage");
        return Ok(memory_stores());
    }

    let pool = connect(database_url).await.map_err(WebError::Storage)?;
    let users = SqliteUserStorage::new(pool.clone())
        .await
        .map_err(WebError::Storage)?;
    let tasks = SqliteTaskStorage::new(pool)
        .await
        .map_err(WebError::Storage)?;
    info!("Using SQLite storage");
    Ok((Arc::new(users), Arc::new(tasks)))
}

#[cfg(not(feature = "sqlite"))]
async fn open_storage(database_url: &str) -> WebResult<Stores> {
    if database_url != MEMORY_DATABASE {
        tracing::warn!("Built without SQLite support, using in-memory storage");
    }
    Ok(memory_stores())
}
