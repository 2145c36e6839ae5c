use super::config::{ConfigModule, ConfigOptions, CONFIG_OPTIONS};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use tessera::prelude::*;

/// In-memory key/value store standing in for a real connection pool.
#[derive(Injectable)]
#[injectable(on_module_init, on_app_destroy)]
pub struct Database {
    #[inject(token = CONFIG_OPTIONS)]
    options: Arc<ConfigOptions>,
    #[inject(default)]
    connected: AtomicBool,
    #[inject(default)]
    next_id: AtomicU64,
    #[inject(default)]
    rows: RwLock<HashMap<u64, String>>,
}

impl Database {
    pub fn insert(&self, value: String) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut rows) = self.rows.write() {
            rows.insert(id, value);
        }
        id
    }

    pub fn find(&self, id: u64) -> Option<String> {
        self.rows.read().ok()?.get(&id).cloned()
    }

    pub fn count(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn page_size(&self) -> usize {
        self.options.page_size
    }
}

#[async_trait]
impl OnModuleInit for Database {
    async fn on_module_init(&self) -> Result<(), LifecycleError> {
        tracing::info!("Connecting to {}", self.options.database_url);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl OnAppDestroy for Database {
    async fn on_app_destroy(&self) -> Result<(), LifecycleError> {
        self.connected.store(false, Ordering::SeqCst);
        tracing::info!("Database disconnected ({} rows)", self.count());
        Ok(())
    }
}

/// Global, so feature modules can inject [`Database`] without importing it.
#[module(
    global,
    imports = [ConfigModule::register(ConfigOptions::default())],
    providers = [Database],
    exports = [Database],
)]
pub struct DatabaseModule;
