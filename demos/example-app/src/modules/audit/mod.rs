use crate::infrastructure::config::{ConfigModule, ConfigOptions, CONFIG_OPTIONS};
use std::sync::Mutex;
use tessera::prelude::*;

pub const AUDIT_CHANNELS: InjectionToken<String> = InjectionToken::new("AuditChannels");

/// Collects audit entries in memory.
#[derive(Injectable)]
pub struct AuditSink {
    #[inject(all = AUDIT_CHANNELS)]
    channels: Vec<Arc<String>>,
    #[inject(default)]
    entries: Mutex<Vec<String>>,
}

impl AuditSink {
    pub fn record(&self, entry: impl Into<String>) {
        let entry = entry.into();
        for channel in &self.channels {
            tracing::debug!(channel = %channel, "{}", entry);
        }
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

fn announce_ready(deps: &Deps) -> Result<LifecycleHook> {
    let options = deps.get::<ConfigOptions>(0)?;
    Ok(LifecycleHook::new(move || {
        let url = options.database_url.clone();
        async move {
            tracing::info!("Audit module ready (store: {})", url);
            Ok(())
        }
    }))
}

// Same options as DatabaseModule, so both share one ConfigModule instance.
#[module(
    imports = [ConfigModule::register(ConfigOptions::default())],
    providers = [
        AuditSink,
        Provider::value(&AUDIT_CHANNELS, "log".to_string()).multi(),
        Provider::value(&AUDIT_CHANNELS, "memory".to_string()).multi(),
        Provider::factory(&MODULE_INIT, announce_ready).deps([&CONFIG_OPTIONS]).multi(),
    ],
    exports = [AuditSink],
)]
pub struct AuditModule;
