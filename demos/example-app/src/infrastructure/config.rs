use tessera::prelude::*;

pub const CONFIG_OPTIONS: InjectionToken<ConfigOptions> = InjectionToken::new("ConfigOptions");

#[derive(Debug, Clone)]
pub struct ConfigOptions {
    pub database_url: String,
    pub page_size: usize,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "memory://example".to_string()),
            page_size: 20,
        }
    }
}

#[module]
pub struct ConfigModule;

impl ConfigModule {
    /// Registering twice with equal options yields one module instance.
    pub fn register(options: ConfigOptions) -> DynamicModule {
        let fingerprint = serde_json::json!({
            "database_url": options.database_url,
            "page_size": options.page_size,
        });
        DynamicModule::new::<ConfigModule>(
            ModuleMetadata::new()
                .providers([Provider::value(&CONFIG_OPTIONS, options)])
                .exports([&CONFIG_OPTIONS]),
        )
        .with_options_value(fingerprint)
    }
}
