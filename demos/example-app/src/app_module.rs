use crate::infrastructure::database::DatabaseModule;
use crate::modules::audit::AuditModule;
use crate::modules::user::UserModule;
use tessera::prelude::*;

fn banner(_: &Deps) -> Result<LifecycleHook> {
    Ok(LifecycleHook::new(|| async {
        tracing::info!("All modules initialized");
        Ok(())
    }))
}

fn farewell(_: &Deps) -> Result<LifecycleHook> {
    Ok(LifecycleHook::new(|| async {
        tracing::info!("Releasing application resources");
        Ok(())
    }))
}

/// Root of the example graph.
///
/// ```text
/// AppModule
/// ├── DatabaseModule (global) ── ConfigModule (dynamic)
/// ├── UserModule ── AuditModule (forward ref) ── ConfigModule (same instance)
/// └── AuditModule
/// ```
#[module(
    imports = [DatabaseModule, UserModule, AuditModule],
    providers = [
        Provider::factory(&APP_INIT, banner).multi(),
        Provider::factory(&APP_DESTROY, farewell).multi(),
    ],
)]
pub struct AppModule;
