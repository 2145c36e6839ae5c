mod service;

pub use service::{UserDirectory, UserService};

use crate::modules::audit::AuditModule;
use tessera::prelude::*;

#[module(
    imports = [ModuleImport::forward(AuditModule::import)],
    providers = [UserService, UserDirectory],
    exports = [UserService],
    on_app_init,
)]
pub struct UserModule {
    #[inject(token = MODULE_REF)]
    module_ref: Arc<ModuleRef>,
}

#[async_trait]
impl OnAppInit for UserModule {
    async fn on_app_init(&self) -> Result<(), LifecycleError> {
        let directory = self
            .module_ref
            .get::<UserDirectory>()
            .map_err(|e| LifecycleError::init_failed(e.to_string()))?;
        tracing::info!("UserModule ready, {} users seeded", directory.seed());
        Ok(())
    }
}
