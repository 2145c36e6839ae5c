//! Lifecycle Manager
//!
//! Runs the application-level phases across a set of created modules.

use super::{LifecycleError, LifecyclePhase};
use crate::error::Result;
use crate::module::ModuleInstance;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Drives app init and teardown over the created modules.
///
/// Module init is not part of this: each module runs it as the last step of
/// its own creation. The manager handles what spans the whole application:
///
/// - app init, in creation order, stopping at the first failure
/// - app destroy, in creation order, then module destroy in reverse
///   creation order; failures are logged and teardown carries on
///
/// # Example
///
/// ```rust,ignore
/// use tessera::lifecycle::LifecycleManager;
/// use std::time::Duration;
///
/// let manager = LifecycleManager::new().with_init_timeout(Duration::from_secs(5));
/// manager.call_app_init(&container.get_created_modules()).await?;
/// // ... application runs ...
/// manager.call_destroy(&container.get_created_modules()).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct LifecycleManager {
    init_timeout: Option<Duration>,
    destroy_timeout: Option<Duration>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the whole app init phase
    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = Some(timeout);
        self
    }

    /// Bound each teardown phase
    pub fn with_destroy_timeout(mut self, timeout: Duration) -> Self {
        self.destroy_timeout = Some(timeout);
        self
    }

    pub fn init_timeout(&self) -> Option<Duration> {
        self.init_timeout
    }

    pub fn destroy_timeout(&self) -> Option<Duration> {
        self.destroy_timeout
    }

    /// Execute all app init hooks
    ///
    /// Modules are visited in creation order, so a module's imports have
    /// always seen app init before the module itself.
    pub async fn call_app_init(&self, modules: &[Arc<ModuleInstance>]) -> Result<()> {
        tracing::info!("Calling {} hooks...", LifecyclePhase::AppInit);

        let run = async {
            for module in modules {
                tracing::debug!("App init: {}", module.name());
                module.on_app_init().await?;
            }
            Result::<()>::Ok(())
        };
        with_timeout(LifecyclePhase::AppInit, self.init_timeout, run).await?;

        tracing::info!(
            "{} complete ({} modules)",
            LifecyclePhase::AppInit,
            modules.len()
        );
        Ok(())
    }

    /// Execute all app destroy hooks
    ///
    /// Every module is visited even if one fails; the first error is
    /// returned once the phase is over.
    pub async fn call_app_destroy(&self, modules: &[Arc<ModuleInstance>]) -> Result<()> {
        tracing::info!("Calling {} hooks...", LifecyclePhase::AppDestroy);

        let run = async {
            let mut first_error = None;
            for module in modules {
                tracing::debug!("App destroy: {}", module.name());
                if let Err(e) = module.on_app_destroy().await {
                    tracing::error!("{} failed for {}: {}", LifecyclePhase::AppDestroy, module.name(), e);
                    first_error.get_or_insert(e);
                }
            }
            first_error.map_or(Ok(()), Err)
        };
        with_timeout(LifecyclePhase::AppDestroy, self.destroy_timeout, run).await?;

        tracing::info!("{} complete", LifecyclePhase::AppDestroy);
        Ok(())
    }

    /// Execute all module destroy hooks
    ///
    /// Modules are destroyed in **reverse order** so that a module goes away
    /// before the modules it imports.
    pub async fn call_module_destroy(&self, modules: &[Arc<ModuleInstance>]) -> Result<()> {
        tracing::info!("Calling {} hooks...", LifecyclePhase::ModuleDestroy);

        let run = async {
            let mut first_error = None;
            for module in modules.iter().rev() {
                tracing::debug!("Destroying: {}", module.name());
                if let Err(e) = module.on_module_destroy().await {
                    tracing::error!(
                        "{} failed for {}: {}",
                        LifecyclePhase::ModuleDestroy,
                        module.name(),
                        e
                    );
                    first_error.get_or_insert(e);
                }
            }
            first_error.map_or(Ok(()), Err)
        };
        with_timeout(LifecyclePhase::ModuleDestroy, self.destroy_timeout, run).await?;

        tracing::info!("{} complete", LifecyclePhase::ModuleDestroy);
        Ok(())
    }

    /// App destroy followed by module destroy.
    ///
    /// Module destroy still runs when app destroy failed.
    pub async fn call_destroy(&self, modules: &[Arc<ModuleInstance>]) -> Result<()> {
        let app = self.call_app_destroy(modules).await;
        let module = self.call_module_destroy(modules).await;
        app.and(module)
    }
}

async fn with_timeout<F>(phase: LifecyclePhase, timeout: Option<Duration>, run: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, run).await.map_err(|_| {
            LifecycleError::timeout(phase.to_string(), format!("Timeout after {:?}", timeout))
        })?,
        None => run.await,
    }
}
