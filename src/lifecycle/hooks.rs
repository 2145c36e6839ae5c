//! Lifecycle hook traits
//!
//! These traits define the contract for modules and providers that need to
//! take part in module and application lifecycle events. A type opts in by
//! implementing the trait and registering it in [`Injectable::lifecycle`]
//! (the derive macro does this from `#[injectable(on_module_init, ...)]`).
//!
//! [`Injectable::lifecycle`]: crate::Injectable::lifecycle

use super::LifecycleError;
use crate::di::Instance;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use strum_macros::{Display, IntoStaticStr};

/// Called once the owning module has bound its providers
///
/// # Example
///
/// ```rust,ignore
/// use tessera::lifecycle::{OnModuleInit, LifecycleError};
/// use async_trait::async_trait;
///
/// #[async_trait]
/// impl OnModuleInit for DatabaseService {
///     async fn on_module_init(&self) -> Result<(), LifecycleError> {
///         self.pool.connect().await
///             .map_err(|e| LifecycleError::init_failed(e.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait OnModuleInit: Send + Sync {
    async fn on_module_init(&self) -> Result<(), LifecycleError>;
}

/// Called during teardown, after every module ran its app-destroy hooks.
///
/// Modules are destroyed in reverse creation order.
#[async_trait]
pub trait OnModuleDestroy: Send + Sync {
    async fn on_module_destroy(&self) -> Result<(), LifecycleError>;
}

/// Called after the whole graph is created
#[async_trait]
pub trait OnAppInit: Send + Sync {
    async fn on_app_init(&self) -> Result<(), LifecycleError>;
}

/// Called first when the application is torn down
#[async_trait]
pub trait OnAppDestroy: Send + Sync {
    async fn on_app_destroy(&self) -> Result<(), LifecycleError>;
}

/// The four lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum LifecyclePhase {
    #[strum(serialize = "OnModuleInit")]
    ModuleInit,
    #[strum(serialize = "OnModuleDestroy")]
    ModuleDestroy,
    #[strum(serialize = "OnAppInit")]
    AppInit,
    #[strum(serialize = "OnAppDestroy")]
    AppDestroy,
}

type HookFuture = BoxFuture<'static, Result<(), LifecycleError>>;
pub(crate) type HookFn = fn(Instance) -> HookFuture;

/// Type-erased hook table of an injectable.
#[derive(Clone, Copy, Default)]
pub struct Hooks {
    module_init: Option<HookFn>,
    module_destroy: Option<HookFn>,
    app_init: Option<HookFn>,
    app_destroy: Option<HookFn>,
}

impl Hooks {
    pub fn has(&self, phase: LifecyclePhase) -> bool {
        self.get(phase).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.module_init.is_none()
            && self.module_destroy.is_none()
            && self.app_init.is_none()
            && self.app_destroy.is_none()
    }

    fn get(&self, phase: LifecyclePhase) -> Option<HookFn> {
        match phase {
            LifecyclePhase::ModuleInit => self.module_init,
            LifecyclePhase::ModuleDestroy => self.module_destroy,
            LifecyclePhase::AppInit => self.app_init,
            LifecyclePhase::AppDestroy => self.app_destroy,
        }
    }

    /// Runs the hook registered for `phase` against `instance`, if any.
    ///
    /// Failures are reported as [`LifecycleError::HookFailed`] naming `owner`.
    pub(crate) async fn run(
        &self,
        phase: LifecyclePhase,
        owner: &str,
        instance: Instance,
    ) -> Result<(), LifecycleError> {
        let Some(hook) = self.get(phase) else {
            return Ok(());
        };
        tracing::debug!("{} -> {}", phase, owner);
        hook(instance).await.map_err(|e| {
            tracing::error!("{} failed for {}: {}", phase, owner, e);
            LifecycleError::hook_failed(owner, e.to_string())
        })
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("module_init", &self.module_init.is_some())
            .field("module_destroy", &self.module_destroy.is_some())
            .field("app_init", &self.app_init.is_some())
            .field("app_destroy", &self.app_destroy.is_some())
            .finish()
    }
}

/// Builder recording which hook traits `T` takes part in.
///
/// ```rust,ignore
/// impl Injectable for Cache {
///     fn inject(_: &Resolver<'_>) -> Result<Self> { Ok(Cache::default()) }
///
///     fn lifecycle() -> Lifecycle<Self> {
///         Lifecycle::new().on_module_init().on_app_destroy()
///     }
/// }
/// ```
pub struct Lifecycle<T> {
    hooks: Hooks,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Lifecycle<T> {
    pub fn new() -> Self {
        Self {
            hooks: Hooks::default(),
            _marker: PhantomData,
        }
    }

    pub fn on_module_init(mut self) -> Self
    where
        T: OnModuleInit,
    {
        self.hooks.module_init = Some(call_module_init::<T> as HookFn);
        self
    }

    pub fn on_module_destroy(mut self) -> Self
    where
        T: OnModuleDestroy,
    {
        self.hooks.module_destroy = Some(call_module_destroy::<T> as HookFn);
        self
    }

    pub fn on_app_init(mut self) -> Self
    where
        T: OnAppInit,
    {
        self.hooks.app_init = Some(call_app_init::<T> as HookFn);
        self
    }

    pub fn on_app_destroy(mut self) -> Self
    where
        T: OnAppDestroy,
    {
        self.hooks.app_destroy = Some(call_app_destroy::<T> as HookFn);
        self
    }

    pub fn into_hooks(self) -> Hooks {
        self.hooks
    }
}

impl<T: Send + Sync + 'static> Default for Lifecycle<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn call_module_init<T: OnModuleInit + 'static>(instance: Instance) -> HookFuture {
    Box::pin(async move {
        let service = downcast::<T>(instance)?;
        service.on_module_init().await
    })
}

fn call_module_destroy<T: OnModuleDestroy + 'static>(instance: Instance) -> HookFuture {
    Box::pin(async move {
        let service = downcast::<T>(instance)?;
        service.on_module_destroy().await
    })
}

fn call_app_init<T: OnAppInit + 'static>(instance: Instance) -> HookFuture {
    Box::pin(async move {
        let service = downcast::<T>(instance)?;
        service.on_app_init().await
    })
}

fn call_app_destroy<T: OnAppDestroy + 'static>(instance: Instance) -> HookFuture {
    Box::pin(async move {
        let service = downcast::<T>(instance)?;
        service.on_app_destroy().await
    })
}

fn downcast<T: Send + Sync + 'static>(instance: Instance) -> Result<Arc<T>, LifecycleError> {
    instance.downcast::<T>().map_err(|_| {
        LifecycleError::hook_failed(std::any::type_name::<T>(), "instance has an unexpected type")
    })
}

/// A hook contributed through one of the broadcast tokens
/// ([`MODULE_INIT`](crate::tokens::MODULE_INIT) and friends), usually from a
/// multi-bound factory provider.
#[derive(Clone)]
pub struct LifecycleHook {
    run: Arc<dyn Fn() -> HookFuture + Send + Sync>,
}

impl LifecycleHook {
    pub fn new<F, Fut>(hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), LifecycleError>> + Send + 'static,
    {
        Self {
            run: Arc::new(move || -> HookFuture { Box::pin(hook()) }),
        }
    }

    pub async fn call(&self) -> Result<(), LifecycleError> {
        (self.run)().await
    }
}

impl fmt::Debug for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LifecycleHook")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Cache {
        warmed: AtomicBool,
    }

    #[async_trait]
    impl OnModuleInit for Cache {
        async fn on_module_init(&self) -> Result<(), LifecycleError> {
            self.warmed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl OnAppDestroy for Cache {
        async fn on_app_destroy(&self) -> Result<(), LifecycleError> {
            Err(LifecycleError::shutdown_failed("still in use"))
        }
    }

    #[tokio::test]
    async fn test_registered_hooks_run() {
        let hooks = Lifecycle::<Cache>::new().on_module_init().into_hooks();
        let cache = Arc::new(Cache::default());

        assert!(hooks.has(LifecyclePhase::ModuleInit));
        assert!(!hooks.has(LifecyclePhase::AppInit));

        hooks
            .run(LifecyclePhase::ModuleInit, "Cache", cache.clone())
            .await
            .unwrap();
        assert!(cache.warmed.load(Ordering::SeqCst));

        // absent hooks are skipped silently
        hooks
            .run(LifecyclePhase::AppInit, "Cache", cache.clone())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_hook_failure_names_owner() {
        let hooks = Lifecycle::<Cache>::new().on_app_destroy().into_hooks();
        let err = hooks
            .run(LifecyclePhase::AppDestroy, "CacheModule", Arc::new(Cache::default()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LifecycleError::HookFailed { ref service, .. } if service == "CacheModule"
        ));
    }

    #[tokio::test]
    async fn test_broadcast_hook_can_be_called_repeatedly() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let hook = LifecycleHook::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        hook.call().await.unwrap();
        hook.call().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(LifecyclePhase::AppInit.to_string(), "OnAppInit");
        assert!(Hooks::default().is_empty());
    }
}
