//! Application Bootstrap
//!
//! The composition root: scans a root module into a live module graph and
//! drives the application lifecycle over it.

use super::{shutdown_signal, LifecycleManager};
use crate::config::ApplicationOptions;
use crate::di::{downcast, Injectable, InjectionToken, Token};
use crate::error::Result;
use crate::exception::ExceptionsZone;
use crate::module::{Container, Module, ModuleImport, ModuleType, Scanner};
use std::sync::Arc;
use std::time::Duration;

/// A running application built from a root module
///
/// # Example
///
/// ```rust,ignore
/// use tessera::Application;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let app = Application::new(AppModule::import());
///     app.start().await?;
///
///     let users = app.get::<UserService>()?;
///     // ...
///
///     app.destroy().await?;
///     Ok(())
/// }
/// ```
pub struct Application {
    root: ModuleImport,
    options: ApplicationOptions,
    container: Arc<Container>,
    scanner: Scanner,
    lifecycle_manager: LifecycleManager,
}

impl Application {
    pub fn new(root: impl Into<ModuleImport>) -> Self {
        Self::with_options(root, ApplicationOptions::default())
    }

    pub fn with_options(root: impl Into<ModuleImport>, options: ApplicationOptions) -> Self {
        let container = Container::new();
        let mut lifecycle_manager = LifecycleManager::new();
        if let Some(timeout) = options.init_timeout {
            lifecycle_manager = lifecycle_manager.with_init_timeout(timeout);
        }
        if let Some(timeout) = options.destroy_timeout {
            lifecycle_manager = lifecycle_manager.with_destroy_timeout(timeout);
        }

        Self {
            root: root.into(),
            options,
            scanner: Scanner::new(Arc::clone(&container)),
            container,
            lifecycle_manager,
        }
    }

    /// Create a new application builder
    pub fn builder(root: impl Into<ModuleImport>) -> ApplicationBuilder {
        ApplicationBuilder::new(root)
    }

    /// Get a reference to the container
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn options(&self) -> &ApplicationOptions {
        &self.options
    }

    /// Scans and creates the module graph, then runs app init unless the
    /// application is in testing mode.
    pub async fn start(&self) -> Result<()> {
        ExceptionsZone::run(async {
            tracing::info!("Starting application...");
            self.scanner.scan(&self.root).await?;
            if !self.options.testing {
                self.run_app_init().await?;
            }
            tracing::info!("Application started");
            Ok(())
        })
        .await
    }

    /// Runs app init across the created modules.
    ///
    /// `start()` already does this outside testing mode.
    pub async fn init(&self) -> Result<()> {
        ExceptionsZone::run(self.run_app_init()).await
    }

    async fn run_app_init(&self) -> Result<()> {
        let modules = self.container.get_created_modules();
        self.lifecycle_manager.call_app_init(&modules).await
    }

    /// Runs app destroy, then module destroy in reverse creation order.
    pub async fn destroy(&self) -> Result<()> {
        ExceptionsZone::run(async {
            tracing::info!("Shutting down application...");
            let modules = self.container.get_created_modules();
            self.lifecycle_manager.call_destroy(&modules).await?;
            tracing::info!("Application shutdown complete");
            Ok(())
        })
        .await
    }

    /// Waits for Ctrl+C or SIGTERM, then destroys the application.
    pub async fn run_until_shutdown(&self) -> Result<()> {
        shutdown_signal().await;
        self.destroy().await
    }

    /// Resolves `T` from the first module that binds it.
    pub fn get<T: Injectable>(&self) -> Result<Arc<T>> {
        ExceptionsZone::report(
            self.container
                .get_provider(&Token::of::<T>(), None, false)
                .and_then(downcast),
        )
    }

    pub fn get_token<T: Send + Sync + 'static>(&self, token: &InjectionToken<T>) -> Result<Arc<T>> {
        ExceptionsZone::report(
            self.container
                .get_provider(&token.token(), None, false)
                .and_then(downcast),
        )
    }

    /// Every value any module binds to `token`, in module registration order.
    pub fn get_all<T: Send + Sync + 'static>(
        &self,
        token: &InjectionToken<T>,
    ) -> Result<Vec<Arc<T>>> {
        ExceptionsZone::report(
            self.container
                .get_all_providers(&token.token(), None)
                .and_then(|values| values.into_iter().map(downcast).collect()),
        )
    }

    pub fn has(&self, token: impl Into<Token>) -> bool {
        self.container.is_provider_bound(&token.into(), None)
    }

    /// Lookups restricted to module `M`.
    pub fn select<M: Module>(&self) -> ModuleSelection<'_> {
        self.select_type(ModuleType::of::<M>())
    }

    pub fn select_type(&self, module: ModuleType) -> ModuleSelection<'_> {
        ModuleSelection {
            container: &self.container,
            module,
        }
    }
}

/// Strict lookups against one module's injector.
pub struct ModuleSelection<'a> {
    container: &'a Container,
    module: ModuleType,
}

impl ModuleSelection<'_> {
    pub fn module(&self) -> ModuleType {
        self.module
    }

    pub fn get<T: Injectable>(&self) -> Result<Arc<T>> {
        ExceptionsZone::report(
            self.container
                .get_provider(&Token::of::<T>(), Some(self.module), true)
                .and_then(downcast),
        )
    }

    pub fn get_token<T: Send + Sync + 'static>(&self, token: &InjectionToken<T>) -> Result<Arc<T>> {
        ExceptionsZone::report(
            self.container
                .get_provider(&token.token(), Some(self.module), true)
                .and_then(downcast),
        )
    }

    pub fn get_all<T: Send + Sync + 'static>(
        &self,
        token: &InjectionToken<T>,
    ) -> Result<Vec<Arc<T>>> {
        ExceptionsZone::report(
            self.container
                .get_all_providers(&token.token(), Some(self.module))
                .and_then(|values| values.into_iter().map(downcast).collect()),
        )
    }

    pub fn has(&self, token: impl Into<Token>) -> bool {
        self.container
            .is_provider_bound(&token.into(), Some(self.module))
    }
}

/// Builder for Application
pub struct ApplicationBuilder {
    root: ModuleImport,
    options: ApplicationOptions,
}

impl ApplicationBuilder {
    pub fn new(root: impl Into<ModuleImport>) -> Self {
        Self {
            root: root.into(),
            options: ApplicationOptions::default(),
        }
    }

    /// Replace all options at once, e.g. with [`ApplicationOptions::from_env`]
    pub fn options(mut self, options: ApplicationOptions) -> Self {
        self.options = options;
        self
    }

    /// Skip app init on start
    pub fn testing(mut self, testing: bool) -> Self {
        self.options.testing = testing;
        self
    }

    /// Set a timeout for app init hooks
    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.options.init_timeout = Some(timeout);
        self
    }

    /// Set a timeout for each teardown phase
    pub fn destroy_timeout(mut self, timeout: Duration) -> Self {
        self.options.destroy_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Application {
        Application::with_options(self.root, self.options)
    }

    /// Build and start the application
    ///
    /// # Errors
    ///
    /// Returns an error if scanning, module creation or app init fails.
    pub async fn start(self) -> Result<Application> {
        let app = self.build();
        app.start().await?;
        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::{Provider, Resolver};
    use crate::error::TesseraError;
    use crate::module::ModuleMetadata;

    const GREETING: InjectionToken<String> = InjectionToken::new("GREETING");
    const PLUGINS: InjectionToken<&'static str> = InjectionToken::new("PLUGINS");

    struct Greeter {
        greeting: Arc<String>,
    }

    impl Injectable for Greeter {
        fn inject(resolver: &Resolver<'_>) -> Result<Self> {
            Ok(Self {
                greeting: resolver.get_token(&GREETING)?,
            })
        }
    }

    struct AppModule;

    impl Injectable for AppModule {
        fn inject(_: &Resolver<'_>) -> Result<Self> {
            Ok(AppModule)
        }

        fn as_module() -> Option<ModuleType> {
            Some(ModuleType::of::<Self>())
        }
    }

    impl Module for AppModule {
        fn metadata() -> ModuleMetadata {
            ModuleMetadata::new().providers([
                Provider::value(&GREETING, "hello".to_string()),
                Provider::of::<Greeter>(),
                Provider::value(&PLUGINS, "auth").multi(),
                Provider::value(&PLUGINS, "audit").multi(),
            ])
        }
    }

    #[tokio::test]
    async fn test_start_and_lookup() {
        let app = Application::builder(ModuleType::of::<AppModule>())
            .testing(true)
            .start()
            .await
            .unwrap();

        let greeter = app.get::<Greeter>().unwrap();
        assert_eq!(greeter.greeting.as_str(), "hello");
        assert!(Arc::ptr_eq(&greeter, &app.get::<Greeter>().unwrap()));

        let plugins: Vec<&str> = app
            .select::<AppModule>()
            .get_all(&PLUGINS)
            .unwrap()
            .iter()
            .map(|plugin| **plugin)
            .collect();
        assert_eq!(plugins, vec!["auth", "audit"]);

        assert!(app.has(&GREETING));
        assert!(!app.has(InjectionToken::<u8>::new("MISSING")));
        app.init().await.unwrap();
        app.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn test_lookup_before_start_fails() {
        let app = Application::new(ModuleType::of::<AppModule>());
        let err = app.get::<Greeter>().err().unwrap();
        assert!(matches!(err, TesseraError::UnknownProvider { .. }));
    }
}
