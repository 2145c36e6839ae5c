use crate::di::{
    downcast, factory_binding, Dependency, Injectable, InjectableType, InjectionToken, Injector,
    Instance, Lazy, Provider, Scope, Token,
};
use crate::error::{join_trace, Result, TesseraError};
use crate::lifecycle::{LifecycleError, LifecycleHook, LifecyclePhase};
use crate::module::{Container, ModuleType};
use crate::reflector::keys;
use crate::tokens::{APP_DESTROY, APP_INIT, MODULE_DESTROY, MODULE_INIT, MODULE_REF};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};
use strum_macros::Display;
use tokio::sync::watch;

/// Where a module is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ModuleState {
    /// Registered, providers not bound yet
    Declared,
    Bound,
    Created,
    Destroyed,
}

/// A validated entry of a module's export set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Export {
    Provider(Token),
    /// Re-exports everything the module exports.
    Module(ModuleType),
}

/// The realised instance of one module reference.
///
/// Owns the module's injector, its resolved imports and exports, and drives
/// its lifecycle: `declared -> bound -> created -> destroyed`.
pub struct ModuleInstance {
    target: ModuleType,
    scope: Vec<ModuleType>,
    token: String,
    container: Weak<Container>,
    injector: Arc<Injector>,
    imports: RwLock<Vec<Weak<ModuleInstance>>>,
    providers: RwLock<Vec<Provider>>,
    exports: RwLock<Vec<Export>>,
    state: RwLock<ModuleState>,
    created: watch::Sender<bool>,
}

impl ModuleInstance {
    pub(crate) fn new(
        target: ModuleType,
        scope: Vec<ModuleType>,
        token: String,
        container: Weak<Container>,
    ) -> Arc<Self> {
        let (created, _) = watch::channel(false);
        Arc::new(Self {
            target,
            scope,
            token,
            container,
            injector: Injector::new(target.name()),
            imports: RwLock::new(Vec::new()),
            providers: RwLock::new(Vec::new()),
            exports: RwLock::new(Vec::new()),
            state: RwLock::new(ModuleState::Declared),
            created,
        })
    }

    pub fn target(&self) -> ModuleType {
        self.target
    }

    pub fn name(&self) -> &'static str {
        self.target.name()
    }

    /// Importing modules this instance was registered under, outermost first.
    pub fn scope(&self) -> &[ModuleType] {
        &self.scope
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn injector(&self) -> &Arc<Injector> {
        &self.injector
    }

    pub fn state(&self) -> ModuleState {
        *self.state.read()
    }

    pub fn imports(&self) -> Vec<Arc<ModuleInstance>> {
        self.imports.read().iter().filter_map(Weak::upgrade).collect()
    }

    pub fn providers(&self) -> Vec<Provider> {
        self.providers.read().clone()
    }

    pub fn exports(&self) -> Vec<Export> {
        self.exports.read().clone()
    }

    /// Waits until [`create`](Self::create) has completed.
    pub async fn created(&self) {
        let mut created = self.created.subscribe();
        // the sender lives as long as `self`, so this only returns once created
        let _ = created.wait_for(|created| *created).await;
    }

    pub fn is_created(&self) -> bool {
        *self.created.borrow()
    }

    pub(crate) fn add_import(&self, related: &Arc<ModuleInstance>) {
        let mut imports = self.imports.write();
        let exists = imports
            .iter()
            .any(|import| std::ptr::eq(import.as_ptr(), Arc::as_ptr(related)));
        if !exists {
            imports.push(Arc::downgrade(related));
        }
    }

    pub(crate) fn add_provider(&self, provider: Provider) {
        self.providers.write().push(provider);
    }

    pub(crate) fn add_exported(&self, export: Export) {
        let mut exports = self.exports.write();
        if !exports.contains(&export) {
            exports.push(export);
        }
    }

    /// Seeds the bindings every module has regardless of its declarations.
    pub(crate) fn add_global_providers(&self) {
        let module_ref = ModuleRef {
            target: self.target,
            token: self.token.clone(),
            injector: Arc::downgrade(&self.injector),
        };
        self.injector
            .bind_constant(MODULE_REF.token(), Arc::new(module_ref));
    }

    fn container(&self) -> Result<Arc<Container>> {
        self.container
            .upgrade()
            .ok_or_else(|| TesseraError::unknown_module([self.name()]))
    }

    fn declares(&self, token: &Token) -> bool {
        self.providers.read().iter().any(|p| p.token() == *token)
    }

    /// The import whose target is `module`, if any.
    fn imported(&self, module: ModuleType) -> Option<Arc<ModuleInstance>> {
        self.imports().into_iter().find(|import| import.target == module)
    }

    /// Whether `token` is visible to importers of this module.
    fn exposes(&self, token: &Token, visited: &mut HashSet<*const ModuleInstance>) -> bool {
        if !visited.insert(self as *const _) {
            return false;
        }
        self.exports().iter().any(|export| match export {
            Export::Provider(exported) => exported == token,
            Export::Module(module) => self
                .imported(*module)
                .is_some_and(|related| related.exposes(token, visited)),
        })
    }

    /// Checks that every export is either declared here or reachable
    /// through the export set of an import.
    pub(crate) fn validate_exports(&self) -> Result<()> {
        for export in self.exports() {
            let valid = match export {
                Export::Provider(token) => {
                    self.declares(&token)
                        || self
                            .imports()
                            .iter()
                            .any(|import| import.exposes(&token, &mut HashSet::new()))
                }
                Export::Module(module) => self.imported(module).is_some(),
            };
            if !valid {
                let export = match export {
                    Export::Provider(token) => token.name(),
                    Export::Module(module) => module.name().to_string(),
                };
                return Err(TesseraError::UnknownExport {
                    module: self.name().to_string(),
                    export,
                });
            }
        }
        Ok(())
    }

    /// Binds the providers reachable through the export chains of the
    /// imports. Resolution is delegated to the injector that owns them.
    fn link_related_providers(&self, container: &Container) -> Result<()> {
        let mut linked = HashSet::new();
        for import in self.imports() {
            let mut visited = HashSet::new();
            let mut trace = vec![self.name()];
            self.link_exports_of(container, &import, &mut visited, &mut linked, &mut trace)?;
        }
        Ok(())
    }

    fn link_exports_of(
        &self,
        container: &Container,
        module: &Arc<ModuleInstance>,
        visited: &mut HashSet<*const ModuleInstance>,
        linked: &mut HashSet<(Token, *const Injector)>,
        trace: &mut Vec<&'static str>,
    ) -> Result<()> {
        if !visited.insert(Arc::as_ptr(module)) {
            return Ok(());
        }
        trace.push(module.name());
        for export in module.exports() {
            match export {
                Export::Provider(token) => {
                    if linked.insert((token, Arc::as_ptr(&module.injector))) {
                        tracing::debug!("{} <- {} from {}", self.name(), token, module.name());
                        self.injector.bind_delegate(token, &module.injector);
                    }
                }
                Export::Module(target) => {
                    let related = module
                        .imported(target)
                        .or_else(|| container.get_module(target))
                        .ok_or_else(|| TesseraError::InvalidExport {
                            export: target.name().to_string(),
                            scope: join_trace(trace.iter().copied()),
                        })?;
                    self.link_exports_of(container, &related, visited, linked, trace)?;
                }
            }
        }
        trace.pop();
        Ok(())
    }

    fn bind_providers(&self, container: &Container) -> Result<()> {
        self.link_related_providers(container)?;

        let providers = self.providers();
        for provider in &providers {
            let token = provider.token();
            if !provider.is_multi() && container.has_provider_token(&token) {
                return Err(TesseraError::MultipleProviders {
                    token: provider.name(),
                });
            }
            container.add_provider_token(token);
            self.bind(token, provider, &providers)?;
        }
        for provider in &providers {
            match provider {
                Provider::Injectable(ty) => self.fulfil_lazy_injects(container, ty)?,
                Provider::Class { use_class, .. } => {
                    self.fulfil_lazy_injects(container, use_class)?
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn bind(
        &self,
        token: Token,
        provider: &Provider,
        declared: &[Provider],
    ) -> Result<()> {
        tracing::debug!("{}: binding {} ({})", self.name(), token, provider.kind());
        match provider {
            Provider::Injectable(ty) => {
                let scope = ty.scope();
                self.warn_request_scope(&token, scope);
                self.injector.bind_class(token, *ty, scope);
            }
            Provider::Class {
                use_class, scope, ..
            } => {
                if use_class.is_module() {
                    return Err(self.configuration(
                        &token,
                        format!("`{}` is a module, not an injectable", use_class.name()),
                    ));
                }
                let scope = scope.unwrap_or_else(|| use_class.scope());
                self.warn_request_scope(&token, scope);
                self.injector.bind_class(token, *use_class, scope);
            }
            Provider::Value { value, .. } => {
                self.injector.bind_constant(token, Arc::clone(value));
            }
            Provider::Factory {
                factory,
                deps,
                scope,
                ..
            } => {
                for dependency in deps {
                    let dependency = dependency.resolve();
                    let visible = declared.iter().any(|p| p.token() == dependency)
                        || self.injector.is_bound(&dependency);
                    if !visible {
                        return Err(TesseraError::unknown_provider(dependency, self.name()));
                    }
                }
                self.warn_request_scope(&token, *scope);
                self.injector.bind_factory(
                    token,
                    factory_binding(factory.clone(), deps.clone(), *scope),
                );
            }
            Provider::Existing { existing, .. } => {
                let existing = existing.resolve();
                if existing.as_class().is_some_and(InjectableType::is_module) {
                    return Err(self.configuration(
                        &token,
                        format!("cannot alias module `{existing}`"),
                    ));
                }
                let value = self.injector.get(&existing)?;
                self.injector.bind_constant(token, value);
            }
        }
        Ok(())
    }

    /// Checks the forward references recorded for `ty` against this module's
    /// bindings, so that a `Lazy` pointing at nothing fails at start instead
    /// of on first access.
    fn fulfil_lazy_injects(&self, container: &Container, ty: &InjectableType) -> Result<()> {
        let reflector = container.reflector();
        for member in reflector.members(keys::LAZY_INJECT, ty.id()) {
            let Some(dependency) = reflector.get::<Dependency>(keys::LAZY_INJECT, ty.id(), Some(member))
            else {
                continue;
            };
            let token = dependency.resolve();
            if token.as_class().is_some_and(InjectableType::is_module) {
                return Err(TesseraError::InvalidProvider {
                    provider: token.name(),
                });
            }
            if !self.injector.is_bound(&token) {
                return Err(TesseraError::unknown_provider(
                    token,
                    format!("{} ({}.{})", self.name(), ty.name(), member),
                ));
            }
            tracing::debug!("{}: {}.{} -> {} (lazy)", self.name(), ty.name(), member, token);
        }
        Ok(())
    }

    fn warn_request_scope(&self, token: &Token, scope: Scope) {
        if scope == Scope::Request {
            tracing::warn!(
                "{}: request scope for {} has no request boundary, resolving as transient",
                self.name(),
                token
            );
        }
    }

    fn configuration(&self, token: &Token, message: String) -> TesseraError {
        TesseraError::Configuration {
            module: self.name().to_string(),
            token: token.name(),
            message,
        }
    }

    /// Binds providers, binds the module itself and runs module init hooks.
    ///
    /// Calling `create` again is a no-op.
    pub async fn create(&self) -> Result<()> {
        let module_token = self.target.token();
        if self.injector.is_bound(&module_token) {
            return Ok(());
        }

        let container = self.container()?;
        self.bind_providers(&container)?;
        self.injector
            .bind_class(module_token, self.target.injectable(), Scope::Singleton);
        *self.state.write() = ModuleState::Bound;

        self.on_module_init().await?;

        *self.state.write() = ModuleState::Created;
        self.created.send_replace(true);
        tracing::debug!("{} created", self.name());
        Ok(())
    }

    pub async fn on_module_init(&self) -> Result<()> {
        self.run_hooks(LifecyclePhase::ModuleInit, &MODULE_INIT).await
    }

    pub async fn on_app_init(&self) -> Result<()> {
        self.run_hooks(LifecyclePhase::AppInit, &APP_INIT).await
    }

    pub async fn on_app_destroy(&self) -> Result<()> {
        self.run_hooks(LifecyclePhase::AppDestroy, &APP_DESTROY).await
    }

    pub async fn on_module_destroy(&self) -> Result<()> {
        self.run_hooks(LifecyclePhase::ModuleDestroy, &MODULE_DESTROY)
            .await?;
        *self.state.write() = ModuleState::Destroyed;
        Ok(())
    }

    /// Runs one phase: the module's own hook, then the hooks bound to the
    /// broadcast token, then the hook of each declared injectable.
    async fn run_hooks(
        &self,
        phase: LifecyclePhase,
        broadcast: &InjectionToken<LifecycleHook>,
    ) -> Result<()> {
        let module = self.injector.get(&self.target.token())?;
        self.target
            .injectable()
            .hooks()
            .run(phase, self.name(), module)
            .await?;

        let broadcast_token = broadcast.token();
        if self.injector.is_bound(&broadcast_token) {
            for hook in self.injector.get_all(&broadcast_token)? {
                downcast::<LifecycleHook>(hook)?
                    .call()
                    .await
                    .map_err(|e| {
                        tracing::error!("{} failed for {}: {}", broadcast_token, self.name(), e);
                        LifecycleError::hook_failed(
                            format!("{} ({})", self.name(), broadcast.description()),
                            e.to_string(),
                        )
                    })?;
            }
        }

        for provider in self.providers() {
            let (token, ty) = match &provider {
                Provider::Injectable(ty) => (Token::Class(*ty), *ty),
                Provider::Class {
                    use_class,
                    multi: false,
                    ..
                } => (provider.token(), *use_class),
                _ => continue,
            };
            let hooks = ty.hooks();
            // module init also instantiates every class provider, surfacing wiring errors at start
            if phase != LifecyclePhase::ModuleInit && !hooks.has(phase) {
                continue;
            }
            let instance = self.injector.get(&token)?;
            hooks.run(phase, ty.name(), instance).await?;
        }
        Ok(())
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("target", &self.target)
            .field("token", &self.token)
            .field("state", &self.state())
            .finish()
    }
}

/// Handle on a module, resolving through its injector.
///
/// Injected under [`MODULE_REF`]; useful to look providers up at runtime
/// without widening a type's declared dependencies.
#[derive(Clone)]
pub struct ModuleRef {
    target: ModuleType,
    token: String,
    injector: Weak<Injector>,
}

impl ModuleRef {
    pub fn module(&self) -> ModuleType {
        self.target
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    fn injector(&self) -> Result<Arc<Injector>> {
        self.injector
            .upgrade()
            .ok_or_else(|| TesseraError::unknown_module([self.target.name()]))
    }

    pub fn resolve(&self, token: &Token) -> Result<Instance> {
        self.injector()?.get(token)
    }

    pub fn get<T: Injectable>(&self) -> Result<Arc<T>> {
        downcast(self.resolve(&Token::of::<T>())?)
    }

    pub fn get_token<T: Send + Sync + 'static>(&self, token: &InjectionToken<T>) -> Result<Arc<T>> {
        downcast(self.resolve(&token.token())?)
    }

    pub fn get_all<T: Send + Sync + 'static>(
        &self,
        token: &InjectionToken<T>,
    ) -> Result<Vec<Arc<T>>> {
        let injector = self.injector()?;
        if !injector.is_bound(&token.token()) {
            return Ok(Vec::new());
        }
        injector
            .get_all(&token.token())?
            .into_iter()
            .map(downcast)
            .collect()
    }

    pub fn has(&self, token: impl Into<Token>) -> bool {
        self.injector
            .upgrade()
            .is_some_and(|injector| injector.is_bound(&token.into()))
    }

    /// Deferred lookup of `T` in this module.
    pub fn lazy<T: Injectable>(&self) -> Lazy<T> {
        Lazy::new(self.injector.clone(), Dependency::Token(Token::of::<T>()))
    }
}

impl fmt::Debug for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRef")
            .field("module", &self.target)
            .finish()
    }
}
