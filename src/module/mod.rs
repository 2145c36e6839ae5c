//! Module declarations and the engine that resolves them into a live graph.

mod compiler;
mod container;
mod instance;
mod scanner;
mod token_factory;

pub use compiler::{ModuleCompiler, ModuleFactory};
pub use container::Container;
pub use instance::{Export, ModuleInstance, ModuleRef, ModuleState};
pub use scanner::Scanner;
pub use token_factory::ModuleTokenFactory;

use crate::di::{ForwardRef, Injectable, InjectableType, InjectionToken, Provider, Token};
use crate::error::Result;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::any::TypeId;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Trait for application modules
///
/// Modules are typically defined using the `#[module]` macro, which
/// implements this trait from the declared imports, providers and exports.
///
/// # Example
/// ```
/// use tessera::{module, DeriveInjectable};
///
/// #[derive(DeriveInjectable)]
/// pub struct UserService;
///
/// #[module(providers = [UserService], exports = [UserService])]
/// pub struct UserModule;
///
/// #[module(imports = [UserModule])]
/// pub struct AppModule;
/// ```
pub trait Module: Injectable {
    /// Declared imports, providers and exports
    fn metadata() -> ModuleMetadata;

    /// Global modules are imported implicitly by every other module and
    /// exist once per process.
    fn is_global() -> bool {
        false
    }

    /// Scoped modules get one instance per chain of importing modules
    /// (up to the nearest unscoped ancestor) instead of one per process.
    fn is_scoped() -> bool {
        false
    }
}

/// Imports, providers and exports of a module.
#[derive(Clone, Default, Debug)]
pub struct ModuleMetadata {
    pub imports: Vec<ModuleImport>,
    pub providers: Vec<Provider>,
    pub exports: Vec<ExportRef>,
}

impl ModuleMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn imports<I: Into<ModuleImport>>(mut self, imports: impl IntoIterator<Item = I>) -> Self {
        self.imports.extend(imports.into_iter().map(Into::into));
        self
    }

    pub fn providers<P: Into<Provider>>(mut self, providers: impl IntoIterator<Item = P>) -> Self {
        self.providers.extend(providers.into_iter().map(Into::into));
        self
    }

    pub fn exports<E: Into<ExportRef>>(mut self, exports: impl IntoIterator<Item = E>) -> Self {
        self.exports.extend(exports.into_iter().map(Into::into));
        self
    }

    /// Appends `other` after the entries already present.
    pub(crate) fn merged(&self, other: Option<&ModuleMetadata>) -> ModuleMetadata {
        let mut merged = self.clone();
        if let Some(other) = other {
            merged.imports.extend(other.imports.iter().cloned());
            merged.providers.extend(other.providers.iter().cloned());
            merged.exports.extend(other.exports.iter().cloned());
        }
        merged
    }
}

/// Type-erased descriptor of a [`Module`].
#[derive(Clone, Copy)]
pub struct ModuleType {
    ty: InjectableType,
    metadata: fn() -> ModuleMetadata,
    global: fn() -> bool,
    scoped: fn() -> bool,
}

impl ModuleType {
    pub fn of<M: Module>() -> Self {
        Self {
            ty: InjectableType::of::<M>(),
            metadata: M::metadata,
            global: M::is_global,
            scoped: M::is_scoped,
        }
    }

    pub fn id(&self) -> TypeId {
        self.ty.id()
    }

    pub fn name(&self) -> &'static str {
        self.ty.name()
    }

    pub fn path(&self) -> &'static str {
        self.ty.path()
    }

    pub fn injectable(&self) -> InjectableType {
        self.ty
    }

    pub fn token(&self) -> Token {
        Token::Class(self.ty)
    }

    pub fn metadata(&self) -> ModuleMetadata {
        (self.metadata)()
    }

    pub fn is_global(&self) -> bool {
        (self.global)()
    }

    pub fn is_scoped(&self) -> bool {
        (self.scoped)()
    }

    /// Whether tokens of this module ignore where it was imported from.
    pub fn is_single_instance(&self) -> bool {
        self.is_global() || !self.is_scoped()
    }
}

impl PartialEq for ModuleType {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for ModuleType {}

impl Hash for ModuleType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A module parametrised at runtime, usually returned by a
/// `register(options)` style constructor.
///
/// Two dynamic modules with the same target and structurally equal metadata
/// and options resolve to the same module instance.
///
/// ```rust,ignore
/// impl ConfigModule {
///     pub fn register(options: ConfigOptions) -> Result<DynamicModule> {
///         DynamicModule::new::<ConfigModule>(
///             ModuleMetadata::new()
///                 .providers([Provider::value(&CONFIG_OPTIONS, options.clone())])
///                 .exports([&CONFIG_OPTIONS]),
///         )
///         .with_options(&options)
///     }
/// }
/// ```
#[derive(Clone)]
pub struct DynamicModule {
    inner: Arc<DynamicInner>,
}

#[derive(Clone)]
struct DynamicInner {
    module: ModuleType,
    metadata: ModuleMetadata,
    options: Option<serde_json::Value>,
}

impl DynamicModule {
    pub fn new<M: Module>(metadata: ModuleMetadata) -> Self {
        Self::from_type(ModuleType::of::<M>(), metadata)
    }

    pub fn from_type(module: ModuleType, metadata: ModuleMetadata) -> Self {
        Self {
            inner: Arc::new(DynamicInner {
                module,
                metadata,
                options: None,
            }),
        }
    }

    /// Attaches the configuration this module was built from; it takes part
    /// in the module's identity.
    pub fn with_options<O: Serialize + ?Sized>(self, options: &O) -> Result<Self> {
        Ok(self.with_options_value(serde_json::to_value(options)?))
    }

    /// [`with_options`](Self::with_options) for options that are already JSON.
    pub fn with_options_value(mut self, options: serde_json::Value) -> Self {
        Arc::make_mut(&mut self.inner).options = Some(options);
        self
    }

    pub fn module(&self) -> ModuleType {
        self.inner.module
    }

    pub fn metadata(&self) -> &ModuleMetadata {
        &self.inner.metadata
    }

    pub fn options(&self) -> Option<&serde_json::Value> {
        self.inner.options.as_ref()
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl fmt::Debug for DynamicModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicModule")
            .field("module", &self.inner.module)
            .field("options", &self.inner.options)
            .finish()
    }
}

/// A dynamic module that is only available asynchronously.
#[derive(Clone)]
pub struct DeferredModule {
    id: usize,
    future: Shared<BoxFuture<'static, DynamicModule>>,
}

impl DeferredModule {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = DynamicModule> + Send + 'static,
    {
        static NEXT_ID: AtomicUsize = AtomicUsize::new(0);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            future: future.boxed().shared(),
        }
    }

    pub async fn resolve(&self) -> DynamicModule {
        self.future.clone().await
    }
}

/// Entry of a module's `imports` list.
#[derive(Clone)]
pub enum ModuleImport {
    Static(ModuleType),
    Dynamic(DynamicModule),
    Deferred(DeferredModule),
    /// Evaluated each time it is consumed.
    Forward(ForwardRef<ModuleImport>),
}

/// Reference identity of an import, used to guard graph traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ImportKey {
    Static(TypeId),
    Dynamic(usize),
    Deferred(usize),
    Forward(usize),
}

impl ModuleImport {
    pub fn of<M: Module>() -> Self {
        ModuleImport::Static(ModuleType::of::<M>())
    }

    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = DynamicModule> + Send + 'static,
    {
        ModuleImport::Deferred(DeferredModule::new(future))
    }

    pub fn forward<F>(resolve: F) -> Self
    where
        F: Fn() -> ModuleImport + Send + Sync + 'static,
    {
        ModuleImport::Forward(ForwardRef::new(resolve))
    }

    /// Evaluates a forward reference one level deep.
    pub fn resolve_forward(&self) -> ModuleImport {
        match self {
            ModuleImport::Forward(forward) => forward.resolve(),
            other => other.clone(),
        }
    }

    pub(crate) fn key(&self) -> ImportKey {
        match self {
            ModuleImport::Static(module) => ImportKey::Static(module.id()),
            ModuleImport::Dynamic(dynamic) => ImportKey::Dynamic(dynamic.addr()),
            ModuleImport::Deferred(deferred) => ImportKey::Deferred(deferred.id),
            ModuleImport::Forward(forward) => ImportKey::Forward(forward.addr()),
        }
    }

    /// Display name used in traces.
    pub fn name(&self) -> String {
        match self {
            ModuleImport::Static(module) => module.name().to_string(),
            ModuleImport::Dynamic(dynamic) => format!("{} (dynamic)", dynamic.module().name()),
            ModuleImport::Deferred(_) => "<deferred module>".to_string(),
            ModuleImport::Forward(_) => "<forward ref>".to_string(),
        }
    }
}

impl From<ModuleType> for ModuleImport {
    fn from(module: ModuleType) -> Self {
        ModuleImport::Static(module)
    }
}

impl From<DynamicModule> for ModuleImport {
    fn from(module: DynamicModule) -> Self {
        ModuleImport::Dynamic(module)
    }
}

impl From<DeferredModule> for ModuleImport {
    fn from(module: DeferredModule) -> Self {
        ModuleImport::Deferred(module)
    }
}

impl From<ForwardRef<ModuleImport>> for ModuleImport {
    fn from(forward: ForwardRef<ModuleImport>) -> Self {
        ModuleImport::Forward(forward)
    }
}

impl fmt::Debug for ModuleImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Entry of a module's `exports` list.
#[derive(Clone)]
pub enum ExportRef {
    /// An injectable or a module type; modules re-export their exports.
    Type(InjectableType),
    Token(Token),
    /// Exports the target module of a dynamic module.
    Dynamic(DynamicModule),
}

impl ExportRef {
    pub fn of<T: Injectable>() -> Self {
        ExportRef::Type(InjectableType::of::<T>())
    }

    pub fn name(&self) -> String {
        match self {
            ExportRef::Type(ty) => ty.name().to_string(),
            ExportRef::Token(token) => token.name(),
            ExportRef::Dynamic(dynamic) => dynamic.module().name().to_string(),
        }
    }
}

impl From<InjectableType> for ExportRef {
    fn from(ty: InjectableType) -> Self {
        ExportRef::Type(ty)
    }
}

impl From<ModuleType> for ExportRef {
    fn from(module: ModuleType) -> Self {
        ExportRef::Type(module.injectable())
    }
}

impl From<Token> for ExportRef {
    fn from(token: Token) -> Self {
        match token {
            Token::Class(ty) => ExportRef::Type(ty),
            token => ExportRef::Token(token),
        }
    }
}

impl<T: ?Sized> From<&InjectionToken<T>> for ExportRef {
    fn from(token: &InjectionToken<T>) -> Self {
        ExportRef::Token(token.token())
    }
}

impl<T: ?Sized> From<InjectionToken<T>> for ExportRef {
    fn from(token: InjectionToken<T>) -> Self {
        ExportRef::Token(token.token())
    }
}

impl From<DynamicModule> for ExportRef {
    fn from(module: DynamicModule) -> Self {
        ExportRef::Dynamic(module)
    }
}

/// Exporting a provider exports the token it is bound under.
impl From<Provider> for ExportRef {
    fn from(provider: Provider) -> Self {
        ExportRef::from(provider.token())
    }
}

impl fmt::Debug for ExportRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
