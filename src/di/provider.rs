use crate::di::injector::{downcast, FactoryFn, Resolver};
use crate::di::token::{Dependency, Instance, Token};
use crate::di::{Injectable, InjectableType, Scope};
use crate::error::{Result, TesseraError};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use strum_macros::{Display, IntoStaticStr};

/// A binding declared in a module's `providers` list.
///
/// # Example
/// ```
/// use tessera::{InjectionToken, Provider, Scope, Token};
/// # #[derive(tessera::DeriveInjectable)] struct Config;
///
/// const GREETING: InjectionToken<String> = InjectionToken::new("GREETING");
/// const PLUGINS: InjectionToken<&'static str> = InjectionToken::new("PLUGINS");
///
/// let providers = vec![
///     Provider::of::<Config>(),
///     Provider::value(&GREETING, "hello".to_string()),
///     Provider::value(&PLUGINS, "auth").multi(),
///     Provider::factory(&PLUGINS, |_deps| Ok("metrics"))
///         .deps([Token::of::<Config>()])
///         .scope(Scope::Transient)
///         .multi(),
/// ];
/// ```
#[derive(Clone)]
pub enum Provider {
    /// An injectable bound under its own type, with its declared scope.
    Injectable(InjectableType),
    Class {
        provide: Token,
        use_class: InjectableType,
        scope: Option<Scope>,
        multi: bool,
    },
    Value {
        provide: Token,
        value: Instance,
        multi: bool,
    },
    Factory {
        provide: Token,
        factory: Factory,
        deps: Vec<Dependency>,
        scope: Scope,
        multi: bool,
    },
    /// Alias of a token that is already bound; resolved once when bound.
    Existing {
        provide: Token,
        existing: Dependency,
        multi: bool,
    },
}

/// Binding strategy of a [`Provider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ProviderKind {
    Default,
    Class,
    Value,
    Factory,
    Existing,
}

type FactoryCall = dyn Fn(&Deps) -> Result<Instance> + Send + Sync;

/// Factory function of a [`Provider::Factory`].
#[derive(Clone)]
pub struct Factory(Arc<FactoryCall>);

impl Factory {
    pub fn new<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Deps) -> Result<T> + Send + Sync + 'static,
    {
        Self(Arc::new(move |deps: &Deps| -> Result<Instance> {
            Ok(Arc::new(factory(deps)?))
        }))
    }

    pub(crate) fn call(&self, deps: &Deps) -> Result<Instance> {
        (self.0)(deps)
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Factory")
    }
}

/// Resolved values of a factory's declared dependencies, in declaration order.
pub struct Deps {
    module: String,
    values: Vec<Instance>,
}

impl Deps {
    pub(crate) fn resolve(resolver: &Resolver<'_>, deps: &[Dependency]) -> Result<Self> {
        let values = deps
            .iter()
            .map(|dep| resolver.resolve(&dep.resolve()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            module: resolver.module_name().to_string(),
            values,
        })
    }

    /// Typed access to the dependency declared at `index`.
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>> {
        let value = self
            .values
            .get(index)
            .ok_or_else(|| TesseraError::Configuration {
                module: self.module.clone(),
                token: format!("deps[{index}]"),
                message: format!("factory declares {} dependencies", self.values.len()),
            })?;
        downcast(Arc::clone(value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Provider {
    pub fn of<T: Injectable>() -> Self {
        Provider::Injectable(InjectableType::of::<T>())
    }

    /// Binds `provide` to an instance of `T`.
    pub fn class<T: Injectable>(provide: impl Into<Token>) -> Self {
        Provider::Class {
            provide: provide.into(),
            use_class: InjectableType::of::<T>(),
            scope: None,
            multi: false,
        }
    }

    pub fn value<T: Send + Sync + 'static>(provide: impl Into<Token>, value: T) -> Self {
        Provider::Value {
            provide: provide.into(),
            value: Arc::new(value),
            multi: false,
        }
    }

    pub fn factory<T, F>(provide: impl Into<Token>, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Deps) -> Result<T> + Send + Sync + 'static,
    {
        Provider::Factory {
            provide: provide.into(),
            factory: Factory::new(factory),
            deps: Vec::new(),
            scope: Scope::Singleton,
            multi: false,
        }
    }

    pub fn existing(provide: impl Into<Token>, existing: impl Into<Dependency>) -> Self {
        Provider::Existing {
            provide: provide.into(),
            existing: existing.into(),
            multi: false,
        }
    }

    /// Allows the token to be bound more than once.
    pub fn multi(mut self) -> Self {
        match &mut self {
            Provider::Injectable(_) => {}
            Provider::Class { multi, .. }
            | Provider::Value { multi, .. }
            | Provider::Factory { multi, .. }
            | Provider::Existing { multi, .. } => *multi = true,
        }
        self
    }

    /// Dependencies resolved and handed to a factory. Ignored by other kinds.
    pub fn deps<D: Into<Dependency>>(mut self, deps: impl IntoIterator<Item = D>) -> Self {
        if let Provider::Factory { deps: declared, .. } = &mut self {
            declared.extend(deps.into_iter().map(Into::into));
        }
        self
    }

    /// Overrides the lifetime of a factory or class provider.
    pub fn scope(mut self, lifetime: Scope) -> Self {
        match &mut self {
            Provider::Factory { scope, .. } => *scope = lifetime,
            Provider::Class { scope, .. } => *scope = Some(lifetime),
            _ => {}
        }
        self
    }

    /// The token this provider is bound under.
    pub fn token(&self) -> Token {
        match self {
            Provider::Injectable(ty) => Token::Class(*ty),
            Provider::Class { provide, .. }
            | Provider::Value { provide, .. }
            | Provider::Factory { provide, .. }
            | Provider::Existing { provide, .. } => *provide,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::Injectable(_) => ProviderKind::Default,
            Provider::Class { .. } => ProviderKind::Class,
            Provider::Value { .. } => ProviderKind::Value,
            Provider::Factory { .. } => ProviderKind::Factory,
            Provider::Existing { .. } => ProviderKind::Existing,
        }
    }

    pub fn is_multi(&self) -> bool {
        match self {
            Provider::Injectable(_) => false,
            Provider::Class { multi, .. }
            | Provider::Value { multi, .. }
            | Provider::Factory { multi, .. }
            | Provider::Existing { multi, .. } => *multi,
        }
    }

    /// Display name used in errors.
    pub fn name(&self) -> String {
        self.token().name()
    }
}

impl From<InjectableType> for Provider {
    fn from(ty: InjectableType) -> Self {
        Provider::Injectable(ty)
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("kind", &self.kind())
            .field("token", &self.token())
            .field("multi", &self.is_multi())
            .finish()
    }
}

/// Wraps a factory so that its result is cached per binding unless `scope`
/// asks for a fresh value on every lookup.
pub(crate) fn factory_binding(factory: Factory, deps: Vec<Dependency>, scope: Scope) -> FactoryFn {
    let cache = Arc::new(once_cell::sync::OnceCell::<Instance>::new());
    Arc::new(move |resolver: &Resolver<'_>| -> Result<Instance> {
        let invoke = || factory.call(&Deps::resolve(resolver, &deps)?);
        if scope.is_cached() {
            cache.get_or_try_init(invoke).cloned()
        } else {
            invoke()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::{InjectionToken, Injector};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const COUNT: InjectionToken<usize> = InjectionToken::new("COUNT");
    const BASE: InjectionToken<usize> = InjectionToken::new("BASE");

    fn bind_counting(injector: &Injector, scope: Scope, calls: Arc<AtomicUsize>) {
        let factory = Factory::new(move |deps: &Deps| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(*deps.get::<usize>(0)? + 1)
        });
        injector.bind_factory(
            COUNT.token(),
            factory_binding(factory, vec![Dependency::from(&BASE)], scope),
        );
    }

    #[test]
    fn test_singleton_factory_runs_once() {
        let injector = Injector::new("TestModule");
        injector.bind_constant(BASE.token(), Arc::new(41usize));
        let calls = Arc::new(AtomicUsize::new(0));
        bind_counting(&injector, Scope::Singleton, calls.clone());

        for _ in 0..3 {
            let value = downcast::<usize>(injector.get(&COUNT.token()).unwrap()).unwrap();
            assert_eq!(*value, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_transient_factory_runs_per_lookup() {
        let injector = Injector::new("TestModule");
        injector.bind_constant(BASE.token(), Arc::new(1usize));
        let calls = Arc::new(AtomicUsize::new(0));
        bind_counting(&injector, Scope::Transient, calls.clone());

        for _ in 0..3 {
            injector.get(&COUNT.token()).unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_undeclared_dependency_is_an_error() {
        let injector = Injector::new("TestModule");
        injector.bind_factory(
            COUNT.token(),
            factory_binding(
                Factory::new(|deps: &Deps| Ok(*deps.get::<usize>(1)?)),
                vec![Dependency::from(&BASE)],
                Scope::Singleton,
            ),
        );
        injector.bind_constant(BASE.token(), Arc::new(1usize));

        let err = injector.get(&COUNT.token()).unwrap_err();
        match err {
            TesseraError::Configuration { module, token, .. } => {
                assert_eq!(module, "TestModule");
                assert_eq!(token, "deps[1]");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_builder_flags() {
        let provider = Provider::value(&COUNT, 3usize).multi();
        assert!(provider.is_multi());
        assert_eq!(provider.kind(), ProviderKind::Value);
        assert_eq!(provider.token(), COUNT.token());

        // injectables are never multi-bound
        struct Plain;
        impl Injectable for Plain {
            fn inject(_: &Resolver<'_>) -> Result<Self> {
                Ok(Plain)
            }
        }
        assert!(!Provider::of::<Plain>().multi().is_multi());
        assert_eq!(Provider::of::<Plain>().name(), "Plain");
    }
}
