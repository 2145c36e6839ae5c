use crate::di::token::{Dependency, InjectionToken, Instance, Token};
use crate::di::{Injectable, InjectableType, Lazy, Scope};
use crate::error::{Result, TesseraError};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

pub(crate) type FactoryFn = Arc<dyn Fn(&Resolver<'_>) -> Result<Instance> + Send + Sync>;

#[derive(Clone)]
enum Binding {
    Constant(Instance),
    Class {
        ty: InjectableType,
        scope: Scope,
        cell: Arc<OnceCell<Instance>>,
    },
    Factory(FactoryFn),
    /// Resolved by the injector of the module that exports the token.
    Delegate { source: Weak<Injector>, token: Token },
}

/// Binding table of a single module.
///
/// Every module owns one injector. Lookups only see what was bound here:
/// the module's own providers, the providers re-exported by its imports
/// (as delegates) and the built-in module handle.
pub struct Injector {
    module: String,
    bindings: RwLock<HashMap<Token, Vec<Binding>>>,
    this: Weak<Injector>,
}

impl Injector {
    pub fn new(module: impl Into<String>) -> Arc<Self> {
        let module = module.into();
        Arc::new_cyclic(|this| Self {
            module,
            bindings: RwLock::new(HashMap::new()),
            this: this.clone(),
        })
    }

    /// Name of the owning module.
    pub fn module_name(&self) -> &str {
        &self.module
    }

    pub fn bind_constant(&self, token: Token, value: Instance) {
        self.push(token, Binding::Constant(value));
    }

    pub fn bind_class(&self, token: Token, ty: InjectableType, scope: Scope) {
        self.push(
            token,
            Binding::Class {
                ty,
                scope,
                cell: Arc::new(OnceCell::new()),
            },
        );
    }

    pub(crate) fn bind_factory(&self, token: Token, factory: FactoryFn) {
        self.push(token, Binding::Factory(factory));
    }

    pub(crate) fn bind_delegate(&self, token: Token, source: &Arc<Injector>) {
        self.push(
            token,
            Binding::Delegate {
                source: Arc::downgrade(source),
                token,
            },
        );
    }

    fn push(&self, token: Token, binding: Binding) {
        self.bindings.write().entry(token).or_default().push(binding);
    }

    pub fn is_bound(&self, token: &Token) -> bool {
        self.bindings
            .read()
            .get(token)
            .is_some_and(|bindings| !bindings.is_empty())
    }

    /// Resolves the first value bound to `token`.
    pub fn get(&self, token: &Token) -> Result<Instance> {
        self.resolve(token, &[])
    }

    /// Resolves every value bound to `token`, in binding order.
    pub fn get_all(&self, token: &Token) -> Result<Vec<Instance>> {
        self.resolve_all(token, &[])
    }

    /// Resolves the values this module binds to `token` itself, leaving out
    /// those delegated to the module that exports them.
    pub fn get_own(&self, token: &Token) -> Result<Vec<Instance>> {
        let bindings: Vec<Binding> = self
            .bindings
            .read()
            .get(token)
            .map(|bindings| {
                bindings
                    .iter()
                    .filter(|binding| !matches!(binding, Binding::Delegate { .. }))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        bindings
            .into_iter()
            .map(|binding| self.activate(token, binding, &[]))
            .collect()
    }

    pub(crate) fn weak(&self) -> Weak<Injector> {
        self.this.clone()
    }

    pub(crate) fn resolve(&self, token: &Token, path: &[Token]) -> Result<Instance> {
        let binding = self
            .bindings
            .read()
            .get(token)
            .and_then(|bindings| bindings.first().cloned())
            .ok_or_else(|| TesseraError::unknown_provider(token, &self.module))?;
        self.activate(token, binding, path)
    }

    pub(crate) fn resolve_all(&self, token: &Token, path: &[Token]) -> Result<Vec<Instance>> {
        let bindings = self
            .bindings
            .read()
            .get(token)
            .cloned()
            .ok_or_else(|| TesseraError::unknown_provider(token, &self.module))?;

        let mut values = Vec::with_capacity(bindings.len());
        for binding in bindings {
            match binding {
                Binding::Delegate { source, token } => {
                    values.extend(self.upgrade(&source, &token)?.resolve_all(&token, path)?);
                }
                binding => values.push(self.activate(token, binding, path)?),
            }
        }
        Ok(values)
    }

    fn activate(&self, token: &Token, binding: Binding, path: &[Token]) -> Result<Instance> {
        match binding {
            Binding::Constant(value) => Ok(value),
            Binding::Class { ty, scope, cell } => {
                let path = enter(token, path)?;
                let resolver = Resolver::new(self, &path);
                if scope.is_cached() {
                    cell.get_or_try_init(|| ty.construct(&resolver)).cloned()
                } else {
                    ty.construct(&resolver)
                }
            }
            Binding::Factory(factory) => {
                let path = enter(token, path)?;
                factory(&Resolver::new(self, &path))
            }
            Binding::Delegate { source, token } => {
                self.upgrade(&source, &token)?.resolve(&token, path)
            }
        }
    }

    fn upgrade(&self, source: &Weak<Injector>, token: &Token) -> Result<Arc<Injector>> {
        source
            .upgrade()
            .ok_or_else(|| TesseraError::unknown_provider(token, &self.module))
    }
}

/// Extends the resolution path, failing when `token` is already being built.
fn enter(token: &Token, path: &[Token]) -> Result<Vec<Token>> {
    if path.contains(token) {
        let cycle = path
            .iter()
            .skip_while(|t| *t != token)
            .chain(std::iter::once(token))
            .map(Token::name)
            .collect::<Vec<_>>()
            .join(" -> ");
        return Err(TesseraError::CircularDependency { cycle });
    }
    let mut next = path.to_vec();
    next.push(*token);
    Ok(next)
}

pub(crate) fn downcast<T: Any + Send + Sync>(instance: Instance) -> Result<Arc<T>> {
    instance
        .downcast::<T>()
        .map_err(|_| TesseraError::downcast::<T>())
}

/// Construction context handed to [`Injectable::inject`] and factories.
pub struct Resolver<'a> {
    injector: &'a Injector,
    path: &'a [Token],
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(injector: &'a Injector, path: &'a [Token]) -> Self {
        Self { injector, path }
    }

    /// Name of the module whose injector is resolving.
    pub fn module_name(&self) -> &str {
        self.injector.module_name()
    }

    pub fn resolve(&self, token: &Token) -> Result<Instance> {
        self.injector.resolve(token, self.path)
    }

    pub fn resolve_all(&self, token: &Token) -> Result<Vec<Instance>> {
        self.injector.resolve_all(token, self.path)
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
        self.resolve_all(&token.token())?
            .into_iter()
            .map(downcast)
            .collect()
    }

    /// Deferred injection of `T`, resolved on first access.
    pub fn lazy<T: Injectable>(&self) -> Lazy<T> {
        Lazy::new(self.injector.weak(), Dependency::Token(Token::of::<T>()))
    }

    pub fn lazy_token<T: Send + Sync + 'static>(&self, token: &InjectionToken<T>) -> Lazy<T> {
        Lazy::new(self.injector.weak(), Dependency::Token(token.token()))
    }

    /// Deferred injection through an arbitrary dependency reference.
    pub fn lazy_dependency<T: Send + Sync + 'static>(&self, dependency: Dependency) -> Lazy<T> {
        Lazy::new(self.injector.weak(), dependency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static BUILT: AtomicUsize = AtomicUsize::new(0);

    struct Counter;

    impl Injectable for Counter {
        fn inject(_resolver: &Resolver<'_>) -> Result<Self> {
            BUILT.fetch_add(1, Ordering::SeqCst);
            Ok(Counter)
        }
    }

    struct Service {
        counter: Arc<Counter>,
    }

    impl Injectable for Service {
        fn inject(resolver: &Resolver<'_>) -> Result<Self> {
            Ok(Self {
                counter: resolver.get()?,
            })
        }
    }

    struct Ping;
    struct Pong;

    impl Injectable for Ping {
        fn inject(resolver: &Resolver<'_>) -> Result<Self> {
            resolver.get::<Pong>()?;
            Ok(Ping)
        }
    }

    impl Injectable for Pong {
        fn inject(resolver: &Resolver<'_>) -> Result<Self> {
            resolver.get::<Ping>()?;
            Ok(Pong)
        }
    }

    const NAMES: InjectionToken<&'static str> = InjectionToken::new("NAMES");

    #[test]
    fn test_singleton_is_shared() {
        let injector = Injector::new("TestModule");
        injector.bind_class(Token::of::<Counter>(), InjectableType::of::<Counter>(), Scope::Singleton);
        injector.bind_class(Token::of::<Service>(), InjectableType::of::<Service>(), Scope::Transient);

        let before = BUILT.load(Ordering::SeqCst);
        let first = downcast::<Service>(injector.get(&Token::of::<Service>()).unwrap()).unwrap();
        let second = downcast::<Service>(injector.get(&Token::of::<Service>()).unwrap()).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first.counter, &second.counter));
        assert_eq!(BUILT.load(Ordering::SeqCst) - before, 1);
    }

    #[test]
    fn test_unknown_provider_names_module() {
        let injector = Injector::new("TestModule");
        let err = injector.get(&Token::of::<Counter>()).err().unwrap();
        assert!(matches!(
            err,
            TesseraError::UnknownProvider { ref module, .. } if module == "TestModule"
        ));
    }

    #[test]
    fn test_construction_cycle_is_reported() {
        let injector = Injector::new("TestModule");
        injector.bind_class(Token::of::<Ping>(), InjectableType::of::<Ping>(), Scope::Singleton);
        injector.bind_class(Token::of::<Pong>(), InjectableType::of::<Pong>(), Scope::Singleton);

        let err = injector.get(&Token::of::<Ping>()).err().unwrap();
        match err {
            TesseraError::CircularDependency { cycle } => {
                assert_eq!(cycle, "Ping -> Pong -> Ping");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_get_all_follows_delegates_in_order() {
        let source = Injector::new("Source");
        source.bind_constant(NAMES.token(), Arc::new("a"));
        source.bind_constant(NAMES.token(), Arc::new("b"));

        let injector = Injector::new("Target");
        injector.bind_delegate(NAMES.token(), &source);
        injector.bind_constant(NAMES.token(), Arc::new("c"));

        let names: Vec<&str> = injector
            .get_all(&NAMES.token())
            .unwrap()
            .into_iter()
            .map(|value| *downcast::<&str>(value).unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
