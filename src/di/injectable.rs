use crate::di::token::{short_type_name, InjectionPoint, Instance};
use crate::di::Resolver;
use crate::error::Result;
use crate::lifecycle::{Hooks, Lifecycle};
use crate::module::ModuleType;
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use strum_macros::{Display, EnumString};

/// Lifetime of a bound provider.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// One instance per module injector.
    #[default]
    Singleton,
    /// A new instance on every resolution.
    Transient,
    /// Recognised but without request boundaries; resolves like `Transient`.
    Request,
}

impl Scope {
    /// Whether a resolved value may be cached by the binding.
    pub fn is_cached(self) -> bool {
        matches!(self, Scope::Singleton)
    }
}

/// Trait for types that can be constructed by a module injector
///
/// This trait is typically implemented automatically via the `#[derive(Injectable)]` macro.
///
/// # Example
/// ```
/// use tessera::{Injectable, Lazy, Resolver, Result};
/// use std::sync::Arc;
///
/// pub struct Database;
///
/// impl Injectable for Database {
///     fn inject(_resolver: &Resolver<'_>) -> Result<Self> {
///         Ok(Database)
///     }
/// }
///
/// pub struct UserService {
///     database: Arc<Database>,
/// }
///
/// impl Injectable for UserService {
///     fn inject(resolver: &Resolver<'_>) -> Result<Self> {
///         Ok(Self { database: resolver.get::<Database>()? })
///     }
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Create an instance by resolving dependencies from the module injector
    ///
    /// # Errors
    /// Returns an error if any required dependency is not visible to the module.
    fn inject(resolver: &Resolver<'_>) -> Result<Self>;

    /// Declared lifetime, singleton unless overridden.
    fn scope() -> Scope {
        Scope::Singleton
    }

    /// Members this type injects; used to detect construction cycles when
    /// the provider is registered and to record deferred injections.
    fn dependencies() -> Vec<InjectionPoint> {
        Vec::new()
    }

    /// Lifecycle hooks this type takes part in.
    fn lifecycle() -> Lifecycle<Self> {
        Lifecycle::new()
    }

    /// Module descriptor when `Self` is a module. Set by `#[module]`.
    #[doc(hidden)]
    fn as_module() -> Option<ModuleType> {
        None
    }
}

/// Type-erased descriptor of an [`Injectable`].
#[derive(Clone, Copy)]
pub struct InjectableType {
    id: TypeId,
    path: &'static str,
    scope: fn() -> Scope,
    dependencies: fn() -> Vec<InjectionPoint>,
    construct: fn(&Resolver<'_>) -> Result<Instance>,
    hooks: fn() -> Hooks,
    module: fn() -> Option<ModuleType>,
}

impl InjectableType {
    pub fn of<T: Injectable>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            path: std::any::type_name::<T>(),
            scope: T::scope,
            dependencies: T::dependencies,
            construct: construct_erased::<T>,
            hooks: hooks_erased::<T>,
            module: T::as_module,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name.
    pub fn path(&self) -> &'static str {
        self.path
    }

    /// Type name without its module path.
    pub fn name(&self) -> &'static str {
        short_type_name(self.path)
    }

    pub fn scope(&self) -> Scope {
        (self.scope)()
    }

    pub fn dependencies(&self) -> Vec<InjectionPoint> {
        (self.dependencies)()
    }

    pub fn hooks(&self) -> Hooks {
        (self.hooks)()
    }

    pub fn as_module(&self) -> Option<ModuleType> {
        (self.module)()
    }

    pub fn is_module(&self) -> bool {
        self.as_module().is_some()
    }

    pub(crate) fn construct(&self, resolver: &Resolver<'_>) -> Result<Instance> {
        (self.construct)(resolver)
    }
}

fn construct_erased<T: Injectable>(resolver: &Resolver<'_>) -> Result<Instance> {
    Ok(Arc::new(T::inject(resolver)?))
}

fn hooks_erased<T: Injectable>() -> Hooks {
    T::lifecycle().into_hooks()
}

impl PartialEq for InjectableType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for InjectableType {}

impl Hash for InjectableType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for InjectableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    struct Plain;

    impl Injectable for Plain {
        fn inject(_resolver: &Resolver<'_>) -> Result<Self> {
            Ok(Plain)
        }
    }

    struct Fresh;

    impl Injectable for Fresh {
        fn inject(_resolver: &Resolver<'_>) -> Result<Self> {
            Ok(Fresh)
        }

        fn scope() -> Scope {
            Scope::Transient
        }
    }

    #[test]
    fn test_descriptor_reads_declared_scope() {
        assert_eq!(InjectableType::of::<Plain>().scope(), Scope::Singleton);
        assert_eq!(InjectableType::of::<Fresh>().scope(), Scope::Transient);
        assert_eq!(InjectableType::of::<Plain>().name(), "Plain");
    }

    #[test]
    fn test_descriptor_identity() {
        assert_eq!(InjectableType::of::<Plain>(), InjectableType::of::<Plain>());
        assert_ne!(InjectableType::of::<Plain>(), InjectableType::of::<Fresh>());
    }

    #[test]
    fn test_scope_parses_lowercase() {
        assert_eq!(Scope::from_str("transient").unwrap(), Scope::Transient);
        assert_eq!(Scope::Request.to_string(), "request");
        assert!(Scope::Singleton.is_cached());
        assert!(!Scope::Request.is_cached());
    }
}
