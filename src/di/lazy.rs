use crate::di::injector::{downcast, Injector};
use crate::di::token::Dependency;
use crate::error::{Result, TesseraError};
use once_cell::sync::OnceCell;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

/// A deferred injection, used to break dependency cycles.
///
/// `Lazy<T>` keeps a handle on the injector of the module that built its
/// owner and resolves `T` only when first accessed. Forward references are
/// evaluated at that moment, so the target may be declared after the owner.
/// Clones share the resolved instance.
///
/// # Panics
///
/// Dereferencing panics if `T` cannot be resolved from the owning module at
/// first access. Use [`Lazy::get`] to handle the failure instead.
pub struct Lazy<T: 'static + Send + Sync> {
    injector: Weak<Injector>,
    dependency: Dependency,
    instance: Arc<OnceCell<Arc<T>>>,
}

impl<T: 'static + Send + Sync> Lazy<T> {
    /// Created through [`Resolver::lazy`](crate::Resolver::lazy) and friends.
    pub(crate) fn new(injector: Weak<Injector>, dependency: Dependency) -> Self {
        Self {
            injector,
            dependency,
            instance: Arc::new(OnceCell::new()),
        }
    }

    /// Resolves the dependency, or returns the instance resolved earlier.
    pub fn get(&self) -> Result<Arc<T>> {
        self.instance.get_or_try_init(|| self.resolve()).cloned()
    }

    pub fn is_resolved(&self) -> bool {
        self.instance.get().is_some()
    }

    fn resolve(&self) -> Result<Arc<T>> {
        let token = self.dependency.resolve();
        let injector = self.injector.upgrade().ok_or_else(|| {
            TesseraError::unknown_provider(token, "<dropped module>")
        })?;
        downcast(injector.get(&token)?)
    }
}

impl<T: 'static + Send + Sync> Deref for Lazy<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        match self.instance.get_or_try_init(|| self.resolve()) {
            Ok(instance) => &**instance,
            Err(e) => panic!(
                "Failed to lazily resolve dependency '{}': {}",
                std::any::type_name::<T>(),
                e
            ),
        }
    }
}

impl<T: 'static + Send + Sync> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self {
            injector: self.injector.clone(),
            dependency: self.dependency.clone(),
            instance: Arc::clone(&self.instance),
        }
    }
}

impl<T: 'static + Send + Sync> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("type", &std::any::type_name::<T>())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::token::{forward_ref, InjectionToken, Token};

    const GREETING: InjectionToken<String> = InjectionToken::new("GREETING");

    #[test]
    fn test_resolves_on_first_access() {
        let injector = Injector::new("TestModule");
        let lazy: Lazy<String> = Lazy::new(
            Arc::downgrade(&injector),
            Dependency::Forward(forward_ref(|| GREETING.token())),
        );

        // binding after the handle exists is fine
        assert!(!lazy.is_resolved());
        injector.bind_constant(GREETING.token(), Arc::new("hello".to_string()));

        assert_eq!(lazy.as_str(), "hello");
        assert!(lazy.clone().is_resolved());
    }

    #[test]
    fn test_get_reports_missing_binding() {
        let injector = Injector::new("TestModule");
        let lazy: Lazy<String> =
            Lazy::new(Arc::downgrade(&injector), Dependency::Token(GREETING.token()));

        assert!(matches!(
            lazy.get(),
            Err(TesseraError::UnknownProvider { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "Failed to lazily resolve dependency")]
    fn test_deref_panics_when_unresolvable() {
        let injector = Injector::new("TestModule");
        let lazy: Lazy<String> = Lazy::new(
            Arc::downgrade(&injector),
            Dependency::Token(Token::Injection("MISSING")),
        );
        let _ = lazy.len();
    }
}
