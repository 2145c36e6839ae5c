//! Out-of-band metadata attached to types and their members.

use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;

/// Well-known metadata keys.
pub mod keys {
    /// Module metadata, cached when a module is first registered.
    pub const MODULE_METADATA: &str = "module:metadata";
    /// Deferred injections recorded per member of an injectable.
    pub const LAZY_INJECT: &str = "injectable:lazy_inject";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MetadataKey {
    key: &'static str,
    target: TypeId,
    member: Option<&'static str>,
}

/// Side table mapping `(key, type, optional member)` to an arbitrary value.
///
/// # Example
/// ```
/// use std::any::TypeId;
/// use tessera::Reflector;
///
/// struct UserService;
///
/// let reflector = Reflector::new();
/// reflector.define("role", TypeId::of::<UserService>(), None, "admin");
/// assert_eq!(
///     *reflector.get::<&str>("role", TypeId::of::<UserService>(), None).unwrap(),
///     "admin"
/// );
/// ```
#[derive(Default)]
pub struct Reflector {
    entries: DashMap<MetadataKey, Arc<dyn Any + Send + Sync>>,
}

impl Reflector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `value` under `key`, replacing any previous value.
    pub fn define<T: Any + Send + Sync>(
        &self,
        key: &'static str,
        target: TypeId,
        member: Option<&'static str>,
        value: T,
    ) {
        self.entries
            .insert(MetadataKey { key, target, member }, Arc::new(value));
    }

    pub fn get<T: Any + Send + Sync>(
        &self,
        key: &'static str,
        target: TypeId,
        member: Option<&'static str>,
    ) -> Option<Arc<T>> {
        self.entries
            .get(&MetadataKey { key, target, member })
            .and_then(|entry| Arc::clone(entry.value()).downcast::<T>().ok())
    }

    pub fn has(&self, key: &'static str, target: TypeId, member: Option<&'static str>) -> bool {
        self.entries
            .contains_key(&MetadataKey { key, target, member })
    }

    /// Members of `target` carrying metadata under `key`.
    pub fn members(&self, key: &'static str, target: TypeId) -> Vec<&'static str> {
        let mut members: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| entry.key().key == key && entry.key().target == target)
            .filter_map(|entry| entry.key().member)
            .collect();
        members.sort_unstable();
        members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Target;

    #[test]
    fn test_member_scoped_metadata() {
        let reflector = Reflector::new();
        let target = TypeId::of::<Target>();

        reflector.define(keys::LAZY_INJECT, target, Some("b"), 2u8);
        reflector.define(keys::LAZY_INJECT, target, Some("a"), 1u8);

        assert!(!reflector.has(keys::LAZY_INJECT, target, None));
        assert_eq!(reflector.members(keys::LAZY_INJECT, target), vec!["a", "b"]);
        assert_eq!(*reflector.get::<u8>(keys::LAZY_INJECT, target, Some("a")).unwrap(), 1);
    }

    #[test]
    fn test_wrong_type_reads_as_absent() {
        let reflector = Reflector::new();
        reflector.define("key", TypeId::of::<Target>(), None, 7u32);
        assert!(reflector.get::<String>("key", TypeId::of::<Target>(), None).is_none());
    }
}
