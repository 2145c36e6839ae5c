use crate::di::{Dependency, Provider};
use crate::error::Result;
use crate::module::{DynamicModule, ExportRef, ModuleImport, ModuleType};
use serde::Serialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

const GLOBAL_SCOPE: &str = "global";
const CIRCULAR: &str = "[Circular]";
const FORWARD: &str = "[Forward]";
const DEFERRED: &str = "[Deferred]";

#[derive(Serialize)]
struct OpaqueToken<'a> {
    module: &'a str,
    dynamic: String,
    scope: Value,
}

/// Computes module tokens: a SHA-256 digest over the module identity, its
/// scope stack and a structural fingerprint of its dynamic metadata.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModuleTokenFactory;

impl ModuleTokenFactory {
    pub fn create(
        &self,
        target: ModuleType,
        scope: &[ModuleType],
        dynamic: Option<&DynamicModule>,
    ) -> Result<String> {
        let scope = if target.is_single_instance() {
            Value::from(GLOBAL_SCOPE)
        } else {
            json!(self.scope_stack(scope))
        };
        let opaque = OpaqueToken {
            module: target.path(),
            dynamic: self.dynamic_metadata_token(dynamic)?,
            scope,
        };

        let digest = Sha256::digest(serde_json::to_vec(&opaque)?);
        Ok(hex::encode(digest))
    }

    /// The enclosing modules, outermost first, starting at the nearest
    /// single-instance ancestor when there is one.
    pub fn scope_stack(&self, scope: &[ModuleType]) -> Vec<&'static str> {
        let start = scope
            .iter()
            .rposition(ModuleType::is_single_instance)
            .unwrap_or(0);
        scope[start..].iter().map(ModuleType::path).collect()
    }

    /// Empty for static modules; otherwise a reference-aware serialisation
    /// of the dynamic metadata, so `{}` and "no metadata" never collide.
    fn dynamic_metadata_token(&self, dynamic: Option<&DynamicModule>) -> Result<String> {
        match dynamic {
            None => Ok(String::new()),
            Some(dynamic) => Ok(serde_json::to_string(&fingerprint(dynamic, &mut Vec::new()))?),
        }
    }
}

fn fingerprint(dynamic: &DynamicModule, ancestors: &mut Vec<usize>) -> Value {
    ancestors.push(dynamic.addr());
    let metadata = dynamic.metadata();
    let mut object = Map::new();
    object.insert(
        "imports".into(),
        metadata
            .imports
            .iter()
            .map(|import| import_fingerprint(import, ancestors))
            .collect(),
    );
    object.insert(
        "providers".into(),
        metadata.providers.iter().map(provider_fingerprint).collect(),
    );
    object.insert(
        "exports".into(),
        metadata
            .exports
            .iter()
            .map(|export| export_fingerprint(export, ancestors))
            .collect(),
    );
    object.insert(
        "options".into(),
        dynamic.options().cloned().unwrap_or(Value::Null),
    );
    ancestors.pop();
    Value::Object(object)
}

fn nested_fingerprint(dynamic: &DynamicModule, ancestors: &mut Vec<usize>) -> Value {
    if ancestors.contains(&dynamic.addr()) {
        return Value::from(CIRCULAR);
    }
    json!({
        "module": dynamic.module().path(),
        "metadata": fingerprint(dynamic, ancestors),
    })
}

fn import_fingerprint(import: &ModuleImport, ancestors: &mut Vec<usize>) -> Value {
    match import {
        ModuleImport::Static(module) => Value::from(module.path()),
        ModuleImport::Dynamic(dynamic) => nested_fingerprint(dynamic, ancestors),
        ModuleImport::Deferred(_) => Value::from(DEFERRED),
        ModuleImport::Forward(_) => Value::from(FORWARD),
    }
}

fn export_fingerprint(export: &ExportRef, ancestors: &mut Vec<usize>) -> Value {
    match export {
        ExportRef::Type(ty) => Value::from(ty.path()),
        ExportRef::Token(token) => Value::from(token.fingerprint()),
        ExportRef::Dynamic(dynamic) => nested_fingerprint(dynamic, ancestors),
    }
}

fn dependency_fingerprint(dependency: &Dependency) -> Value {
    match dependency {
        Dependency::Token(token) => Value::from(token.fingerprint()),
        Dependency::Forward(_) => Value::from(FORWARD),
    }
}

fn provider_fingerprint(provider: &Provider) -> Value {
    let mut object = Map::new();
    object.insert("kind".into(), Value::from(provider.kind().to_string()));
    object.insert("provide".into(), Value::from(provider.token().fingerprint()));
    object.insert("multi".into(), Value::from(provider.is_multi()));
    match provider {
        Provider::Class {
            use_class, scope, ..
        } => {
            object.insert("use_class".into(), Value::from(use_class.path()));
            object.insert("scope".into(), json!(scope));
        }
        Provider::Factory { deps, scope, .. } => {
            object.insert(
                "deps".into(),
                deps.iter().map(dependency_fingerprint).collect(),
            );
            object.insert("scope".into(), json!(scope));
        }
        Provider::Existing { existing, .. } => {
            object.insert("use_existing".into(), dependency_fingerprint(existing));
        }
        Provider::Injectable(_) | Provider::Value { .. } => {}
    }
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::{InjectionToken, Resolver};
    use crate::module::{Module, ModuleMetadata};
    use crate::{Injectable, Result};

    const LABEL: InjectionToken<String> = InjectionToken::new("LABEL");

    macro_rules! test_module {
        ($name:ident, global = $global:expr, scoped = $scoped:expr) => {
            struct $name;

            impl Injectable for $name {
                fn inject(_: &Resolver<'_>) -> Result<Self> {
                    Ok($name)
                }
            }

            impl Module for $name {
                fn metadata() -> ModuleMetadata {
                    ModuleMetadata::new()
                }

                fn is_global() -> bool {
                    $global
                }

                fn is_scoped() -> bool {
                    $scoped
                }
            }
        };
    }

    test_module!(Root, global = false, scoped = true);
    test_module!(Shared, global = true, scoped = false);
    test_module!(Feature, global = false, scoped = true);
    test_module!(Leaf, global = false, scoped = false);
    test_module!(Nested, global = false, scoped = true);

    fn labelled(label: &str) -> DynamicModule {
        DynamicModule::new::<Leaf>(
            ModuleMetadata::new().providers([Provider::value(&LABEL, label.to_string())]),
        )
        .with_options(&json!({ "label": label }))
        .unwrap()
    }

    #[test]
    fn test_token_is_deterministic() {
        let factory = ModuleTokenFactory;
        let scope = [ModuleType::of::<Root>()];
        let a = factory.create(ModuleType::of::<Leaf>(), &scope, None).unwrap();
        let b = factory.create(ModuleType::of::<Leaf>(), &scope, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_scoped_module_depends_on_import_chain() {
        let factory = ModuleTokenFactory;
        let nested = ModuleType::of::<Nested>();
        let a = factory.create(nested, &[ModuleType::of::<Root>()], None).unwrap();
        let b = factory.create(nested, &[ModuleType::of::<Feature>()], None).unwrap();
        assert_ne!(a, b);

        // unscoped modules are one instance regardless of the importer
        let leaf = ModuleType::of::<Leaf>();
        assert_eq!(
            factory.create(leaf, &[ModuleType::of::<Root>()], None).unwrap(),
            factory.create(leaf, &[ModuleType::of::<Feature>()], None).unwrap()
        );
    }

    #[test]
    fn test_global_module_ignores_scope() {
        let factory = ModuleTokenFactory;
        let shared = ModuleType::of::<Shared>();
        let a = factory.create(shared, &[ModuleType::of::<Root>()], None).unwrap();
        let b = factory
            .create(shared, &[ModuleType::of::<Root>(), ModuleType::of::<Feature>()], None)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_scope_stack_truncates_at_nearest_global() {
        let factory = ModuleTokenFactory;
        let scope = [
            ModuleType::of::<Root>(),
            ModuleType::of::<Shared>(),
            ModuleType::of::<Feature>(),
        ];
        let stack = factory.scope_stack(&scope);
        assert_eq!(stack.len(), 2);
        assert!(stack[0].ends_with("Shared"));
        assert!(stack[1].ends_with("Feature"));

        assert_eq!(factory.scope_stack(&scope[..1]).len(), 1);
    }

    #[test]
    fn test_dynamic_metadata_takes_part_in_identity() {
        let factory = ModuleTokenFactory;
        let leaf = ModuleType::of::<Leaf>();
        let static_token = factory.create(leaf, &[], None).unwrap();
        let empty = DynamicModule::new::<Leaf>(ModuleMetadata::new());
        let empty_token = factory.create(leaf, &[], Some(&empty)).unwrap();

        assert_ne!(static_token, empty_token);
        assert_eq!(
            factory.create(leaf, &[], Some(&labelled("a"))).unwrap(),
            factory.create(leaf, &[], Some(&labelled("a"))).unwrap()
        );
        assert_ne!(
            factory.create(leaf, &[], Some(&labelled("a"))).unwrap(),
            factory.create(leaf, &[], Some(&labelled("b"))).unwrap()
        );
    }

    #[test]
    fn test_forward_refs_are_not_evaluated() {
        let dynamic = DynamicModule::new::<Leaf>(
            ModuleMetadata::new()
                .imports([ModuleImport::forward(|| panic!("evaluated while hashing"))]),
        );
        let token = ModuleTokenFactory.create(ModuleType::of::<Leaf>(), &[], Some(&dynamic));
        assert!(token.is_ok());
    }
}
