use crate::di::{InjectableType, Instance, Provider, Token};
use crate::error::{Result, TesseraError};
use crate::module::{
    Export, ExportRef, ModuleCompiler, ModuleFactory, ModuleImport, ModuleInstance,
    ModuleMetadata, ModuleType,
};
use crate::reflector::{keys, Reflector};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// Registry of every module instance in an application.
///
/// Modules are keyed by their token; the container also owns the
/// process-wide bookkeeping shared by all modules: claimed provider tokens,
/// dynamic metadata and the reflector.
pub struct Container {
    modules: DashMap<String, Arc<ModuleInstance>>,
    /// Registration order; the first entry is the root module.
    ordered: RwLock<Vec<Arc<ModuleInstance>>>,
    global_modules: RwLock<Vec<Arc<ModuleInstance>>>,
    created_modules: RwLock<Vec<Arc<ModuleInstance>>>,
    provider_tokens: DashSet<Token>,
    dynamic_metadata: DashMap<String, ModuleMetadata>,
    reflector: Reflector,
    compiler: ModuleCompiler,
    this: Weak<Container>,
}

impl Container {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            modules: DashMap::new(),
            ordered: RwLock::new(Vec::new()),
            global_modules: RwLock::new(Vec::new()),
            created_modules: RwLock::new(Vec::new()),
            provider_tokens: DashSet::new(),
            dynamic_metadata: DashMap::new(),
            reflector: Reflector::new(),
            compiler: ModuleCompiler::new(),
            this: this.clone(),
        })
    }

    pub fn reflector(&self) -> &Reflector {
        &self.reflector
    }

    pub fn compiler(&self) -> &ModuleCompiler {
        &self.compiler
    }

    /// Registers `module` under `scope` and returns its token.
    ///
    /// Registering a reference that compiles to an existing token is a no-op,
    /// which is what collapses repeated imports into one instance. The imports
    /// of a newly registered dynamic module are registered too, under
    /// `scope` extended with its target.
    pub fn add_module<'a>(
        &'a self,
        module: &'a ModuleImport,
        scope: &'a [ModuleType],
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let ModuleFactory {
                target,
                dynamic_metadata,
                token,
            } = self.compiler.compile(module, scope).await?;

            // no await from here on: check and insert happen in one step
            let instance = match self.modules.entry(token.clone()) {
                Entry::Occupied(_) => return Ok(token),
                Entry::Vacant(entry) => {
                    let instance = ModuleInstance::new(
                        target,
                        scope.to_vec(),
                        token.clone(),
                        self.this.clone(),
                    );
                    instance.add_global_providers();
                    entry.insert(Arc::clone(&instance));
                    instance
                }
            };

            tracing::debug!("registered module {} ({})", target, short(&token));
            self.ordered.write().push(Arc::clone(&instance));
            if target.is_global() {
                self.global_modules.write().push(instance);
            }
            if let Some(dynamic) = dynamic_metadata {
                let metadata = dynamic.metadata().clone();
                self.dynamic_metadata.insert(token.clone(), metadata.clone());

                let mut nested_scope = scope.to_vec();
                nested_scope.push(target);
                for import in &metadata.imports {
                    self.add_module(import, &nested_scope).await?;
                }
            }
            Ok(token)
        })
    }

    fn module_by_token(&self, token: &str) -> Result<Arc<ModuleInstance>> {
        self.get_module_by_token(token)
            .ok_or_else(|| TesseraError::UnknownModule {
                trace: short(token).to_string(),
            })
    }

    /// Declares `provider` in the module registered under `token`.
    pub fn add_provider(&self, provider: Provider, token: &str) -> Result<()> {
        let module = self.module_by_token(token)?;
        if let Some(ty) = class_of(&provider) {
            if ty.is_module() {
                return Err(TesseraError::InvalidProvider {
                    provider: ty.name().to_string(),
                });
            }
            self.record_lazy_injects(ty);
            check_construction_cycles(ty, &mut Vec::new())?;
        }
        module.add_provider(provider);
        Ok(())
    }

    /// Remembers the forward references of `ty`; they are fulfilled by the
    /// module that binds it.
    fn record_lazy_injects(&self, ty: InjectableType) {
        for point in ty.dependencies() {
            if point.dependency.is_forward() {
                self.reflector
                    .define(keys::LAZY_INJECT, ty.id(), Some(point.member), point.dependency);
            }
        }
    }

    pub fn add_exported(&self, export: &ExportRef, token: &str) -> Result<()> {
        let module = self.module_by_token(token)?;
        let export = match export {
            ExportRef::Type(ty) => match ty.as_module() {
                Some(target) => Export::Module(target),
                None => Export::Provider(Token::Class(*ty)),
            },
            ExportRef::Token(token) => Export::Provider(*token),
            ExportRef::Dynamic(dynamic) => Export::Module(dynamic.module()),
        };
        module.add_exported(export);
        Ok(())
    }

    /// Links `related` as an import of the module registered under `token`.
    /// The related module must already be registered.
    pub async fn add_import(&self, related: &ModuleImport, token: &str) -> Result<()> {
        let module = self.module_by_token(token)?;
        let mut scope = module.scope().to_vec();
        scope.push(module.target());

        let compiled = self.compiler.compile(related, &scope).await?;
        if compiled.token == token {
            return Err(TesseraError::CircularDependency {
                cycle: format!("{0} -> {0}", module.name()),
            });
        }
        let Some(related_module) = self.get_module_by_token(&compiled.token) else {
            let mut trace: Vec<&str> = scope.iter().map(ModuleType::name).collect();
            trace.push(compiled.target.name());
            // a forward import whose target was never registered is an unresolved cycle
            if matches!(related, ModuleImport::Forward(_)) {
                return Err(TesseraError::CircularDependency {
                    cycle: trace.join(" -> "),
                });
            }
            return Err(TesseraError::unknown_module(trace));
        };
        module.add_import(&related_module);
        Ok(())
    }

    /// Imports every global module into every other module.
    pub fn bind_global_scope(&self) {
        let globals = self.global_modules.read().clone();
        for module in self.modules() {
            for global in &globals {
                if !Arc::ptr_eq(&module, global) {
                    module.add_import(global);
                }
            }
        }
    }

    pub fn validate_exports(&self) -> Result<()> {
        self.modules()
            .iter()
            .try_for_each(|module| module.validate_exports())
    }

    /// Looks `token` up in `module` only when `strict`, otherwise in every
    /// module in registration order.
    pub fn get_provider(
        &self,
        token: &Token,
        module: Option<ModuleType>,
        strict: bool,
    ) -> Result<Instance> {
        match module {
            Some(target) if strict => {
                let module = self
                    .get_module(target)
                    .ok_or_else(|| TesseraError::unknown_module([target.name()]))?;
                module.injector().get(token)
            }
            _ => {
                let modules = self.search_order(module);
                let module = modules
                    .iter()
                    .find(|module| module.injector().is_bound(token))
                    .ok_or_else(|| TesseraError::unknown_provider(token, scope_name(&modules)))?;
                module.injector().get(token)
            }
        }
    }

    /// Every value bound to a multi-bindable `token`, in binding order.
    ///
    /// With a module, that module's bindings including the ones its imports
    /// export to it. Without one, the values bound by every module
    /// concatenated in registration order; each value is counted once, in
    /// the module that declares it.
    pub fn get_all_providers(&self, token: &Token, module: Option<ModuleType>) -> Result<Vec<Instance>> {
        if !token.is_injection_token() {
            return Err(TesseraError::MissingInjectionToken {
                context: format!("get_all({token})"),
            });
        }
        match module {
            Some(target) => {
                let module = self
                    .get_module(target)
                    .ok_or_else(|| TesseraError::unknown_module([target.name()]))?;
                if module.injector().is_bound(token) {
                    module.injector().get_all(token)
                } else {
                    Ok(Vec::new())
                }
            }
            None => {
                let mut values = Vec::new();
                for module in self.modules() {
                    values.extend(module.injector().get_own(token)?);
                }
                Ok(values)
            }
        }
    }

    fn search_order(&self, first: Option<ModuleType>) -> Vec<Arc<ModuleInstance>> {
        let mut modules = self.modules();
        if let Some(first) = first {
            if let Some(index) = modules.iter().position(|m| m.target() == first) {
                let module = modules.remove(index);
                modules.insert(0, module);
            }
        }
        modules
    }

    pub fn is_provider_bound(&self, token: &Token, module: Option<ModuleType>) -> bool {
        match module {
            Some(target) => self
                .get_module(target)
                .is_some_and(|module| module.injector().is_bound(token)),
            None => self
                .modules()
                .iter()
                .any(|module| module.injector().is_bound(token)),
        }
    }

    pub fn has_module(&self, target: ModuleType) -> bool {
        self.get_module(target).is_some()
    }

    /// First registered instance of `target`.
    pub fn get_module(&self, target: ModuleType) -> Option<Arc<ModuleInstance>> {
        self.ordered
            .read()
            .iter()
            .find(|module| module.target() == target)
            .cloned()
    }

    pub fn get_module_by_token(&self, token: &str) -> Option<Arc<ModuleInstance>> {
        self.modules.get(token).map(|entry| Arc::clone(entry.value()))
    }

    pub fn get_root_module(&self) -> Option<Arc<ModuleInstance>> {
        self.ordered.read().first().cloned()
    }

    /// All modules in registration order.
    pub fn modules(&self) -> Vec<Arc<ModuleInstance>> {
        self.ordered.read().clone()
    }

    pub fn global_modules(&self) -> Vec<Arc<ModuleInstance>> {
        self.global_modules.read().clone()
    }

    /// Created modules in creation order.
    pub fn get_created_modules(&self) -> Vec<Arc<ModuleInstance>> {
        self.created_modules.read().clone()
    }

    pub fn is_module_created(&self, token: &str) -> bool {
        self.created_modules
            .read()
            .iter()
            .any(|module| module.token() == token)
    }

    pub fn add_created_module(&self, module: &Arc<ModuleInstance>) {
        let mut created = self.created_modules.write();
        if !created.iter().any(|m| Arc::ptr_eq(m, module)) {
            created.push(Arc::clone(module));
        }
    }

    pub fn has_provider_token(&self, token: &Token) -> bool {
        self.provider_tokens.contains(token)
    }

    pub fn add_provider_token(&self, token: Token) {
        self.provider_tokens.insert(token);
    }

    pub fn get_dynamic_metadata_by_token(&self, token: &str) -> Option<ModuleMetadata> {
        self.dynamic_metadata
            .get(token)
            .map(|entry| entry.value().clone())
    }

    /// Static metadata of `target`, computed once per type.
    pub fn module_metadata(&self, target: ModuleType) -> Arc<ModuleMetadata> {
        if let Some(metadata) = self
            .reflector
            .get::<ModuleMetadata>(keys::MODULE_METADATA, target.id(), None)
        {
            return metadata;
        }
        let metadata = target.metadata();
        self.reflector
            .define(keys::MODULE_METADATA, target.id(), None, metadata.clone());
        Arc::new(metadata)
    }
}

fn class_of(provider: &Provider) -> Option<InjectableType> {
    match provider {
        Provider::Injectable(ty) => Some(*ty),
        Provider::Class { use_class, .. } => Some(*use_class),
        _ => None,
    }
}

/// Fails when `ty` reaches itself through direct (non-forward) class
/// dependencies.
fn check_construction_cycles(ty: InjectableType, path: &mut Vec<InjectableType>) -> Result<()> {
    if let Some(start) = path.iter().position(|seen| *seen == ty) {
        let cycle = path[start..]
            .iter()
            .chain(std::iter::once(&ty))
            .map(InjectableType::name)
            .collect::<Vec<_>>()
            .join(" -> ");
        return Err(TesseraError::CircularDependency { cycle });
    }
    path.push(ty);
    for point in ty.dependencies() {
        if point.dependency.is_forward() {
            continue;
        }
        if let Some(dependency) = point.dependency.resolve().as_class() {
            check_construction_cycles(*dependency, path)?;
        }
    }
    path.pop();
    Ok(())
}

fn scope_name(modules: &[Arc<ModuleInstance>]) -> String {
    match modules {
        [module] => module.name().to_string(),
        _ => "any module".to_string(),
    }
}

fn short(token: &str) -> &str {
    token.get(..12).unwrap_or(token)
}
