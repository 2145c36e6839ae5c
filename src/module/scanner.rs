use crate::error::{Result, TesseraError};
use crate::module::{Container, ImportKey, ModuleImport, ModuleInstance, ModuleMetadata, ModuleType};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Walks the module graph from a root module: registers every reachable
/// module, links imports, providers and exports, then creates the modules
/// dependency-first.
pub struct Scanner {
    container: Arc<Container>,
}

impl Scanner {
    pub fn new(container: Arc<Container>) -> Self {
        Self { container }
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub async fn scan(&self, root: &ModuleImport) -> Result<()> {
        info!("Scanning modules from {}", root.name());
        self.scan_for_modules(root.clone(), Vec::new(), &mut HashSet::new(), &mut Vec::new())
            .await?;
        self.scan_modules_for_dependencies().await?;
        self.container.bind_global_scope();
        self.container.validate_exports()?;
        self.create_modules().await?;
        info!(
            "{} modules created",
            self.container.get_created_modules().len()
        );
        Ok(())
    }

    /// Declared metadata of `module`, static entries first.
    fn metadata_of(&self, module: &ModuleInstance) -> ModuleMetadata {
        let dynamic = self.container.get_dynamic_metadata_by_token(module.token());
        self.container
            .module_metadata(module.target())
            .merged(dynamic.as_ref())
    }

    /// Depth-first registration of every module reachable from `module`.
    ///
    /// `path` holds the import references currently being descended, so a
    /// module importing one of its ancestors does not recurse forever;
    /// `visited` holds the tokens already expanded.
    fn scan_for_modules<'a>(
        &'a self,
        module: ModuleImport,
        scope: Vec<ModuleType>,
        visited: &'a mut HashSet<String>,
        path: &'a mut Vec<ImportKey>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let module = module.resolve_forward();
            let key = module.key();
            if path.contains(&key) {
                return Ok(());
            }

            let token = self.container.add_module(&module, &scope).await?;
            if !visited.insert(token.clone()) {
                return Ok(());
            }
            let instance = self
                .container
                .get_module_by_token(&token)
                .ok_or_else(|| TesseraError::unknown_module(scope.iter().map(ModuleType::name)))?;

            let imports = self.metadata_of(&instance).imports;
            let mut scope = scope;
            scope.push(instance.target());

            path.push(key);
            for import in imports {
                self.scan_for_modules(import, scope.clone(), visited, path)
                    .await?;
            }
            path.pop();
            Ok(())
        }
        .boxed()
    }

    async fn scan_modules_for_dependencies(&self) -> Result<()> {
        for module in self.container.modules() {
            let token = module.token();
            let ModuleMetadata {
                imports,
                providers,
                exports,
            } = self.metadata_of(&module);
            debug!(
                "Linking {}: {} imports, {} providers, {} exports",
                module.name(),
                imports.len(),
                providers.len(),
                exports.len()
            );

            for import in &imports {
                self.container.add_import(import, token).await?;
            }
            for provider in providers {
                self.container.add_provider(provider, token)?;
            }
            for export in &exports {
                self.container.add_exported(export, token)?;
            }
        }
        Ok(())
    }

    async fn create_modules(&self) -> Result<()> {
        let mut in_progress = HashSet::new();
        if let Some(root) = self.container.get_root_module() {
            self.create_module(root, &mut in_progress).await?;
        }
        // modules only reachable through a skipped cycle edge
        for module in self.container.modules() {
            self.create_module(module, &mut in_progress).await?;
        }
        Ok(())
    }

    fn create_module<'a>(
        &'a self,
        module: Arc<ModuleInstance>,
        in_progress: &'a mut HashSet<String>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let token = module.token().to_string();
            if self.container.is_module_created(&token) || !in_progress.insert(token.clone()) {
                return Ok(());
            }

            for import in module.imports() {
                self.create_module(Arc::clone(&import), in_progress).await?;
                // an import still in progress is an ancestor importing us back
                if !in_progress.contains(import.token()) {
                    import.created().await;
                }
            }

            module.create().await?;
            self.container.add_created_module(&module);
            in_progress.remove(&token);
            Ok(())
        }
        .boxed()
    }
}
