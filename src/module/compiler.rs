use crate::error::{Result, TesseraError};
use crate::module::{DynamicModule, ModuleImport, ModuleTokenFactory, ModuleType};

/// A module reference resolved to its target and token.
#[derive(Debug, Clone)]
pub struct ModuleFactory {
    pub target: ModuleType,
    /// Set when the reference was a dynamic module.
    pub dynamic_metadata: Option<DynamicModule>,
    pub token: String,
}

/// Resolves module references: forward references are evaluated, deferred
/// modules awaited and dynamic modules split into target and metadata.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModuleCompiler {
    token_factory: ModuleTokenFactory,
}

impl ModuleCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn compile(&self, module: &ModuleImport, scope: &[ModuleType]) -> Result<ModuleFactory> {
        let (target, dynamic_metadata) = self.extract_metadata(module, scope).await?;
        let token = self
            .token_factory
            .create(target, scope, dynamic_metadata.as_ref())?;

        Ok(ModuleFactory {
            target,
            dynamic_metadata,
            token,
        })
    }

    async fn extract_metadata(
        &self,
        module: &ModuleImport,
        scope: &[ModuleType],
    ) -> Result<(ModuleType, Option<DynamicModule>)> {
        match module.resolve_forward() {
            ModuleImport::Static(target) => Ok((target, None)),
            ModuleImport::Dynamic(dynamic) => Ok((dynamic.module(), Some(dynamic))),
            ModuleImport::Deferred(deferred) => {
                let dynamic = deferred.resolve().await;
                Ok((dynamic.module(), Some(dynamic)))
            }
            // a forward reference must point at a module, not another forward reference
            ModuleImport::Forward(_) => Err(TesseraError::InvalidModule {
                scope: scope
                    .iter()
                    .map(ModuleType::name)
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}
