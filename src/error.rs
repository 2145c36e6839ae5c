use crate::lifecycle::LifecycleError;
use strum_macros::{Display, IntoStaticStr};
use thiserror::Error;

pub type Result<T, E = TesseraError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TesseraError {
    #[error("Invalid module reference in scope [{scope}]")]
    InvalidModule { scope: String },

    #[error("Module not found while resolving [{trace}]")]
    UnknownModule { trace: String },

    #[error("Provider not found: {token} (searched in {module})")]
    UnknownProvider { token: String, module: String },

    #[error("Module {module} cannot export {export}: it is neither provided locally nor exported by an import")]
    UnknownExport { module: String, export: String },

    #[error("Invalid export {export} in [{scope}]")]
    InvalidExport { export: String, scope: String },

    #[error("Multiple providers registered for {token}; set `multi` to bind it more than once")]
    MultipleProviders { token: String },

    #[error("{context} requires an InjectionToken")]
    MissingInjectionToken { context: String },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("Invalid provider: {provider} is neither an injectable nor an injection token")]
    InvalidProvider { provider: String },

    #[error("Invalid provider configuration in module {module} with {token}: {message}")]
    Configuration {
        module: String,
        token: String,
        message: String,
    },

    #[error("Failed to downcast type: {type_name}")]
    DowncastFailed { type_name: String },

    #[error("Failed to serialize module options: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Coarse classification used when reporting failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    InvalidModule,
    UnknownModule,
    UnknownProvider,
    UnknownExport,
    InvalidExport,
    MultipleProviders,
    MissingInjectionToken,
    CircularDependency,
    InvalidProvider,
    Configuration,
    DowncastFailed,
    Serialization,
    Lifecycle,
}

impl TesseraError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidModule { .. } => ErrorKind::InvalidModule,
            Self::UnknownModule { .. } => ErrorKind::UnknownModule,
            Self::UnknownProvider { .. } => ErrorKind::UnknownProvider,
            Self::UnknownExport { .. } => ErrorKind::UnknownExport,
            Self::InvalidExport { .. } => ErrorKind::InvalidExport,
            Self::MultipleProviders { .. } => ErrorKind::MultipleProviders,
            Self::MissingInjectionToken { .. } => ErrorKind::MissingInjectionToken,
            Self::CircularDependency { .. } => ErrorKind::CircularDependency,
            Self::InvalidProvider { .. } => ErrorKind::InvalidProvider,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::DowncastFailed { .. } => ErrorKind::DowncastFailed,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Lifecycle(_) => ErrorKind::Lifecycle,
        }
    }

    pub(crate) fn unknown_module<'a>(trace: impl IntoIterator<Item = &'a str>) -> Self {
        Self::UnknownModule {
            trace: join_trace(trace),
        }
    }

    pub(crate) fn unknown_provider(token: impl ToString, module: impl Into<String>) -> Self {
        Self::UnknownProvider {
            token: token.to_string(),
            module: module.into(),
        }
    }

    pub(crate) fn downcast<T: ?Sized>() -> Self {
        Self::DowncastFailed {
            type_name: std::any::type_name::<T>().to_string(),
        }
    }
}

/// Joins module names the way traces are printed: `Root -> Feature -> Leaf`.
pub(crate) fn join_trace<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names.into_iter().collect::<Vec<_>>().join(" -> ")
}
