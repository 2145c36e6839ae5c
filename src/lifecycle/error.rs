//! Errors raised by lifecycle hooks and phases

use thiserror::Error;

/// Failure of a lifecycle hook or of a whole lifecycle phase.
///
/// Hook implementations return this type; the phase runner wraps whatever
/// a hook reports into [`LifecycleError::HookFailed`] with the owner's name.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Shutdown failed: {0}")]
    ShutdownFailed(String),

    /// A phase did not complete within its configured time-out
    #[error("Timeout during {phase}: {message}")]
    Timeout { phase: String, message: String },

    /// `service` is the module or provider whose hook failed
    #[error("Hook execution failed for {service}: {message}")]
    HookFailed { service: String, message: String },
}

impl LifecycleError {
    pub fn init_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    pub fn shutdown_failed(msg: impl Into<String>) -> Self {
        Self::ShutdownFailed(msg.into())
    }

    pub fn timeout(phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Timeout {
            phase: phase.into(),
            message: message.into(),
        }
    }

    pub fn hook_failed(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HookFailed {
            service: service.into(),
            message: message.into(),
        }
    }
}
