//! Lifecycle Hooks Module
//!
//! Modules and providers take part in four lifecycle events. The first one
//! runs while the graph is created; the others are driven by the
//! [`Application`].
//!
//! # Lifecycle Phases
//!
//! ```text
//! 1. Scan: register modules, link imports/providers/exports
//!    ↓
//! 2. Create modules, imports first
//!    ↓
//! 3. OnModuleInit (each module, as it is created)    ← Lifecycle Hook
//!    ↓
//! 4. OnAppInit (each module, creation order)         ← Lifecycle Hook
//!    ↓
//! [Running...]
//!    ↓
//! 5. OnAppDestroy (each module, creation order)      ← Lifecycle Hook
//!    ↓
//! 6. OnModuleDestroy (each module, reverse order)    ← Lifecycle Hook
//! ```
//!
//! Within one module a phase runs the module's own hook, then the hooks bound
//! to the phase's broadcast token (see [`tokens`](crate::tokens)), then the
//! hooks of its declared providers in declaration order.
//!
//! # Example
//!
//! ```rust,ignore
//! use tessera::lifecycle::{OnModuleInit, OnModuleDestroy, LifecycleError};
//! use async_trait::async_trait;
//!
//! #[derive(Injectable)]
//! #[injectable(on_module_init, on_module_destroy)]
//! pub struct DatabaseService {
//!     config: Arc<DatabaseConfig>,
//! }
//!
//! #[async_trait]
//! impl OnModuleInit for DatabaseService {
//!     async fn on_module_init(&self) -> Result<(), LifecycleError> {
//!         tracing::info!("Initializing database connection");
//!         Ok(())
//!     }
//! }
//!
//! #[async_trait]
//! impl OnModuleDestroy for DatabaseService {
//!     async fn on_module_destroy(&self) -> Result<(), LifecycleError> {
//!         tracing::info!("Closing database connections");
//!         Ok(())
//!     }
//! }
//! ```

mod application;
mod error;
mod hooks;
mod manager;
mod shutdown;

pub use application::{Application, ApplicationBuilder, ModuleSelection};
pub use error::LifecycleError;
pub use hooks::{
    Hooks, Lifecycle, LifecycleHook, LifecyclePhase, OnAppDestroy, OnAppInit, OnModuleDestroy,
    OnModuleInit,
};
pub use manager::LifecycleManager;
pub use shutdown::shutdown_signal;
