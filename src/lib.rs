//! # Tessera
//!
//! Module composition and dependency resolution for Rust applications.
//!
//! An application is a graph of modules. Each module declares the modules it
//! imports, the providers it binds and the subset it exports. Tessera scans
//! the graph from a root module, gives every module its own injector, wires
//! exported providers into importing modules and runs lifecycle hooks in
//! dependency order.
//!
//! ## Features
//!
//! - **Modules**: static, dynamic (configured at runtime) and deferred
//!   (built asynchronously) modules, global modules visible everywhere
//! - **Providers**: class, value, factory and alias bindings, singleton or
//!   transient, with multi-binding under injection tokens
//! - **Forward references**: `Lazy<T>` breaks construction cycles
//! - **Lifecycle**: module/app init and destroy hooks, per type or broadcast
//!   through tokens
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tessera::{module, Application, DeriveInjectable, InjectionToken, Provider};
//! use std::sync::Arc;
//!
//! pub const GREETING: InjectionToken<String> = InjectionToken::new("GREETING");
//!
//! // 1. Define your service
//! #[derive(DeriveInjectable)]
//! pub struct Greeter {
//!     #[inject(token = GREETING)]
//!     greeting: Arc<String>,
//! }
//!
//! // 2. Define your module
//! #[module(
//!     providers = [Greeter, Provider::value(&GREETING, "hello".to_string())],
//!     exports = [Greeter],
//! )]
//! pub struct AppModule;
//!
//! // 3. Bootstrap your application
//! #[tokio::main]
//! async fn main() -> tessera::Result<()> {
//!     let app = Application::new(AppModule::import());
//!     app.start().await?;
//!
//!     let greeter = app.get::<Greeter>()?;
//!     println!("{}", greeter.greeting);
//!
//!     app.destroy().await
//! }
//! ```

extern crate self as tessera;

pub mod config;
pub mod di;
pub mod error;
pub mod exception;
pub mod lifecycle;
pub mod module;
pub mod reflector;
pub mod tokens;

// Re-export core types
pub use config::ApplicationOptions;
pub use di::{
    forward_ref, Dependency, Deps, ForwardRef, Injectable, InjectableType, InjectionPoint,
    InjectionToken, Injector, Instance, Lazy, Provider, Resolver, Scope, Token,
};
pub use error::{Result, TesseraError};
pub use lifecycle::{Application, ApplicationBuilder, Lifecycle, LifecycleError, LifecycleHook};
pub use module::{
    Container, DynamicModule, ExportRef, Module, ModuleImport, ModuleMetadata, ModuleRef,
    ModuleType,
};
pub use reflector::Reflector;

// Re-export macros
pub use tessera_macro::{module, Injectable as DeriveInjectable};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;

/// Prelude module for convenient imports
///
/// ```
/// use tessera::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::ApplicationOptions;
    pub use crate::di::{
        forward_ref, Dependency, Deps, Injectable, InjectionToken, Lazy, Provider, Resolver,
        Scope, Token,
    };
    pub use crate::error::{Result, TesseraError};
    pub use crate::lifecycle::{
        shutdown_signal, Application, ApplicationBuilder, Lifecycle, LifecycleError,
        LifecycleHook, OnAppDestroy, OnAppInit, OnModuleDestroy, OnModuleInit,
    };
    pub use crate::module::{DynamicModule, Module, ModuleImport, ModuleMetadata, ModuleRef};
    pub use crate::tokens::{APP_DESTROY, APP_INIT, MODULE_DESTROY, MODULE_INIT, MODULE_REF};
    pub use crate::{module, DeriveInjectable as Injectable};
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
}
