//! Built-in injection tokens.
//!
//! The lifecycle tokens are broadcast channels: bind [`LifecycleHook`]s to
//! them with multi-bound providers and every hook runs, in declaration order,
//! when the owning module reaches that phase.
//!
//! ```
//! use tessera::{tokens::MODULE_INIT, LifecycleHook, Provider};
//!
//! let hook = Provider::factory(&MODULE_INIT, |_deps| {
//!     Ok(LifecycleHook::new(|| async {
//!         tracing::info!("module ready");
//!         Ok(())
//!     }))
//! })
//! .multi();
//! ```

use crate::di::InjectionToken;
use crate::lifecycle::LifecycleHook;
use crate::module::ModuleRef;

pub const APP_INIT: InjectionToken<LifecycleHook> = InjectionToken::new("Initialize<App>");
pub const APP_DESTROY: InjectionToken<LifecycleHook> = InjectionToken::new("Destroy<App>");
pub const MODULE_INIT: InjectionToken<LifecycleHook> = InjectionToken::new("Initialize<Module>");
pub const MODULE_DESTROY: InjectionToken<LifecycleHook> = InjectionToken::new("Destroy<Module>");

/// Handle on the module a provider is resolved in. Bound in every module.
pub const MODULE_REF: InjectionToken<ModuleRef> = InjectionToken::new("Ref<Module>");
