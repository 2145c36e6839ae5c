use proc_macro::TokenStream;

mod injectable;
mod module;

/// Derive macro implementing `tessera::Injectable` for a struct
///
/// Fields are resolved from the injector of the module the type is bound in:
///
/// - `Arc<T>`: the provider bound under `T`
/// - `#[inject(token = TOKEN)] Arc<T>`: the provider bound under an
///   `InjectionToken<T>`
/// - `#[inject(all = TOKEN)] Vec<Arc<T>>`: every value multi-bound under a token
/// - `Lazy<T>`: a forward reference, resolved on first access; combine with
///   `token = TOKEN` to defer a token lookup
/// - `#[inject(default)]`: not injected, `Default::default()`
///
/// Struct-level `#[injectable(...)]` sets the scope and the lifecycle hooks
/// the type implements.
///
/// # Example
/// ```ignore
/// use tessera::{DeriveInjectable, Lazy};
///
/// #[derive(DeriveInjectable)]
/// #[injectable(scope = "transient", on_module_init)]
/// pub struct UserService {
///     repository: Arc<UserRepository>,
///     #[inject(token = DATABASE_URL)]
///     url: Arc<String>,
///     audit: Lazy<AuditService>,
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(injectable, inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable(input)
}

/// Attribute macro declaring a module
///
/// Bare type paths are module types in `imports` and injectable types in
/// `providers` and `exports`; any other expression is converted with `From`,
/// so tokens are exported as `&TOKEN` and providers can be built inline.
///
/// # Example
/// ```ignore
/// use tessera::module;
///
/// #[module(
///     imports = [DatabaseModule, ConfigModule::register(options)],
///     providers = [UserService, Provider::value(&PAGE_SIZE, 20usize)],
///     exports = [UserService, &PAGE_SIZE],
/// )]
/// pub struct UserModule;
///
/// #[module(global, providers = [Clock], exports = [Clock])]
/// pub struct CommonModule;
/// ```
#[proc_macro_attribute]
pub fn module(attr: TokenStream, item: TokenStream) -> TokenStream {
    module::module_attribute(attr, item)
}
