//! Module graph scenarios driven through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use tessera::prelude::*;
use tessera::Container;
use tessera::TesseraError;

async fn start(root: ModuleImport) -> tessera::Result<Application> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Application::builder(root).start().await
}

mod shared_import {
    use super::*;

    #[derive(Injectable)]
    pub struct Shared;

    #[module(providers = [Shared], exports = [Shared])]
    pub struct SharedModule;

    #[derive(Injectable)]
    pub struct Left {
        pub shared: Arc<Shared>,
    }

    #[module(imports = [SharedModule], providers = [Left], exports = [Left])]
    pub struct LeftModule;

    #[derive(Injectable)]
    pub struct Right {
        pub shared: Arc<Shared>,
    }

    #[module(imports = [SharedModule], providers = [Right], exports = [Right])]
    pub struct RightModule;

    #[module(imports = [LeftModule, RightModule, SharedModule])]
    pub struct AppModule;
}

#[tokio::test]
async fn test_module_imported_twice_is_registered_once() {
    use shared_import::*;

    let app = start(AppModule::import()).await.unwrap();

    let shared = app
        .container()
        .modules()
        .into_iter()
        .filter(|m| m.name() == "SharedModule")
        .count();
    assert_eq!(shared, 1);
    assert_eq!(app.container().modules().len(), 4);

    let left = app.get::<Left>().unwrap();
    let right = app.get::<Right>().unwrap();
    assert!(Arc::ptr_eq(&left.shared, &right.shared));
}

mod global_scope {
    use super::*;

    pub static BUILT: AtomicUsize = AtomicUsize::new(0);

    pub struct Clock;

    impl Injectable for Clock {
        fn inject(_: &Resolver<'_>) -> tessera::Result<Self> {
            BUILT.fetch_add(1, Ordering::SeqCst);
            Ok(Clock)
        }
    }

    #[module(global, providers = [Clock], exports = [Clock])]
    pub struct CommonModule;

    #[derive(Injectable)]
    pub struct Billing {
        pub clock: Arc<Clock>,
    }

    #[module(providers = [Billing], exports = [Billing])]
    pub struct BillingModule;

    #[derive(Injectable)]
    pub struct Shipping {
        pub clock: Arc<Clock>,
    }

    #[module(providers = [Shipping], exports = [Shipping])]
    pub struct ShippingModule;

    #[module(imports = [CommonModule, BillingModule, ShippingModule])]
    pub struct AppModule;
}

#[tokio::test]
async fn test_global_provider_is_one_instance_in_every_branch() {
    use global_scope::*;

    let app = start(AppModule::import()).await.unwrap();

    let billing = app.get::<Billing>().unwrap();
    let shipping = app.get::<Shipping>().unwrap();
    assert!(Arc::ptr_eq(&billing.clock, &shipping.clock));
    assert_eq!(BUILT.load(Ordering::SeqCst), 1);
    assert_eq!(app.container().global_modules().len(), 1);
}

mod reexport {
    use super::*;

    #[derive(Injectable)]
    pub struct Mailer;

    #[module(providers = [Mailer], exports = [Mailer])]
    pub struct MailModule;

    #[module(imports = [MailModule], exports = [MailModule])]
    pub struct NotifyModule;

    #[derive(Injectable)]
    pub struct Signup {
        pub mailer: Arc<Mailer>,
    }

    #[module(imports = [NotifyModule], providers = [Signup])]
    pub struct AppModule;
}

#[tokio::test]
async fn test_reexported_module_exposes_its_exports() {
    use reexport::*;

    let app = start(AppModule::import()).await.unwrap();

    let signup = app.select::<AppModule>().get::<Signup>().unwrap();
    let mailer = app.select::<MailModule>().get::<Mailer>().unwrap();
    assert!(Arc::ptr_eq(&signup.mailer, &mailer));
    assert!(app.select::<NotifyModule>().has(Token::of::<Mailer>()));
}

mod private_provider {
    use super::*;

    #[derive(Injectable)]
    pub struct Secret;

    #[module(providers = [Secret])]
    pub struct VaultModule;

    #[derive(Injectable)]
    pub struct Consumer {
        pub secret: Arc<Secret>,
    }

    #[module(imports = [VaultModule], providers = [Consumer])]
    pub struct AppModule;
}

#[tokio::test]
async fn test_unexported_provider_is_not_visible_to_importers() {
    use private_provider::*;

    let err = start(AppModule::import()).await.err().unwrap();
    assert!(matches!(err, TesseraError::UnknownProvider { .. }), "{err}");
}

mod leaky_export {
    use super::*;

    #[derive(Injectable)]
    pub struct Elsewhere;

    #[module(exports = [Elsewhere])]
    pub struct LeakyModule;

    #[module(imports = [LeakyModule])]
    pub struct AppModule;
}

#[tokio::test]
async fn test_export_without_provider_fails_at_start() {
    use leaky_export::*;

    let err = start(AppModule::import()).await.err().unwrap();
    match err {
        TesseraError::UnknownExport { module, export } => {
            assert_eq!(module, "LeakyModule");
            assert_eq!(export, "Elsewhere");
        }
        other => panic!("unexpected error: {other}"),
    }
}

mod multi_bind {
    use super::*;

    pub const PLUGINS: InjectionToken<&'static str> = InjectionToken::new("PLUGINS");

    #[module(
        providers = [
            Provider::value(&PLUGINS, "x").multi(),
            Provider::value(&PLUGINS, "y").multi(),
            Provider::factory(&PLUGINS, |_| Ok("z")).multi(),
        ],
        exports = [&PLUGINS],
    )]
    pub struct PluginModule;

    #[derive(Injectable)]
    pub struct Registry {
        #[inject(all = PLUGINS)]
        pub plugins: Vec<Arc<&'static str>>,
    }

    #[module(imports = [PluginModule], providers = [Registry])]
    pub struct AppModule;
}

#[tokio::test]
async fn test_multi_bindings_keep_declaration_order() {
    use multi_bind::*;

    let app = start(AppModule::import()).await.unwrap();

    let values: Vec<&str> = app
        .get_all(&PLUGINS)
        .unwrap()
        .iter()
        .map(|v| **v)
        .collect();
    assert_eq!(values, ["x", "y", "z"]);

    let registry = app.get::<Registry>().unwrap();
    let injected: Vec<&str> = registry.plugins.iter().map(|v| **v).collect();
    assert_eq!(injected, ["x", "y", "z"]);
}

mod conflicting {
    use super::*;

    pub const PORT: InjectionToken<u16> = InjectionToken::new("PORT");

    #[module(providers = [Provider::value(&PORT, 8080u16)])]
    pub struct HttpModule;

    #[module(providers = [Provider::value(&PORT, 9090u16)])]
    pub struct AdminModule;

    #[module(imports = [HttpModule, AdminModule])]
    pub struct AppModule;
}

#[tokio::test]
async fn test_token_bound_twice_without_multi_is_rejected() {
    use conflicting::*;

    let err = start(AppModule::import()).await.err().unwrap();
    assert!(
        matches!(err, TesseraError::MultipleProviders { ref token } if token.contains("PORT")),
        "{err}"
    );
}

mod construction_cycle {
    use super::*;

    #[derive(Injectable)]
    pub struct Chicken {
        pub egg: Arc<Egg>,
    }

    #[derive(Injectable)]
    pub struct Egg {
        pub chicken: Arc<Chicken>,
    }

    #[module(providers = [Chicken, Egg])]
    pub struct FarmModule;
}

#[tokio::test]
async fn test_immediate_cycle_is_detected_before_construction() {
    use construction_cycle::*;

    let err = start(FarmModule::import()).await.err().unwrap();
    match err {
        TesseraError::CircularDependency { cycle } => {
            assert!(cycle.contains("Chicken"), "{cycle}");
            assert!(cycle.contains("Egg"), "{cycle}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

mod forward_refs {
    use super::*;

    #[derive(Injectable)]
    pub struct Orders {
        pub invoices: Lazy<Invoices>,
    }

    #[derive(Injectable)]
    pub struct Invoices {
        pub orders: Lazy<Orders>,
    }

    #[module(providers = [Orders, Invoices], exports = [Orders])]
    pub struct SalesModule;
}

#[tokio::test]
async fn test_lazy_references_resolve_mutual_dependencies() {
    use forward_refs::*;

    let app = start(SalesModule::import()).await.unwrap();

    let orders = app.get::<Orders>().unwrap();
    assert!(!orders.invoices.is_resolved());

    let invoices = orders.invoices.get().unwrap();
    let back = invoices.orders.get().unwrap();
    assert!(Arc::ptr_eq(&orders, &back));
    assert!(orders.invoices.is_resolved());
}

mod factories {
    use super::*;

    pub static CALLS: AtomicUsize = AtomicUsize::new(0);
    pub const BASE_URL: InjectionToken<String> = InjectionToken::new("BASE_URL");
    pub const ENDPOINT: InjectionToken<String> = InjectionToken::new("ENDPOINT");

    pub static STAMPS: AtomicUsize = AtomicUsize::new(0);
    pub const STAMP: InjectionToken<usize> = InjectionToken::new("STAMP");

    fn endpoint(deps: &Deps) -> tessera::Result<String> {
        CALLS.fetch_add(1, Ordering::SeqCst);
        let base = deps.get::<String>(0)?;
        Ok(format!("{base}/users"))
    }

    #[module(providers = [
        Provider::value(&BASE_URL, "http://api".to_string()),
        Provider::factory(&ENDPOINT, endpoint).deps([&BASE_URL]),
        Provider::factory(&STAMP, |_| Ok(STAMPS.fetch_add(1, Ordering::SeqCst))).scope(Scope::Transient),
    ])]
    pub struct ApiModule;
}

#[tokio::test]
async fn test_singleton_factory_runs_once() {
    use factories::*;

    let app = start(ApiModule::import()).await.unwrap();

    let first = app.get_token(&ENDPOINT).unwrap();
    let second = app.get_token(&ENDPOINT).unwrap();
    assert_eq!(first.as_str(), "http://api/users");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transient_factory_runs_per_lookup() {
    use factories::*;

    let app = start(ApiModule::import()).await.unwrap();

    let first = app.get_token(&STAMP).unwrap();
    let second = app.get_token(&STAMP).unwrap();
    assert_ne!(*first, *second);
    assert_eq!(STAMPS.load(Ordering::SeqCst), 2);
}

mod scopes {
    use super::*;

    #[derive(Injectable)]
    #[injectable(scope = "transient")]
    pub struct Draft;

    #[derive(Injectable)]
    pub struct MemoryStore;

    pub const STORE: InjectionToken<MemoryStore> = InjectionToken::new("STORE");
    pub const CACHE: InjectionToken<MemoryStore> = InjectionToken::new("CACHE");

    #[module(providers = [
        Draft,
        Provider::class::<MemoryStore>(&STORE),
        Provider::existing(&CACHE, &STORE),
    ])]
    pub struct StoreModule;
}

#[tokio::test]
async fn test_transient_class_and_alias_providers() {
    use scopes::*;

    let app = start(StoreModule::import()).await.unwrap();

    let a = app.get::<Draft>().unwrap();
    let b = app.get::<Draft>().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));

    let store = app.get_token(&STORE).unwrap();
    let cache = app.get_token(&CACHE).unwrap();
    assert!(Arc::ptr_eq(&store, &cache));
    assert!(!app.has(Token::of::<MemoryStore>()));
}

mod dynamic {
    use super::*;

    pub const DSN: InjectionToken<String> = InjectionToken::new("DSN");

    #[module]
    pub struct DbModule;

    impl DbModule {
        pub fn register(dsn: &str) -> DynamicModule {
            DynamicModule::new::<DbModule>(
                ModuleMetadata::new()
                    .providers([Provider::value(&DSN, dsn.to_string())])
                    .exports([&DSN]),
            )
            .with_options(&dsn)
            .unwrap()
        }
    }

    #[derive(Injectable)]
    pub struct Reports {
        #[inject(token = DSN)]
        pub dsn: Arc<String>,
    }

    #[module(imports = [DbModule::register("postgres://main")], providers = [Reports], exports = [Reports])]
    pub struct ReportsModule;

    #[derive(Injectable)]
    pub struct Accounts {
        #[inject(token = DSN)]
        pub dsn: Arc<String>,
    }

    #[module(imports = [DbModule::register("postgres://main")], providers = [Accounts], exports = [Accounts])]
    pub struct AccountsModule;

    #[module(imports = [ReportsModule, AccountsModule])]
    pub struct AppModule;
}

#[tokio::test]
async fn test_equal_dynamic_modules_collapse_into_one() -> anyhow::Result<()> {
    use dynamic::*;

    let app = start(AppModule::import()).await?;

    let instances = app
        .container()
        .modules()
        .into_iter()
        .filter(|m| m.name() == "DbModule")
        .count();
    assert_eq!(instances, 1);

    let reports = app.get::<Reports>()?;
    let accounts = app.get::<Accounts>()?;
    assert!(Arc::ptr_eq(&reports.dsn, &accounts.dsn));
    Ok(())
}

#[tokio::test]
async fn test_dynamic_modules_with_different_options_stay_apart() {
    let first = dynamic::DbModule::register("postgres://a");
    let second = dynamic::DbModule::register("postgres://b");
    let container = Container::new();

    let a = container.add_module(&first.into(), &[]).await.unwrap();
    let b = container.add_module(&second.into(), &[]).await.unwrap();
    assert_ne!(a, b);
}

mod spread_multi_bind {
    use super::*;

    pub const HANDLERS: InjectionToken<&'static str> = InjectionToken::new("HANDLERS");

    #[module(providers = [Provider::value(&HANDLERS, "audit").multi()])]
    pub struct AuditHandlers;

    #[module(
        providers = [Provider::value(&HANDLERS, "billing").multi()],
        exports = [&HANDLERS],
    )]
    pub struct BillingHandlers;

    #[module(imports = [AuditHandlers, BillingHandlers])]
    pub struct AppModule;
}

#[tokio::test]
async fn test_get_all_concatenates_bindings_of_every_module() {
    use spread_multi_bind::*;

    let app = start(AppModule::import()).await.unwrap();

    let values: Vec<&str> = app
        .get_all(&HANDLERS)
        .unwrap()
        .iter()
        .map(|v| **v)
        .collect();
    // the export into AppModule is not counted a second time
    assert_eq!(values, ["audit", "billing"]);

    let selected = app.select::<AppModule>().get_all(&HANDLERS).unwrap();
    assert_eq!(selected.len(), 1);
    assert_eq!(*selected[0], "billing");
}

mod dangling_lazy {
    use super::*;

    #[derive(Injectable)]
    pub struct Missing;

    #[derive(Injectable)]
    pub struct Holder {
        pub missing: Lazy<Missing>,
    }

    #[module(providers = [Holder])]
    pub struct HolderModule;
}

#[tokio::test]
async fn test_lazy_reference_to_unbound_provider_fails_at_start() {
    use dangling_lazy::*;

    let err = start(HolderModule::import()).await.err().unwrap();
    match err {
        TesseraError::UnknownProvider { token, module } => {
            assert!(token.contains("Missing"), "{token}");
            assert!(module.contains("HolderModule"), "{module}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

mod token_reexport {
    use super::*;

    #[derive(Injectable)]
    pub struct Payments;

    #[module(providers = [Payments], exports = [Payments])]
    pub struct GatewayModule;

    #[module(imports = [GatewayModule], exports = [Payments])]
    pub struct CheckoutModule;

    #[derive(Injectable)]
    pub struct Cart {
        pub payments: Arc<Payments>,
    }

    #[module(imports = [CheckoutModule], providers = [Cart])]
    pub struct StoreModule;
}

#[tokio::test]
async fn test_provider_reexported_by_token_reaches_importers() {
    use token_reexport::*;

    let app = start(StoreModule::import()).await.unwrap();

    let cart = app.select::<StoreModule>().get::<Cart>().unwrap();
    let payments = app.select::<GatewayModule>().get::<Payments>().unwrap();
    assert!(Arc::ptr_eq(&cart.payments, &payments));
}

mod broken_reexport {
    use super::*;

    #[derive(Injectable)]
    pub struct Payments;

    #[module(providers = [Payments])]
    pub struct GatewayModule;

    #[module(imports = [GatewayModule], exports = [Payments])]
    pub struct CheckoutModule;

    #[module(imports = [CheckoutModule])]
    pub struct StoreModule;
}

#[tokio::test]
async fn test_reexport_of_unexported_provider_names_the_reexporter() {
    use broken_reexport::*;

    let err = start(StoreModule::import()).await.err().unwrap();
    match err {
        TesseraError::UnknownExport { module, export } => {
            assert_eq!(module, "CheckoutModule");
            assert_eq!(export, "Payments");
        }
        other => panic!("unexpected error: {other}"),
    }
}
