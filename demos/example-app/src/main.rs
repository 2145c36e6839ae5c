use std::time::Duration;
use tessera::prelude::*;

mod app_module;
mod infrastructure;
mod modules;

use app_module::AppModule;
use infrastructure::database::Database;
use modules::audit::AuditSink;
use modules::user::UserService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    tracing::info!("🚀 Starting example application...");

    let app = Application::builder(AppModule::import())
        .options(ApplicationOptions::from_env())
        .init_timeout(Duration::from_secs(30))
        .destroy_timeout(Duration::from_secs(10))
        .start()
        .await?;

    let users = app.get::<UserService>()?;
    let id = users.create("alice");
    let directory = users.directory()?;
    tracing::info!("Users: {:?}", directory.listing(&[1, 2, id]));

    let database = app.get::<Database>()?;
    tracing::info!("{} rows, page size {}", database.count(), database.page_size());

    let audit = app.select::<modules::audit::AuditModule>().get::<AuditSink>()?;
    for entry in audit.entries() {
        tracing::info!("audit: {}", entry);
    }

    if std::env::var("EXAMPLE_WAIT").is_ok() {
        tracing::info!("✅ Running, press Ctrl+C to stop");
        app.run_until_shutdown().await?;
    } else {
        app.destroy().await?;
    }

    tracing::info!("👋 Bye");
    Ok(())
}
