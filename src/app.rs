//! Application wiring: store, module registry, router and lifecycle.

use anyhow::Context;
use axum::Router;
use bookswap_db::Database;
use bookswap_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules;
use crate::state::AppState;

/// Open the configured SQLite database.
pub fn open_database(settings: &Settings) -> anyhow::Result<Database> {
    Database::open(&settings.database.path)
        .with_context(|| format!("failed to open database '{}'", settings.database.path))
}

/// Registry holding every application module, bound to `state`.
pub fn build_registry(state: &AppState) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, state);
    tracing::debug!(
        core = registry.core_module_count(),
        custom = registry.custom_module_count(),
        "modules registered"
    );
    registry
}

/// Migrate `state`'s database and build the full HTTP router over it.
pub fn build_router(state: &AppState, settings: &Settings) -> anyhow::Result<Router> {
    let registry = build_registry(state);
    registry.apply_migrations(&state.db)?;
    Ok(bookswap_http::build_router(&registry, settings))
}

/// Apply pending migrations and return how many ran.
pub fn migrate(settings: &Settings) -> anyhow::Result<usize> {
    let db = open_database(settings)?;
    let state = AppState::new(db, settings);
    build_registry(&state).apply_migrations(&state.db)
}

/// Run the service until Ctrl-C.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let db = open_database(&settings)?;
    let state = AppState::new(db.clone(), &settings);
    let registry = build_registry(&state);

    registry.apply_migrations(&db)?;

    let ctx = InitCtx {
        settings: &settings,
        db: &db,
    };
    registry.init_core_modules(&ctx).await?;
    registry.init_custom_modules(&ctx).await?;
    registry.start_core_modules(&ctx).await?;
    registry.start_custom_modules(&ctx).await?;

    let served = bookswap_http::start_server(&registry, &settings).await;

    registry.stop_custom_modules().await?;
    registry.stop_core_modules().await?;

    served
}
