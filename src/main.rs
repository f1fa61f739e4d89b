use anyhow::Context;
use bookswap_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load BookSwap settings")?;
    bookswap_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.path,
        "bookswap-app starting"
    );

    bookswap_app::run(settings).await
}
