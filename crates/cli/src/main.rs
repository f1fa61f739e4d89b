use anyhow::Context;
use bookswap_kernel::settings::Settings;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "bookswap", version, about = "Run and administer the BookSwap service")]
struct Cli {
    /// SQLite database path, overriding `database.path`
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Migrate, then serve HTTP until Ctrl-C
    Serve,
    /// Apply pending migrations and exit
    Migrate,
    /// Insert demo accounts and books
    Seed {
        #[arg(long, default_value_t = 5)]
        users: usize,
        #[arg(long, default_value_t = 20)]
        books: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load().context("failed to load BookSwap settings")?;
    if let Some(path) = cli.database {
        settings.database.path = path;
    }
    bookswap_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Serve => bookswap_app::run(settings).await,
        Command::Migrate => {
            let applied = bookswap_app::app::migrate(&settings)?;
            tracing::info!(applied, db = %settings.database.path, "migrations complete");
            Ok(())
        }
        Command::Seed { users, books } => {
            let db = bookswap_app::open_database(&settings)?;
            let state = bookswap_app::AppState::new(db, &settings);
            bookswap_app::build_registry(&state).apply_migrations(&state.db)?;

            let report = tokio::task::spawn_blocking(move || {
                bookswap_app::seed::seed(&state.db, users, books)
            })
            .await
            .context("seed task failed")??;

            println!(
                "seeded {} users and {} books (password {})",
                report.users,
                report.books,
                bookswap_app::seed::SEED_PASSWORD
            );
            Ok(())
        }
    }
}
