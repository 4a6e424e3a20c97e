use clap::{Args, Subcommand};
use rebate_app::database;

#[derive(Debug, Args)]
pub(crate) struct DbCommand {
    #[command(subcommand)]
    command: DbSubcommand,
}

#[derive(Debug, Subcommand)]
enum DbSubcommand {
    /// Apply pending schema migrations
    Migrate,
}

pub(crate) async fn run(command: DbCommand, database_url: &str) -> Result<String, String> {
    match command.command {
        DbSubcommand::Migrate => {
            let pool = database::connect(database_url)
                .await
                .map_err(|error| format!("failed to connect to database: {error}"))?;

            database::migrate(&pool)
                .await
                .map_err(|error| format!("failed to apply migrations: {error}"))?;

            Ok("migrations applied".to_string())
        }
    }
}
