use clap::{Parser, Subcommand};
use rebate_app::{
    config::{DatabaseConfig, LoggingConfig},
    context::AppContext,
    observability,
};

mod audit;
mod db;
mod discount;
mod output;
mod user;

#[derive(Debug, Parser)]
#[command(name = "rebate-app", about = "Discount ledger CLI", long_about = None)]
pub(crate) struct Cli {
    #[command(flatten)]
    logging: LoggingConfig,

    #[command(flatten)]
    database: DatabaseConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    User(user::UserCommand),
    Discount(discount::DiscountCommand),
    Audit(audit::AuditCommand),
    Db(db::DbCommand),
}

impl Cli {
    pub(crate) async fn run(self) -> Result<(), String> {
        observability::init_subscriber(&self.logging).map_err(|error| error.to_string())?;

        let database_url = self.database.url()?;

        let output = match self.command {
            Commands::Db(command) => db::run(command, database_url).await?,
            Commands::User(command) => user::run(command, &connect(database_url).await?).await?,
            Commands::Discount(command) => {
                discount::run(command, &connect(database_url).await?).await?
            }
            Commands::Audit(command) => audit::run(command, &connect(database_url).await?).await?,
        };

        println!("{output}");

        Ok(())
    }
}

async fn connect(database_url: &str) -> Result<AppContext, String> {
    AppContext::from_database_url(database_url)
        .await
        .map_err(|error| describe(&error))
}

/// An error followed by its chain of sources, `: ` separated.
pub(crate) fn describe(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}
