//! Database Config

use clap::Args;

/// Database settings.
#[derive(Debug, Args)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true, global = true)]
    pub database_url: Option<String>,
}

impl DatabaseConfig {
    /// The configured URL.
    ///
    /// # Errors
    ///
    /// Returns a message when neither `--database-url` nor `DATABASE_URL` is set.
    pub fn url(&self) -> Result<&str, String> {
        self.database_url
            .as_deref()
            .ok_or_else(|| "missing --database-url (or DATABASE_URL)".to_string())
    }
}
