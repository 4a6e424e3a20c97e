//! App Context

use std::sync::Arc;

use thiserror::Error;

use crate::{
    database::{self, Db},
    domain::{
        discounts::{
            DiscountsService, PgDiscountsService,
            memory::MemoryDiscountsService,
            notifications::{NotificationSink, TracingSink},
        },
        users::{PgUsersService, UsersService},
    },
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to connect to database")]
    Database(#[source] sqlx::Error),
}

#[derive(Clone)]
pub struct AppContext {
    pub users: Arc<dyn UsersService>,
    pub discounts: Arc<dyn DiscountsService>,
}

impl AppContext {
    /// Build application context from a database URL, logging notifications.
    ///
    /// # Errors
    ///
    /// Returns an error when establishing a database connection fails.
    pub async fn from_database_url(url: &str) -> Result<Self, AppInitError> {
        let pool = database::connect(url)
            .await
            .map_err(AppInitError::Database)?;

        Ok(Self::from_db(Db::new(pool), Arc::new(TracingSink)))
    }

    /// Services backed by `PostgreSQL`.
    #[must_use]
    pub fn from_db(db: Db, notifications: Arc<dyn NotificationSink>) -> Self {
        Self {
            users: Arc::new(PgUsersService::new(db.clone())),
            discounts: Arc::new(PgDiscountsService::new(db, notifications)),
        }
    }

    /// Services backed by one shared in-memory ledger.
    #[must_use]
    pub fn in_memory(notifications: Arc<dyn NotificationSink>) -> Self {
        let ledger = MemoryDiscountsService::new(notifications);

        Self {
            users: Arc::new(ledger.clone()),
            discounts: Arc::new(ledger),
        }
    }
}
