//! Database Test Utilities
//!
//! PostgreSQL tests run only when `TEST_DATABASE_URL` points at a database
//! the suite may migrate. Without it the helpers return `None` and the test
//! returns early, so the default test run needs no running server.
//!
//! Tests share one database and isolate themselves by creating their own
//! user; every table hangs off `users`, so rows never collide.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::OnceCell;

use core_kernel::UserId;
use infra_db::run_migrations;

/// Environment variable holding the test database URL
pub const TEST_DATABASE_URL: &str = "TEST_DATABASE_URL";

/// A migrated test database
pub struct TestDatabase {
    pub url: String,
    pub pool: PgPool,
}

impl TestDatabase {
    /// Connects to `url` and applies the migrations
    pub async fn connect(url: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(url)
            .await?;
        run_migrations(&pool).await?;
        Ok(Self {
            url: url.to_string(),
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Removes every row while keeping the schema
    ///
    /// Not safe while other tests are using the same database.
    pub async fn clear_data(&self) -> Result<(), sqlx::Error> {
        sqlx::query("TRUNCATE TABLE payments, invoice_items, invoices, recurring_invoices, clients, users CASCADE")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

static SHARED_TEST_DB: OnceCell<Option<Arc<TestDatabase>>> = OnceCell::const_new();

/// The shared test database, or `None` when `TEST_DATABASE_URL` is unset
///
/// # Panics
///
/// Panics if the variable is set but the database cannot be reached or migrated
pub async fn test_database() -> Option<Arc<TestDatabase>> {
    SHARED_TEST_DB
        .get_or_init(|| async {
            let url = std::env::var(TEST_DATABASE_URL).ok()?;
            let db = TestDatabase::connect(&url)
                .await
                .unwrap_or_else(|err| panic!("Failed to prepare test database at {}: {}", url, err));
            Some(Arc::new(db))
        })
        .await
        .clone()
}

/// An email address no other test run will use
pub fn unique_email(prefix: &str) -> String {
    format!("{}+{}@studio.test", prefix, UserId::new_v7())
}

/// Runs the body only when a test database is configured
#[macro_export]
macro_rules! with_test_database {
    ($db:ident => $body:block) => {
        let Some($db) = $crate::database::test_database().await else {
            eprintln!("skipping: {} is not set", $crate::database::TEST_DATABASE_URL);
            return;
        };
        $body
    };
}
