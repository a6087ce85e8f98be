pub mod from_row;
pub mod queries;
pub mod schema;

use std::time::Duration;

use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::crypto::SiteSecret;
use crate::error::Result;
use crate::events::SharedEventSink;
use crate::rate_limit::RateLimiter;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

/// Shared per-request state. Constructed once at startup and cloned into
/// handlers; no component reaches for globals.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub site_secret: SiteSecret,
    pub rate_limiter: RateLimiter,
    pub events: SharedEventSink,
    pub config: Config,
}

/// Open a pooled SQLite database. Every connection gets WAL mode, enforced
/// foreign keys, and a busy timeout so concurrent IMMEDIATE transactions
/// queue instead of failing with SQLITE_BUSY.
pub fn create_pool(path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        // journal_mode returns the resulting mode as a row
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        Ok(())
    });

    let pool = r2d2::Pool::builder().build(manager)?;

    let conn = pool.get()?;
    schema::init_db(&conn)?;

    Ok(pool)
}
