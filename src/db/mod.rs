pub mod migrations;
pub mod queries;

use std::time::Duration;

use anyhow::Context;
use rusqlite::Connection;

pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {path}"))?;

    // Foreign keys are off by default per connection in SQLite.
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;
    conn.busy_timeout(Duration::from_secs(5))
        .context("failed to set busy timeout")?;

    migrations::run_migrations(&conn)?;
    tracing::debug!(path, "database ready");

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_keys_enforced() {
        let conn = init_db(":memory:").unwrap();
        let result = conn.execute(
            "INSERT INTO bookings (id, user_id, service_type, date_time, zip_code)
             VALUES ('bk1', 'missing-user', 'manicure', '2025-06-16 10:00:00', '10001')",
            [],
        );
        assert!(result.is_err());
    }
}
