//! Price store schema.

use sqlx::SqlitePool;

/// Create the `stock_prices` table and its indexes if they do not exist.
pub async fn initialize_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS stock_prices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticker TEXT NOT NULL,
            price TEXT NOT NULL,
            timestamp TEXT NOT NULL
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_stock_prices_ticker ON stock_prices(ticker)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_stock_prices_timestamp ON stock_prices(timestamp)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
