//! The zone's SOA serial, kept as a single transactional row
//!
//! DNS consumers expect the serial to increase on every zone change, so the
//! increment happens inside the same transaction as the triggering record
//! mutation: a mutation is never observable without its serial bump, and a
//! rolled-back mutation leaves the serial untouched. Concurrent writers
//! serialize on the store's writer lock and each one reads back the value it
//! produced, so no two mutations ever share a serial.

use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::dns::errors::Result;

/// Serial the singleton row is seeded with when the table is first created.
pub const SERIAL_BASELINE: u32 = 10;

/// Current serial, read outside any mutation.
pub async fn read(pool: &SqlitePool) -> Result<u32> {
    let row = sqlx::query("SELECT serial FROM dns_serials")
        .fetch_one(pool)
        .await?;
    Ok(row.get::<i64, _>("serial") as u32)
}

/// Bump the serial inside the caller's transaction and return the new value.
///
/// Commits and rollbacks are the caller's responsibility; if the enclosing
/// transaction fails, the bump rolls back with it.
pub(crate) async fn increment(tx: &mut Transaction<'_, Sqlite>) -> Result<u32> {
    sqlx::query("UPDATE dns_serials SET serial = serial + 1")
        .execute(&mut **tx)
        .await?;

    let row = sqlx::query("SELECT serial FROM dns_serials")
        .fetch_one(&mut **tx)
        .await?;
    Ok(row.get::<i64, _>("serial") as u32)
}
