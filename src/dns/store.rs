//! Record and request-log persistence
//!
//! All multi-step mutations (record write + serial bump) run in a single
//! transaction, so a mutation and its serial increment commit or roll back
//! together. Queries are read-only and never take the writer lock.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::dns::errors::{Result, ZoneError};
use crate::dns::protocol::{DnsRecord, QueryType};
use crate::dns::requests::RequestLogEntry;
use crate::dns::serial::{self, SERIAL_BASELINE};
use crate::dns::validation;

/// The records, request log, and serial row for the playground zone.
pub struct ZoneStore {
    pool: SqlitePool,
}

impl ZoneStore {
    /// Open (or create) the store at `db_url` and ensure the schema exists.
    pub async fn open(db_url: &str) -> Result<ZoneStore> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;

        let store = ZoneStore { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    /// In-memory store, used by tests and local experiments.
    ///
    /// A single connection keeps every caller on the same in-memory database;
    /// the database lives exactly as long as that connection, so idle and
    /// lifetime reaping are disabled to keep the pool from replacing it with
    /// a fresh empty one.
    pub async fn open_in_memory() -> Result<ZoneStore> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = ZoneStore { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dns_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at INTEGER NOT NULL,
                name TEXT NOT NULL,
                rrtype INTEGER NOT NULL,
                content TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_name ON dns_records(name)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_time ON dns_records(created_at)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dns_requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at INTEGER NOT NULL,
                name TEXT NOT NULL,
                request TEXT NOT NULL,
                response TEXT NOT NULL,
                src_ip TEXT NOT NULL,
                src_host TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_requests_name ON dns_requests(name)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_requests_time ON dns_requests(created_at)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE TABLE IF NOT EXISTS dns_serials (serial INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        // seed the singleton serial row exactly once
        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM dns_serials")
            .fetch_one(&self.pool)
            .await?
            .get("n");
        if count == 0 {
            sqlx::query("INSERT INTO dns_serials (serial) VALUES (?)")
                .bind(i64::from(SERIAL_BASELINE))
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// Insert a record owned by `subdomain` and bump the serial, atomically.
    pub async fn insert_record(&self, subdomain: &str, record: &DnsRecord) -> Result<i64> {
        validation::subdomain_error(record.get_domain(), subdomain)?;
        let content = record.to_content()?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO dns_records (created_at, name, rrtype, content) VALUES (?, ?, ?, ?)",
        )
        .bind(Utc::now().timestamp())
        .bind(record.get_domain())
        .bind(i64::from(record.get_querytype().to_num()))
        .bind(&content)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();
        let new_serial = serial::increment(&mut tx).await?;
        tx.commit().await?;

        log::info!(
            "inserted record {} for {} (serial {})",
            id,
            record.get_domain(),
            new_serial
        );
        Ok(id)
    }

    /// Overwrite name, type, and content of record `id`, bumping the serial.
    ///
    /// Fails with `NotFound` if the id does not exist; the serial is left
    /// unchanged in that case.
    pub async fn update_record(
        &self,
        id: i64,
        subdomain: &str,
        record: &DnsRecord,
    ) -> Result<()> {
        validation::subdomain_error(record.get_domain(), subdomain)?;
        let content = record.to_content()?;

        let mut tx = self.pool.begin().await?;
        let result =
            sqlx::query("UPDATE dns_records SET name = ?, rrtype = ?, content = ? WHERE id = ?")
                .bind(record.get_domain())
                .bind(i64::from(record.get_querytype().to_num()))
                .bind(&content)
                .bind(id)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(ZoneError::NotFound(id));
        }

        serial::increment(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Delete record `id`, bumping the serial. `NotFound` if it does not
    /// exist, with the serial untouched.
    pub async fn delete_record(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM dns_records WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ZoneError::NotFound(id));
        }

        serial::increment(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Records matching `name` with the requested type, or CNAME.
    ///
    /// A CNAME at a name pre-empts every other type during resolution, so it
    /// is returned regardless of the requested type. The store only expresses
    /// that preference; CNAME exclusivity is the protocol engine's call.
    pub async fn get_records(&self, name: &str, qtype: QueryType) -> Result<Vec<DnsRecord>> {
        let rows = sqlx::query(
            "SELECT rrtype, content FROM dns_records \
             WHERE name = ? AND (rrtype = ? OR rrtype = 5) ORDER BY id",
        )
        .bind(name)
        .bind(i64::from(qtype.to_num()))
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let rrtype: i64 = row.get("rrtype");
            let content: String = row.get("content");
            records.push(DnsRecord::from_content(rrtype as u16, &content)?);
        }
        Ok(records)
    }

    /// Everything whose name ends with `name`, keyed by id. Used for
    /// administrative listing of all records under a subdomain.
    ///
    /// `%` and `_` in the probe are escaped, so names with SRV-style
    /// underscore labels match literally instead of as LIKE wildcards.
    pub async fn get_records_for_name(&self, name: &str) -> Result<HashMap<i64, DnsRecord>> {
        let escaped = name
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let rows = sqlx::query(
            "SELECT id, rrtype, content FROM dns_records WHERE name LIKE ? ESCAPE '\\'",
        )
        .bind(format!("%{}", escaped))
        .fetch_all(&self.pool)
        .await?;

        let mut records = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("id");
            let rrtype: i64 = row.get("rrtype");
            let content: String = row.get("content");
            records.insert(id, DnsRecord::from_content(rrtype as u16, &content)?);
        }
        Ok(records)
    }

    /// Current SOA serial.
    pub async fn get_serial(&self) -> Result<u32> {
        serial::read(&self.pool).await
    }

    /// Persist one served query/response pair under its owner label.
    pub(crate) async fn insert_request(
        &self,
        subdomain: &str,
        request: &str,
        response: &str,
        src_ip: &str,
        src_host: &str,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO dns_requests (created_at, name, request, response, src_ip, src_host) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Utc::now().timestamp())
        .bind(subdomain)
        .bind(request)
        .bind(response)
        .bind(src_ip)
        .bind(src_host)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Logged requests for a subdomain, newest first.
    pub async fn get_requests(&self, subdomain: &str) -> Result<Vec<RequestLogEntry>> {
        let rows = sqlx::query(
            "SELECT id, created_at, request, response, src_ip, src_host \
             FROM dns_requests WHERE name = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(subdomain)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(RequestLogEntry {
                id: row.get("id"),
                created_at: row.get("created_at"),
                request: row.get("request"),
                response: row.get("response"),
                src_ip: row.get("src_ip"),
                src_host: row.get("src_host"),
            });
        }
        Ok(entries)
    }

    /// Drop every logged request for a subdomain, e.g. when it is released.
    pub async fn delete_requests_for_domain(&self, subdomain: &str) -> Result<()> {
        sqlx::query("DELETE FROM dns_requests WHERE name = ?")
            .bind(subdomain)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete records older than `max_age`. Maintenance only: deliberately
    /// not paired with a serial bump, since it is a cleanup rather than a
    /// zone-semantic mutation.
    pub async fn delete_old_records(&self, max_age: Duration) -> Result<u64> {
        let cutoff = Utc::now().timestamp() - max_age.as_secs() as i64;
        let result = sqlx::query("DELETE FROM dns_records WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete logged requests older than `max_age`. The bounded window keeps
    /// the delete short even on a large table.
    pub async fn delete_old_requests(&self, max_age: Duration) -> Result<u64> {
        let cutoff = Utc::now().timestamp() - max_age.as_secs() as i64;
        let result = sqlx::query("DELETE FROM dns_requests WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::protocol::TransientTtl;
    use crate::dns::serial::SERIAL_BASELINE;
    use std::sync::Arc;

    fn a_record(domain: &str) -> DnsRecord {
        DnsRecord::A {
            domain: domain.to_string(),
            addr: "203.0.113.7".parse().unwrap(),
            ttl: TransientTtl(3600),
        }
    }

    #[tokio::test]
    async fn test_insert_bumps_serial() {
        let store = ZoneStore::open_in_memory().await.unwrap();
        assert_eq!(store.get_serial().await.unwrap(), SERIAL_BASELINE);

        store
            .insert_record("test", &a_record("a.test.messwithdns.net."))
            .await
            .unwrap();
        assert_eq!(store.get_serial().await.unwrap(), SERIAL_BASELINE + 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_unowned_name() {
        let store = ZoneStore::open_in_memory().await.unwrap();
        let err = store
            .insert_record("other", &a_record("a.test.messwithdns.net."))
            .await
            .unwrap_err();
        assert!(matches!(err, ZoneError::Validation(_)));
        assert_eq!(store.get_serial().await.unwrap(), SERIAL_BASELINE);
    }

    #[tokio::test]
    async fn test_update_rewrites_record() {
        let store = ZoneStore::open_in_memory().await.unwrap();
        let id = store
            .insert_record("test", &a_record("a.test.messwithdns.net."))
            .await
            .unwrap();

        let replacement = DnsRecord::Txt {
            domain: "b.test.messwithdns.net.".to_string(),
            data: "updated".to_string(),
            ttl: TransientTtl(60),
        };
        store.update_record(id, "test", &replacement).await.unwrap();

        let records = store
            .get_records("b.test.messwithdns.net.", QueryType::Txt)
            .await
            .unwrap();
        assert_eq!(records, vec![replacement]);
        assert_eq!(store.get_serial().await.unwrap(), SERIAL_BASELINE + 2);
    }

    #[tokio::test]
    async fn test_update_missing_id() {
        let store = ZoneStore::open_in_memory().await.unwrap();
        let err = store
            .update_record(42, "test", &a_record("a.test.messwithdns.net."))
            .await
            .unwrap_err();
        assert!(matches!(err, ZoneError::NotFound(42)));
        assert_eq!(store.get_serial().await.unwrap(), SERIAL_BASELINE);
    }

    #[tokio::test]
    async fn test_delete_missing_id_leaves_serial() {
        let store = ZoneStore::open_in_memory().await.unwrap();
        store
            .insert_record("test", &a_record("a.test.messwithdns.net."))
            .await
            .unwrap();
        let serial = store.get_serial().await.unwrap();

        let err = store.delete_record(9999).await.unwrap_err();
        assert!(matches!(err, ZoneError::NotFound(9999)));
        assert_eq!(store.get_serial().await.unwrap(), serial);
    }

    #[tokio::test]
    async fn test_delete_record() {
        let store = ZoneStore::open_in_memory().await.unwrap();
        let id = store
            .insert_record("test", &a_record("a.test.messwithdns.net."))
            .await
            .unwrap();

        store.delete_record(id).await.unwrap();
        assert_eq!(store.get_serial().await.unwrap(), SERIAL_BASELINE + 2);
        assert!(store
            .get_records("a.test.messwithdns.net.", QueryType::A)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_cname_returned_regardless_of_qtype() {
        let store = ZoneStore::open_in_memory().await.unwrap();
        let cname = DnsRecord::Cname {
            domain: "a.test.messwithdns.net.".to_string(),
            host: "test.messwithdns.net.".to_string(),
            ttl: TransientTtl(300),
        };
        store.insert_record("test", &cname).await.unwrap();

        let records = store
            .get_records("a.test.messwithdns.net.", QueryType::A)
            .await
            .unwrap();
        assert_eq!(records, vec![cname]);
    }

    #[tokio::test]
    async fn test_suffix_listing() {
        let store = ZoneStore::open_in_memory().await.unwrap();
        let id_a = store
            .insert_record("test", &a_record("a.test.messwithdns.net."))
            .await
            .unwrap();
        let id_b = store
            .insert_record("test", &a_record("b.a.test.messwithdns.net."))
            .await
            .unwrap();
        store
            .insert_record("unrelated", &a_record("x.unrelated.messwithdns.net."))
            .await
            .unwrap();

        let records = store
            .get_records_for_name("test.messwithdns.net.")
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.contains_key(&id_a));
        assert!(records.contains_key(&id_b));
    }

    #[tokio::test]
    async fn test_suffix_listing_underscores_match_literally() {
        let store = ZoneStore::open_in_memory().await.unwrap();
        let srv = DnsRecord::Srv {
            domain: "_sip._tcp.test.messwithdns.net.".to_string(),
            priority: 0,
            weight: 5,
            port: 5060,
            host: "sip.test.messwithdns.net.".to_string(),
            ttl: TransientTtl(300),
        };
        let srv_id = store.insert_record("test", &srv).await.unwrap();
        // would match a probe whose underscore acted as a wildcard
        store
            .insert_record("test", &a_record("a.xtcp.test.messwithdns.net."))
            .await
            .unwrap();

        let records = store
            .get_records_for_name("_tcp.test.messwithdns.net.")
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records.get(&srv_id), Some(&srv));
    }

    #[tokio::test]
    async fn test_concurrent_mutations_serialize() {
        let store = Arc::new(ZoneStore::open_in_memory().await.unwrap());

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .insert_record(
                        "test",
                        &a_record(&format!("h{}.test.messwithdns.net.", i)),
                    )
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get_serial().await.unwrap(), SERIAL_BASELINE + 10);
    }

    #[tokio::test]
    async fn test_retention_only_removes_old_rows() {
        let store = ZoneStore::open_in_memory().await.unwrap();
        let old_id = store
            .insert_record("test", &a_record("old.test.messwithdns.net."))
            .await
            .unwrap();
        store
            .insert_record("test", &a_record("new.test.messwithdns.net."))
            .await
            .unwrap();

        // backdate one row past the retention window
        let eight_days_ago = Utc::now().timestamp() - 8 * 24 * 3600;
        sqlx::query("UPDATE dns_records SET created_at = ? WHERE id = ?")
            .bind(eight_days_ago)
            .bind(old_id)
            .execute(&store.pool)
            .await
            .unwrap();

        let removed = store
            .delete_old_records(Duration::from_secs(7 * 24 * 3600))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let remaining = store.get_records_for_name("messwithdns.net.").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(!remaining.contains_key(&old_id));
    }

    #[tokio::test]
    async fn test_request_retention_only_removes_old_rows() {
        let store = ZoneStore::open_in_memory().await.unwrap();
        let old_id = store
            .insert_request("test", "{\"q\":1}", "{\"r\":1}", "192.0.2.1", "")
            .await
            .unwrap();
        store
            .insert_request("test", "{\"q\":2}", "{\"r\":2}", "192.0.2.2", "")
            .await
            .unwrap();

        // backdate one row past the retention window
        let two_days_ago = Utc::now().timestamp() - 2 * 24 * 3600;
        sqlx::query("UPDATE dns_requests SET created_at = ? WHERE id = ?")
            .bind(two_days_ago)
            .bind(old_id)
            .execute(&store.pool)
            .await
            .unwrap();

        let removed = store
            .delete_old_requests(Duration::from_secs(24 * 3600))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let entries = store.get_requests("test").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].request, "{\"q\":2}");
    }

    #[tokio::test]
    async fn test_request_log_roundtrip() {
        let store = ZoneStore::open_in_memory().await.unwrap();
        store
            .insert_request("test", "{\"q\":1}", "{\"r\":1}", "192.0.2.1", "host1.example.")
            .await
            .unwrap();
        store
            .insert_request("test", "{\"q\":2}", "{\"r\":2}", "192.0.2.2", "host2.example.")
            .await
            .unwrap();
        store
            .insert_request("other", "{\"q\":3}", "{\"r\":3}", "192.0.2.3", "")
            .await
            .unwrap();

        let entries = store.get_requests("test").await.unwrap();
        assert_eq!(entries.len(), 2);
        // newest first
        assert_eq!(entries[0].request, "{\"q\":2}");
        assert_eq!(entries[0].src_ip, "192.0.2.2");
        assert_eq!(entries[1].request, "{\"q\":1}");

        store.delete_requests_for_domain("test").await.unwrap();
        assert!(store.get_requests("test").await.unwrap().is_empty());
        assert_eq!(store.get_requests("other").await.unwrap().len(), 1);
    }
}
