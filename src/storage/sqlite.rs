//! SQLite implementation of [`SubscriptionStore`]

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::SubscriptionStore;
use crate::models::{
    Item, ItemId, ItemSpec, SubscriberSpec, Subscription, SubscriptionId, SubscriptionStatus,
    SubscriptionView,
};

const ITEM_COLUMNS: &str = "id, url, location_filter, interval_minutes, created_at";

const SUBSCRIPTION_COLUMNS: &str =
    "id, item_id, email, phone_number, status, created_at, status_changed_at";

/// SQLite-backed store
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .context("Failed to configure SQLite journal")?;

        let store = Self::with_connection(conn)?;
        tracing::info!(path = %path.display(), "SQLite store initialized");
        Ok(store)
    }

    /// Create in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .context("Failed to enable foreign keys")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("SQLite connection mutex poisoned"))
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    url TEXT NOT NULL,
                    location_filter TEXT NOT NULL,
                    interval_minutes INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    UNIQUE(url, location_filter, interval_minutes)
                );

                CREATE TABLE IF NOT EXISTS subscriptions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
                    email TEXT NOT NULL,
                    phone_number TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'active',
                    created_at TEXT NOT NULL,
                    status_changed_at TEXT NOT NULL,
                    UNIQUE(item_id, email)
                );

                CREATE INDEX IF NOT EXISTS idx_subscriptions_item_status
                    ON subscriptions(item_id, status);

                CREATE INDEX IF NOT EXISTS idx_subscriptions_email
                    ON subscriptions(email COLLATE NOCASE);
                "#,
        )
        .context("Failed to create SQLite schema")?;

        Ok(())
    }
}

// ============================================================================
// Row mapping
// ============================================================================

impl ToSql for SubscriptionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SubscriptionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        url: row.get(1)?,
        location_filter: row.get(2)?,
        interval_minutes: row.get(3)?,
        created_at: timestamp(row, 4)?,
    })
}

fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        item_id: row.get(1)?,
        email: row.get(2)?,
        phone_number: row.get(3)?,
        status: row.get(4)?,
        created_at: timestamp(row, 5)?,
        status_changed_at: timestamp(row, 6)?,
    })
}

// ============================================================================
// Statements shared by single calls and the registration transaction
// ============================================================================

fn upsert_item_on(conn: &Connection, spec: &ItemSpec) -> Result<Item> {
    let interval = spec.effective_interval();
    let now = now_timestamp();

    conn.execute(
        r#"
            INSERT INTO items (url, location_filter, interval_minutes, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(url, location_filter, interval_minutes) DO NOTHING
            "#,
        params![spec.url, spec.location_filter, interval, now],
    )
    .context("Failed to insert item")?;

    conn.query_row(
        &format!(
            "SELECT {ITEM_COLUMNS} FROM items
             WHERE url = ?1 AND location_filter = ?2 AND interval_minutes = ?3"
        ),
        params![spec.url, spec.location_filter, interval],
        item_from_row,
    )
    .context("Failed to load item after upsert")
}

fn upsert_subscription_on(
    conn: &Connection,
    item_id: ItemId,
    subscriber: &SubscriberSpec,
) -> Result<Subscription> {
    let now = now_timestamp();

    conn.execute(
        r#"
            INSERT INTO subscriptions
                (item_id, email, phone_number, status, created_at, status_changed_at)
            VALUES (?1, ?2, ?3, 'active', ?4, ?4)
            ON CONFLICT(item_id, email) DO UPDATE SET
                phone_number = excluded.phone_number,
                status_changed_at = CASE
                    WHEN subscriptions.status = 'active' THEN subscriptions.status_changed_at
                    ELSE excluded.status_changed_at
                END,
                status = 'active'
            "#,
        params![item_id, subscriber.email, subscriber.phone_number, now],
    )
    .context("Failed to upsert subscription")?;

    conn.query_row(
        &format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE item_id = ?1 AND email = ?2"
        ),
        params![item_id, subscriber.email],
        subscription_from_row,
    )
    .context("Failed to load subscription after upsert")
}

fn get_subscription_on(conn: &Connection, id: SubscriptionId) -> Result<Option<Subscription>> {
    conn.query_row(
        &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?1"),
        params![id],
        subscription_from_row,
    )
    .optional()
    .context("Failed to get subscription")
}

#[async_trait]
impl SubscriptionStore for SqliteStore {
    async fn upsert_item(&self, spec: &ItemSpec) -> Result<Item> {
        let conn = self.conn()?;
        upsert_item_on(&conn, spec)
    }

    async fn upsert_subscription(
        &self,
        item_id: ItemId,
        subscriber: &SubscriberSpec,
    ) -> Result<Subscription> {
        let conn = self.conn()?;
        upsert_subscription_on(&conn, item_id, subscriber)
    }

    async fn register(
        &self,
        item: &ItemSpec,
        subscriber: &SubscriberSpec,
    ) -> Result<(Item, Subscription)> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .context("Failed to begin registration transaction")?;

        let item = upsert_item_on(&tx, item)?;
        let subscription = upsert_subscription_on(&tx, item.id, subscriber)?;

        tx.commit()
            .context("Failed to commit registration transaction")?;

        Ok((item, subscription))
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"),
            params![id],
            item_from_row,
        )
        .optional()
        .context("Failed to get item")
    }

    async fn get_subscription(&self, id: SubscriptionId) -> Result<Option<Subscription>> {
        let conn = self.conn()?;
        get_subscription_on(&conn, id)
    }

    async fn set_subscription_status(
        &self,
        id: SubscriptionId,
        status: SubscriptionStatus,
    ) -> Result<Option<Subscription>> {
        let conn = self.conn()?;
        let now = now_timestamp();

        conn.execute(
            "UPDATE subscriptions SET status = ?1, status_changed_at = ?2
             WHERE id = ?3 AND status != ?1",
            params![status, now, id],
        )
        .context("Failed to update subscription status")?;

        get_subscription_on(&conn, id)
    }

    async fn expire_if_active(&self, id: SubscriptionId) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE subscriptions SET status = 'expired', status_changed_at = ?1
                 WHERE id = ?2 AND status = 'active'",
                params![now_timestamp(), id],
            )
            .context("Failed to expire subscription")?;

        Ok(changed > 0)
    }

    async fn active_subscriptions_for(&self, item_id: ItemId) -> Result<Vec<Subscription>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
                 WHERE item_id = ?1 AND status = 'active'
                 ORDER BY id"
            ))
            .context("Failed to prepare active subscriptions query")?;

        let subscriptions = stmt
            .query_map(params![item_id], subscription_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read active subscriptions")?;

        Ok(subscriptions)
    }

    async fn active_count_for(&self, item_id: ItemId) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM subscriptions WHERE item_id = ?1 AND status = 'active'",
                params![item_id],
                |row| row.get(0),
            )
            .context("Failed to count active subscriptions")?;

        Ok(count as usize)
    }

    async fn items_with_active_subscriptions(&self) -> Result<Vec<Item>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT i.id, i.url, i.location_filter, i.interval_minutes, i.created_at
                 FROM items i
                 WHERE EXISTS (
                     SELECT 1 FROM subscriptions s
                     WHERE s.item_id = i.id AND s.status = 'active'
                 )
                 ORDER BY i.id",
            )
            .context("Failed to prepare active items query")?;

        let items = stmt
            .query_map([], item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read active items")?;

        Ok(items)
    }

    async fn subscriptions_for_email(&self, email: &str) -> Result<Vec<SubscriptionView>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT s.id, s.item_id, s.email, s.phone_number, s.status, s.created_at,
                        s.status_changed_at, i.url, i.location_filter, i.interval_minutes
                 FROM subscriptions s
                 JOIN items i ON i.id = s.item_id
                 WHERE s.email = ?1 COLLATE NOCASE
                 ORDER BY s.created_at DESC, s.id DESC",
            )
            .context("Failed to prepare subscriptions query")?;

        let views = stmt
            .query_map(params![email], |row| {
                Ok(SubscriptionView {
                    id: row.get(0)?,
                    item_id: row.get(1)?,
                    email: row.get(2)?,
                    phone_number: row.get(3)?,
                    status: row.get(4)?,
                    created_at: timestamp(row, 5)?,
                    status_changed_at: timestamp(row, 6)?,
                    url: row.get(7)?,
                    location_filter: row.get(8)?,
                    interval_minutes: row.get(9)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read subscriptions")?;

        Ok(views)
    }
}
