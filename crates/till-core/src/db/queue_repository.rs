//! Offline order queue repository

use crate::error::Result;
use crate::models::{Order, QueuedOrder};
use crate::util::unix_millis_now;
use libsql::{params, Connection};

/// libSQL access to the `offline_orders` table
///
/// Row layout: `seq` (auto-increment key), `data` (order JSON),
/// `timestamp` (Unix ms), `synced` (always 0).
pub struct LibSqlQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append an order with a fresh sequence number and the current time
    pub async fn insert(&self, order: &Order) -> Result<QueuedOrder> {
        let data = order.to_json()?;
        let enqueued_at = unix_millis_now();

        self.conn
            .execute(
                "INSERT INTO offline_orders (data, timestamp, synced) VALUES (?, ?, 0)",
                params![data, enqueued_at],
            )
            .await?;
        let sequence_id = self.conn.last_insert_rowid();

        Ok(QueuedOrder {
            sequence_id,
            payload: order.clone(),
            enqueued_at,
            synced: false,
        })
    }

    /// All resident entries, ascending by sequence number.
    ///
    /// Rows whose data no longer decodes as an order are moved to
    /// `rejected_orders` so they cannot block later drains.
    pub async fn list(&self) -> Result<Vec<QueuedOrder>> {
        let mut rows = self
            .conn
            .query(
                "SELECT seq, data, timestamp, synced FROM offline_orders ORDER BY seq ASC",
                (),
            )
            .await?;

        let mut queued = Vec::new();
        let mut rejected = Vec::new();
        while let Some(row) = rows.next().await? {
            let sequence_id: i64 = row.get(0)?;
            let data: String = row.get(1)?;
            let enqueued_at: i64 = row.get(2)?;
            match Order::from_json(&data) {
                Ok(payload) => queued.push(QueuedOrder {
                    sequence_id,
                    payload,
                    enqueued_at,
                    synced: row.get::<i64>(3)? != 0,
                }),
                Err(error) => {
                    rejected.push((sequence_id, data, enqueued_at, error.to_string()));
                }
            }
        }
        drop(rows);

        for (sequence_id, data, enqueued_at, error) in rejected {
            tracing::warn!(
                sequence_id,
                error = %error,
                "Queued order is unreadable, moving it to rejected_orders"
            );
            self.reject(sequence_id, &data, enqueued_at, &error).await?;
        }

        Ok(queued)
    }

    async fn reject(
        &self,
        sequence_id: i64,
        data: &str,
        enqueued_at: i64,
        error: &str,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO rejected_orders (seq, data, timestamp, error, rejected_at)
                 VALUES (?, ?, ?, ?, ?)",
                params![sequence_id, data, enqueued_at, error, unix_millis_now()],
            )
            .await?;
        self.conn
            .execute(
                "DELETE FROM offline_orders WHERE seq = ?",
                params![sequence_id],
            )
            .await?;
        Ok(())
    }

    /// Number of rows moved aside because they could not be decoded
    pub async fn rejected_count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM rejected_orders", ())
            .await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Delete every entry; returns the number of rows removed
    pub async fn delete_all(&self) -> Result<u64> {
        Ok(self.conn.execute("DELETE FROM offline_orders", ()).await?)
    }

    /// Delete entries with `seq <= sequence_id`
    pub async fn delete_through(&self, sequence_id: i64) -> Result<u64> {
        Ok(self
            .conn
            .execute(
                "DELETE FROM offline_orders WHERE seq <= ?",
                params![sequence_id],
            )
            .await?)
    }

    /// Number of resident entries
    pub async fn count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM offline_orders", ())
            .await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
