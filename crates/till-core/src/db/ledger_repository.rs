//! Order ledger repository

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET and positions

use crate::error::Result;
use crate::models::Order;
use crate::util::unix_millis_now;
use libsql::{params, Connection};

/// libSQL access to the persisted canonical ledger (`orders` table)
///
/// Rows are listed by `position` descending, so a prepended block sits in
/// front of everything recorded earlier.
pub struct LibSqlLedgerRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlLedgerRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Prepend a block of orders, keeping the block's own order.
    ///
    /// Ids already present are skipped. Returns the number of rows inserted.
    pub async fn prepend(&self, orders: &[Order]) -> Result<usize> {
        if orders.is_empty() {
            return Ok(0);
        }

        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        match self.prepend_in_transaction(orders).await {
            Ok(inserted) => {
                if let Err(e) = self.conn.execute("COMMIT", ()).await {
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e.into());
                }
                Ok(inserted)
            }
            Err(e) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(e)
            }
        }
    }

    async fn prepend_in_transaction(&self, orders: &[Order]) -> Result<usize> {
        let top = self.top_position().await?;
        let block_len = orders.len() as i64;
        let recorded_at = unix_millis_now();

        let mut inserted = 0;
        for (index, order) in orders.iter().enumerate() {
            let position = top + block_len - index as i64;
            let rows = self
                .conn
                .execute(
                    "INSERT OR IGNORE INTO orders (id, data, position, recorded_at) VALUES (?, ?, ?, ?)",
                    params![order.id.to_string(), order.to_json()?, position, recorded_at],
                )
                .await?;
            if rows > 0 {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn top_position(&self) -> Result<i64> {
        let mut rows = self
            .conn
            .query("SELECT COALESCE(MAX(position), 0) FROM orders", ())
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }

    /// List ledger orders, front of the ledger first
    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Order>> {
        let rows = self
            .conn
            .query(
                "SELECT data FROM orders ORDER BY position DESC LIMIT ? OFFSET ?",
                params![limit as i64, offset as i64],
            )
            .await?;
        Self::collect_orders(rows).await
    }

    /// Load the whole ledger, front first
    pub async fn load_all(&self) -> Result<Vec<Order>> {
        let rows = self
            .conn
            .query("SELECT data FROM orders ORDER BY position DESC", ())
            .await?;
        Self::collect_orders(rows).await
    }

    async fn collect_orders(mut rows: libsql::Rows) -> Result<Vec<Order>> {
        let mut orders = Vec::new();
        while let Some(row) = rows.next().await? {
            let data: String = row.get(0)?;
            orders.push(Order::from_json(&data)?);
        }
        Ok(orders)
    }

    /// Number of orders in the ledger
    pub async fn count(&self) -> Result<usize> {
        let mut rows = self.conn.query("SELECT COUNT(*) FROM orders", ()).await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
