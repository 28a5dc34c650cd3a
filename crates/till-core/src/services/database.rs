//! Shared database service wrapper used by the sync worker and the register.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{Database, LibSqlLedgerRepository, LibSqlQueueRepository};
use crate::models::{Order, QueuedOrder};
use crate::Result;

/// Thread-safe service for DB and repository operations.
///
/// Every operation holds the connection lock for its full duration, so queue
/// writes and queue snapshots never interleave.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    ///
    /// A file that is not a valid database is moved aside and a fresh one is
    /// created in its place.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path).await {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local database at {} is unreadable: {}. Moving it aside and retrying once.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path).await?
            }
            Err(error) => return Err(error),
        };

        tracing::debug!("Opened local database at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    fn is_corrupted_db_error(error: &crate::Error) -> bool {
        let message = error.to_string().to_ascii_lowercase();
        message.contains("not a database") || message.contains("malformed")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let base_name = db_path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("till.db");
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted local DB file from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        let Some(parent) = db_path.parent() else {
            return Ok(());
        };
        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };
        let sidecar_prefix = format!("{base_name}-");

        for entry in std::fs::read_dir(parent)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(&sidecar_prefix) {
                let path = entry.path();
                std::fs::remove_file(&path)?;
                tracing::warn!("Removed stale sidecar file {}", path.display());
            }
        }

        Ok(())
    }

    /// Append an order to the offline queue.
    pub async fn enqueue_order(&self, order: &Order) -> Result<QueuedOrder> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.insert(order).await
    }

    /// Snapshot of the offline queue, ascending by sequence number.
    pub async fn queued_orders(&self) -> Result<Vec<QueuedOrder>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.list().await
    }

    /// Remove every queued order.
    pub async fn purge_queue(&self) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.delete_all().await
    }

    /// Remove queued orders up to and including `sequence_id`.
    pub async fn purge_queue_through(&self, sequence_id: i64) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.delete_through(sequence_id).await
    }

    /// Number of queued orders.
    pub async fn queued_count(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.count().await
    }

    /// Ledger orders, front first.
    pub async fn ledger_orders(&self, limit: usize, offset: usize) -> Result<Vec<Order>> {
        let db = self.db.lock().await;
        let repo = LibSqlLedgerRepository::new(db.connection());
        repo.list(limit, offset).await
    }

    /// The whole ledger, front first.
    pub async fn load_ledger(&self) -> Result<Vec<Order>> {
        let db = self.db.lock().await;
        let repo = LibSqlLedgerRepository::new(db.connection());
        repo.load_all().await
    }

    /// Prepend newly known orders to the persisted ledger.
    pub async fn prepend_to_ledger(&self, orders: &[Order]) -> Result<usize> {
        let db = self.db.lock().await;
        let repo = LibSqlLedgerRepository::new(db.connection());
        repo.prepend(orders).await
    }

    /// Number of orders in the persisted ledger.
    pub async fn ledger_count(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let repo = LibSqlLedgerRepository::new(db.connection());
        repo.count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderId;

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_queue_and_ledger_roundtrip() {
        let service = DatabaseService::open_in_memory().await.unwrap();
        let order = Order::new(OrderId::new("ord_1").unwrap());

        service.enqueue_order(&order).await.unwrap();
        assert_eq!(service.queued_count().await.unwrap(), 1);

        service.prepend_to_ledger(&[order.clone()]).await.unwrap();
        let ledger = service.load_ledger().await.unwrap();
        assert_eq!(ledger, vec![order]);
    }

    #[test]
    fn detects_corrupted_db_errors() {
        assert!(DatabaseService::is_corrupted_db_error(
            &crate::Error::Database("SQLite failure: file is not a database".to_string())
        ));
        assert!(!DatabaseService::is_corrupted_db_error(
            &crate::Error::InvalidInput("order id must not be empty".to_string())
        ));
    }

    #[test]
    fn quarantine_moves_db_and_removes_sidecars() {
        let test_dir = tempfile::tempdir().unwrap();

        let db_path = test_dir.path().join("till.db");
        let wal_path = test_dir.path().join("till.db-wal");
        let shm_path = test_dir.path().join("till.db-shm");

        std::fs::write(&db_path, b"bad-db").unwrap();
        std::fs::write(&wal_path, b"wal").unwrap();
        std::fs::write(&shm_path, b"shm").unwrap();

        DatabaseService::quarantine_corrupted_db_files(&db_path).unwrap();

        assert!(!db_path.exists());
        assert!(!wal_path.exists());
        assert!(!shm_path.exists());

        let found_backup = std::fs::read_dir(test_dir.path())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .any(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("till.db.corrupt-")
            });
        assert!(found_backup);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_path_recovers_from_garbage_file() {
        let test_dir = tempfile::tempdir().unwrap();
        let db_path = test_dir.path().join("till.db");
        std::fs::write(&db_path, vec![b'x'; 4096]).unwrap();

        let service = DatabaseService::open_path(&db_path).await.unwrap();
        assert_eq!(service.queued_count().await.unwrap(), 0);
    }
}
