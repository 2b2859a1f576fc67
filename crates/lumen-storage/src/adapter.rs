// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage traits.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use lumen_config::model::StorageConfig;
use lumen_core::{
    AdapterType, HealthStatus, HistoryStore, JobStore, LumenError, PluginAdapter, StorageAdapter,
};

use crate::database::{Database, map_tr_err};
use crate::models::{
    GenerationRecord, GenerationRequest, HistoryFilter, JobStatus, QueueCounts, QueueItem,
    StatusUpdate,
};
use crate::queries;

/// SQLite-backed job queue and generation history.
///
/// The database is opened lazily by [`StorageAdapter::initialize`], which
/// also runs crash recovery, or by [`SqliteStorage::attach`], which does not.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`]
    /// or [`SqliteStorage::attach`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already-open database. No recovery is run.
    pub fn from_database(config: StorageConfig, db: Database) -> Self {
        Self {
            config,
            db: OnceCell::new_with(Some(db)),
        }
    }

    /// Returns the underlying Database, or an error if not opened yet.
    pub fn db(&self) -> Result<&Database, LumenError> {
        self.db.get().ok_or_else(|| LumenError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    async fn open(&self) -> Result<&Database, LumenError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| LumenError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage opened");
        self.db()
    }

    /// Open the database without crash recovery.
    ///
    /// For short-lived tools that share the database with a running queue
    /// processor, whose in-flight job must not be reset underneath it.
    pub async fn attach(&self) -> Result<(), LumenError> {
        self.open().await.map(|_| ())
    }

    /// Return every item left `generating` by a previous process to `pending`.
    pub async fn recover_interrupted(&self) -> Result<usize, LumenError> {
        let recovered = queries::queue::recover_interrupted(self.db()?).await?;
        if recovered > 0 {
            info!(count = recovered, "requeued interrupted generations");
        }
        Ok(recovered)
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, LumenError> {
        let Some(db) = self.db.get() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LumenError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    /// Open, migrate, then requeue anything a crashed process left generating.
    async fn initialize(&self) -> Result<(), LumenError> {
        self.open().await?;
        self.recover_interrupted().await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), LumenError> {
        self.db()?.checkpoint().await
    }
}

#[async_trait]
impl JobStore for SqliteStorage {
    async fn enqueue(
        &self,
        id: &str,
        request: &GenerationRequest,
    ) -> Result<QueueItem, LumenError> {
        queries::queue::enqueue(self.db()?, id, request).await
    }

    async fn get_job(&self, id: &str) -> Result<Option<QueueItem>, LumenError> {
        queries::queue::get(self.db()?, id).await
    }

    async fn next_pending(&self) -> Result<Option<QueueItem>, LumenError> {
        queries::queue::next_pending(self.db()?).await
    }

    async fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        update: StatusUpdate,
    ) -> Result<bool, LumenError> {
        queries::queue::update_status(self.db()?, id, status, update).await
    }

    async fn delete_job(&self, id: &str) -> Result<bool, LumenError> {
        queries::queue::delete(self.db()?, id).await
    }

    async fn delete_if_status(
        &self,
        id: &str,
        statuses: &[JobStatus],
    ) -> Result<bool, LumenError> {
        queries::queue::delete_if_status(self.db()?, id, statuses).await
    }

    async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<QueueItem>, LumenError> {
        queries::queue::list(self.db()?, status).await
    }

    async fn counts_by_status(&self) -> Result<QueueCounts, LumenError> {
        queries::queue::counts_by_status(self.db()?).await
    }

    async fn reset_to_pending(&self, id: &str) -> Result<bool, LumenError> {
        queries::queue::reset_to_pending(self.db()?, id).await
    }
}

#[async_trait]
impl HistoryStore for SqliteStorage {
    async fn record_generation(&self, record: &GenerationRecord) -> Result<(), LumenError> {
        queries::generations::record(self.db()?, record).await
    }

    async fn get_generation(&self, id: &str) -> Result<Option<GenerationRecord>, LumenError> {
        queries::generations::get(self.db()?, id).await
    }

    async fn list_generations(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<GenerationRecord>, LumenError> {
        queries::generations::list(self.db()?, filter).await
    }

    async fn count_generations(&self, filter: &HistoryFilter) -> Result<u64, LumenError> {
        queries::generations::count(self.db()?, filter).await
    }

    async fn delete_generation(&self, id: &str) -> Result<bool, LumenError> {
        queries::generations::delete(self.db()?, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::now_timestamp;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    fn fox() -> GenerationRequest {
        GenerationRequest {
            prompt: "a fox".into(),
            negative_prompt: None,
            model: "m1".into(),
            width: 512,
            height: 512,
            steps: 20,
            cfg_scale: 7.0,
            seed: None,
            output_path: "/out/g1.png".into(),
            theme_id: None,
            template_id: None,
            template_values: None,
            remove_background: false,
        }
    }

    #[tokio::test]
    async fn sqlite_storage_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
        assert!(matches!(
            storage.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }

    #[tokio::test]
    async fn operations_before_initialize_fail() {
        let storage = SqliteStorage::new(make_config("/unused.db"));
        assert!(storage.get_job("g1").await.is_err());
        assert!(storage.close().await.is_err());
    }

    #[tokio::test]
    async fn initialize_twice_fails() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("twice.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
        assert!(storage.initialize().await.is_err());
    }

    /// A job left generating by a crashed process is pending again after the
    /// next `initialize`, but not after `attach`.
    #[tokio::test]
    async fn initialize_recovers_interrupted_jobs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("crash.db");
        let path = path.to_str().unwrap();

        {
            let first = SqliteStorage::new(make_config(path));
            first.initialize().await.unwrap();
            first.enqueue("g1", &fox()).await.unwrap();
            let claimed = first
                .update_status(
                    "g1",
                    JobStatus::Generating,
                    StatusUpdate {
                        started_at: Some(now_timestamp()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            assert!(claimed);
            first.close().await.unwrap();
        }

        let attached = SqliteStorage::new(make_config(path));
        attached.attach().await.unwrap();
        let item = attached.get_job("g1").await.unwrap().unwrap();
        assert_eq!(item.status, JobStatus::Generating);

        let restarted = SqliteStorage::new(make_config(path));
        restarted.initialize().await.unwrap();
        let item = restarted.get_job("g1").await.unwrap().unwrap();
        assert_eq!(item.status, JobStatus::Pending);
        assert!(item.started_at.is_none());
        assert_eq!(item.request, fox());
    }

    #[tokio::test]
    async fn history_through_trait() {
        let db = Database::open_in_memory().await.unwrap();
        let storage = SqliteStorage::from_database(make_config(":memory:"), db);
        let store: &dyn HistoryStore = &storage;

        let rec = GenerationRecord::from_request("g1", &fox(), 42, "/out/g1.png".into(), 1200);
        store.record_generation(&rec).await.unwrap();
        assert_eq!(store.get_generation("g1").await.unwrap(), Some(rec));
        assert_eq!(
            store
                .count_generations(&HistoryFilter::default())
                .await
                .unwrap(),
            1
        );
    }
}
