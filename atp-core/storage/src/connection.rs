//! SQLite 连接
//!
//! 文件库使用 WAL：CLI 轮询运行记录的同时，后台编排任务可以写入。
//! 所有连接都开启外键，删除项目时级联删除用例、运行和生成历史。

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Result, StorageError};

/// 文件库连接池大小
const FILE_POOL_SIZE: u32 = 5;

/// 写锁等待时间
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// 数据库连接与表结构
pub struct StorageManager {
    pool: SqlitePool,
}

impl StorageManager {
    /// 打开数据库文件，不存在时连同父目录一起创建
    ///
    /// ```no_run
    /// # use atp_storage::StorageManager;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let storage = StorageManager::new("~/.config/atp/data.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(db_path: &str) -> Result<Self> {
        let path = PathBuf::from(shellexpand::tilde(db_path).as_ref());

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                StorageError::ConnectionError(format!("cannot create {}: {}", dir.display(), e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        info!("打开 ATP 数据库: {}", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(FILE_POOL_SIZE)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;

        Self::migrated(pool).await
    }

    /// 内存数据库，测试用
    ///
    /// 内存库只存在于单个连接中，连接池固定为一个永不回收的连接。
    pub async fn new_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;

        Self::migrated(pool).await
    }

    /// 建表后返回
    async fn migrated(pool: SqlitePool) -> Result<Self> {
        sqlx::query(include_str!("../migrations/001_initial.sql"))
            .execute(&pool)
            .await
            .map_err(|e| StorageError::MigrationError(e.to_string()))?;
        debug!("表结构已就绪");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// 数据库是否可用
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
