mod connection;
mod error;
mod models;
mod repositories;

pub use connection::StorageManager;
pub use error::{Result, StorageError};
pub use models::*;
pub use repositories::*;

use sqlx::SqlitePool;

/// 统一的数据访问层入口
pub struct Storage {
    _pool: SqlitePool,
    projects: ProjectRepository,
    test_cases: TestCaseRepository,
    runs: RunRepository,
    generations: GenerationRepository,
}

impl Storage {
    /// 从 StorageManager 创建 Storage
    pub fn from_manager(manager: &StorageManager) -> Self {
        let pool = manager.pool().clone();
        Self {
            _pool: pool.clone(),
            projects: ProjectRepository::new(pool.clone()),
            test_cases: TestCaseRepository::new(pool.clone()),
            runs: RunRepository::new(pool.clone()),
            generations: GenerationRepository::new(pool),
        }
    }

    /// 获取项目仓储
    pub fn projects(&self) -> &ProjectRepository {
        &self.projects
    }

    /// 获取测试用例仓储
    pub fn test_cases(&self) -> &TestCaseRepository {
        &self.test_cases
    }

    /// 获取运行仓储
    pub fn runs(&self) -> &RunRepository {
        &self.runs
    }

    /// 获取生成历史仓储
    pub fn generations(&self) -> &GenerationRepository {
        &self.generations
    }

    /// 获取数据库连接池
    pub fn pool(&self) -> &SqlitePool {
        &self._pool
    }
}
