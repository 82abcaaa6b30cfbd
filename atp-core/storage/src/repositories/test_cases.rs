use atp_common::TestCase;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{Result, StorageError};
use crate::models::TestCaseRecord;

/// 测试用例仓储
pub struct TestCaseRepository {
    pool: SqlitePool,
}

impl TestCaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 创建测试用例
    pub async fn create(&self, record: &TestCaseRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO test_cases
            (project_id, title, steps, code, priority, expected_result, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.project_id)
        .bind(&record.title)
        .bind(&record.steps)
        .bind(&record.code)
        .bind(&record.priority)
        .bind(&record.expected_result)
        .bind(&record.status)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!("Created test case '{}' with ID: {}", record.title, id);

        Ok(id)
    }

    /// 批量导入领域对象，返回新 ID
    pub async fn create_many(&self, project_id: i64, test_cases: &[TestCase]) -> Result<Vec<i64>> {
        let mut ids = Vec::with_capacity(test_cases.len());
        for test_case in test_cases {
            let record = TestCaseRecord::from_test_case(project_id, test_case)?;
            ids.push(self.create(&record).await?);
        }
        Ok(ids)
    }

    /// 根据ID获取用例
    pub async fn get_by_id(&self, id: i64) -> Result<Option<TestCaseRecord>> {
        let record = sqlx::query_as::<_, TestCaseRecord>("SELECT * FROM test_cases WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// 获取项目下的全部用例 (按创建顺序)
    pub async fn list_by_project(&self, project_id: i64) -> Result<Vec<TestCaseRecord>> {
        let records = sqlx::query_as::<_, TestCaseRecord>(
            "SELECT * FROM test_cases WHERE project_id = ? ORDER BY id ASC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// 统计项目下的用例数
    pub async fn count_by_project(&self, project_id: i64) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM test_cases WHERE project_id = ?")
            .bind(project_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// 删除用例
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM test_cases WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("Test case {} not found", id)));
        }

        debug!("Deleted test case {}", id);

        Ok(())
    }
}
