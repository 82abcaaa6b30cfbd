use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::Result;
use crate::models::GenerationRecord;

/// 用例生成历史仓储
pub struct GenerationRepository {
    pool: SqlitePool,
}

impl GenerationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 记录一次生成
    pub async fn create(
        &self,
        project_id: i64,
        prompt: Option<&str>,
        model: &str,
        status: &str,
        test_cases_json: &str,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO generations (project_id, prompt, model, status, test_cases, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(project_id)
        .bind(prompt)
        .bind(model)
        .bind(status)
        .bind(test_cases_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!("Recorded generation {} ({}) for project {}", id, status, project_id);

        Ok(id)
    }

    /// 项目的生成历史 (最新的在前)
    pub async fn list_by_project(&self, project_id: i64) -> Result<Vec<GenerationRecord>> {
        let records = sqlx::query_as::<_, GenerationRecord>(
            "SELECT * FROM generations WHERE project_id = ? ORDER BY id DESC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
