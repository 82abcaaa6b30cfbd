use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{Result, StorageError};
use crate::models::ProjectRecord;

/// 项目仓储
pub struct ProjectRepository {
    pool: SqlitePool,
}

impl ProjectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 创建项目
    pub async fn create(&self, name: &str, url: &str, description: Option<&str>) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO projects (name, url, description, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(url)
        .bind(description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed") {
                StorageError::AlreadyExists(format!("Project '{}' already exists", name))
            } else {
                StorageError::DatabaseError(e)
            }
        })?;

        let project_id = result.last_insert_rowid();
        debug!("Created project '{}' with ID: {}", name, project_id);

        Ok(project_id)
    }

    /// 根据ID获取项目
    pub async fn get_by_id(&self, id: i64) -> Result<Option<ProjectRecord>> {
        let record = sqlx::query_as::<_, ProjectRecord>("SELECT * FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// 根据名称获取项目
    pub async fn get_by_name(&self, name: &str) -> Result<Option<ProjectRecord>> {
        let record = sqlx::query_as::<_, ProjectRecord>("SELECT * FROM projects WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// 列出所有项目
    pub async fn list(&self) -> Result<Vec<ProjectRecord>> {
        let records = sqlx::query_as::<_, ProjectRecord>("SELECT * FROM projects ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    /// 删除项目 (级联删除用例、运行和生成历史)
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("Project {} not found", id)));
        }

        debug!("Deleted project {}", id);

        Ok(())
    }
}
