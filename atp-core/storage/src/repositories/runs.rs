use atp_common::RunStatus;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{Result, StorageError};
use crate::models::{RunFilter, RunUpdate, TestRunRecord};

/// 测试运行仓储
///
/// 每条运行记录只由负责它的编排任务写入。
pub struct RunRepository {
    pool: SqlitePool,
}

impl RunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 创建运行记录
    pub async fn create(&self, run: &TestRunRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO test_runs
            (id, project_id, test_case_id, run_type, status, parent_run_id,
             results, raw_output, total_count, pass_count, fail_count, duration_ms,
             created_at, executed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.id)
        .bind(run.project_id)
        .bind(run.test_case_id)
        .bind(&run.run_type)
        .bind(&run.status)
        .bind(&run.parent_run_id)
        .bind(&run.results)
        .bind(&run.raw_output)
        .bind(run.total_count)
        .bind(run.pass_count)
        .bind(run.fail_count)
        .bind(run.duration_ms)
        .bind(run.created_at)
        .bind(run.executed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed") {
                StorageError::AlreadyExists(format!("Run '{}' already exists", run.id))
            } else {
                StorageError::DatabaseError(e)
            }
        })?;

        debug!("Created {} run {}", run.run_type, run.id);

        Ok(())
    }

    /// 根据ID获取运行
    pub async fn get_by_id(&self, id: &str) -> Result<Option<TestRunRecord>> {
        let record = sqlx::query_as::<_, TestRunRecord>("SELECT * FROM test_runs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// 更新运行状态
    ///
    /// 只允许 PENDING → RUNNING → {PASSED, FAILED}，终态不会被再次写入。
    /// 携带结果时根据结果重新计算 total / pass / fail 和总耗时。
    pub async fn update_status(&self, id: &str, update: &RunUpdate) -> Result<()> {
        let (results_json, total, passed, failed, duration) = match &update.results {
            Some(results) => {
                let passed = results.iter().filter(|r| r.is_pass()).count() as i64;
                let total = results.len() as i64;
                let duration: u64 = results.iter().map(|r| r.duration_ms).sum();
                (
                    Some(serde_json::to_string(results)?),
                    Some(total),
                    Some(passed),
                    Some(total - passed),
                    Some(duration as i64),
                )
            }
            None => (None, None, None, None, None),
        };

        let sources = allowed_sources(update.status);
        if sources.is_empty() {
            return Err(StorageError::InvalidTransition(format!(
                "Run {} cannot move to {}",
                id, update.status
            )));
        }

        let query = format!(
            r#"
            UPDATE test_runs
            SET status = ?,
                results = COALESCE(?, results),
                raw_output = COALESCE(?, raw_output),
                total_count = COALESCE(?, total_count),
                pass_count = COALESCE(?, pass_count),
                fail_count = COALESCE(?, fail_count),
                duration_ms = COALESCE(?, duration_ms),
                executed_at = COALESCE(?, executed_at)
            WHERE id = ? AND status IN ({})
            "#,
            vec!["?"; sources.len()].join(", ")
        );

        let mut sql_query = sqlx::query(&query)
            .bind(update.status.as_str())
            .bind(results_json)
            .bind(&update.raw_output)
            .bind(total)
            .bind(passed)
            .bind(failed)
            .bind(duration)
            .bind(update.executed_at)
            .bind(id);
        for source in sources {
            sql_query = sql_query.bind(source.as_str());
        }

        let result = sql_query.execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return match self.get_by_id(id).await? {
                Some(run) => Err(StorageError::InvalidTransition(format!(
                    "Run {} is {} and cannot move to {}",
                    id, run.status, update.status
                ))),
                None => Err(StorageError::NotFound(format!("Run {} not found", id))),
            };
        }

        debug!("Run {} -> {}", id, update.status);

        Ok(())
    }

    /// 查询运行列表 (最新的在前)
    pub async fn list(&self, filter: &RunFilter) -> Result<Vec<TestRunRecord>> {
        let mut query = String::from("SELECT * FROM test_runs WHERE 1=1");
        push_conditions(&mut query, filter);
        query.push_str(" ORDER BY created_at DESC, rowid DESC");

        if let Some(limit) = filter.limit {
            query.push_str(&format!(" LIMIT {}", limit));
            if let Some(offset) = filter.offset {
                query.push_str(&format!(" OFFSET {}", offset));
            }
        }

        let mut sql_query = sqlx::query_as::<_, TestRunRecord>(&query);
        if let Some(project_id) = filter.project_id {
            sql_query = sql_query.bind(project_id);
        }
        if let Some(status) = filter.status {
            sql_query = sql_query.bind(status.as_str());
        }

        let runs = sql_query.fetch_all(&self.pool).await?;

        Ok(runs)
    }

    /// 统计满足条件的运行数 (忽略分页)
    pub async fn count(&self, filter: &RunFilter) -> Result<i64> {
        let mut query = String::from("SELECT COUNT(*) FROM test_runs WHERE 1=1");
        push_conditions(&mut query, filter);

        let mut sql_query = sqlx::query_as::<_, (i64,)>(&query);
        if let Some(project_id) = filter.project_id {
            sql_query = sql_query.bind(project_id);
        }
        if let Some(status) = filter.status {
            sql_query = sql_query.bind(status.as_str());
        }

        let (count,) = sql_query.fetch_one(&self.pool).await?;

        Ok(count)
    }

    /// 删除运行
    pub async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM test_runs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("Run {} not found", id)));
        }

        Ok(())
    }
}

/// 允许迁移到 `target` 的源状态
fn allowed_sources(target: RunStatus) -> &'static [RunStatus] {
    match target {
        RunStatus::Pending => &[],
        RunStatus::Running => &[RunStatus::Pending],
        RunStatus::Passed | RunStatus::Failed => &[RunStatus::Pending, RunStatus::Running],
    }
}

fn push_conditions(query: &mut String, filter: &RunFilter) {
    if filter.project_id.is_some() {
        query.push_str(" AND project_id = ?");
    }
    if filter.status.is_some() {
        query.push_str(" AND status = ?");
    }
}
