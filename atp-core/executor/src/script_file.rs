//! 临时脚本文件
//!
//! `ScriptFile` 在 drop 时删除文件，删除失败只记录警告。

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{ExecutorError, Result};

/// 运行独占的临时脚本
#[derive(Debug)]
pub struct ScriptFile {
    path: PathBuf,
}

impl ScriptFile {
    /// 在 `dir` 下写入 `run-{run_id}.spec.js`
    pub async fn create(dir: &Path, run_id: &str, content: &str) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            ExecutorError::ScriptWriteFailed(format!("{}: {}", dir.display(), e))
        })?;

        let path = dir.join(script_file_name(run_id));
        if let Err(e) = tokio::fs::write(&path, content).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(ExecutorError::ScriptWriteFailed(format!(
                "{}: {}",
                path.display(),
                e
            )));
        }

        debug!("临时脚本已写入: {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScriptFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("临时脚本已删除: {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("临时脚本删除失败 {}: {}", self.path.display(), e),
        }
    }
}

/// 按运行 ID 命名的脚本文件名，只保留字母数字、`-` 和 `_`
pub fn script_file_name(run_id: &str) -> String {
    let safe: String = run_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("run-{}.spec.js", safe)
}
