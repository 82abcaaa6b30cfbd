//! 外部测试进程
//!
//! 以子进程方式运行 Playwright，捕获 stdout / stderr。每个输出流只保留
//! 前 `max_output_bytes` 字节，其余部分读出后丢弃，避免子进程被管道阻塞。
//!
//! 命令经 shell 启动，unix 上 shell 自成一个进程组。超时或任务被取消时
//! 杀死整个进程组，npx / node / 浏览器不会残留。

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::{ExecutorError, Result};

/// 子进程输出
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// 退出码 (被信号终止时为 None)
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    /// 是否有输出流被截断
    pub truncated: bool,
    /// 读取输出流时遇到的错误
    pub read_error: Option<String>,
}

/// 脚本运行器
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// 运行脚本文件并收集输出。非零退出码不是错误。
    async fn run(&self, script: &Path) -> Result<ProcessOutput>;
}

/// 通过 shell 调用 `npx playwright test` 的运行器
///
/// 测试总是以单 worker 串行执行。
pub struct PlaywrightRunner {
    config: RunnerConfig,
}

impl PlaywrightRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// 构造 shell 命令行
    pub fn command_line(&self, script: &Path) -> String {
        let mut line = format!(
            "{} \"{}\"",
            self.config.program.trim(),
            shell_safe_path(script, &self.config.project_root)
        );
        if let Some(config_file) = &self.config.config_file {
            line.push_str(&format!(" --config \"{}\"", config_file.replace('"', "")));
        }
        line.push_str(" --reporter=json --workers=1");
        line
    }

    fn shell_command(line: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(line);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(line).process_group(0);
            cmd
        }
    }
}

/// shell 所在的进程组，drop 时整组杀死
///
/// 进程正常退出后调用 `disarm`，之后不再发送信号。
struct ProcessGroup {
    pgid: Option<i32>,
}

impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self {
            pgid: child.id().and_then(|id| i32::try_from(id).ok()),
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }

    fn kill(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        #[cfg(unix)]
        {
            // SAFETY: killpg 只向进程组发送信号，不访问内存
            let ret = unsafe { libc::killpg(pgid, libc::SIGKILL) };
            if ret == 0 {
                debug!("已终止进程组 {}", pgid);
            } else {
                debug!(
                    "终止进程组 {} 失败: {}",
                    pgid,
                    std::io::Error::last_os_error()
                );
            }
        }
        #[cfg(not(unix))]
        let _ = pgid;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[async_trait]
impl ScriptRunner for PlaywrightRunner {
    async fn run(&self, script: &Path) -> Result<ProcessOutput> {
        let line = self.command_line(script);
        info!("执行测试命令: {}", line);

        let mut cmd = Self::shell_command(&line);
        cmd.current_dir(&self.config.project_root)
            .env("CI", "true")
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| ExecutorError::ProcessSpawnFailed(format!("{}: {}", line, e)))?;
        // 在 child 之后声明，先于 child 被 drop
        let mut group = ProcessGroup::of(&child);

        let cap = self.config.max_output_bytes;
        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();
        let stdout_task = tokio::spawn(async move { read_capped(stdout_handle, cap).await });
        let stderr_task = tokio::spawn(async move { read_capped(stderr_handle, cap).await });

        let status = match self.config.timeout_secs {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), child.wait()).await
            {
                Ok(status) => status?,
                Err(_) => {
                    warn!("测试进程超过 {} 秒，终止进程组", secs);
                    group.kill();
                    stdout_task.abort();
                    stderr_task.abort();
                    if let Err(e) = child.kill().await {
                        debug!("回收测试进程失败: {}", e);
                    }
                    return Err(ExecutorError::Timeout(secs));
                }
            },
            None => child.wait().await?,
        };
        group.disarm();

        let stdout = join_reader(stdout_task).await;
        let stderr = join_reader(stderr_task).await;
        let truncated = stdout.truncated || stderr.truncated;
        if truncated {
            warn!("测试进程输出超过 {} 字节，已截断", cap);
        }
        let read_error = match (stdout.error, stderr.error) {
            (None, None) => None,
            (Some(e), None) => Some(format!("stdout: {}", e)),
            (None, Some(e)) => Some(format!("stderr: {}", e)),
            (Some(out), Some(err)) => Some(format!("stdout: {}; stderr: {}", out, err)),
        };
        if let Some(e) = &read_error {
            warn!("读取测试进程输出失败: {}", e);
        }

        let output = ProcessOutput {
            stdout: String::from_utf8_lossy(&stdout.bytes).into_owned(),
            stderr: String::from_utf8_lossy(&stderr.bytes).into_owned(),
            exit_code: status.code(),
            duration_ms: start.elapsed().as_millis() as u64,
            truncated,
            read_error,
        };

        debug!(
            "测试进程结束: exit={:?}, 耗时={}ms, stdout={}B, stderr={}B",
            output.exit_code,
            output.duration_ms,
            output.stdout.len(),
            output.stderr.len()
        );

        Ok(output)
    }
}

/// 单个输出流的读取结果
#[derive(Debug, Default)]
struct CappedRead {
    bytes: Vec<u8>,
    truncated: bool,
    error: Option<String>,
}

async fn join_reader(task: JoinHandle<CappedRead>) -> CappedRead {
    task.await.unwrap_or_else(|e| CappedRead {
        error: Some(e.to_string()),
        ..Default::default()
    })
}

/// 读取至多 `cap` 字节，剩余内容丢弃
async fn read_capped<R: AsyncRead + Unpin>(handle: Option<R>, cap: usize) -> CappedRead {
    let mut read = CappedRead::default();
    let Some(mut h) = handle else {
        return read;
    };
    if let Err(e) = (&mut h).take(cap as u64).read_to_end(&mut read.bytes).await {
        read.error = Some(e.to_string());
        return read;
    }
    match tokio::io::copy(&mut h, &mut tokio::io::sink()).await {
        Ok(rest) => read.truncated = rest > 0,
        Err(e) => read.error = Some(e.to_string()),
    }
    read
}

/// 放进 shell 命令的脚本路径
///
/// 尽量使用相对 `project_root` 的路径，分隔符统一为 `/`，并去掉双引号。
pub fn shell_safe_path(script: &Path, project_root: &Path) -> String {
    let relative = script.strip_prefix(project_root).unwrap_or(script);
    relative
        .to_string_lossy()
        .replace('\\', "/")
        .replace('"', "")
}
