//! ATP CLI 应用

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use config::AtpConfig;

#[derive(Parser)]
#[command(name = "atp")]
#[command(about = "ATP - 自然语言 Web 自动化测试平台", long_about = None)]
#[command(version)]
struct Cli {
    /// 日志级别 (覆盖配置文件，RUST_LOG 优先)
    #[arg(short, long)]
    log_level: Option<String>,

    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 项目管理
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// 测试用例管理
    Case {
        #[command(subcommand)]
        action: CaseAction,
    },

    /// 使用 LLM 生成测试用例
    Generate {
        /// 项目 ID 或名称
        project: String,

        /// 额外的生成要求
        #[arg(short, long)]
        instructions: Option<String>,

        /// 只显示结果，不保存用例
        #[arg(long)]
        dry_run: bool,
    },

    /// 组装测试脚本但不执行
    Compile {
        /// 项目 ID 或名称
        project: String,

        /// 只编译指定的测试用例
        #[arg(long)]
        case: Option<i64>,

        /// 输出文件 (默认输出到终端)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 测试运行
    Run {
        #[command(subcommand)]
        action: RunAction,
    },

    /// 测试报告
    Report {
        #[command(subcommand)]
        action: ReportAction,
    },
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// 添加项目
    Add {
        /// 项目名称
        name: String,
        /// 被测站点 URL
        url: String,
        /// 描述
        #[arg(short, long)]
        description: Option<String>,
    },
    /// 列出项目
    List,
    /// 删除项目 (同时删除其用例和运行记录)
    Remove {
        /// 项目 ID 或名称
        project: String,
    },
}

#[derive(Subcommand)]
pub enum CaseAction {
    /// 从 JSON / YAML 文件导入测试用例
    Import {
        /// 项目 ID 或名称
        project: String,
        /// 用例文件
        file: PathBuf,
    },
    /// 列出项目的测试用例
    List {
        /// 项目 ID 或名称
        project: String,
    },
    /// 显示用例详情
    Show {
        /// 用例 ID
        id: i64,
        /// 显示每个步骤翻译后的语句
        #[arg(long)]
        translate: bool,
    },
}

#[derive(Subcommand)]
pub enum RunAction {
    /// 运行项目下的全部用例
    Suite {
        /// 项目 ID 或名称
        project: String,
        #[command(flatten)]
        wait: WaitArgs,
    },
    /// 运行单个用例
    Case {
        /// 用例 ID
        id: i64,
        #[command(flatten)]
        wait: WaitArgs,
    },
    /// 重跑某次运行中失败的用例
    RerunFailed {
        /// 父运行 ID
        run_id: String,
        #[command(flatten)]
        wait: WaitArgs,
    },
    /// 显示运行详情
    Show {
        /// 运行 ID
        run_id: String,
        /// 同时输出测试进程的原始输出
        #[arg(long)]
        raw: bool,
    },
    /// 列出项目的运行记录
    List {
        /// 项目 ID 或名称
        project: String,
        /// 状态过滤 (PENDING/RUNNING/PASSED/FAILED)
        #[arg(short, long)]
        status: Option<String>,
        /// 每页数量
        #[arg(short, long, default_value = "20")]
        limit: i64,
        /// 页码 (从 1 开始)
        #[arg(short, long, default_value = "1")]
        page: i64,
    },
}

/// 等待运行结束的参数
#[derive(clap::Args, Debug, Clone)]
pub struct WaitArgs {
    /// 轮询间隔 (毫秒)
    #[arg(long, default_value = "500")]
    pub interval_ms: u64,

    /// 最长等待时间 (秒)，默认一直等待
    #[arg(long)]
    pub wait_timeout: Option<u64>,
}

#[derive(Subcommand)]
pub enum ReportAction {
    /// 导出运行报告
    Export {
        /// 运行 ID
        run_id: String,

        /// 输出文件路径 (默认输出到终端)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 输出格式(json/yaml)
        #[arg(short, long, default_value = "json")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AtpConfig::load(cli.config.as_deref())?;

    // 初始化日志
    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("ATP CLI 启动");

    // 处理命令
    match cli.command {
        Commands::Project { action } => commands::project::handle(&config, action).await?,
        Commands::Case { action } => commands::case::handle(&config, action).await?,
        Commands::Generate {
            project,
            instructions,
            dry_run,
        } => commands::generate::handle(&config, &project, instructions.as_deref(), dry_run).await?,
        Commands::Compile {
            project,
            case,
            output,
        } => commands::compile::handle(&config, &project, case, output.as_deref()).await?,
        Commands::Run { action } => commands::run::handle(&config, action).await?,
        Commands::Report { action } => commands::report::handle(&config, action).await?,
    }

    Ok(())
}
