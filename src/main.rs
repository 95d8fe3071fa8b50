//! MangaDex 章节下载器。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/重试/路径等基础设施
//! - `network_parser`：MangaDex 接口与图片传输
//! - `download`：标题解析、章节目录、选择、图片下载与批量编排
//! - `ui`：命令行交互与多语言文本

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::info;

mod base_system;
mod download;
mod network_parser;
mod ui;

use base_system::config::load_or_create;
use base_system::context::Config;
use base_system::logging::{LogOptions, LogSystem};
use network_parser::network::{MangaDexClient, MangaDexConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "mdex-downloader")]
#[command(about = "MangaDex chapter downloader")]
struct Cli {
    /// 作品标题；指定后只运行一轮
    #[arg(short = 'm', long)]
    manga: Option<String>,

    /// 章节语言代码（pt-br / en / es）
    #[arg(short = 'l', long)]
    lang: Option<String>,

    /// 章节选择表达式，例如 "1 5 10.5"、"20-25"、"all"
    #[arg(short = 'c', long)]
    chapters: Option<String>,

    /// 保存根目录（覆盖配置中的 save_path）
    #[arg(short = 'd', long)]
    dir: Option<String>,

    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 数据目录路径（用于存放 config.yml 和 logs）
    #[arg(long)]
    data_dir: Option<String>,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("MangaDex Downloader v{}", VERSION);
        return Ok(());
    }

    let data_dir = cli.data_dir.as_deref().map(Path::new);
    let log = init_logging(cli.debug, data_dir)?;
    info!(target: "startup", logs = %log.logs_dir().display(), "当前版本: v{}", VERSION);

    let loaded = load_or_create::<Config>(data_dir).map_err(|e| anyhow!(e.to_string()))?;
    if loaded.created {
        info!(target: "startup", path = %loaded.path.display(), "已生成默认配置文件");
    }
    let mut config = loaded.config;

    if let Some(dir) = cli.dir.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        config.save_path = dir.trim_end_matches(['/', '\\']).to_string();
    }
    let save_root: PathBuf = config.default_save_dir();
    std::fs::create_dir_all(&save_root)
        .with_context(|| format!("创建目录失败: {}", save_root.display()))?;

    let client = Arc::new(MangaDexClient::new(MangaDexConfig::from(&config))?);
    ui::noui::run(
        &mut config,
        client,
        ui::noui::RunArgs {
            title: cli.manga,
            language: cli.lang,
            chapters: cli.chapters,
        },
    )
}

fn init_logging(debug: bool, base_dir: Option<&Path>) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        use_color: true,
        archive_on_exit: true,
        console: true,
    };
    LogSystem::init_with_base(opts, base_dir).map_err(|e| anyhow!(e))
}
