use std::path::PathBuf;

use anyhow::Context;
use boq_config::{AppConfig, ConfigError, GroupBy};
use boq_engine::Engine;
use boq_io::{JsonRecords, JsonSnapshot, RecordWriter, SnapshotLoader};
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GroupByArg {
    /// 按类型与区域分组
    Zone,
    /// 按类型与可见性状态分组
    Visibility,
}

impl From<GroupByArg> for GroupBy {
    fn from(value: GroupByArg) -> Self {
        match value {
            GroupByArg::Zone => GroupBy::Zone,
            GroupByArg::Visibility => GroupBy::Visibility,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "boq")]
#[command(about = "Zone-tagged bill-of-quantities from a drawing snapshot", long_about = None)]
#[command(version)]
struct Cli {
    /// 图纸快照（JSON）
    #[arg(short, long)]
    input: PathBuf,

    /// 输出文件，缺省写到标准输出
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 配置文件路径，缺省按 BOQ_CONFIG 或 ./config/default.toml 查找
    #[arg(long)]
    config: Option<PathBuf>,

    /// 覆盖配置中的分组方式
    #[arg(long, value_enum)]
    group_by: Option<GroupByArg>,

    /// 输出紧凑 JSON
    #[arg(long)]
    compact: bool,
}

fn main() {
    let cli = Cli::parse();
    let (mut config, fallback) = load_configuration(cli.config.clone());
    init_logging(&config);
    if let Some(fallback) = fallback {
        fallback.report();
    }

    if let Some(group_by) = cli.group_by {
        config.engine.group_by = group_by.into();
    }
    if cli.compact {
        config.output.pretty = false;
    }

    if let Err(err) = run(&cli, config) {
        error!(error = %err, "计算失败");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli, config: AppConfig) -> anyhow::Result<()> {
    info!(input = %cli.input.display(), "加载图纸快照");
    let drawing = JsonSnapshot::new()
        .load(&cli.input)
        .with_context(|| format!("无法加载快照 {}", cli.input.display()))?;

    let engine = Engine::new(config.engine);
    let records = engine.run(&drawing).context("引擎计算失败")?;

    let writer = JsonRecords::new(config.output.pretty);
    match &cli.output {
        Some(path) => {
            writer
                .write(&records, path)
                .with_context(|| format!("无法写出记录 {}", path.display()))?;
            info!(path = %path.display(), records = records.len(), "记录已写出");
        }
        None => {
            let body = writer.render(&records).context("无法编码记录")?;
            println!("{body}");
        }
    }
    Ok(())
}

/// 配置加载失败时回退到默认值；日志初始化之后再报告原因。
struct ConfigFallback {
    path: Option<PathBuf>,
    error: ConfigError,
    explicit: bool,
}

impl ConfigFallback {
    fn report(&self) {
        let message = if self.explicit {
            "加载指定配置失败，使用默认配置"
        } else {
            "加载默认配置失败，使用内建默认值"
        };
        match &self.path {
            Some(path) => warn!(path = %path.display(), error = %self.error, "{}", message),
            None => warn!(error = %self.error, "{}", message),
        }
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> (AppConfig, Option<ConfigFallback>) {
    let (result, explicit) = match &override_path {
        Some(path) => (AppConfig::from_file(path), true),
        None => (AppConfig::discover(), false),
    };
    match result {
        Ok(cfg) => (cfg, None),
        Err(error) => {
            let path = match &error {
                ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                    Some(path.clone())
                }
                ConfigError::Context { .. } => override_path,
            };
            let fallback = ConfigFallback {
                path,
                error,
                explicit,
            };
            (AppConfig::default(), Some(fallback))
        }
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
