//! # 素材合成工具 — 命令行入口
//!
//! 本文件仅负责参数解析、日志初始化与结果输出。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use std::path::PathBuf;
use std::process::ExitCode;

use asset_compositor::compositor::{
    AssetCategory, Background, CompositorConfig, Compositor, FitMode, OutputFormat, TargetSize,
    commands::{self, CommandError, ComposeRequest, TransformArgs},
};
use asset_compositor::settings::AppSettings;
use asset_compositor::storage::DirectoryUploader;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

const DEFAULT_OUTPUT_DIR: &str = "assets";

#[derive(Parser, Debug)]
#[command(name = "asset-compositor", version, about = "按类别尺寸规范化营销素材")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 合成一张素材并写入输出目录。
    Compose(ComposeArgs),
    /// 只计算布局，不处理像素。
    Placement(PlacementArgs),
    /// 列出所有类别及目标尺寸。
    Categories,
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// 素材类别（hero / deal / destination / flyer / general）。
    #[arg(long, conflicts_with_all = ["width", "height"], required_unless_present_all = ["width", "height"])]
    category: Option<AssetCategory>,

    /// 自定义目标宽度。
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// 自定义目标高度。
    #[arg(long, requires = "width")]
    height: Option<u32>,
}

impl TargetArgs {
    fn resolve(&self) -> Result<(TargetSize, Option<AssetCategory>), CommandError> {
        match (self.category, self.width, self.height) {
            (Some(category), _, _) => Ok((category.target_size(), Some(category))),
            (None, Some(width), Some(height)) => Ok((TargetSize::new(width, height)?, None)),
            _ => Err(CommandError {
                code: "E_INVALID_SPEC",
                stage: "config",
                message: "需要 --category 或同时提供 --width/--height".to_string(),
            }),
        }
    }
}

#[derive(Args, Debug)]
struct TransformCliArgs {
    /// 适配模式（cover / contain / stretch）。
    #[arg(long)]
    fit: Option<FitMode>,

    /// 缩放倍数（0.1 ~ 3.0）。
    #[arg(long)]
    zoom: Option<f64>,

    /// 水平偏移（目标像素）。
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    offset_x: i32,

    /// 垂直偏移（目标像素）。
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    offset_y: i32,
}

impl From<&TransformCliArgs> for TransformArgs {
    fn from(args: &TransformCliArgs) -> Self {
        Self {
            fit_mode: args.fit,
            zoom: args.zoom,
            offset_x: args.offset_x,
            offset_y: args.offset_y,
        }
    }
}

#[derive(Args, Debug)]
struct ComposeArgs {
    /// 文件路径或 `data:image/...;base64,` Data URL。
    #[arg(long)]
    input: String,

    #[command(flatten)]
    target: TargetArgs,

    #[command(flatten)]
    transform: TransformCliArgs,

    /// 背景色 `#rrggbb`，覆盖设置中的默认值。
    #[arg(long)]
    background: Option<Background>,

    /// 输出格式（jpeg / png）。
    #[arg(long, default_value = "jpeg")]
    format: String,

    /// JPEG 质量（1 ~ 100）。
    #[arg(long)]
    quality: Option<u8>,

    /// 额外保存预览 PNG。
    #[arg(long)]
    preview: Option<PathBuf>,

    /// 输出目录，优先于设置文件中的 `output_dir`。
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// 设置文件路径。
    #[arg(long)]
    settings: Option<PathBuf>,

    /// 预览渲染档位（quality / balanced / speed）。
    #[arg(long)]
    profile: Option<String>,
}

#[derive(Args, Debug)]
struct PlacementArgs {
    #[arg(long)]
    source_width: u32,

    #[arg(long)]
    source_height: u32,

    #[command(flatten)]
    target: TargetArgs,

    #[command(flatten)]
    transform: TransformCliArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.cmd {
        Command::Compose(args) => cmd_compose(args).await,
        Command::Placement(args) => cmd_placement(args),
        Command::Categories => print_json(&commands::list_categories()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("❌ [{}] {}", err.code, err.message);
            match serde_json::to_string(&err) {
                Ok(json) => eprintln!("{}", json),
                Err(_) => eprintln!("{}", err.message),
            }
            ExitCode::FAILURE
        }
    }
}

async fn cmd_compose(args: ComposeArgs) -> Result<(), CommandError> {
    let settings = match args.settings.as_deref() {
        Some(path) => AppSettings::load_from_path(path)?,
        None => AppSettings::default(),
    };

    let mut config = CompositorConfig::default();
    settings.apply_to(&mut config)?;
    let compositor = Compositor::new(config);

    if let Some(profile) = args.profile.as_deref() {
        commands::set_render_profile(&compositor, profile)?;
    }
    if let Some(quality) = args.quality {
        compositor.set_jpeg_quality(quality)?;
    }

    let (target, category) = args.target.resolve()?;
    let jpeg_quality = compositor.config_snapshot()?.jpeg_quality;
    let format = OutputFormat::parse(&args.format, jpeg_quality)?;

    let out_dir = args
        .out_dir
        .or_else(|| settings.output_dir.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let uploader = DirectoryUploader::new(out_dir);

    let response = commands::compose(
        &compositor,
        &uploader,
        ComposeRequest {
            input: args.input,
            target,
            category,
            transform: TransformArgs::from(&args.transform),
            background: args.background,
            format: Some(format),
            preview_path: args.preview,
        },
    )
    .await?;

    print_json(&response)
}

fn cmd_placement(args: PlacementArgs) -> Result<(), CommandError> {
    let (target, _) = args.target.resolve()?;
    let response = commands::placement(
        args.source_width,
        args.source_height,
        target,
        TransformArgs::from(&args.transform),
    );
    print_json(&response)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CommandError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| CommandError {
        code: "E_OUTPUT",
        stage: "output",
        message: format!("序列化输出失败：{}", e),
    })?;
    println!("{}", json);
    Ok(())
}
