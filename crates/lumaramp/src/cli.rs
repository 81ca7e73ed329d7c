use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use gradmap::ThemeMode;

#[derive(Parser, Debug)]
#[command(
    name = "lumaramp",
    author,
    version,
    about = "Render images and animated clips through a theme-synchronised gradient map"
)]
pub struct Cli {
    /// Configuration file; defaults to `config.toml` in the user config directory.
    #[arg(long, global = true, value_name = "FILE", env = "LUMARAMP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub render: RenderArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Overrides applied on top of the configuration file.
#[derive(Args, Debug, Default)]
pub struct RenderArgs {
    /// Still image to map (path or http(s) URL).
    #[arg(long, global = true, value_name = "PATH|URL", conflicts_with_all = ["video", "raw"])]
    pub image: Option<String>,

    /// Clip to map: animated GIF/APNG, or mp4/webm/mkv via ffmpeg (path or http(s) URL).
    #[arg(long, global = true, value_name = "PATH|URL", conflicts_with = "raw")]
    pub video: Option<String>,

    /// File whose bytes are handed over as an in-memory upload.
    #[arg(long, global = true, value_name = "FILE")]
    pub raw: Option<PathBuf>,

    /// Light-theme ramp, comma separated (`#fff,--primary,#000`).
    #[arg(
        long,
        global = true,
        value_name = "COLORS",
        value_delimiter = ',',
        allow_hyphen_values = true
    )]
    pub light: Vec<String>,

    /// Dark-theme ramp, comma separated.
    #[arg(
        long,
        global = true,
        value_name = "COLORS",
        value_delimiter = ',',
        allow_hyphen_values = true
    )]
    pub dark: Vec<String>,

    /// Show the media unmodified instead of gradient-mapped.
    #[arg(long, global = true)]
    pub pass_through: bool,

    /// Force the theme: `light` or `dark`.
    #[arg(long, global = true, value_name = "THEME", value_parser = parse_theme)]
    pub theme: Option<ThemeMode>,

    /// Log colour resolution details.
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a window and render continuously (the default).
    View(ViewArgs),
    /// Render offscreen once and write a PNG.
    Snapshot(SnapshotArgs),
}

#[derive(Args, Debug, Default)]
pub struct ViewArgs {
    /// Capture a snapshot after this long, write it to `--output` and close.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration, requires = "output")]
    pub capture_after: Option<Duration>,

    #[arg(long, short, value_name = "PNG")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    #[arg(long, short, value_name = "PNG")]
    pub output: PathBuf,

    /// Render size, e.g. `1920x1080`; defaults to the configured window size.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Upper bound on waiting for media before capturing anyway.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration, default_value = "10s")]
    pub timeout: Duration,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_theme(value: &str) -> Result<ThemeMode, String> {
    value.trim().parse::<ThemeMode>().map_err(|err| err.to_string())
}

pub fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value.trim()).map_err(|err| format!("invalid duration '{value}': {err}"))
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WxH format, e.g. 1920x1080".to_string())?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in size specification".to_string())?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in size specification".to_string())?;
    if width == 0 || height == 0 {
        return Err("dimensions must be greater than zero".into());
    }
    Ok((width, height))
}
