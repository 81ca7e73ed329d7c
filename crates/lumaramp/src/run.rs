use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use gradmap::{render_still, RendererConfig, StyleEnvironment, ViewportSize, WindowRuntime};
use themeconfig::GradientConfig;
use tracing_subscriber::EnvFilter;

use crate::bindings::{renderer_config, style_sheet};
use crate::cli::{Cli, Command, SnapshotArgs, ViewArgs};
use crate::paths::AppPaths;

const WINDOW_CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

pub fn run(cli: Cli) -> Result<()> {
    let file = load_config(cli.config.as_deref())?;
    let config = renderer_config(&file, &cli.render)?;
    let style: Arc<dyn StyleEnvironment> = style_sheet(&file);
    tracing::debug!(
        media = config.media.kind(),
        light = config.light_colors.len(),
        dark = config.dark_colors.len(),
        pass_through = config.pass_through,
        theme = ?config.theme_override,
        "resolved renderer configuration"
    );

    match cli.command {
        Some(Command::Snapshot(args)) => run_snapshot(config, style, args),
        Some(Command::View(args)) => run_view(config, style, args),
        None => run_view(config, style, ViewArgs::default()),
    }
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// An explicit `--config` must exist; the discovered default is optional.
fn load_config(explicit: Option<&Path>) -> Result<GradientConfig> {
    if let Some(path) = explicit {
        return GradientConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()));
    }
    let paths = AppPaths::discover()?;
    let path = paths.config_file();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no configuration file; using defaults");
        return Ok(GradientConfig::default());
    }
    tracing::debug!(path = %path.display(), "loading configuration");
    GradientConfig::load(&path).with_context(|| format!("failed to load {}", path.display()))
}

fn run_snapshot(
    config: RendererConfig,
    style: Arc<dyn StyleEnvironment>,
    args: SnapshotArgs,
) -> Result<()> {
    let size = args
        .size
        .map(|(width, height)| ViewportSize::new(width, height))
        .unwrap_or(config.surface_size);
    tracing::info!(width = size.width, height = size.height, "rendering snapshot offscreen");
    let bytes = render_still(config, Some(style), size, args.timeout)
        .context("failed to render snapshot")?;
    write_png(&args.output, &bytes)
}

fn run_view(
    config: RendererConfig,
    style: Arc<dyn StyleEnvironment>,
    args: ViewArgs,
) -> Result<()> {
    let runtime = WindowRuntime::spawn(config, Some(style)).context("failed to open window")?;
    let Some(delay) = args.capture_after else {
        return runtime.wait();
    };
    let Some(output) = args.output else {
        bail!("--capture-after requires --output");
    };

    thread::sleep(delay);
    let bytes = runtime
        .capture_snapshot(WINDOW_CAPTURE_TIMEOUT)
        .context("failed to capture window snapshot")?;
    write_png(&output, &bytes)?;
    runtime.shutdown()
}

fn write_png(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "snapshot written");
    Ok(())
}
