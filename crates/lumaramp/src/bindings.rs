//! Maps the TOML configuration and CLI overrides onto renderer types.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use gradmap::types::DEFAULT_INIT_DELAY;
use gradmap::{
    ColorToken, GpuPowerPreference, MediaDescriptor, RendererConfig, StyleSheet, ThemeMode,
    VariableWait, ViewportSize,
};
use themeconfig::{GradientConfig, MediaChoice, PowerSetting, ThemeSetting};

use crate::cli::RenderArgs;

pub fn renderer_config(config: &GradientConfig, args: &RenderArgs) -> Result<RendererConfig> {
    let [width, height] = config.window.size();
    let render = &config.render;

    let light = pick_colors(&args.light, &config.colors.light);
    let dark = pick_colors(&args.dark, &config.colors.dark);

    let mut variable_wait = VariableWait::for_host(render.embedded);
    if let Some(attempts) = config.variables.wait_attempts {
        variable_wait.attempts = attempts;
    }
    if let Some(backoff) = config.variables.wait_backoff {
        variable_wait.backoff = backoff;
    }

    Ok(RendererConfig {
        surface_size: ViewportSize::new(width, height),
        media: media_descriptor(media_choice(config, args).as_ref())?,
        light_colors: parse_tokens(light).context("invalid light colour list")?,
        dark_colors: parse_tokens(dark).context("invalid dark colour list")?,
        pass_through: args.pass_through || render.pass_through,
        debug: args.debug || render.debug_enabled(),
        embedded: render.embedded,
        theme_override: args.theme.or(render.theme.map(theme_mode)),
        init_delay: render.init_delay.unwrap_or(DEFAULT_INIT_DELAY),
        variable_wait,
        gpu_power: match render.gpu_power {
            PowerSetting::Low => GpuPowerPreference::Low,
            PowerSetting::High => GpuPowerPreference::High,
        },
        ..RendererConfig::default()
    })
}

/// The `:root` and `.dark` variable blocks from `[style]`.
pub fn style_sheet(config: &GradientConfig) -> Arc<StyleSheet> {
    let sheet = StyleSheet::new();
    for (name, value) in &config.style.root {
        sheet.set_root_variable(name.as_str(), value.as_str());
    }
    for (name, value) in &config.style.dark {
        sheet.set_dark_variable(name.as_str(), value.as_str());
    }
    Arc::new(sheet)
}

fn pick_colors<'a>(cli: &'a [String], file: &'a [String]) -> &'a [String] {
    if cli.is_empty() {
        file
    } else {
        cli
    }
}

fn parse_tokens(raw: &[String]) -> Result<Vec<ColorToken>> {
    raw.iter()
        .map(|value| ColorToken::parse(value).with_context(|| format!("colour '{value}'")))
        .collect()
}

fn theme_mode(setting: ThemeSetting) -> ThemeMode {
    match setting {
        ThemeSetting::Light => ThemeMode::Light,
        ThemeSetting::Dark => ThemeMode::Dark,
    }
}

/// CLI media flags replace the configured source entirely.
fn media_choice(config: &GradientConfig, args: &RenderArgs) -> Option<MediaChoice> {
    args.image
        .clone()
        .map(MediaChoice::Image)
        .or_else(|| args.video.clone().map(MediaChoice::Video))
        .or_else(|| args.raw.clone().map(MediaChoice::Raw))
        .or_else(|| config.media.choice())
}

fn media_descriptor(choice: Option<&MediaChoice>) -> Result<MediaDescriptor> {
    Ok(match choice {
        None => MediaDescriptor::None,
        Some(MediaChoice::Image(location)) => MediaDescriptor::Image(location.clone()),
        Some(MediaChoice::Video(location)) => MediaDescriptor::Video(location.clone()),
        Some(MediaChoice::Raw(path)) => MediaDescriptor::RawImage(Arc::from(read_raw(path)?)),
    })
}

fn read_raw(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read raw image {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gradmap::StyleEnvironment;
    use std::time::Duration;

    fn config(toml: &str) -> GradientConfig {
        GradientConfig::from_toml_str(toml).unwrap()
    }

    #[test]
    fn cli_flags_override_file_values() {
        let file = config(
            r##"
[media]
image = "file.png"

[colors]
light = ["#ffffff", "#000000"]

[render]
theme = "light"
"##,
        );
        let args = RenderArgs {
            video: Some("clip.gif".into()),
            light: vec!["--primary".into()],
            theme: Some(ThemeMode::Dark),
            ..RenderArgs::default()
        };
        let resolved = renderer_config(&file, &args).unwrap();
        assert_eq!(resolved.media, MediaDescriptor::Video("clip.gif".into()));
        assert_eq!(resolved.light_colors, vec![ColorToken::variable("--primary")]);
        assert_eq!(resolved.theme_override, Some(ThemeMode::Dark));
    }

    #[test]
    fn embedded_hosts_get_the_longer_wait_and_debug() {
        let resolved =
            renderer_config(&config("[render]\nembedded = true\n"), &RenderArgs::default())
                .unwrap();
        assert_eq!(resolved.variable_wait, VariableWait::EMBEDDED);
        assert!(resolved.debug);

        let resolved = renderer_config(
            &config("[variables]\nwait_attempts = 7\nwait_backoff = \"20ms\"\n"),
            &RenderArgs::default(),
        )
        .unwrap();
        assert_eq!(resolved.variable_wait.attempts, 7);
        assert_eq!(resolved.variable_wait.backoff, Duration::from_millis(20));
        assert_eq!(resolved.init_delay, DEFAULT_INIT_DELAY);
    }

    #[test]
    fn invalid_colour_is_reported() {
        let args = RenderArgs {
            dark: vec!["not-a-colour".into()],
            ..RenderArgs::default()
        };
        let err = renderer_config(&GradientConfig::default(), &args).unwrap_err();
        assert!(format!("{err:#}").contains("not-a-colour"));
    }

    #[test]
    fn raw_media_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        fs::write(&path, [1u8, 2, 3]).unwrap();
        let args = RenderArgs {
            raw: Some(path),
            ..RenderArgs::default()
        };
        let resolved = renderer_config(&GradientConfig::default(), &args).unwrap();
        match resolved.media {
            MediaDescriptor::RawImage(bytes) => assert_eq!(&bytes[..], &[1, 2, 3]),
            other => panic!("unexpected media {other:?}"),
        }
    }

    #[test]
    fn style_blocks_populate_the_sheet() {
        let sheet = style_sheet(&config(
            "[style.root]\n\"--primary\" = \"0 100% 50%\"\n[style.dark]\n\"--primary\" = \"120 100% 50%\"\n",
        ));
        assert_eq!(sheet.variable("--primary").as_deref(), Some("0 100% 50%"));
        sheet.set_class("dark", true);
        assert_eq!(sheet.variable("--primary").as_deref(), Some("120 100% 50%"));
    }
}
