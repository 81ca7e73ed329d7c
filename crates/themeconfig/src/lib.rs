use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Default window size when `[window] size` is omitted.
pub const DEFAULT_WINDOW_SIZE: [u32; 2] = [1280, 720];

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GradientConfig {
    #[serde(default)]
    pub media: MediaSection,
    #[serde(default)]
    pub colors: ColorsSection,
    #[serde(default)]
    pub render: RenderSection,
    #[serde(default)]
    pub variables: VariablesSection,
    #[serde(default)]
    pub style: StyleSection,
    #[serde(default)]
    pub window: WindowSection,
}

/// At most one of the three sources may be set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MediaSection {
    pub image: Option<String>,
    pub video: Option<String>,
    pub raw: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaChoice {
    Image(String),
    Video(String),
    /// File whose bytes are handed to the renderer as an in-memory payload.
    Raw(PathBuf),
}

impl MediaSection {
    pub fn choice(&self) -> Option<MediaChoice> {
        self.image
            .clone()
            .map(MediaChoice::Image)
            .or_else(|| self.video.clone().map(MediaChoice::Video))
            .or_else(|| self.raw.clone().map(MediaChoice::Raw))
    }

    fn configured(&self) -> usize {
        [self.image.is_some(), self.video.is_some(), self.raw.is_some()]
            .into_iter()
            .filter(|set| *set)
            .count()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ColorsSection {
    #[serde(default)]
    pub light: Vec<String>,
    #[serde(default)]
    pub dark: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeSetting {
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSetting {
    Low,
    #[default]
    High,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RenderSection {
    #[serde(default)]
    pub pass_through: bool,
    /// Defaults to `embedded` when omitted.
    #[serde(default)]
    pub debug: Option<bool>,
    #[serde(default)]
    pub embedded: bool,
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub init_delay: Option<Duration>,
    #[serde(default)]
    pub theme: Option<ThemeSetting>,
    #[serde(default)]
    pub gpu_power: PowerSetting,
}

impl RenderSection {
    pub fn debug_enabled(&self) -> bool {
        self.debug.unwrap_or(self.embedded)
    }
}

/// Bounded wait for theme variables; unset fields fall back to the host defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VariablesSection {
    #[serde(default)]
    pub wait_attempts: Option<u32>,
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub wait_backoff: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StyleSection {
    #[serde(default)]
    pub root: BTreeMap<String, String>,
    #[serde(default)]
    pub dark: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WindowSection {
    #[serde(default)]
    pub size: Option<[u32; 2]>,
}

impl WindowSection {
    pub fn size(&self) -> [u32; 2] {
        self.size.unwrap_or(DEFAULT_WINDOW_SIZE)
    }
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl GradientConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: GradientConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.media.configured() > 1 {
            return Err(ConfigError::Invalid(
                "[media] may set only one of image, video or raw".into(),
            ));
        }
        for (key, value) in [("image", &self.media.image), ("video", &self.media.video)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!("media.{key} may not be empty")));
            }
        }

        for (theme, colors) in [("light", &self.colors.light), ("dark", &self.colors.dark)] {
            if colors.iter().any(|color| color.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "colors.{theme} contains an empty entry"
                )));
            }
        }

        if self.variables.wait_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "variables.wait_attempts must be at least 1".into(),
            ));
        }

        for (block, vars) in [("root", &self.style.root), ("dark", &self.style.dark)] {
            if let Some(name) = vars.keys().find(|name| !name.starts_with("--")) {
                return Err(ConfigError::Invalid(format!(
                    "style.{block} key '{name}' must start with '--'"
                )));
            }
        }

        let [width, height] = self.window.size();
        if width == 0 || height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window.size must be non-zero, got {width}x{height}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r##"
[media]
image = "hero.png"

[colors]
light = ["#ffffff", "--primary", "#000000"]
dark = ["--background", "--accent"]

[render]
pass_through = false
embedded = true
init_delay = "250ms"
theme = "dark"
gpu_power = "low"

[variables]
wait_attempts = 5
wait_backoff = 0.2

[style.root]
"--background" = "0 0% 100%"

[style.dark]
"--background" = "222.2 84% 4.9%"

[window]
size = [800, 600]
"##;

    #[test]
    fn parses_sample_config() {
        let config = GradientConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.media.choice(), Some(MediaChoice::Image("hero.png".into())));
        assert_eq!(config.colors.light.len(), 3);
        assert_eq!(config.colors.dark[1], "--accent");
        assert!(config.render.debug_enabled());
        assert_eq!(config.render.init_delay, Some(Duration::from_millis(250)));
        assert_eq!(config.render.theme, Some(ThemeSetting::Dark));
        assert_eq!(config.render.gpu_power, PowerSetting::Low);
        assert_eq!(config.variables.wait_attempts, Some(5));
        assert_eq!(config.variables.wait_backoff, Some(Duration::from_millis(200)));
        assert_eq!(
            config.style.dark.get("--background").map(String::as_str),
            Some("222.2 84% 4.9%")
        );
        assert_eq!(config.window.size(), [800, 600]);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = GradientConfig::from_toml_str("").unwrap();
        assert_eq!(config.media.choice(), None);
        assert!(config.colors.light.is_empty());
        assert!(!config.render.debug_enabled());
        assert_eq!(config.render.gpu_power, PowerSetting::High);
        assert_eq!(config.window.size(), DEFAULT_WINDOW_SIZE);
    }

    #[test]
    fn explicit_debug_overrides_embedded() {
        let config = GradientConfig::from_toml_str(
            r#"
[render]
embedded = true
debug = false
"#,
        )
        .unwrap();
        assert!(!config.render.debug_enabled());
    }

    #[test]
    fn rejects_multiple_media_sources() {
        let err = GradientConfig::from_toml_str(
            r#"
[media]
image = "a.png"
video = "b.gif"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_wait_budget() {
        let err = GradientConfig::from_toml_str("[variables]\nwait_attempts = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_style_keys_without_prefix() {
        let err = GradientConfig::from_toml_str("[style.root]\nbackground = \"#fff\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_window_size() {
        let err = GradientConfig::from_toml_str("[window]\nsize = [0, 600]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = GradientConfig::from_toml_str("[render]\nfps = 60\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[media]\nraw = \"upload.bin\"").unwrap();
        let config = GradientConfig::load(file.path()).unwrap();
        assert_eq!(
            config.media.choice(),
            Some(MediaChoice::Raw(PathBuf::from("upload.bin")))
        );

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            GradientConfig::load(&missing),
            Err(ConfigError::Io { .. })
        ));
    }
}
