use std::fmt;
use std::str::FromStr;

use crate::style::{StyleEnvironment, DARK_CLASS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ThemeMode::Light),
            "dark" => Ok(ThemeMode::Dark),
            other => Err(format!("unknown theme '{other}' (expected light or dark)")),
        }
    }
}

impl From<winit::window::Theme> for ThemeMode {
    fn from(theme: winit::window::Theme) -> Self {
        match theme {
            winit::window::Theme::Light => ThemeMode::Light,
            winit::window::Theme::Dark => ThemeMode::Dark,
        }
    }
}

/// Everything that can decide the active theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThemeInputs {
    /// Window-system preference, when the platform reports one.
    pub signal: Option<ThemeMode>,
    /// Explicit per-call override from configuration.
    pub override_: Option<ThemeMode>,
}

impl ThemeInputs {
    /// Signal, then the `dark` class marker, then the override, then light.
    pub fn resolve(&self, env: Option<&dyn StyleEnvironment>) -> ThemeMode {
        if let Some(signal) = self.signal {
            return signal;
        }
        if env.is_some_and(|env| env.has_class(DARK_CLASS)) {
            return ThemeMode::Dark;
        }
        self.override_.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::StyleSheet;

    #[test]
    fn undetermined_theme_is_light() {
        assert_eq!(ThemeInputs::default().resolve(None), ThemeMode::Light);
    }

    #[test]
    fn signal_wins_over_marker_and_override() {
        let sheet = StyleSheet::new();
        sheet.set_class(DARK_CLASS, true);
        let inputs = ThemeInputs {
            signal: Some(ThemeMode::Light),
            override_: Some(ThemeMode::Dark),
        };
        assert_eq!(inputs.resolve(Some(&sheet)), ThemeMode::Light);
    }

    #[test]
    fn class_marker_beats_override() {
        let sheet = StyleSheet::new();
        sheet.set_class(DARK_CLASS, true);
        let inputs = ThemeInputs {
            signal: None,
            override_: Some(ThemeMode::Light),
        };
        assert_eq!(inputs.resolve(Some(&sheet)), ThemeMode::Dark);

        sheet.set_class(DARK_CLASS, false);
        assert_eq!(inputs.resolve(Some(&sheet)), ThemeMode::Light);
    }

    #[test]
    fn parses_names() {
        assert_eq!("Dark".parse::<ThemeMode>().unwrap(), ThemeMode::Dark);
        assert!("dim".parse::<ThemeMode>().is_err());
    }
}
