use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::style::StyleEnvironment;
use crate::theme::ThemeMode;

/// Upper bound on the number of stops the gradient shader accepts.
pub const MAX_RAMP: usize = 10;

/// Normalised RGB colour with channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    /// Parses `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`. Alpha is dropped.
    pub fn from_hex(raw: &str) -> Option<Self> {
        let digits = raw.strip_prefix('#')?;
        if !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match digits.len() {
            3 | 4 => {
                let mut out = [0u8; 3];
                for (slot, ch) in out.iter_mut().zip(digits.chars()) {
                    let nibble = ch.to_digit(16)? as u8;
                    *slot = nibble * 17;
                }
                Some(Self::from_u8(out[0], out[1], out[2]))
            }
            6 | 8 => Some(Self::from_u8(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            _ => None,
        }
    }

    pub fn to_u8(self) -> [u8; 3] {
        let quantise = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [quantise(self.r), quantise(self.g), quantise(self.b)]
    }

    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        Rgb::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }

    pub(crate) fn to_vec4(self) -> [f32; 4] {
        [self.r, self.g, self.b, 1.0]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.to_u8();
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a recognised colour")]
pub struct ParseColorError(pub String);

/// Parses an absolute colour string (`#hex`, `rgb(...)`, or a handful of keywords).
pub fn parse_color(raw: &str) -> Result<Rgb, ParseColorError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('#') {
        return Rgb::from_hex(trimmed).ok_or_else(|| ParseColorError(raw.to_string()));
    }
    let lower = trimmed.to_ascii_lowercase();
    match lower.as_str() {
        "white" => return Ok(Rgb::WHITE),
        "black" | "transparent" => return Ok(Rgb::BLACK),
        _ => {}
    }
    if let Some(inner) = lower
        .strip_prefix("rgb(")
        .or_else(|| lower.strip_prefix("rgba("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let parts: Vec<f32> = inner
            .split(|ch: char| ch == ',' || ch.is_whitespace() || ch == '/')
            .filter(|part| !part.is_empty())
            .map(str::parse::<f32>)
            .collect::<Result<_, _>>()
            .map_err(|_| ParseColorError(raw.to_string()))?;
        if parts.len() >= 3 {
            let channel = |v: f32| (v / 255.0).clamp(0.0, 1.0);
            return Ok(Rgb::new(channel(parts[0]), channel(parts[1]), channel(parts[2])));
        }
    }
    Err(ParseColorError(raw.to_string()))
}

/// Converts HSL (hue in degrees, saturation and lightness in percent) into RGB.
///
/// Each channel is quantised to eight bits before normalising so the result
/// matches the hex string a stylesheet author would see.
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> Rgb {
    let l = l / 100.0;
    let a = s * l.min(1.0 - l) / 100.0;
    let channel = |n: f32| {
        let k = (n + h / 30.0).rem_euclid(12.0);
        let value = l - a * (k - 3.0).min(9.0 - k).min(1.0).max(-1.0);
        (255.0 * value).round().clamp(0.0, 255.0) / 255.0
    };
    Rgb::new(channel(0.0), channel(8.0), channel(4.0))
}

/// Parses a space separated HSL triple such as `222.2 84% 4.9%`.
pub fn parse_hsl_triple(raw: &str) -> Option<Rgb> {
    if !raw.contains(' ') {
        return None;
    }
    let values: Vec<f32> = raw
        .split_whitespace()
        .map(|part| part.trim_end_matches('%').parse::<f32>())
        .collect::<Result<_, _>>()
        .ok()?;
    if values.len() < 3 {
        return None;
    }
    Some(hsl_to_rgb(values[0], values[1], values[2]))
}

/// Abstract colour supplied by configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorToken {
    Literal(Rgb),
    /// Reference to a theme variable such as `--primary`.
    Variable(String),
}

impl ColorToken {
    pub fn parse(raw: &str) -> Result<Self, ParseColorError> {
        let trimmed = raw.trim();
        if trimmed.starts_with("--") {
            Ok(ColorToken::Variable(trimmed.to_string()))
        } else {
            parse_color(trimmed).map(ColorToken::Literal)
        }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        ColorToken::Variable(name.into())
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, ColorToken::Variable(_))
    }
}

impl FromStr for ColorToken {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColorToken::parse(s)
    }
}

impl fmt::Display for ColorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorToken::Literal(rgb) => write!(f, "{rgb}"),
            ColorToken::Variable(name) => f.write_str(name),
        }
    }
}

/// Ordered, bounded list of resolved colours used as a luminance lookup table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColorRamp {
    stops: Vec<Rgb>,
}

impl ColorRamp {
    pub fn new(mut stops: Vec<Rgb>) -> Self {
        if stops.len() > MAX_RAMP {
            tracing::warn!(
                requested = stops.len(),
                max = MAX_RAMP,
                "gradient ramp exceeds the shader limit; extra stops dropped"
            );
            stops.truncate(MAX_RAMP);
        }
        Self { stops }
    }

    pub fn stops(&self) -> &[Rgb] {
        &self.stops
    }

    pub fn active_count(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Fixed-size view for the shader: unused slots are black.
    pub fn padded(&self) -> [Rgb; MAX_RAMP] {
        let mut slots = [Rgb::BLACK; MAX_RAMP];
        for (slot, stop) in slots.iter_mut().zip(&self.stops) {
            *slot = *stop;
        }
        slots
    }
}

struct FallbackEntry {
    name: &'static str,
    light: &'static str,
    dark: &'static str,
}

const FALLBACKS: [FallbackEntry; 8] = [
    FallbackEntry { name: "--background", light: "#ffffff", dark: "#0f172a" },
    FallbackEntry { name: "--foreground", light: "#000000", dark: "#f8fafc" },
    FallbackEntry { name: "--primary", light: "#0ea5e9", dark: "#38bdf8" },
    FallbackEntry { name: "--secondary", light: "#64748b", dark: "#64748b" },
    FallbackEntry { name: "--accent", light: "#6366f1", dark: "#a78bfa" },
    FallbackEntry { name: "--muted", light: "#f1f5f9", dark: "#1e293b" },
    FallbackEntry { name: "--border", light: "#e2e8f0", dark: "#334155" },
    FallbackEntry { name: "--ring", light: "#0ea5e9", dark: "#38bdf8" },
];

const NEUTRAL_LIGHT: Rgb = Rgb::WHITE;
// #1e293b
const NEUTRAL_DARK: Rgb = Rgb::new(30.0 / 255.0, 41.0 / 255.0, 59.0 / 255.0);

/// Theme-appropriate colour for a variable that could not be read.
pub fn fallback_color(name: &str, theme: ThemeMode) -> Rgb {
    FALLBACKS
        .iter()
        .find(|entry| entry.name == name)
        .and_then(|entry| {
            let hex = match theme {
                ThemeMode::Light => entry.light,
                ThemeMode::Dark => entry.dark,
            };
            Rgb::from_hex(hex)
        })
        .unwrap_or_else(|| neutral(theme))
}

fn neutral(theme: ThemeMode) -> Rgb {
    match theme {
        ThemeMode::Light => NEUTRAL_LIGHT,
        ThemeMode::Dark => NEUTRAL_DARK,
    }
}

/// Turns colour tokens into concrete colours against a style environment.
///
/// Resolution never fails; anything unreadable degrades to a themed neutral.
pub struct ColorResolver<'a> {
    env: Option<&'a dyn StyleEnvironment>,
    verbose: bool,
}

impl<'a> ColorResolver<'a> {
    pub fn new(env: Option<&'a dyn StyleEnvironment>) -> Self {
        Self {
            env,
            verbose: false,
        }
    }

    /// Promotes per-token resolution traces to `info` level.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Resolves one token; never fails.
    ///
    /// A variable whose value is neither an HSL triple nor a parseable colour
    /// becomes the theme's neutral rather than being passed through verbatim.
    pub fn resolve(&self, token: &ColorToken, theme: ThemeMode) -> Rgb {
        let name = match token {
            ColorToken::Literal(rgb) => return *rgb,
            ColorToken::Variable(name) => name.as_str(),
        };

        let Some(env) = self.env else {
            tracing::debug!(variable = name, ?theme, "no style environment; using fallback");
            return fallback_color(name, theme);
        };

        let value = env.variable(name).map(|raw| raw.trim().to_string());
        let value = match value {
            Some(value) if !value.is_empty() => value,
            _ => {
                let fallback = fallback_color(name, theme);
                tracing::debug!(
                    variable = name,
                    ?theme,
                    %fallback,
                    "variable resolution fallback"
                );
                return fallback;
            }
        };

        if let Some(rgb) = parse_hsl_triple(&value) {
            if self.verbose {
                tracing::info!(variable = name, value = %value, color = %rgb, "converted HSL variable");
            }
            return rgb;
        }

        match parse_color(&value) {
            Ok(rgb) => {
                if self.verbose {
                    tracing::info!(variable = name, color = %rgb, "using direct variable value");
                }
                rgb
            }
            Err(_) => {
                let fallback = neutral(theme);
                tracing::debug!(
                    variable = name,
                    value = %value,
                    %fallback,
                    "variable value is not a colour; using neutral"
                );
                fallback
            }
        }
    }

    pub fn resolve_ramp(&self, tokens: &[ColorToken], theme: ThemeMode) -> ColorRamp {
        if tokens.is_empty() {
            return self.default_ramp(theme);
        }
        let ramp = ColorRamp::new(
            tokens
                .iter()
                .map(|token| self.resolve(token, theme))
                .collect(),
        );
        if self.verbose {
            tracing::info!(
                ?theme,
                stops = ?ramp.stops().iter().map(ToString::to_string).collect::<Vec<_>>(),
                "resolved gradient ramp"
            );
        }
        ramp
    }

    /// Background, primary and secondary theme colours followed by white.
    pub fn default_ramp(&self, theme: ThemeMode) -> ColorRamp {
        let stops = ["--background", "--primary", "--secondary"]
            .iter()
            .map(|name| self.resolve(&ColorToken::variable(*name), theme))
            .chain(std::iter::once(Rgb::WHITE))
            .collect();
        ColorRamp::new(stops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::StyleSheet;

    #[test]
    fn hsl_primaries_round_trip_to_hex() {
        assert_eq!(hsl_to_rgb(0.0, 100.0, 50.0).to_string(), "#ff0000");
        assert_eq!(hsl_to_rgb(120.0, 100.0, 50.0).to_string(), "#00ff00");
        assert_eq!(hsl_to_rgb(240.0, 100.0, 50.0).to_string(), "#0000ff");
        assert_eq!(hsl_to_rgb(0.0, 0.0, 100.0).to_string(), "#ffffff");
        assert_eq!(hsl_to_rgb(222.2, 84.0, 4.9).to_string(), "#020817");
    }

    #[test]
    fn parses_literal_forms() {
        assert_eq!(parse_color("#fff").unwrap(), Rgb::WHITE);
        assert_eq!(parse_color("#000000").unwrap(), Rgb::BLACK);
        assert_eq!(parse_color("rgb(255, 0, 0)").unwrap().to_string(), "#ff0000");
        assert_eq!(parse_color("White").unwrap(), Rgb::WHITE);
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("chartreuse-ish").is_err());
    }

    #[test]
    fn token_parse_distinguishes_variables() {
        assert_eq!(
            ColorToken::parse("--primary").unwrap(),
            ColorToken::Variable("--primary".into())
        );
        assert_eq!(
            ColorToken::parse("#ffffff").unwrap(),
            ColorToken::Literal(Rgb::WHITE)
        );
    }

    #[test]
    fn literal_tokens_pass_through_unchanged() {
        let resolver = ColorResolver::new(None);
        let token = ColorToken::Literal(Rgb::new(0.25, 0.5, 0.75));
        assert_eq!(
            resolver.resolve(&token, ThemeMode::Dark),
            Rgb::new(0.25, 0.5, 0.75)
        );
    }

    #[test]
    fn missing_variables_use_theme_fallback_table() {
        let sheet = StyleSheet::new();
        let resolver = ColorResolver::new(Some(&sheet));
        let primary = ColorToken::variable("--primary");
        assert_eq!(resolver.resolve(&primary, ThemeMode::Light).to_string(), "#0ea5e9");
        assert_eq!(resolver.resolve(&primary, ThemeMode::Dark).to_string(), "#38bdf8");
    }

    #[test]
    fn unknown_variable_without_value_degrades_to_neutral() {
        let sheet = StyleSheet::new();
        let resolver = ColorResolver::new(Some(&sheet));
        let token = ColorToken::variable("--brand-glow");
        assert_eq!(resolver.resolve(&token, ThemeMode::Light), Rgb::WHITE);
        assert_eq!(resolver.resolve(&token, ThemeMode::Dark).to_string(), "#1e293b");
    }

    #[test]
    fn hsl_variables_are_converted() {
        let sheet = StyleSheet::new();
        sheet.set_root_variable("--primary", "0 100% 50%");
        let resolver = ColorResolver::new(Some(&sheet));
        assert_eq!(
            resolver
                .resolve(&ColorToken::variable("--primary"), ThemeMode::Light)
                .to_string(),
            "#ff0000"
        );
    }

    #[test]
    fn absolute_variable_values_are_used_directly() {
        let sheet = StyleSheet::new();
        sheet.set_root_variable("--accent", "#123456");
        sheet.set_root_variable("--border", "not a colour");
        let resolver = ColorResolver::new(Some(&sheet));
        assert_eq!(
            resolver
                .resolve(&ColorToken::variable("--accent"), ThemeMode::Light)
                .to_string(),
            "#123456"
        );
        assert_eq!(
            resolver.resolve(&ColorToken::variable("--border"), ThemeMode::Dark),
            NEUTRAL_DARK
        );
    }

    #[test]
    fn empty_token_list_yields_four_stop_default() {
        let resolver = ColorResolver::new(None);
        let ramp = resolver.resolve_ramp(&[], ThemeMode::Light);
        let hex: Vec<String> = ramp.stops().iter().map(ToString::to_string).collect();
        assert_eq!(hex, ["#ffffff", "#0ea5e9", "#64748b", "#ffffff"]);
    }

    #[test]
    fn ramp_pads_with_black_and_truncates() {
        let ramp = ColorRamp::new(vec![Rgb::WHITE, Rgb::WHITE]);
        let padded = ramp.padded();
        assert_eq!(ramp.active_count(), 2);
        assert_eq!(padded[0], Rgb::WHITE);
        assert!(padded[2..].iter().all(|slot| *slot == Rgb::BLACK));

        let long = ColorRamp::new(vec![Rgb::WHITE; MAX_RAMP + 3]);
        assert_eq!(long.active_count(), MAX_RAMP);
    }
}
