//! Keeps the gradient ramp in step with theme, tokens and style edits.

use crate::color::{ColorRamp, ColorResolver, ColorToken};
use crate::gpu::{GradientPipeline, MaterialMode};
use crate::style::{StyleEnvironment, StyleSubscription};
use crate::theme::ThemeMode;

/// Receiver of recomputed ramps.
pub trait RampTarget {
    fn material_mode(&self) -> Option<MaterialMode>;

    /// Stages `ramp`; returns whether the active material accepted it.
    fn update_ramp(&mut self, ramp: &ColorRamp) -> bool;
}

impl RampTarget for GradientPipeline {
    fn material_mode(&self) -> Option<MaterialMode> {
        GradientPipeline::material_mode(self)
    }

    fn update_ramp(&mut self, ramp: &ColorRamp) -> bool {
        GradientPipeline::update_ramp(self, ramp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No input changed since the last sync.
    Clean,
    /// A new ramp was staged on the gradient material.
    Pushed,
    /// Recomputed, but the result matched what the material already had.
    Unchanged,
    /// Recomputed, but the active material does not take a ramp.
    Ignored,
}

pub struct UniformSynchronizer {
    light: Vec<ColorToken>,
    dark: Vec<ColorToken>,
    theme: ThemeMode,
    subscription: Option<StyleSubscription>,
    dirty: bool,
    verbose: bool,
}

impl UniformSynchronizer {
    pub fn new(light: Vec<ColorToken>, dark: Vec<ColorToken>, theme: ThemeMode) -> Self {
        Self {
            light,
            dark,
            theme,
            subscription: None,
            dirty: true,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Starts watching the environment's style attribute, when it supports that.
    pub fn observe(&mut self, env: &dyn StyleEnvironment) {
        self.subscription = env.subscribe();
        if self.subscription.is_none() {
            tracing::debug!("style environment offers no mutation feed; edits apply on theme change only");
        }
    }

    pub fn is_observing(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn theme(&self) -> ThemeMode {
        self.theme
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn set_theme(&mut self, theme: ThemeMode) {
        if theme != self.theme {
            tracing::debug!(from = %self.theme, to = %theme, "theme changed");
            self.theme = theme;
            self.dirty = true;
        }
    }

    pub fn set_tokens(&mut self, light: Vec<ColorToken>, dark: Vec<ColorToken>) {
        if light != self.light || dark != self.dark {
            self.light = light;
            self.dark = dark;
            self.dirty = true;
        }
    }

    pub fn tokens(&self) -> &[ColorToken] {
        match self.theme {
            ThemeMode::Light => &self.light,
            ThemeMode::Dark => &self.dark,
        }
    }

    /// True when any configured token for either theme is a variable reference.
    pub fn uses_variables(&self) -> bool {
        self.light.iter().chain(&self.dark).any(ColorToken::is_variable)
            || self.light.is_empty()
            || self.dark.is_empty()
    }

    /// Resolves the ramp for the current theme without touching the dirty flag.
    pub fn resolve(&self, env: Option<&dyn StyleEnvironment>) -> ColorRamp {
        ColorResolver::new(env)
            .verbose(self.verbose)
            .resolve_ramp(self.tokens(), self.theme)
    }

    /// Folds pending style mutations in and, if anything changed, recomputes
    /// the ramp and pushes it to `target` when a gradient material is active.
    pub fn sync(
        &mut self,
        env: Option<&dyn StyleEnvironment>,
        target: &mut dyn RampTarget,
    ) -> SyncOutcome {
        if let Some(subscription) = self.subscription.as_ref() {
            let mutations = subscription.drain();
            if mutations > 0 {
                tracing::trace!(mutations, "style attribute changed");
                self.dirty = true;
            }
        }
        if !self.dirty {
            return SyncOutcome::Clean;
        }
        self.dirty = false;

        if target.material_mode() != Some(MaterialMode::GradientMapped) {
            return SyncOutcome::Ignored;
        }
        let ramp = self.resolve(env);
        if target.update_ramp(&ramp) {
            tracing::debug!(theme = %self.theme, stops = ramp.active_count(), "ramp pushed");
            SyncOutcome::Pushed
        } else {
            SyncOutcome::Unchanged
        }
    }
}
