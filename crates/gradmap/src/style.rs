//! The rendering environment colour variables are read from.
//!
//! [`StyleSheet`] models a document root: a base `:root` block, a `.dark`
//! block that applies while the `dark` class is present, and an inline
//! `style` attribute that wins over both. Inline edits are broadcast to
//! subscribers so out-of-band variable changes can be noticed without
//! polling.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, RwLock};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

/// Class that activates the `.dark` block and doubles as the class-level theme marker.
pub const DARK_CLASS: &str = "dark";

/// Read access to theme variables plus optional change notification.
pub trait StyleEnvironment: Send + Sync {
    /// Current value of a custom property, if any.
    fn variable(&self, name: &str) -> Option<String>;

    fn has_class(&self, class: &str) -> bool;

    /// Hosts that cannot observe style mutations return `None`.
    fn subscribe(&self) -> Option<StyleSubscription> {
        None
    }
}

/// Notification that the inline style attribute changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleMutation {
    pub property: String,
}

/// Receiving end of a style-attribute watch.
#[derive(Debug)]
pub struct StyleSubscription {
    rx: Receiver<StyleMutation>,
}

impl StyleSubscription {
    pub fn new(rx: Receiver<StyleMutation>) -> Self {
        Self { rx }
    }

    /// Drains every queued mutation and reports how many there were.
    ///
    /// A burst of edits between two frames collapses into a single count.
    pub fn drain(&self) -> usize {
        let mut seen = 0;
        loop {
            match self.rx.try_recv() {
                Ok(_) => seen += 1,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        seen
    }
}

#[derive(Debug, Default)]
struct Blocks {
    root: BTreeMap<String, String>,
    dark: BTreeMap<String, String>,
    inline: BTreeMap<String, String>,
    classes: BTreeSet<String>,
}

/// In-memory style environment shared between the host and the renderer.
#[derive(Debug, Default)]
pub struct StyleSheet {
    blocks: RwLock<Blocks>,
    watchers: Mutex<Vec<Sender<StyleMutation>>>,
}

impl StyleSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_root_variable(&self, name: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut blocks) = self.blocks.write() {
            blocks.root.insert(name.into(), value.into());
        }
    }

    pub fn set_dark_variable(&self, name: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut blocks) = self.blocks.write() {
            blocks.dark.insert(name.into(), value.into());
        }
    }

    /// Writes a property into the inline style attribute and notifies watchers.
    pub fn set_property(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if let Ok(mut blocks) = self.blocks.write() {
            blocks.inline.insert(name.clone(), value.into());
        }
        self.notify(&name);
    }

    pub fn remove_property(&self, name: &str) {
        let removed = self
            .blocks
            .write()
            .map(|mut blocks| blocks.inline.remove(name).is_some())
            .unwrap_or(false);
        if removed {
            self.notify(name);
        }
    }

    pub fn set_class(&self, class: &str, enabled: bool) {
        if let Ok(mut blocks) = self.blocks.write() {
            if enabled {
                blocks.classes.insert(class.to_string());
            } else {
                blocks.classes.remove(class);
            }
        }
    }

    fn notify(&self, property: &str) {
        let Ok(mut watchers) = self.watchers.lock() else {
            return;
        };
        watchers.retain(|tx| {
            tx.send(StyleMutation {
                property: property.to_string(),
            })
            .is_ok()
        });
    }
}

impl StyleEnvironment for StyleSheet {
    fn variable(&self, name: &str) -> Option<String> {
        let blocks = self.blocks.read().ok()?;
        if let Some(value) = blocks.inline.get(name) {
            return Some(value.clone());
        }
        if blocks.classes.contains(DARK_CLASS) {
            if let Some(value) = blocks.dark.get(name) {
                return Some(value.clone());
            }
        }
        blocks.root.get(name).cloned()
    }

    fn has_class(&self, class: &str) -> bool {
        self.blocks
            .read()
            .map(|blocks| blocks.classes.contains(class))
            .unwrap_or(false)
    }

    fn subscribe(&self) -> Option<StyleSubscription> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.watchers.lock().ok()?.push(tx);
        Some(StyleSubscription::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_beats_dark_beats_root() {
        let sheet = StyleSheet::new();
        sheet.set_root_variable("--primary", "root");
        sheet.set_dark_variable("--primary", "dark");
        assert_eq!(sheet.variable("--primary").as_deref(), Some("root"));

        sheet.set_class(DARK_CLASS, true);
        assert_eq!(sheet.variable("--primary").as_deref(), Some("dark"));

        sheet.set_property("--primary", "inline");
        assert_eq!(sheet.variable("--primary").as_deref(), Some("inline"));

        sheet.remove_property("--primary");
        assert_eq!(sheet.variable("--primary").as_deref(), Some("dark"));
    }

    #[test]
    fn subscription_coalesces_bursts() {
        let sheet = StyleSheet::new();
        let sub = sheet.subscribe().expect("style sheet supports observation");
        assert_eq!(sub.drain(), 0);

        sheet.set_property("--a", "1");
        sheet.set_property("--b", "2");
        sheet.set_property("--a", "3");
        assert_eq!(sub.drain(), 3);
        assert_eq!(sub.drain(), 0);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let sheet = StyleSheet::new();
        drop(sheet.subscribe());
        sheet.set_property("--a", "1");
        assert!(sheet.watchers.lock().unwrap().is_empty());
    }

    #[test]
    fn class_changes_do_not_notify() {
        let sheet = StyleSheet::new();
        let sub = sheet.subscribe().unwrap();
        sheet.set_class(DARK_CLASS, true);
        assert_eq!(sub.drain(), 0);
        assert!(sheet.has_class(DARK_CLASS));
    }
}
