//! Containers the renderer mounts into.

use std::sync::Arc;

use anyhow::{bail, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::Window;

use crate::types::ViewportSize;

/// Anything a wgpu surface can be created from.
pub trait WindowTarget: HasDisplayHandle + HasWindowHandle {}

impl<T: HasDisplayHandle + HasWindowHandle> WindowTarget for T {}

/// The element that hosts the render surface.
pub trait RenderHost {
    /// Current content box, or `None` when there is nothing to measure.
    fn content_box(&self) -> Option<ViewportSize>;

    /// Window to present into. Hosts without one render offscreen.
    fn window_target(&self) -> Option<&dyn WindowTarget> {
        None
    }

    /// Removes the render surface from the host. Errors are reported but
    /// callers on the teardown path ignore them.
    fn detach(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Offscreen host with an explicitly set content box.
#[derive(Debug, Clone, Default)]
pub struct HeadlessHost {
    size: Option<ViewportSize>,
    attached: bool,
}

impl HeadlessHost {
    pub fn new(size: ViewportSize) -> Self {
        Self {
            size: Some(size),
            attached: true,
        }
    }

    /// A host that has already been removed from its layout.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn set_size(&mut self, size: ViewportSize) {
        self.size = Some(size);
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

impl RenderHost for HeadlessHost {
    fn content_box(&self) -> Option<ViewportSize> {
        self.size.filter(|_| self.attached)
    }

    fn detach(&mut self) -> Result<()> {
        if !self.attached {
            bail!("headless host already detached");
        }
        self.attached = false;
        Ok(())
    }
}

/// A winit window acting as the host element.
#[derive(Debug, Clone)]
pub struct WindowHost {
    window: Arc<Window>,
    attached: bool,
}

impl WindowHost {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            attached: true,
        }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }
}

impl RenderHost for WindowHost {
    fn content_box(&self) -> Option<ViewportSize> {
        if !self.attached {
            return None;
        }
        let size = ViewportSize::from(self.window.inner_size());
        (!size.is_empty()).then_some(size)
    }

    fn window_target(&self) -> Option<&dyn WindowTarget> {
        self.attached.then_some(self.window.as_ref() as &dyn WindowTarget)
    }

    fn detach(&mut self) -> Result<()> {
        if !self.attached {
            bail!("window surface already detached");
        }
        self.attached = false;
        self.window.set_visible(false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_headless_host_has_no_content_box() {
        let mut host = HeadlessHost::new(ViewportSize::new(4, 4));
        assert_eq!(host.content_box(), Some(ViewportSize::new(4, 4)));
        host.detach().unwrap();
        assert_eq!(host.content_box(), None);
        assert!(host.detach().is_err());
    }
}
