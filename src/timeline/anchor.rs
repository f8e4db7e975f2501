//! Scroll anchoring for an incrementally growing entry viewport.
//!
//! Every mutation of the rendered sequence is followed by a call to
//! [`ScrollAnchor::reconcile`] with the new content extent. What happens to the
//! scroll offset depends on why the list changed:
//!
//! * [`AnchorMode::SnapToBottom`]: new content at the end (append, promote,
//!   fresh load). The viewport jumps to the newest row unless auto-scroll is
//!   switched off.
//! * [`AnchorMode::PreserveOffset`]: content inserted above the viewport
//!   (older page). The offset grows by exactly the extent delta so the rows
//!   the user was reading stay put.
//! * [`AnchorMode::Hold`]: in-place changes (edit, highlight, delete, display
//!   toggles). The offset stays, clamped to the new extent.

use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AnchorMode {
    SnapToBottom,
    PreserveOffset,
    Hold,
}

#[derive(Debug, Clone)]
pub struct ScrollAnchor {
    offset: usize,
    previous_extent: usize,
    viewport: usize,
    pending: AnchorMode,
    auto_scroll: bool,
}

impl Default for ScrollAnchor {
    fn default() -> Self {
        Self {
            offset: 0,
            previous_extent: 0,
            viewport: 0,
            pending: AnchorMode::SnapToBottom,
            auto_scroll: true,
        }
    }
}

impl ScrollAnchor {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn extent(&self) -> usize {
        self.previous_extent
    }

    pub fn viewport(&self) -> usize {
        self.viewport
    }

    pub fn pending(&self) -> AnchorMode {
        self.pending
    }

    pub fn auto_scroll(&self) -> bool {
        self.auto_scroll
    }

    /// Pins or unpins the viewport; while unpinned, snap requests hold instead.
    pub fn set_auto_scroll(&mut self, enabled: bool) {
        self.auto_scroll = enabled;
    }

    pub fn at_top(&self) -> bool {
        self.offset == 0
    }

    pub fn at_bottom(&self) -> bool {
        self.offset >= self.max_offset(self.previous_extent)
    }

    /// Records why the next mutation is happening.
    pub fn request(&mut self, mode: AnchorMode) {
        self.pending = mode;
    }

    /// Applies the pending intent against the new content extent and returns
    /// the mode that was actually used.
    pub fn reconcile(&mut self, extent: usize) -> AnchorMode {
        let mode = match self.pending {
            AnchorMode::SnapToBottom if !self.auto_scroll => AnchorMode::Hold,
            mode => mode,
        };
        let max = self.max_offset(extent);
        self.offset = match mode {
            AnchorMode::SnapToBottom => max,
            AnchorMode::PreserveOffset => {
                let delta = extent as isize - self.previous_extent as isize;
                clamp_offset(self.offset as isize + delta, max)
            }
            AnchorMode::Hold => self.offset.min(max),
        };
        self.previous_extent = extent;
        self.pending = AnchorMode::Hold;
        mode
    }

    /// Re-measures after the displayed dataset was swapped and pins to the
    /// bottom, so the next delta is computed against the right baseline.
    pub fn resnapshot(&mut self, extent: usize) {
        self.previous_extent = extent;
        self.offset = self.max_offset(extent);
        self.pending = AnchorMode::Hold;
    }

    /// Adjusts to a new viewport height. A viewport resting on the bottom
    /// stays there.
    pub fn resize(&mut self, viewport: usize, extent: usize) {
        let was_at_bottom = self.at_bottom();
        self.viewport = viewport;
        self.previous_extent = extent;
        let max = self.max_offset(extent);
        self.offset = if was_at_bottom {
            max
        } else {
            self.offset.min(max)
        };
    }

    /// User-driven scroll. Returns the new offset.
    pub fn scroll_by(&mut self, delta: isize) -> usize {
        let max = self.max_offset(self.previous_extent);
        self.offset = clamp_offset(self.offset as isize + delta, max);
        self.offset
    }

    /// Scrolls the minimum amount needed to show rows `top..top + height`.
    pub fn reveal(&mut self, top: usize, height: usize) {
        if top < self.offset {
            self.offset = top;
        } else if top + height > self.offset + self.viewport {
            let wanted = (top + height).saturating_sub(self.viewport);
            self.offset = wanted.min(top).min(self.max_offset(self.previous_extent));
        }
    }

    fn max_offset(&self, extent: usize) -> usize {
        extent.saturating_sub(self.viewport)
    }
}

fn clamp_offset(value: isize, max: usize) -> usize {
    value.clamp(0, max as isize) as usize
}
