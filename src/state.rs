use crate::config::{
    MAX_PIXEL_RATIO, MOBILE_BREAKPOINT, SECTION_COUNT, TABLET_BREAKPOINT,
};

/// Viewport size in logical pixels plus derived breakpoints
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    /// Render scale, never above `MAX_PIXEL_RATIO`
    pub pixel_ratio: f64,
    pub is_mobile: bool,
    pub is_tablet: bool,
}

impl Viewport {
    pub fn new(width: f64, height: f64, device_pixel_ratio: f64) -> Self {
        Viewport {
            width,
            height,
            pixel_ratio: device_pixel_ratio.min(MAX_PIXEL_RATIO),
            is_mobile: width < MOBILE_BREAKPOINT,
            is_tablet: width < TABLET_BREAKPOINT,
        }
    }

    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }
}

/// Cursor offset from the viewport centre, each axis in [-0.5, 0.5]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Cursor {
    pub x: f64,
    pub y: f64,
}

impl Cursor {
    pub fn from_client(client_x: f64, client_y: f64, viewport: &Viewport) -> Self {
        Cursor {
            x: (client_x / viewport.width - 0.5).clamp(-0.5, 0.5),
            y: (client_y / viewport.height - 0.5).clamp(-0.5, 0.5),
        }
    }
}

/// Vertical scroll position of the virtual page, in logical pixels
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollState {
    pub offset: f64,
}

impl ScrollState {
    pub fn max_offset(viewport: &Viewport) -> f64 {
        (SECTION_COUNT.saturating_sub(1)) as f64 * viewport.height
    }

    /// Moves to `offset`, clamped to the page
    pub fn scroll_to(&mut self, offset: f64, viewport: &Viewport) {
        self.offset = offset.clamp(0.0, ScrollState::max_offset(viewport));
    }

    #[cfg(test)]
    pub fn scroll_by(&mut self, amount: f64, viewport: &Viewport) {
        self.scroll_to(self.offset + amount, viewport);
    }
}

/// Section shown at a scroll offset: `round(offset / viewport_height)`
pub fn section_index(offset: f64, viewport_height: f64) -> i64 {
    (offset / viewport_height).round() as i64
}

/// Everything the event handlers write and the frame loop reads
#[derive(Clone, Debug, PartialEq)]
pub struct InputState {
    pub viewport: Viewport,
    pub scroll: ScrollState,
    pub cursor: Cursor,
}

impl InputState {
    pub fn new(viewport: Viewport) -> Self {
        InputState {
            viewport,
            scroll: ScrollState::default(),
            cursor: Cursor::default(),
        }
    }

    /// Rewrites the viewport record and keeps the scroll offset on the page
    pub fn resize(&mut self, width: f64, height: f64, device_pixel_ratio: f64) {
        self.viewport = Viewport::new(width, height, device_pixel_ratio);
        let offset = self.scroll.offset;
        self.scroll.scroll_to(offset, &self.viewport);
    }
}
