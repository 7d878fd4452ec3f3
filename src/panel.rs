use std::time::Duration;

use crate::color::Color;
use crate::config::PALETTE;
use crate::material::Materials;

/// Values the debug panel can tweak
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Parameters {
    pub material_color: Color,
}

/// Rolling frames-per-second estimate
#[derive(Debug, Default)]
pub struct FpsCounter {
    frames_since_last_update: usize,
    last_fps_calculation: Duration,
    fps: f64,
}

impl FpsCounter {
    pub fn record(&mut self, now: Duration) {
        self.frames_since_last_update += 1;
        let window = now.saturating_sub(self.last_fps_calculation);
        if window.as_secs_f64() >= 1.0 {
            self.fps = self.frames_since_last_update as f64 / window.as_secs_f64();
            self.frames_since_last_update = 0;
            self.last_fps_calculation = now;
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

/// Overlay with the tunable material colour; hidden unless testing
#[derive(Debug)]
pub struct DebugPanel {
    visible: bool,
    palette_index: usize,
    pub fps: FpsCounter,
}

/// What the panel shows besides the parameters
pub struct PanelStatus {
    pub elapsed: f64,
    pub section: i64,
    pub scroll_offset: f64,
    pub model_loaded: bool,
}

impl DebugPanel {
    pub fn new(visible: bool) -> Self {
        DebugPanel {
            visible,
            palette_index: 0,
            fps: FpsCounter::default(),
        }
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    /// Recolours the shared materials right away
    pub fn set_material_color(
        &mut self,
        params: &mut Parameters,
        materials: &mut Materials,
        color: Color,
    ) {
        params.material_color = color;
        materials.set_material_color(color);
        log::info!("material colour set to {color}");
    }

    /// Steps to the next palette entry; does nothing while hidden
    pub fn cycle_color(
        &mut self,
        params: &mut Parameters,
        materials: &mut Materials,
    ) -> Option<Color> {
        if !self.visible {
            return None;
        }
        self.palette_index = (self.palette_index + 1) % PALETTE.len();
        let color = Color::from_hex(PALETTE[self.palette_index]).ok()?;
        self.set_material_color(params, materials, color);
        Some(color)
    }

    pub fn lines(&self, params: &Parameters, status: &PanelStatus) -> Vec<String> {
        if !self.visible {
            return Vec::new();
        }
        vec![
            format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            format!("materialColor: {}  [c] cycle", params.material_color),
            format!("section: {}  scroll: {:.0}px", status.section, status.scroll_offset),
            format!("model: {}", if status.model_loaded { "loaded" } else { "loading" }),
            format!("FPS: {:.2}  time: {:.1}s", self.fps.fps(), status.elapsed),
        ]
    }
}
