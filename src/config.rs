use std::path::PathBuf;

use clap::Parser;

use crate::color::Color;

/// World-space distance between two consecutive sections
pub const SECTION_SPACING: f64 = 4.0;
/// Number of sections on the page, one scene object each
pub const SECTION_COUNT: usize = 6;
/// Registry slot filled by the asynchronously loaded model
pub const MODEL_SECTION: usize = 2;

pub const PARALLAX_AMPLITUDE: f64 = 0.5;
pub const PARALLAX_SMOOTHING: f64 = 4.0;

/// Continuous rotation speed (radians per second) about X and Y
pub const SPIN_RATE: [f64; 2] = [0.1, 0.2];

/// Rotation added to a section's object when it scrolls into view
pub const SECTION_TWEEN_DELTA: [f64; 3] = [6.0, 3.0, 1.5];
pub const SECTION_TWEEN_DURATION: f64 = 1.5;

pub const MOBILE_BREAKPOINT: f64 = 768.0;
pub const TABLET_BREAKPOINT: f64 = 1000.0;
pub const MAX_PIXEL_RATIO: f64 = 2.0;

/// Logical pixels covered by one terminal cell
pub const CELL_WIDTH_PX: f64 = 8.0;
pub const CELL_HEIGHT_PX: f64 = 16.0;

/// Logical pixels scrolled per mouse-wheel notch or arrow key
pub const SCROLL_STEP_PX: f64 = 120.0;

pub const PARTICLE_COUNT: usize = 300;

/// Preset colours the debug panel cycles through
pub const PALETTE: [&str; 6] = ["#ffffff", "#ffeded", "#8ecae6", "#ffb703", "#fb8500", "#b5e48c"];

/// Command-line options
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Show the debug panel
    #[arg(long)]
    pub testing: bool,

    /// Initial colour of the toon and glass materials
    #[arg(long, default_value = "#ffffff", value_parser = parse_color)]
    pub color: Color,

    /// glTF model shown in the third section
    #[arg(long, default_value = "static/models/Fox/glTF/Fox.gltf")]
    pub model: PathBuf,

    /// Target frames per second
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..=240))]
    pub fps: u32,

    /// Supersampling factor, capped at 2
    #[arg(long, default_value_t = 1.0)]
    pub pixel_ratio: f64,

    /// Seed for the particle field
    #[arg(long, default_value_t = 0x5eed)]
    pub seed: u64,

    /// File receiving log output (the terminal is the render surface)
    #[arg(long, default_value = "scrollscene.log")]
    pub log_file: PathBuf,
}

fn parse_color(value: &str) -> Result<Color, String> {
    Color::from_hex(value).map_err(|e| e.to_string())
}

/// Settings consumed by scene assembly
#[derive(Clone, Debug)]
pub struct SceneSettings {
    pub material_color: Color,
    pub seed: u64,
}

impl From<&Cli> for SceneSettings {
    fn from(cli: &Cli) -> Self {
        SceneSettings {
            material_color: cli.color,
            seed: cli.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let cli = Cli::try_parse_from(["scrollscene"]).unwrap();
        assert!(!cli.testing);
        assert_eq!(cli.color, Color::WHITE);
        assert_eq!(cli.fps, 60);
        assert_eq!(cli.pixel_ratio, 1.0);
    }

    #[test]
    fn testing_flag_and_colour() {
        let cli = Cli::try_parse_from(["scrollscene", "--testing", "--color", "#f00"]).unwrap();
        assert!(cli.testing);
        assert_eq!(SceneSettings::from(&cli).material_color, Color::rgb(1.0, 0.0, 0.0));
    }

    #[test]
    fn bad_colour_is_rejected() {
        assert!(Cli::try_parse_from(["scrollscene", "--color", "blue"]).is_err());
    }

    #[test]
    fn palette_entries_are_valid() {
        for entry in PALETTE {
            assert!(Color::from_hex(entry).is_ok(), "{entry}");
        }
    }
}
