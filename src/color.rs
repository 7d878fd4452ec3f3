use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Linear RGB colour with components nominally in 0..=1
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColorParseError {
    #[error("colour must be #rgb or #rrggbb, got {0:?}")]
    InvalidLength(String),
    #[error("invalid hex digit in colour {0:?}")]
    InvalidDigit(String),
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);

    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Color { r, g, b }
    }

    pub fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Color::rgb(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0)
    }

    pub fn from_hex(value: &str) -> Result<Self, ColorParseError> {
        let digits = value.trim().trim_start_matches('#');
        if !digits.is_ascii() {
            return Err(ColorParseError::InvalidDigit(value.to_string()));
        }
        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 => digits.to_string(),
            _ => return Err(ColorParseError::InvalidLength(value.to_string())),
        };
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&expanded[range], 16)
                .map_err(|_| ColorParseError::InvalidDigit(value.to_string()))
        };
        Ok(Color::rgb8(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn as_rgb8(&self) -> (u8, u8, u8) {
        let quantize = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        (quantize(self.r), quantize(self.g), quantize(self.b))
    }

    pub fn scale(&self, factor: f64) -> Color {
        Color::rgb(self.r * factor, self.g * factor, self.b * factor)
    }

    pub fn add(&self, other: &Color) -> Color {
        Color::rgb(self.r + other.r, self.g + other.g, self.b + other.b)
    }

    pub fn multiply(&self, other: &Color) -> Color {
        Color::rgb(self.r * other.r, self.g * other.g, self.b * other.b)
    }

    pub fn lerp(&self, other: &Color, t: f64) -> Color {
        Color::rgb(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }

    pub fn clamped(&self) -> Color {
        Color::rgb(
            self.r.clamp(0.0, 1.0),
            self.g.clamp(0.0, 1.0),
            self.b.clamp(0.0, 1.0),
        )
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::from_hex(s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (r, g, b) = self.as_rgb8();
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hex_expands() {
        assert_eq!(Color::from_hex("#fff").unwrap(), Color::WHITE);
        assert_eq!(Color::from_hex("#f80").unwrap().as_rgb8(), (255, 136, 0));
    }

    #[test]
    fn display_uses_long_hex() {
        assert_eq!(Color::from_hex("1e90ff").unwrap().to_string(), "#1e90ff");
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            Color::from_hex("#ffff"),
            Err(ColorParseError::InvalidLength(_))
        ));
        assert!(matches!(
            Color::from_hex("#zzzzzz"),
            Err(ColorParseError::InvalidDigit(_))
        ));
    }

    #[test]
    fn non_ascii_input_is_an_error() {
        // Six bytes, five characters
        assert!(matches!(
            Color::from_hex("#aébcd"),
            Err(ColorParseError::InvalidDigit(_))
        ));
        assert!(Color::from_hex("ééé").is_err());
    }
}
