//! Colours, numeric gradients and per-element colour tables.

pub mod elements;
pub mod scheme;

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A packed `0xRRGGBB` colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "ColorRepr")]
pub struct Color(pub u32);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid colour '{0}'")]
pub struct ParseColorError(pub String);

impl Color {
    pub const WHITE: Color = Color(0xFFFFFF);
    pub const BLACK: Color = Color(0x000000);
    pub const GREY: Color = Color(0x808080);

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Color(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    pub fn r(self) -> u8 {
        ((self.0 >> 16) & 0xFF) as u8
    }

    pub fn g(self) -> u8 {
        ((self.0 >> 8) & 0xFF) as u8
    }

    pub fn b(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Channel values scaled to `[0, 1]`, as consumed by render backends.
    pub fn to_rgb_f32(self) -> [f32; 3] {
        [
            self.r() as f32 / 255.0,
            self.g() as f32 / 255.0,
            self.b() as f32 / 255.0,
        ]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0 & 0xFFFFFF)
    }
}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
            .or_else(|| trimmed.strip_prefix("0X"));
        if let Some(digits) = hex {
            return u32::from_str_radix(digits, 16)
                .ok()
                .filter(|v| *v <= 0xFFFFFF && digits.len() == 6)
                .map(Color)
                .ok_or_else(|| ParseColorError(s.to_string()));
        }
        named_color(&trimmed.to_ascii_lowercase()).ok_or_else(|| ParseColorError(s.to_string()))
    }
}

fn named_color(name: &str) -> Option<Color> {
    let value = match name {
        "white" => 0xFFFFFF,
        "black" => 0x000000,
        "grey" | "gray" => 0x808080,
        "red" => 0xFF0000,
        "green" => 0x00FF00,
        "blue" => 0x0000FF,
        "yellow" => 0xFFFF00,
        "orange" => 0xFFA500,
        "purple" => 0x800080,
        "cyan" => 0x00FFFF,
        "magenta" => 0xFF00FF,
        "pink" => 0xFFC0CB,
        "brown" => 0xA52A2A,
        "lightgrey" | "lightgray" => 0xD3D3D3,
        _ => return None,
    };
    Some(Color(value))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    Packed(u32),
    Text(String),
}

impl TryFrom<ColorRepr> for Color {
    type Error = ParseColorError;

    fn try_from(repr: ColorRepr) -> Result<Self, Self::Error> {
        match repr {
            ColorRepr::Packed(v) if v <= 0xFFFFFF => Ok(Color(v)),
            ColorRepr::Packed(v) => Err(ParseColorError(v.to_string())),
            ColorRepr::Text(s) => s.parse(),
        }
    }
}
