//! Numeric gradients mapping a value within a range onto a colour.

use super::Color;
use serde::Deserialize;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A pure `(value, range) -> colour` mapping.
///
/// Implementations carry at most a configured `(min, max)`; an explicit range passed to
/// [`ColorScheme::value_to_hex`] takes precedence over it. Values outside the range clamp
/// to its ends, and a collapsed range maps every value to the gradient midpoint.
pub trait ColorScheme: Send + Sync {
    fn value_to_hex(&self, value: f64, range: Option<(f64, f64)>) -> Color;

    /// The configured range, if any.
    fn range(&self) -> Option<(f64, f64)>;

    /// Identifier of the equivalent Jmol colour scheme.
    fn jmol_id(&self) -> &'static str;
}

/// Fraction of `value` within `[lo, hi]`, clamped, or `None` when the range is degenerate.
fn normalized(value: f64, lo: f64, hi: f64) -> Option<f64> {
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    if !(hi - lo).is_normal() || !value.is_finite() {
        return None;
    }
    Some(((value - lo) / (hi - lo)).clamp(0.0, 1.0))
}

fn resolve_range(explicit: Option<(f64, f64)>, configured: Option<(f64, f64)>) -> (f64, f64) {
    explicit.or(configured).unwrap_or((0.0, 1.0))
}

fn channel(scale: f64) -> u32 {
    (255.0 * scale.clamp(0.0, 1.0).sqrt()).floor() as u32
}

/// Red at the minimum, white at the midpoint, blue at the maximum.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rwb {
    range: Option<(f64, f64)>,
}

impl Rwb {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            range: Some((min, max)),
        }
    }
}

impl ColorScheme for Rwb {
    fn value_to_hex(&self, value: f64, range: Option<(f64, f64)>) -> Color {
        let (lo, hi) = resolve_range(range, self.range);
        let Some(t) = normalized(value, lo, hi) else {
            return Color::WHITE;
        };
        if t <= 0.5 {
            let s = channel(t / 0.5);
            Color(0xFF0000 + 0x100 * s + s)
        } else {
            let s = channel(1.0 - (t - 0.5) / 0.5);
            Color(0x10000 * s + 0x100 * s + 0xFF)
        }
    }

    fn range(&self) -> Option<(f64, f64)> {
        self.range
    }

    fn jmol_id(&self) -> &'static str {
        "rwb"
    }
}

/// Hue rotation red, orange, yellow, green, blue with a square-root ramp per quartile.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Roygb {
    range: Option<(f64, f64)>,
}

impl Roygb {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            range: Some((min, max)),
        }
    }
}

impl ColorScheme for Roygb {
    fn value_to_hex(&self, value: f64, range: Option<(f64, f64)>) -> Color {
        let (lo, hi) = resolve_range(range, self.range);
        let Some(t) = normalized(value, lo, hi) else {
            return Color(0x00FF00);
        };
        if t < 0.25 {
            Color(0xFF0000 + 0x100 * channel(t / 0.25))
        } else if t < 0.5 {
            Color(0x10000 * channel(1.0 - (t - 0.25) / 0.25) + 0xFF00)
        } else if t < 0.75 {
            Color(0xFF00 + channel((t - 0.5) / 0.25))
        } else {
            Color(0x100 * channel(1.0 - (t - 0.75) / 0.25) + 0xFF)
        }
    }

    fn range(&self) -> Option<(f64, f64)> {
        self.range
    }

    fn jmol_id(&self) -> &'static str {
        "roygb"
    }
}

/// Rainbow with constant perceived saturation built from phase-shifted `sin²` channels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sinebow {
    range: Option<(f64, f64)>,
}

impl Sinebow {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            range: Some((min, max)),
        }
    }
}

impl ColorScheme for Sinebow {
    fn value_to_hex(&self, value: f64, range: Option<(f64, f64)>) -> Color {
        let (lo, hi) = resolve_range(range, self.range);
        let t = normalized(value, lo, hi).unwrap_or(0.5);
        let h = 5.0 * t / 6.0 + 0.5;
        let component = |phase: f64| {
            let s = (PI * (h + phase)).sin();
            (s * s * 255.0).floor() as u8
        };
        Color::from_rgb(component(0.0), component(1.0 / 3.0), component(2.0 / 3.0))
    }

    fn range(&self) -> Option<(f64, f64)> {
        self.range
    }

    fn jmol_id(&self) -> &'static str {
        "sinebow"
    }
}

/// Names the built-in gradients for configuration files and command-line flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gradient {
    Rwb,
    Roygb,
    Sinebow,
}

#[derive(Debug, Error)]
#[error("Unknown colour gradient '{0}' (expected rwb, roygb or sinebow)")]
pub struct ParseGradientError(pub String);

impl Gradient {
    /// Instantiates the gradient, optionally with a configured value range.
    pub fn scheme(self, range: Option<(f64, f64)>) -> Box<dyn ColorScheme> {
        match (self, range) {
            (Gradient::Rwb, Some((lo, hi))) => Box::new(Rwb::new(lo, hi)),
            (Gradient::Rwb, None) => Box::new(Rwb::default()),
            (Gradient::Roygb, Some((lo, hi))) => Box::new(Roygb::new(lo, hi)),
            (Gradient::Roygb, None) => Box::new(Roygb::default()),
            (Gradient::Sinebow, Some((lo, hi))) => Box::new(Sinebow::new(lo, hi)),
            (Gradient::Sinebow, None) => Box::new(Sinebow::default()),
        }
    }
}

impl FromStr for Gradient {
    type Err = ParseGradientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rwb" => Ok(Self::Rwb),
            "roygb" | "rainbow" => Ok(Self::Roygb),
            "sinebow" => Ok(Self::Sinebow),
            _ => Err(ParseGradientError(s.to_string())),
        }
    }
}

impl fmt::Display for Gradient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rwb => "rwb",
            Self::Roygb => "roygb",
            Self::Sinebow => "sinebow",
        })
    }
}
