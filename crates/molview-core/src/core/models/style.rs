//! Per-atom visual style records and surface materials.
//!
//! An [`AtomStyle`] holds one optional [`RepresentationStyle`] per [`Representation`].
//! Absent representations are not drawn. Deserialization recognises exactly the
//! representation keys (`line`, `cross`, `sphere`, `stick`, `cartoon`) and ignores
//! anything else.

use crate::core::color::Color;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_LINE_WIDTH: f64 = 1.0;
pub const DEFAULT_CROSS_RADIUS: f64 = 0.25;
pub const DEFAULT_STICK_RADIUS: f64 = 0.25;
pub const DEFAULT_CARTOON_WIDTH: f64 = 1.0;

/// The atom-level drawing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Representation {
    Line,
    Cross,
    Sphere,
    Stick,
    Cartoon,
}

impl Representation {
    pub const ALL: [Representation; 5] = [
        Representation::Line,
        Representation::Cross,
        Representation::Sphere,
        Representation::Stick,
        Representation::Cartoon,
    ];
}

#[derive(Debug, Error)]
#[error("Invalid representation string")]
pub struct ParseRepresentationError;

impl FromStr for Representation {
    type Err = ParseRepresentationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "line" | "lines" => Ok(Self::Line),
            "cross" => Ok(Self::Cross),
            "sphere" | "spheres" => Ok(Self::Sphere),
            "stick" | "sticks" => Ok(Self::Stick),
            "cartoon" => Ok(Self::Cartoon),
            _ => Err(ParseRepresentationError),
        }
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Line => "line",
            Self::Cross => "cross",
            Self::Sphere => "sphere",
            Self::Stick => "stick",
            Self::Cartoon => "cartoon",
        })
    }
}

/// Parameters of a single representation. Unset fields fall back to per-representation defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RepresentationStyle {
    pub color: Option<Color>,
    pub radius: Option<f64>,
    #[serde(alias = "linewidth", alias = "line-width")]
    pub line_width: Option<f64>,
    pub scale: Option<f64>,
    pub hidden: bool,
}

impl RepresentationStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = Some(width);
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// The full style record of an atom.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AtomStyle {
    pub line: Option<RepresentationStyle>,
    pub cross: Option<RepresentationStyle>,
    pub sphere: Option<RepresentationStyle>,
    pub stick: Option<RepresentationStyle>,
    pub cartoon: Option<RepresentationStyle>,
}

impl AtomStyle {
    pub fn new() -> Self {
        Self::default()
    }

    /// A style drawing only `representation` with the given parameters.
    pub fn only(representation: Representation, style: RepresentationStyle) -> Self {
        let mut out = Self::default();
        out.set(representation, Some(style));
        out
    }

    pub fn with(mut self, representation: Representation, style: RepresentationStyle) -> Self {
        self.set(representation, Some(style));
        self
    }

    pub fn get(&self, representation: Representation) -> Option<&RepresentationStyle> {
        self.slot(representation).as_ref()
    }

    pub fn set(&mut self, representation: Representation, style: Option<RepresentationStyle>) {
        *self.slot_mut(representation) = style;
    }

    /// The representation's parameters if it is present and not hidden.
    pub fn visible(&self, representation: Representation) -> Option<&RepresentationStyle> {
        self.get(representation).filter(|s| !s.hidden)
    }

    pub fn is_empty(&self) -> bool {
        Representation::ALL.iter().all(|r| self.get(*r).is_none())
    }

    /// Overwrites every representation present in `other`, keeping the rest.
    pub fn merge(&mut self, other: &AtomStyle) {
        for representation in Representation::ALL {
            if let Some(incoming) = other.get(representation) {
                self.set(representation, Some(incoming.clone()));
            }
        }
    }

    fn slot(&self, representation: Representation) -> &Option<RepresentationStyle> {
        match representation {
            Representation::Line => &self.line,
            Representation::Cross => &self.cross,
            Representation::Sphere => &self.sphere,
            Representation::Stick => &self.stick,
            Representation::Cartoon => &self.cartoon,
        }
    }

    fn slot_mut(&mut self, representation: Representation) -> &mut Option<RepresentationStyle> {
        match representation {
            Representation::Line => &mut self.line,
            Representation::Cross => &mut self.cross,
            Representation::Sphere => &mut self.sphere,
            Representation::Stick => &mut self.stick,
            Representation::Cartoon => &mut self.cartoon,
        }
    }
}

/// Surface appearance. Changing it never re-triangulates a surface.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MaterialStyle {
    pub color: Option<Color>,
    pub opacity: f32,
    pub wireframe: bool,
    pub hidden: bool,
}

impl Default for MaterialStyle {
    fn default() -> Self {
        Self {
            color: None,
            opacity: 1.0,
            wireframe: false,
            hidden: false,
        }
    }
}

impl MaterialStyle {
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(radius: f64) -> RepresentationStyle {
        RepresentationStyle::new().with_radius(radius)
    }

    mod merging {
        use super::*;

        #[test]
        fn present_kinds_overwrite_and_absent_kinds_survive() {
            let mut style = AtomStyle::only(Representation::Sphere, sphere(1.0))
                .with(Representation::Line, RepresentationStyle::new());
            let incoming = AtomStyle::only(Representation::Sphere, sphere(1.5))
                .with(Representation::Stick, RepresentationStyle::new());

            style.merge(&incoming);

            assert_eq!(style.sphere, Some(sphere(1.5)));
            assert_eq!(style.line, Some(RepresentationStyle::new()));
            assert!(style.stick.is_some());
            assert!(style.cross.is_none());
        }

        #[test]
        fn merging_empty_style_is_noop() {
            let mut style = AtomStyle::only(Representation::Cartoon, RepresentationStyle::new());
            let before = style.clone();
            style.merge(&AtomStyle::new());
            assert_eq!(style, before);
        }

        #[test]
        fn successive_merges_follow_merge_by_key_law() {
            let a = AtomStyle::only(Representation::Sphere, sphere(1.0))
                .with(Representation::Line, RepresentationStyle::new().with_line_width(2.0));
            let b = AtomStyle::only(Representation::Line, RepresentationStyle::new().with_line_width(4.0));
            let mut style = AtomStyle::new();
            style.merge(&a);
            style.merge(&b);
            assert_eq!(style.line, b.line);
            assert_eq!(style.sphere, a.sphere);
        }
    }

    mod visibility {
        use super::*;

        #[test]
        fn hidden_representation_is_not_visible() {
            let style = AtomStyle::only(Representation::Stick, RepresentationStyle::new().hidden());
            assert!(style.get(Representation::Stick).is_some());
            assert!(style.visible(Representation::Stick).is_none());
            assert!(!style.is_empty());
            assert!(AtomStyle::new().is_empty());
        }
    }

    mod parsing {
        use super::*;

        #[test]
        fn deserializes_known_keys_and_ignores_unknown() {
            let style: AtomStyle = toml::from_str(
                r##"
                [sphere]
                radius = 1.5
                color = "#ff0000"
                glow = true

                [stick]
                linewidth = 3.0

                [ribbon]
                width = 2
                "##,
            )
            .unwrap();
            assert_eq!(
                style.sphere,
                Some(RepresentationStyle::new().with_radius(1.5).with_color(Color(0xFF0000)))
            );
            assert_eq!(style.stick.as_ref().and_then(|s| s.line_width), Some(3.0));
            assert!(style.line.is_none());
        }

        #[test]
        fn representation_from_str_accepts_plurals() {
            assert_eq!("Spheres".parse::<Representation>().unwrap(), Representation::Sphere);
            assert_eq!("line".parse::<Representation>().unwrap(), Representation::Line);
            assert!("surface".parse::<Representation>().is_err());
        }

        #[test]
        fn material_defaults_are_opaque() {
            let material: MaterialStyle = toml::from_str("wireframe = true").unwrap();
            assert_eq!(material.opacity, 1.0);
            assert!(material.wireframe);
            assert_eq!(MaterialStyle::default().with_opacity(3.0).opacity, 1.0);
        }
    }
}
