use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::core::color::elements::ElementColorMap;
use crate::core::models::style::AtomStyle;

/// Probe radius of a water molecule, in Ångström.
pub const DEFAULT_PROBE_RADIUS: f64 = 1.4;
pub const DEFAULT_RESOLUTION: f64 = 0.5;
/// Finer grids than this are rejected; memory grows with the cube of the inverse.
pub const MIN_RESOLUTION: f64 = 0.05;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Whether `add_surface` blocks until the mesh exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    #[default]
    Sync,
    Async,
}

#[derive(Debug, Error)]
#[error("Unknown extraction mode '{0}' (expected sync or async)")]
pub struct ParseExtractionModeError(pub String);

impl FromStr for ExtractionMode {
    type Err = ParseExtractionModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sync" => Ok(ExtractionMode::Sync),
            "async" => Ok(ExtractionMode::Async),
            _ => Err(ParseExtractionModeError(s.to_string())),
        }
    }
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMode::Sync => write!(f, "sync"),
            ExtractionMode::Async => write!(f, "async"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceConfig {
    pub probe_radius: f64,
    /// Grid spacing in Ångström.
    pub resolution: f64,
    pub mode: ExtractionMode,
    pub smooth_normals: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            probe_radius: DEFAULT_PROBE_RADIUS,
            resolution: DEFAULT_RESOLUTION,
            mode: ExtractionMode::Sync,
            smooth_normals: true,
        }
    }
}

impl SurfaceConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        validate_probe_radius(self.probe_radius)?;
        validate_resolution(self.resolution)
    }
}

pub(crate) fn validate_probe_radius(value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidParameter {
            name: "probe_radius",
            reason: format!("must be a finite, non-negative distance (got {value})"),
        });
    }
    Ok(())
}

pub(crate) fn validate_resolution(value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < MIN_RESOLUTION {
        return Err(ConfigError::InvalidParameter {
            name: "resolution",
            reason: format!("must be at least {MIN_RESOLUTION} (got {value})"),
        });
    }
    Ok(())
}

#[derive(Default)]
pub struct SurfaceConfigBuilder {
    probe_radius: Option<f64>,
    resolution: Option<f64>,
    mode: Option<ExtractionMode>,
    smooth_normals: Option<bool>,
}

impl SurfaceConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe_radius(mut self, radius: f64) -> Self {
        self.probe_radius = Some(radius);
        self
    }
    pub fn resolution(mut self, spacing: f64) -> Self {
        self.resolution = Some(spacing);
        self
    }
    pub fn mode(mut self, mode: ExtractionMode) -> Self {
        self.mode = Some(mode);
        self
    }
    pub fn smooth_normals(mut self, smooth: bool) -> Self {
        self.smooth_normals = Some(smooth);
        self
    }

    pub fn build(self) -> Result<SurfaceConfig, ConfigError> {
        let defaults = SurfaceConfig::default();
        let config = SurfaceConfig {
            probe_radius: self.probe_radius.unwrap_or(defaults.probe_radius),
            resolution: self.resolution.unwrap_or(defaults.resolution),
            mode: self.mode.unwrap_or(defaults.mode),
            smooth_normals: self.smooth_normals.unwrap_or(defaults.smooth_normals),
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewerConfig {
    pub surface: SurfaceConfig,
    /// Element colours handed to every new model.
    pub element_colors: ElementColorMap,
    /// Style applied to freshly loaded atoms; empty leaves them unstyled.
    pub default_style: AtomStyle,
}

#[derive(Default)]
pub struct ViewerConfigBuilder {
    surface: Option<SurfaceConfig>,
    element_colors: Option<ElementColorMap>,
    default_style: Option<AtomStyle>,
}

impl ViewerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn surface(mut self, surface: SurfaceConfig) -> Self {
        self.surface = Some(surface);
        self
    }
    pub fn element_colors(mut self, colors: ElementColorMap) -> Self {
        self.element_colors = Some(colors);
        self
    }
    pub fn default_style(mut self, style: AtomStyle) -> Self {
        self.default_style = Some(style);
        self
    }

    pub fn build(self) -> Result<ViewerConfig, ConfigError> {
        let surface = self.surface.unwrap_or_default();
        surface.validate()?;
        Ok(ViewerConfig {
            surface,
            element_colors: self.element_colors.unwrap_or_default(),
            default_style: self.default_style.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::style::{Representation, RepresentationStyle};

    mod surface_builder {
        use super::*;

        #[test]
        fn empty_builder_gives_defaults() {
            assert_eq!(SurfaceConfigBuilder::new().build().unwrap(), SurfaceConfig::default());
        }

        #[test]
        fn overrides_are_applied() {
            let config = SurfaceConfigBuilder::new()
                .probe_radius(0.0)
                .resolution(1.0)
                .mode(ExtractionMode::Async)
                .smooth_normals(false)
                .build()
                .unwrap();
            assert_eq!(config.probe_radius, 0.0);
            assert_eq!(config.resolution, 1.0);
            assert_eq!(config.mode, ExtractionMode::Async);
            assert!(!config.smooth_normals);
        }

        #[test]
        fn negative_probe_is_rejected() {
            let error = SurfaceConfigBuilder::new().probe_radius(-1.0).build().unwrap_err();
            assert!(matches!(
                error,
                ConfigError::InvalidParameter { name: "probe_radius", .. }
            ));
        }

        #[test]
        fn tiny_or_nan_resolution_is_rejected() {
            for bad in [0.0, 0.01, f64::NAN, f64::INFINITY] {
                let error = SurfaceConfigBuilder::new().resolution(bad).build().unwrap_err();
                assert!(matches!(
                    error,
                    ConfigError::InvalidParameter { name: "resolution", .. }
                ));
            }
        }
    }

    mod viewer_builder {
        use super::*;

        #[test]
        fn carries_default_style_and_surface() {
            let style = AtomStyle::only(Representation::Stick, RepresentationStyle::new());
            let config = ViewerConfigBuilder::new()
                .default_style(style.clone())
                .surface(SurfaceConfig {
                    resolution: 0.8,
                    ..SurfaceConfig::default()
                })
                .build()
                .unwrap();
            assert_eq!(config.default_style, style);
            assert_eq!(config.surface.resolution, 0.8);
        }

        #[test]
        fn invalid_surface_section_fails_the_build() {
            let result = ViewerConfigBuilder::new()
                .surface(SurfaceConfig {
                    probe_radius: f64::NAN,
                    ..SurfaceConfig::default()
                })
                .build();
            assert!(result.is_err());
        }
    }

    #[test]
    fn extraction_mode_parses_case_insensitively() {
        assert_eq!("ASYNC".parse::<ExtractionMode>().unwrap(), ExtractionMode::Async);
        assert_eq!(ExtractionMode::Sync.to_string(), "sync");
        assert!("later".parse::<ExtractionMode>().is_err());
    }
}
