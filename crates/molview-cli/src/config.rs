use crate::cli::SurfaceArgs;
use crate::error::{CliError, Result};
use molview::core::color::Color;
use molview::core::color::elements::ElementColorMap;
use molview::core::models::style::{AtomStyle, MaterialStyle};
use molview::engine::config::{
    ExtractionMode, SurfaceConfigBuilder, ViewerConfig, ViewerConfigBuilder,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ElementScheme {
    #[default]
    Jmol,
    Rasmol,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialSurfaceConfig {
    #[serde(rename = "probe-radius")]
    probe_radius: Option<f64>,
    resolution: Option<f64>,
    mode: Option<ExtractionMode>,
    #[serde(rename = "smooth-normals")]
    smooth_normals: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialColorConfig {
    scheme: Option<ElementScheme>,
    /// Per-element overrides on top of the scheme.
    #[serde(default)]
    elements: BTreeMap<String, Color>,
}

/// The `molview surface` configuration file. Every section is optional.
///
/// ```toml
/// [surface]
/// probe-radius = 1.4
/// resolution = 0.5
/// mode = "async"
///
/// [colors]
/// scheme = "rasmol"
/// elements = { C = "#33ff33" }
///
/// [material]
/// opacity = 0.8
/// ```
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialViewerConfig {
    surface: Option<PartialSurfaceConfig>,
    colors: Option<PartialColorConfig>,
    style: Option<AtomStyle>,
    material: Option<MaterialStyle>,
}

/// Viewer configuration plus the material for the surface being extracted.
#[derive(Debug)]
pub struct ResolvedConfig {
    pub viewer: ViewerConfig,
    pub material: MaterialStyle,
}

impl PartialViewerConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Loads the file named by `--config`, or starts empty.
    pub fn load(args: &SurfaceArgs) -> Result<Self> {
        match &args.config {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Command-line flags win over `--set` values, which win over the file.
    pub fn merge_with_cli(mut self, args: &SurfaceArgs) -> Result<ResolvedConfig> {
        self.apply_set_values(&args.set_values)?;

        let surface_file = self.surface.take().unwrap_or_default();
        let mut surface = SurfaceConfigBuilder::new();
        if let Some(radius) = args.probe_radius.or(surface_file.probe_radius) {
            surface = surface.probe_radius(radius);
        }
        if let Some(spacing) = args.resolution.or(surface_file.resolution) {
            surface = surface.resolution(spacing);
        }
        let mode = if args.run_async {
            Some(ExtractionMode::Async)
        } else {
            surface_file.mode
        };
        if let Some(mode) = mode {
            surface = surface.mode(mode);
        }
        let smooth = if args.flat_normals {
            Some(false)
        } else {
            surface_file.smooth_normals
        };
        if let Some(smooth) = smooth {
            surface = surface.smooth_normals(smooth);
        }
        let surface = surface.build().map_err(|e| CliError::Config(e.to_string()))?;

        let viewer = ViewerConfigBuilder::new()
            .surface(surface)
            .element_colors(Self::merge_colors(self.colors.take()))
            .default_style(self.style.take().unwrap_or_default())
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        Ok(ResolvedConfig {
            viewer,
            material: self.material.take().unwrap_or_default(),
        })
    }

    fn merge_colors(partial: Option<PartialColorConfig>) -> ElementColorMap {
        let partial = partial.unwrap_or_default();
        let mut colors = match partial.scheme.unwrap_or_default() {
            ElementScheme::Jmol => ElementColorMap::jmol(),
            ElementScheme::Rasmol => ElementColorMap::rasmol(),
        };
        for (element, color) in partial.elements {
            colors.insert(&element, color);
        }
        colors
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value) = kv_pair.split_once('=').ok_or_else(|| {
                CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                ))
            })?;
            let (key, value) = (key.trim(), value.trim());
            let surface = self.surface.get_or_insert_with(Default::default);

            match key {
                "surface.probe-radius" => surface.probe_radius = Some(parse_value(key, value)?),
                "surface.resolution" => surface.resolution = Some(parse_value(key, value)?),
                "surface.mode" => surface.mode = Some(parse_value(key, value)?),
                "surface.smooth-normals" => surface.smooth_normals = Some(parse_value(key, value)?),
                "colors.scheme" => {
                    let scheme = match value.to_ascii_lowercase().as_str() {
                        "jmol" => ElementScheme::Jmol,
                        "rasmol" => ElementScheme::Rasmol,
                        _ => {
                            return Err(CliError::Config(format!(
                                "Invalid value for {}: {} (expected jmol or rasmol)",
                                key, value
                            )));
                        }
                    };
                    self.colors.get_or_insert_with(Default::default).scheme = Some(scheme);
                }
                _ => {
                    let Some(element) = key.strip_prefix("colors.elements.") else {
                        return Err(CliError::Config(format!(
                            "Unsupported configuration key for --set: '{}'",
                            key
                        )));
                    };
                    let color = parse_value(key, value)?;
                    self.colors
                        .get_or_insert_with(Default::default)
                        .elements
                        .insert(element.to_string(), color);
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}
