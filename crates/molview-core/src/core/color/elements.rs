use super::{Color, ParseColorError};
use phf::phf_map;
use std::collections::HashMap;
use thiserror::Error;

/// Colour used for elements absent from a map.
pub const DEFAULT_ELEMENT_COLOR: Color = Color(0xFF1493);

static JMOL_COLORS: phf::Map<&'static str, u32> = phf_map! {
    "H" => 0xFFFFFF,
    "HE" => 0xD9FFFF,
    "LI" => 0xCC80FF,
    "B" => 0xFFB5B5,
    "C" => 0x909090,
    "N" => 0x3050F8,
    "O" => 0xFF0D0D,
    "F" => 0x90E050,
    "NA" => 0xAB5CF2,
    "MG" => 0x8AFF00,
    "AL" => 0xBFA6A6,
    "SI" => 0xF0C8A0,
    "P" => 0xFF8000,
    "S" => 0xFFFF30,
    "CL" => 0x1FF01F,
    "K" => 0x8F40D4,
    "CA" => 0x3DFF00,
    "MN" => 0x9C7AC7,
    "FE" => 0xE06633,
    "CO" => 0xF090A0,
    "NI" => 0x50D050,
    "CU" => 0xC88033,
    "ZN" => 0x7D80B0,
    "SE" => 0xFFA100,
    "BR" => 0xA62929,
    "I" => 0x940094,
};

static RASMOL_COLORS: phf::Map<&'static str, u32> = phf_map! {
    "H" => 0xFFFFFF,
    "HE" => 0xFFC0CB,
    "LI" => 0xB22222,
    "B" => 0x00FF00,
    "C" => 0xC8C8C8,
    "N" => 0x8F8FFF,
    "O" => 0xF00000,
    "F" => 0xDAA520,
    "NA" => 0x0000FF,
    "MG" => 0x228B22,
    "AL" => 0x808090,
    "SI" => 0xDAA520,
    "P" => 0xFFA500,
    "S" => 0xFFC832,
    "CL" => 0x00FF00,
    "CA" => 0x808090,
    "MN" => 0x808090,
    "FE" => 0xFFA500,
    "NI" => 0xA52A2A,
    "CU" => 0xA52A2A,
    "ZN" => 0xA52A2A,
    "BR" => 0xA52A2A,
    "I" => 0xA020F0,
};

#[derive(Debug, Error)]
pub enum ElementColorMapError {
    #[error("Invalid colour table: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid colour for element '{element}': {source}")]
    Color {
        element: String,
        #[source]
        source: ParseColorError,
    },
}

/// Element symbol to colour lookup used when an atom carries no colour of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementColorMap {
    colors: HashMap<String, Color>,
    default: Color,
}

impl ElementColorMap {
    pub fn new(default: Color) -> Self {
        Self {
            colors: HashMap::new(),
            default,
        }
    }

    fn from_table(table: &phf::Map<&'static str, u32>) -> Self {
        Self {
            colors: table
                .entries()
                .map(|(k, v)| ((*k).to_string(), Color(*v)))
                .collect(),
            default: DEFAULT_ELEMENT_COLOR,
        }
    }

    /// Jmol-style colours, the default scheme for new models.
    pub fn jmol() -> Self {
        Self::from_table(&JMOL_COLORS)
    }

    pub fn rasmol() -> Self {
        Self::from_table(&RASMOL_COLORS)
    }

    /// Parses a flat TOML table of `element = colour` pairs on top of the Jmol defaults.
    ///
    /// ```ignore
    /// C = "#33ff33"
    /// FE = 0xffa500
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self, ElementColorMapError> {
        let raw: HashMap<String, toml::Value> = toml::from_str(content)?;
        let mut map = Self::jmol();
        for (element, value) in raw {
            let color = match value {
                toml::Value::Integer(v) if (0..=0xFFFFFF).contains(&v) => Color(v as u32),
                toml::Value::String(s) => {
                    s.parse().map_err(|source| ElementColorMapError::Color {
                        element: element.clone(),
                        source,
                    })?
                }
                other => {
                    return Err(ElementColorMapError::Color {
                        element,
                        source: ParseColorError(other.to_string()),
                    });
                }
            };
            map.insert(&element, color);
        }
        Ok(map)
    }

    pub fn insert(&mut self, element: &str, color: Color) {
        self.colors.insert(element.trim().to_ascii_uppercase(), color);
    }

    pub fn get(&self, element: &str) -> Option<Color> {
        self.colors
            .get(element.trim().to_ascii_uppercase().as_str())
            .copied()
    }

    /// Colour for `element`, falling back to the map default.
    pub fn color_of(&self, element: &str) -> Color {
        self.get(element).unwrap_or(self.default)
    }

    pub fn default_color(&self) -> Color {
        self.default
    }
}

impl Default for ElementColorMap {
    fn default() -> Self {
        Self::jmol()
    }
}

impl FromIterator<(String, Color)> for ElementColorMap {
    fn from_iter<T: IntoIterator<Item = (String, Color)>>(iter: T) -> Self {
        let mut map = Self::new(DEFAULT_ELEMENT_COLOR);
        for (element, color) in iter {
            map.insert(&element, color);
        }
        map
    }
}
